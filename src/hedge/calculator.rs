use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::config::HedgeConfig;
use crate::hedge::error::HedgeError;
use crate::hedge::types::{
    BucketAllocation, ExitAnalysis, ExitRecommendation, ExitSignal, OutcomeGroup,
    PortfolioResult, Quality, QualityFlag, Scenario,
};

/// Losing-side prices below this are near-certain losses.
pub const MIN_NO_PRICE: u32 = 5;
/// Losing-side prices above this leave too little margin.
pub const MAX_NO_PRICE: u32 = 87;
pub const MAX_FEE_RATIO: f64 = 0.5;
/// A yes price at or above this means the group is nearly settled.
pub const NEARLY_DECIDED_YES: u32 = 90;
/// Unrealized loss fraction at which a single position should be sold.
pub const DEFAULT_EXIT_LOSS_FRACTION: f64 = 0.30;

/// Sizes losing-side positions across an outcome group and scores the result.
///
/// Stateless apart from its configuration; every call is a pure function of
/// the group snapshot and parameters.
#[derive(Debug, Clone)]
pub struct HedgeCalculator {
    config: HedgeConfig,
}

impl HedgeCalculator {
    pub fn new(config: HedgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HedgeConfig {
        &self.config
    }

    /// Allocate `budget` dollars across the selected buckets of `group`.
    ///
    /// `selected = None` selects every bucket. `exit_threshold = None` uses the
    /// configured threshold.
    pub fn allocate(
        &self,
        group: &OutcomeGroup,
        budget: f64,
        fee_per_contract: f64,
        selected: Option<&[String]>,
        exit_threshold: Option<f64>,
    ) -> Result<PortfolioResult, HedgeError> {
        let exit_threshold = exit_threshold.unwrap_or(self.config.exit_threshold);
        validate(budget, fee_per_contract, exit_threshold)?;

        debug!(
            "{}: {} buckets, YES sum {}¢ ({:+}), NO sum {}¢, all liquid: {}",
            group.group_id,
            group.num_buckets(),
            group.sum_yes_prices(),
            group.overround(),
            group.sum_no_prices(),
            group.all_have_liquidity()
        );

        let selected: HashSet<&str> = match selected {
            Some(ids) => ids.iter().map(String::as_str).collect(),
            None => group.buckets.iter().map(|b| b.id()).collect(),
        };

        let allocations = allocate_proportional(group, budget, fee_per_contract, &selected);
        let scenarios = build_scenarios(group, &allocations);

        let held: Vec<&BucketAllocation> = allocations.iter().filter(|a| a.is_held()).collect();
        let total_cost: f64 = held.iter().map(|a| a.cost).sum();
        let total_fees: f64 = held.iter().map(|a| a.fees).sum();
        let total_contracts: u64 = held.iter().map(|a| a.contracts).sum();

        let expected_profit: f64 = scenarios.iter().map(|s| s.probability * s.net_pnl).sum();
        let win_probability: f64 = scenarios
            .iter()
            .filter(|s| s.is_profitable)
            .map(|s| s.probability)
            .sum();
        let worst_case_pnl = scenarios.iter().map(|s| s.net_pnl).reduce(f64::min).unwrap_or(0.0);
        let best_case_pnl = scenarios.iter().map(|s| s.net_pnl).reduce(f64::max).unwrap_or(0.0);
        let fee_cost_ratio = if total_cost > 0.0 { total_fees / total_cost } else { 0.0 };

        let quality_flags = assess_quality(group, held.len(), fee_cost_ratio, expected_profit);
        let quality = rate(&quality_flags);
        let quality_reason = quality_flags
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");

        let (adjusted_expected_profit, exit_analysis) =
            if self.config.enable_dynamic_exit && !held.is_empty() {
                dynamic_exit(&allocations, &scenarios, exit_threshold)
            } else {
                (expected_profit, Vec::new())
            };

        info!(
            "Allocated {}: {} contracts across {} buckets, outlay ${:.2}, EV ${:.2} (adjusted ${:.2}), quality {}",
            group.group_id,
            total_contracts,
            held.len(),
            total_cost + total_fees,
            expected_profit,
            adjusted_expected_profit,
            quality
        );

        Ok(PortfolioResult {
            group_id: group.group_id.clone(),
            budget,
            fee_per_contract,
            allocations,
            scenarios,
            total_cost,
            total_fees,
            total_outlay: total_cost + total_fees,
            total_contracts,
            expected_profit,
            adjusted_expected_profit,
            worst_case_pnl,
            best_case_pnl,
            win_probability,
            fee_cost_ratio,
            quality,
            quality_flags,
            quality_reason,
            exit_threshold,
            exit_analysis,
        })
    }

    /// Look a group up by id, then [`allocate`](Self::allocate) it.
    pub fn allocate_by_id(
        &self,
        groups: &[OutcomeGroup],
        group_id: &str,
        budget: f64,
        fee_per_contract: f64,
        selected: Option<&[String]>,
        exit_threshold: Option<f64>,
    ) -> Result<PortfolioResult, HedgeError> {
        let group = groups
            .iter()
            .find(|g| g.group_id == group_id)
            .ok_or_else(|| HedgeError::GroupNotFound(group_id.to_string()))?;

        self.allocate(group, budget, fee_per_contract, selected, exit_threshold)
    }

    /// Should a held NO bought at `entry_no_price` be sold at `current_no_price`?
    pub fn evaluate_exit(
        entry_no_price: u32,
        current_no_price: u32,
        loss_fraction_threshold: f64,
    ) -> ExitSignal {
        let unrealized_cents = i64::from(current_no_price) - i64::from(entry_no_price);
        let loss_fraction = if entry_no_price > 0 {
            unrealized_cents.unsigned_abs() as f64 / f64::from(entry_no_price)
        } else {
            0.0
        };

        let recommendation = if unrealized_cents < 0 && loss_fraction >= loss_fraction_threshold {
            ExitRecommendation::Sell
        } else {
            ExitRecommendation::Hold
        };

        ExitSignal {
            entry_no_price,
            current_no_price,
            unrealized_pnl: unrealized_cents as f64 / 100.0,
            max_loss_if_held: -f64::from(entry_no_price) / 100.0,
            recommendation,
        }
    }
}

fn validate(budget: f64, fee_per_contract: f64, exit_threshold: f64) -> Result<(), HedgeError> {
    if !(budget.is_finite() && budget > 0.0) {
        return Err(HedgeError::InvalidBudget(budget));
    }
    if !(fee_per_contract.is_finite() && fee_per_contract >= 0.0) {
        return Err(HedgeError::InvalidFee(fee_per_contract));
    }
    if !(exit_threshold > 0.0 && exit_threshold < 1.0) {
        return Err(HedgeError::InvalidExitThreshold(exit_threshold));
    }
    Ok(())
}

fn round_cents(dollars: f64) -> f64 {
    (dollars * 100.0).round() / 100.0
}

/// Passes the price band and still earns something after fees.
fn is_viable(no_price: u32, fee_per_contract: f64) -> bool {
    if !(MIN_NO_PRICE..=MAX_NO_PRICE).contains(&no_price) {
        return false;
    }
    f64::from(100 - no_price) / 100.0 - fee_per_contract > 0.0
}

/// Profit earned per dollar risked on the losing side.
fn margin_weight(no_price: u32) -> f64 {
    f64::from(100 - no_price) / f64::from(no_price)
}

fn allocate_proportional(
    group: &OutcomeGroup,
    budget: f64,
    fee_per_contract: f64,
    selected: &HashSet<&str>,
) -> Vec<BucketAllocation> {
    let weights: HashMap<&str, f64> = group
        .buckets
        .iter()
        .filter(|b| selected.contains(b.id()) && is_viable(b.no_price(), fee_per_contract))
        .map(|b| (b.id(), margin_weight(b.no_price())))
        .collect();
    let total_weight: f64 = weights.values().sum();

    let budget_cents = budget * 100.0;
    let fee_cents = fee_per_contract * 100.0;

    group
        .buckets
        .iter()
        .map(|bucket| {
            let included = selected.contains(bucket.id());
            let weight = weights.get(bucket.id()).copied();
            let no_price = bucket.no_price();

            let contracts = match weight {
                Some(weight) if included && total_weight > 0.0 => {
                    let share_cents = weight / total_weight * budget_cents;
                    let unit_cents = f64::from(no_price) + fee_cents;
                    if unit_cents > 0.0 {
                        (share_cents / unit_cents).floor().max(0.0) as u64
                    } else {
                        0
                    }
                }
                _ => {
                    debug!(
                        "{}: no allocation (included={}, no_price={}¢)",
                        bucket.id(),
                        included,
                        no_price
                    );
                    0
                }
            };

            let cost = contracts as f64 * f64::from(bucket.no_loss_if_loses()) / 100.0;
            let fees = contracts as f64 * fee_per_contract;
            let (profit_if_no_wins, loss_if_yes_wins) = if contracts > 0 {
                (
                    contracts as f64 * f64::from(bucket.no_profit_if_wins()) / 100.0 - fees,
                    -(cost + fees),
                )
            } else {
                (0.0, 0.0)
            };

            BucketAllocation {
                contract_id: bucket.id().to_string(),
                range_label: bucket.range_label.clone(),
                no_price,
                yes_price: bucket.yes_price(),
                contracts,
                cost,
                fees,
                total_outlay: cost + fees,
                profit_if_no_wins,
                loss_if_yes_wins,
                included,
                viable: weight.is_some(),
            }
        })
        .collect()
}

/// One scenario per bucket: that bucket's event occurs, every other bucket's
/// does not.
fn build_scenarios(group: &OutcomeGroup, allocations: &[BucketAllocation]) -> Vec<Scenario> {
    let sum_yes = group.sum_yes_prices();
    let n = group.num_buckets();

    group
        .buckets
        .iter()
        .map(|bucket| {
            let probability = if sum_yes > 0 {
                f64::from(bucket.yes_price()) / f64::from(sum_yes)
            } else {
                1.0 / n as f64
            };

            let net_pnl: f64 = allocations
                .iter()
                .filter(|a| a.is_held())
                .map(|a| {
                    if a.contract_id == bucket.id() {
                        a.loss_if_yes_wins
                    } else {
                        a.profit_if_no_wins
                    }
                })
                .sum();

            Scenario {
                winning_bucket: bucket.id().to_string(),
                winning_label: bucket.range_label.clone(),
                probability,
                net_pnl: round_cents(net_pnl),
                is_profitable: net_pnl > 0.0,
            }
        })
        .collect()
}

fn assess_quality(
    group: &OutcomeGroup,
    held_buckets: usize,
    fee_cost_ratio: f64,
    expected_profit: f64,
) -> Vec<QualityFlag> {
    let mut flags = Vec::new();

    if held_buckets <= 1 {
        flags.push(QualityFlag::NoDiversification);
    }
    if fee_cost_ratio > MAX_FEE_RATIO {
        flags.push(QualityFlag::HighFeeRatio(fee_cost_ratio));
    }
    let max_yes = group.buckets.iter().map(|b| b.yes_price()).max().unwrap_or(0);
    if max_yes >= NEARLY_DECIDED_YES {
        flags.push(QualityFlag::NearlyDecided(max_yes));
    }
    if expected_profit < 0.0 {
        flags.push(QualityFlag::NegativeExpectedValue);
    }

    flags
}

fn rate(flags: &[QualityFlag]) -> Quality {
    match flags {
        [] => Quality::Good,
        [QualityFlag::NearlyDecided(_)] => Quality::Poor,
        [_] => Quality::Fair,
        _ => Quality::Poor,
    }
}

/// Exit price in cents once the implied yes probability reaches `threshold`.
fn exit_no_price(threshold: f64) -> u32 {
    (100.0 - threshold * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Loss (dollars, negative) from exiting a held position at `exit_no` cents.
fn exit_loss(allocation: &BucketAllocation, exit_no: u32) -> f64 {
    let capped_cents = allocation.no_price.saturating_sub(exit_no);
    -(allocation.contracts as f64 * f64::from(capped_cents) / 100.0 + allocation.fees)
}

/// Expected profit when a bucket whose event occurs is exited at the threshold
/// instead of held to resolution, plus a per-bucket breakdown.
fn dynamic_exit(
    allocations: &[BucketAllocation],
    scenarios: &[Scenario],
    threshold: f64,
) -> (f64, Vec<ExitAnalysis>) {
    let held: Vec<&BucketAllocation> = allocations.iter().filter(|a| a.is_held()).collect();
    let exit_no = exit_no_price(threshold);

    let adjusted_expected: f64 = scenarios
        .iter()
        .map(|scenario| {
            let winner = held.iter().find(|a| a.contract_id == scenario.winning_bucket);
            let pnl = match winner {
                None => scenario.net_pnl,
                Some(winner) => held
                    .iter()
                    .map(|a| {
                        if a.contract_id == winner.contract_id {
                            exit_loss(a, exit_no)
                        } else {
                            a.profit_if_no_wins
                        }
                    })
                    .sum::<f64>(),
            };
            scenario.probability * pnl
        })
        .sum();

    let analysis = held
        .iter()
        .map(|alloc| {
            let entry_cost = alloc.cost;
            let loss_if_held = alloc.loss_if_yes_wins;
            let loss_if_exit = exit_loss(alloc, exit_no);

            let others: Vec<&&BucketAllocation> = held
                .iter()
                .filter(|other| other.contract_id != alloc.contract_id)
                .collect();
            let profit_from_others: f64 = others.iter().map(|o| o.profit_if_no_wins).sum();
            let profit_per_other_bucket = if others.is_empty() {
                0.0
            } else {
                profit_from_others / others.len() as f64
            };

            ExitAnalysis {
                contract_id: alloc.contract_id.clone(),
                range_label: alloc.range_label.clone(),
                entry_no_price: alloc.no_price,
                exit_no_price: exit_no,
                contracts: alloc.contracts,
                exit_trigger_yes_prob: threshold,
                num_other_buckets: others.len(),
                profit_per_other_bucket: round_cents(profit_per_other_bucket),
                profit_from_others: round_cents(profit_from_others),
                entry_cost: round_cents(entry_cost),
                loss_if_held: round_cents(loss_if_held),
                loss_if_exit: round_cents(loss_if_exit),
                net_pnl: round_cents(profit_from_others + loss_if_exit),
                improvement: round_cents(loss_if_held.abs() - loss_if_exit.abs()),
            }
        })
        .collect();

    (adjusted_expected, analysis)
}
