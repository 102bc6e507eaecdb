use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::types::{Contract, MeasurementKind};

/// One contract inside an outcome group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub range_label: String,
    pub contract: Contract,
}

impl Bucket {
    pub fn id(&self) -> &str {
        &self.contract.id
    }

    pub fn yes_price(&self) -> u32 {
        self.contract.yes_price
    }

    /// Cost (cents) of the losing side.
    pub fn no_price(&self) -> u32 {
        self.contract.no_price
    }

    /// Cents earned per NO contract when this bucket does not occur.
    pub fn no_profit_if_wins(&self) -> u32 {
        100u32.saturating_sub(self.no_price())
    }

    /// Cents lost per NO contract when this bucket occurs.
    pub fn no_loss_if_loses(&self) -> u32 {
        self.no_price()
    }

    pub fn has_liquidity(&self) -> bool {
        self.contract.has_liquidity()
    }
}

/// Mutually exclusive contracts for one location, date and measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeGroup {
    pub group_id: String,
    pub location: String,
    pub date_code: String,
    pub date: NaiveDate,
    pub kind: MeasurementKind,
    /// Ascending by range; "below" first, "above" last.
    pub buckets: Vec<Bucket>,
}

impl OutcomeGroup {
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn sum_yes_prices(&self) -> u32 {
        self.buckets.iter().map(Bucket::yes_price).sum()
    }

    /// Percentage points above 100 (negative when the book sums short).
    pub fn overround(&self) -> i64 {
        i64::from(self.sum_yes_prices()) - 100
    }

    pub fn sum_no_prices(&self) -> u32 {
        self.buckets.iter().map(Bucket::no_price).sum()
    }

    pub fn all_have_liquidity(&self) -> bool {
        self.buckets.iter().all(Bucket::has_liquidity)
    }
}

/// Position sized for one bucket. Money fields are dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketAllocation {
    pub contract_id: String,
    pub range_label: String,
    pub no_price: u32,
    pub yes_price: u32,
    pub contracts: u64,
    pub cost: f64,
    pub fees: f64,
    pub total_outlay: f64,
    pub profit_if_no_wins: f64,
    pub loss_if_yes_wins: f64,
    pub included: bool,
    pub viable: bool,
}

impl BucketAllocation {
    /// Included in the portfolio and actually holding contracts.
    pub fn is_held(&self) -> bool {
        self.included && self.contracts > 0
    }
}

/// Portfolio outcome if one bucket's event occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub winning_bucket: String,
    pub winning_label: String,
    /// Yes price normalized over the group; not a model probability.
    pub probability: f64,
    pub net_pnl: f64,
    pub is_profitable: bool,
}

/// Effect of exiting one held bucket early at the exit threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitAnalysis {
    pub contract_id: String,
    pub range_label: String,
    pub entry_no_price: u32,
    pub exit_no_price: u32,
    pub contracts: u64,
    pub exit_trigger_yes_prob: f64,
    pub num_other_buckets: usize,
    pub profit_per_other_bucket: f64,
    pub profit_from_others: f64,
    pub entry_cost: f64,
    pub loss_if_held: f64,
    pub loss_if_exit: f64,
    pub net_pnl: f64,
    pub improvement: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quality::Good => write!(f, "good"),
            Quality::Fair => write!(f, "fair"),
            Quality::Poor => write!(f, "poor"),
        }
    }
}

/// Reasons a portfolio is marked down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QualityFlag {
    NoDiversification,
    HighFeeRatio(f64),
    NearlyDecided(u32),
    NegativeExpectedValue,
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityFlag::NoDiversification => {
                write!(f, "Only 1 viable bucket - no diversification benefit")
            }
            QualityFlag::HighFeeRatio(ratio) => {
                write!(f, "Fees are {:.0}% of cost - poor economics", ratio * 100.0)
            }
            QualityFlag::NearlyDecided(yes) => {
                write!(f, "Market is {}% resolved - nearly settled", yes)
            }
            QualityFlag::NegativeExpectedValue => write!(f, "Negative expected value"),
        }
    }
}

/// Complete sizing and scenario report for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
    pub group_id: String,
    pub budget: f64,
    pub fee_per_contract: f64,
    pub allocations: Vec<BucketAllocation>,
    pub scenarios: Vec<Scenario>,
    pub total_cost: f64,
    pub total_fees: f64,
    pub total_outlay: f64,
    pub total_contracts: u64,
    pub expected_profit: f64,
    /// Expected profit when losing positions are exited at the threshold.
    pub adjusted_expected_profit: f64,
    pub worst_case_pnl: f64,
    pub best_case_pnl: f64,
    /// Probability mass of profitable scenarios, in [0, 1].
    pub win_probability: f64,
    pub fee_cost_ratio: f64,
    pub quality: Quality,
    pub quality_flags: Vec<QualityFlag>,
    pub quality_reason: String,
    pub exit_threshold: f64,
    pub exit_analysis: Vec<ExitAnalysis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitRecommendation {
    Sell,
    Hold,
}

/// Early-exit check for a single held NO position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub entry_no_price: u32,
    pub current_no_price: u32,
    /// Dollars per contract; negative is a loss.
    pub unrealized_pnl: f64,
    /// Dollars per contract lost if held and the bucket occurs.
    pub max_loss_if_held: f64,
    pub recommendation: ExitRecommendation,
}
