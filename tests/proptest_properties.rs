//! Property-Based Tests: Pricing and Allocation Invariants
//!
//! Uses `proptest` to check that the settlement model, the guardrail
//! cascade and the allocation engine hold their invariants across
//! random inputs.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use edge_engine::config::HedgeConfig;
use edge_engine::data::types::{Contract, MeasurementKind};
use edge_engine::hedge::calculator::{HedgeCalculator, MAX_NO_PRICE, MIN_NO_PRICE};
use edge_engine::hedge::types::{Bucket, OutcomeGroup};
use edge_engine::strategies::guardrails::{self, EdgeInputs, Guardrail};
use edge_engine::strategies::probability::discrete_mass;

fn group_from_prices(prices: &[(u32, u32)]) -> OutcomeGroup {
    let buckets = prices
        .iter()
        .enumerate()
        .map(|(i, (yes, no))| Bucket {
            range_label: format!("{}° to {}°", 30 + 2 * i, 31 + 2 * i),
            contract: Contract {
                id: format!("KXHIGHNY-26FEB24-B{}.5", 30 + 2 * i),
                description: String::new(),
                yes_price: *yes,
                no_price: *no,
                yes_bid: None,
                yes_ask: None,
                no_bid: None,
                no_ask: None,
                volume: 0,
                close_time: Utc.with_ymd_and_hms(2026, 2, 24, 23, 0, 0).unwrap(),
                fetched_at: Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap(),
            },
        })
        .collect();

    OutcomeGroup {
        group_id: "KXHIGHNY-26FEB24".to_string(),
        location: "New York".to_string(),
        date_code: "26FEB24".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
        kind: MeasurementKind::High,
        buckets,
    }
}

fn price_pairs() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0u32..=100, 0u32..=100), 1..8)
}

// ── Settlement Model Properties ─────────────────────────────

proptest! {
    /// P(reported = k) summed over a wide integer range is ~1.
    #[test]
    fn pmf_sums_to_one(mean in -40.0f64..120.0, sigma in 0.5f64..8.0) {
        let span = (10.0 * sigma).ceil() as i32 + 10;
        let center = mean.round() as i32;
        let total: f64 = (center - span..=center + span)
            .map(|k| discrete_mass(k, mean, sigma))
            .sum();
        prop_assert!((total - 1.0).abs() < 1e-6, "PMF summed to {total}");
    }

    /// With an integer mean the PMF is symmetric around it.
    #[test]
    fn pmf_symmetric_around_integer_mean(
        mean in -30i32..110,
        offset in 0i32..15,
        sigma in 0.5f64..8.0,
    ) {
        let above = discrete_mass(mean + offset, f64::from(mean), sigma);
        let below = discrete_mass(mean - offset, f64::from(mean), sigma);
        prop_assert!((above - below).abs() < 1e-12, "{above} != {below}");
    }
}

// ── Guardrail Properties ────────────────────────────────────

proptest! {
    /// Confident estimates on non-extreme markets are never zeroed by the
    /// extreme-market guardrail.
    #[test]
    fn confident_mid_market_not_zeroed(
        fair in 0.0f64..=1.0,
        market in 0.10f64..=0.90,
        confidence in 0.8f64..=1.0,
        liquid in any::<bool>(),
    ) {
        let guarded = guardrails::apply(EdgeInputs {
            fair_prob: fair,
            market_prob: market,
            confidence,
            has_liquidity: liquid,
        });
        prop_assert!(!guarded.triggered.contains(&Guardrail::ExtremeMarket));
        prop_assert!(guardrails::extreme_market(guarded.raw_edge, market, confidence).is_none());
    }
}

// ── Allocation Properties ───────────────────────────────────

proptest! {
    /// Scenario probabilities are a normalization and always sum to 1.
    #[test]
    fn scenario_probabilities_sum_to_one(
        prices in price_pairs(),
        budget in 1.0f64..5000.0,
    ) {
        let group = group_from_prices(&prices);
        let result = HedgeCalculator::new(HedgeConfig::default())
            .allocate(&group, budget, 0.011, None, None)
            .unwrap();

        let total: f64 = result.scenarios.iter().map(|s| s.probability).sum();
        prop_assert!((total - 1.0).abs() < 1e-9, "probabilities summed to {total}");
        prop_assert!(result.win_probability >= 0.0 && result.win_probability <= 1.0 + 1e-9);
    }

    /// Money spent on included buckets never exceeds the budget.
    #[test]
    fn allocation_within_budget(
        prices in price_pairs(),
        budget in 1.0f64..10000.0,
        fee in 0.0f64..0.05,
    ) {
        let group = group_from_prices(&prices);
        let result = HedgeCalculator::new(HedgeConfig::default())
            .allocate(&group, budget, fee, None, None)
            .unwrap();

        let spent_cents: f64 = result
            .allocations
            .iter()
            .filter(|a| a.included)
            .map(|a| a.contracts as f64 * f64::from(a.no_price))
            .sum();
        prop_assert!(spent_cents <= budget * 100.0 + 1e-6);
        prop_assert!(result.total_outlay <= budget + 1e-6);
    }

    /// Losing-side prices outside [5, 87] are never bought.
    #[test]
    fn out_of_band_prices_never_allocated(
        prices in price_pairs(),
        budget in 1.0f64..100000.0,
    ) {
        let group = group_from_prices(&prices);
        let result = HedgeCalculator::new(HedgeConfig::default())
            .allocate(&group, budget, 0.011, None, None)
            .unwrap();

        for alloc in &result.allocations {
            if alloc.no_price < MIN_NO_PRICE || alloc.no_price > MAX_NO_PRICE {
                prop_assert_eq!(alloc.contracts, 0);
                prop_assert!(!alloc.viable);
            }
        }
    }

    /// Exiting early never loses more than holding to resolution.
    #[test]
    fn dynamic_exit_improvement_non_negative(
        prices in price_pairs(),
        budget in 10.0f64..5000.0,
        threshold in 0.05f64..0.95,
    ) {
        let group = group_from_prices(&prices);
        let result = HedgeCalculator::new(HedgeConfig::default())
            .allocate(&group, budget, 0.011, None, Some(threshold))
            .unwrap();

        for exit in &result.exit_analysis {
            prop_assert!(exit.improvement >= 0.0, "improvement {}", exit.improvement);
            prop_assert!(exit.loss_if_exit >= exit.loss_if_held);
        }
        // static EV rounds each scenario to the cent
        prop_assert!(result.adjusted_expected_profit >= result.expected_profit - 0.01);
    }
}
