//! Edge guardrails, applied in order:
//!
//! 1. raw edge = fair − market
//! 2. confidence weighting: edge × confidence
//! 3. extreme market: market < 10% or > 90% with confidence < 0.8 → 0
//! 4. extreme edge: |raw| > 50% → 0 unless liquid and market ≥ 2%;
//!    30% < |raw| ≤ 50% on an illiquid contract → edge × 0.3
//!
//! Every step is a pure function of its inputs so the cascade can be
//! replayed and tested step by step.

use serde::{Deserialize, Serialize};

pub const EXTREME_MARKET_LOW: f64 = 0.10;
pub const EXTREME_MARKET_HIGH: f64 = 0.90;
pub const EXTREME_MARKET_MIN_CONFIDENCE: f64 = 0.8;
pub const EXTREME_EDGE: f64 = 0.50;
pub const LARGE_EDGE: f64 = 0.30;
pub const LARGE_EDGE_DAMPENING: f64 = 0.3;
pub const PENNY_MARKET: f64 = 0.02;

/// A guardrail that changed the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guardrail {
    ExtremeMarket,
    ExtremeEdge,
    LargeEdgeDampened,
}

impl std::fmt::Display for Guardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Guardrail::ExtremeMarket => write!(f, "extreme market price, low confidence: edge zeroed"),
            Guardrail::ExtremeEdge => write!(f, "edge >50% looks like a data artifact: edge zeroed"),
            Guardrail::LargeEdgeDampened => write!(f, "large edge on illiquid contract: edge ×0.3"),
        }
    }
}

/// What the cascade needs to know about one contract evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeInputs {
    pub fair_prob: f64,
    pub market_prob: f64,
    pub confidence: f64,
    pub has_liquidity: bool,
}

/// Result of running the full cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedEdge {
    pub raw_edge: f64,
    pub edge: f64,
    pub triggered: Vec<Guardrail>,
}

pub fn raw_edge(fair_prob: f64, market_prob: f64) -> f64 {
    fair_prob - market_prob
}

pub fn confidence_weighted(raw_edge: f64, confidence: f64) -> f64 {
    raw_edge * confidence.clamp(0.0, 1.0)
}

/// Step 3. Returns `None` when the guardrail does not fire.
pub fn extreme_market(edge: f64, market_prob: f64, confidence: f64) -> Option<f64> {
    let extreme = market_prob < EXTREME_MARKET_LOW || market_prob > EXTREME_MARKET_HIGH;
    if extreme && confidence < EXTREME_MARKET_MIN_CONFIDENCE && edge != 0.0 {
        Some(0.0)
    } else {
        None
    }
}

/// Step 4. Triggered by the magnitude of the *raw* edge.
pub fn extreme_edge(
    edge: f64,
    raw_edge: f64,
    market_prob: f64,
    has_liquidity: bool,
) -> Option<(f64, Guardrail)> {
    let magnitude = raw_edge.abs();
    if magnitude > EXTREME_EDGE {
        if has_liquidity && market_prob >= PENNY_MARKET {
            None
        } else {
            Some((0.0, Guardrail::ExtremeEdge))
        }
    } else if magnitude > LARGE_EDGE && !has_liquidity {
        Some((edge * LARGE_EDGE_DAMPENING, Guardrail::LargeEdgeDampened))
    } else {
        None
    }
}

/// Run the full cascade.
pub fn apply(inputs: EdgeInputs) -> GuardedEdge {
    let raw = raw_edge(inputs.fair_prob, inputs.market_prob);
    let mut edge = confidence_weighted(raw, inputs.confidence);
    let mut triggered = Vec::new();

    if let Some(adjusted) = extreme_market(edge, inputs.market_prob, inputs.confidence) {
        edge = adjusted;
        triggered.push(Guardrail::ExtremeMarket);
    }

    if let Some((adjusted, guardrail)) =
        extreme_edge(edge, raw, inputs.market_prob, inputs.has_liquidity)
    {
        if adjusted != edge {
            triggered.push(guardrail);
        }
        edge = adjusted;
    }

    GuardedEdge {
        raw_edge: raw,
        edge,
        triggered,
    }
}
