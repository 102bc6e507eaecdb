use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::types::Contract;
use crate::strategies::guardrails::Guardrail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Model view of one contract against its market price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeEstimate {
    pub contract_id: String,
    pub market_prob: f64,
    pub fair_prob: f64,
    /// fair − market before confidence weighting and guardrails.
    pub raw_edge: f64,
    /// Final edge; positive means YES is underpriced.
    pub edge: f64,
    pub confidence: f64,
    pub guardrails: Vec<Guardrail>,
    pub rationale: String,
}

impl EdgeEstimate {
    /// Edge of at least one percentage point.
    pub fn has_edge(&self) -> bool {
        self.edge.abs() >= 0.01
    }

    pub fn direction(&self) -> Side {
        if self.edge > 0.0 {
            Side::Yes
        } else {
            Side::No
        }
    }
}

/// Actionable edge, ready to hand to a downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub market_id: String,
    pub description: String,
    pub market_prob: f64,
    pub fair_prob: f64,
    pub edge: f64,
    pub confidence: f64,
    pub side: Side,
    pub rationale: String,
    pub emitted_at: DateTime<Utc>,
}

impl Signal {
    pub fn from_estimate(contract: &Contract, estimate: &EdgeEstimate, now: DateTime<Utc>) -> Self {
        Self {
            market_id: estimate.contract_id.clone(),
            description: contract.description.clone(),
            market_prob: estimate.market_prob,
            fair_prob: estimate.fair_prob,
            edge: estimate.edge,
            confidence: estimate.confidence,
            side: estimate.direction(),
            rationale: estimate.rationale.clone(),
            emitted_at: now,
        }
    }
}
