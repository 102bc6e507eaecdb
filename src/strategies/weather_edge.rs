use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{EdgeConfig, ModelConfig};
use crate::data::snapshot::ForecastSource;
use crate::data::stations::StationTable;
use crate::data::ticker::{parse_contract_terms, ContractTerms, Settlement};
use crate::data::types::{Contract, ForecastObservation, MeasurementKind};
use crate::strategies::guardrails::{self, EdgeInputs};
use crate::strategies::probability::{effective_sigma, settlement_probability, SIGMA_FLOOR};
use crate::strategies::types::EdgeEstimate;

const DEFAULT_DECAY_HOURS: f64 = 6.0;

const AGE_FACTOR_FLOOR: f64 = 0.5;
const HORIZON_FACTOR_FLOOR: f64 = 0.6;
const UNCERTAINTY_FACTOR_FLOOR: f64 = 0.7;
const HORIZON_GRACE_HOURS: f64 = 24.0;
const HORIZON_FALLOFF_HOURS: f64 = 120.0;
const UNCERTAINTY_GRACE_STD: f64 = 4.0;
const UNCERTAINTY_FALLOFF_STD: f64 = 10.0;

/// Fair-probability model for integer-settled temperature contracts.
#[derive(Debug, Clone)]
pub struct WeatherEdgeModel {
    stations: StationTable,
    confidence_decay_hours: f64,
}

impl WeatherEdgeModel {
    pub fn new(stations: StationTable, confidence_decay_hours: f64) -> Self {
        let confidence_decay_hours =
            if confidence_decay_hours.is_finite() && confidence_decay_hours > 0.0 {
                confidence_decay_hours
            } else {
                DEFAULT_DECAY_HOURS
            };
        Self {
            stations,
            confidence_decay_hours,
        }
    }

    pub fn from_config(edge: &EdgeConfig, model: &ModelConfig) -> Self {
        Self::new(
            StationTable::new(model.reporting_noise.clone()),
            edge.confidence_decay_hours,
        )
    }

    /// Evaluate one contract against whatever forecast the source holds for
    /// its location and date.
    ///
    /// Returns `None` when the identifier does not parse or no usable
    /// forecast exists; bad input never aborts a batch.
    pub fn evaluate(
        &self,
        contract: &Contract,
        forecasts: &dyn ForecastSource,
        now: DateTime<Utc>,
    ) -> Option<EdgeEstimate> {
        let terms = match parse_contract_terms(contract) {
            Some(terms) => terms,
            None => {
                debug!("Cannot parse contract: {}", contract.id);
                return None;
            }
        };

        let forecast = match forecasts.forecast(&terms.location, terms.date) {
            Some(forecast) => forecast,
            None => {
                debug!("No forecast for {} on {}", terms.location, terms.date);
                return None;
            }
        };

        self.evaluate_terms(contract, &terms, forecast, now)
    }

    /// Evaluate already-parsed terms against a specific forecast.
    pub fn evaluate_terms(
        &self,
        contract: &Contract,
        terms: &ContractTerms,
        forecast: &ForecastObservation,
        now: DateTime<Utc>,
    ) -> Option<EdgeEstimate> {
        let (mean, forecast_std) = forecast.for_kind(terms.kind);
        if !mean.is_finite() {
            debug!("Forecast mean is not finite for {}", contract.id);
            return None;
        }

        let sigma_forecast = if forecast_std.is_finite() {
            forecast_std.max(SIGMA_FLOOR)
        } else {
            SIGMA_FLOOR
        };
        let sigma_reporting = self.stations.reporting_noise(&terms.location);
        let sigma_eff = effective_sigma(sigma_forecast, sigma_reporting);

        let observed = forecast
            .observed_temp
            .and_then(|temp| observed_outcome(terms.kind, terms.settlement, temp));
        let fair_prob = observed
            .unwrap_or_else(|| settlement_probability(terms.settlement, mean, sigma_eff));

        let market_prob = contract.implied_probability();
        let confidence = self.confidence_score(forecast, contract, now);
        let guarded = guardrails::apply(EdgeInputs {
            fair_prob,
            market_prob,
            confidence,
            has_liquidity: contract.has_liquidity(),
        });

        let mut rationale = format!(
            "Forecast {}: {:.1}°F | σ_forecast {:.2}, σ_reporting {:.2}, σ_eff {:.2} | {} = {:.1}% | Market: {:.1}% | {}",
            terms.kind,
            mean,
            sigma_forecast,
            sigma_reporting,
            sigma_eff,
            describe_condition(terms.kind, terms.settlement),
            fair_prob * 100.0,
            market_prob * 100.0,
            pricing_assessment(guarded.raw_edge),
        );
        if let (Some(temp), Some(_)) = (forecast.observed_temp, observed) {
            rationale.push_str(&format!(" | Observed {:.0}°F already decides outcome", temp));
        }
        for guardrail in &guarded.triggered {
            rationale.push_str(&format!(" | Guardrail: {}", guardrail));
        }

        debug!(
            "Evaluated {}: market={:.1}%, fair={:.1}%, edge={:+.1}%, confidence={:.3}",
            contract.id,
            market_prob * 100.0,
            fair_prob * 100.0,
            guarded.edge * 100.0,
            confidence
        );

        Some(EdgeEstimate {
            contract_id: contract.id.clone(),
            market_prob,
            fair_prob,
            raw_edge: guarded.raw_edge,
            edge: guarded.edge,
            confidence,
            guardrails: guarded.triggered,
            rationale,
        })
    }

    /// Data-quality confidence in [0, 1]: the product of age, horizon and
    /// uncertainty decay factors, each with its own floor.
    pub fn confidence_score(
        &self,
        forecast: &ForecastObservation,
        contract: &Contract,
        now: DateTime<Utc>,
    ) -> f64 {
        let mut confidence = 1.0;

        let age_hours = forecast.age_hours(now);
        if age_hours > 0.0 {
            let age_factor = (1.0 - (age_hours / self.confidence_decay_hours) * 0.5)
                .max(AGE_FACTOR_FLOOR);
            confidence *= age_factor;
        }

        let hours_until_close = contract.hours_until_close(now);
        if hours_until_close > HORIZON_GRACE_HOURS {
            let horizon_factor = (1.0
                - (hours_until_close - HORIZON_GRACE_HOURS) / HORIZON_FALLOFF_HOURS)
                .max(HORIZON_FACTOR_FLOOR);
            confidence *= horizon_factor;
        }

        let avg_std = forecast.average_std();
        if avg_std > UNCERTAINTY_GRACE_STD {
            let uncertainty_factor = (1.0
                - (avg_std - UNCERTAINTY_GRACE_STD) / UNCERTAINTY_FALLOFF_STD)
                .max(UNCERTAINTY_FACTOR_FLOOR);
            confidence *= uncertainty_factor;
        }

        (confidence * 1000.0).round() / 1000.0
    }
}

/// Outcome already fixed by today's observation, if any.
///
/// A daily high can only rise and a daily low can only fall, so an
/// observation can settle a contract before the day ends.
pub fn observed_outcome(kind: MeasurementKind, settlement: Settlement, observed: f64) -> Option<f64> {
    if !observed.is_finite() {
        return None;
    }
    let reported = observed.round() as i64;

    match (kind, settlement) {
        (MeasurementKind::High, Settlement::Above(t)) if reported >= i64::from(t) => Some(1.0),
        (MeasurementKind::High, Settlement::Below(t)) if reported > i64::from(t) => Some(0.0),
        (MeasurementKind::High, Settlement::Bucket(k)) if reported > i64::from(k) => Some(0.0),
        (MeasurementKind::Low, Settlement::Below(t)) if reported <= i64::from(t) => Some(1.0),
        (MeasurementKind::Low, Settlement::Above(t)) if reported < i64::from(t) => Some(0.0),
        (MeasurementKind::Low, Settlement::Bucket(k)) if reported < i64::from(k) => Some(0.0),
        _ => None,
    }
}

fn describe_condition(kind: MeasurementKind, settlement: Settlement) -> String {
    match settlement {
        Settlement::Above(t) => format!("P({} ≥ {}°F)", kind, t),
        Settlement::Below(t) => format!("P({} ≤ {}°F)", kind, t),
        Settlement::Bucket(k) => format!("P({} = {}°F)", kind, k),
    }
}

fn pricing_assessment(raw_edge: f64) -> String {
    if raw_edge.abs() < 0.01 {
        "Market is fairly priced".to_string()
    } else if raw_edge > 0.0 {
        format!("Market underprices YES by {:.1}%", raw_edge * 100.0)
    } else {
        format!("Market overprices YES by {:.1}%", raw_edge.abs() * 100.0)
    }
}
