use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::data::snapshot::ForecastSource;
use crate::data::types::Contract;
use crate::hedge::calculator::HedgeCalculator;
use crate::hedge::grouper::MarketGrouper;
use crate::hedge::types::{OutcomeGroup, PortfolioResult};
use crate::monitoring::logger::CsvLogger;
use crate::strategies::dedup::SignalDeduplicator;
use crate::strategies::types::{EdgeEstimate, Signal};
use crate::strategies::weather_edge::WeatherEdgeModel;

/// Everything one evaluation cycle produced.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub estimates: Vec<EdgeEstimate>,
    pub signals: Vec<Signal>,
    pub groups: Vec<OutcomeGroup>,
    pub portfolios: Vec<PortfolioResult>,
    /// Contracts the model could not price (bad id or no forecast).
    pub skipped: usize,
}

/// Wires the estimator, grouper and calculator into a single polling cycle.
pub struct EdgeEngine {
    model: WeatherEdgeModel,
    grouper: MarketGrouper,
    calculator: HedgeCalculator,
    dedup: SignalDeduplicator,
    csv_logger: Option<CsvLogger>,
    edge_threshold: f64,
    default_budget: Option<f64>,
    markets_per_cycle: Option<usize>,
}

impl EdgeEngine {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let csv_logger = if config.monitoring.csv_logging {
            Some(CsvLogger::new(&config.monitoring.csv_log_path)?)
        } else {
            None
        };

        Ok(Self {
            model: WeatherEdgeModel::from_config(&config.edge, &config.model),
            grouper: MarketGrouper::new(),
            calculator: HedgeCalculator::new(config.hedge.clone()),
            dedup: SignalDeduplicator::new(
                Duration::seconds(config.signal.dedup_window_secs),
                config.signal.max_tracked,
            ),
            csv_logger,
            edge_threshold: config.edge.threshold,
            default_budget: config.hedge.default_budget,
            markets_per_cycle: config.polling.markets_per_cycle,
        })
    }

    pub fn calculator(&self) -> &HedgeCalculator {
        &self.calculator
    }

    /// Evaluate a fresh snapshot.
    ///
    /// A contract that cannot be priced is counted and skipped; a group that
    /// cannot be sized is logged and skipped. Neither stops the cycle.
    pub fn run_cycle(
        &self,
        contracts: &[Contract],
        forecasts: &dyn ForecastSource,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let contracts = match self.markets_per_cycle {
            Some(limit) if limit < contracts.len() => &contracts[..limit],
            _ => contracts,
        };

        let mut report = CycleReport::default();

        for contract in contracts {
            let estimate = match self.model.evaluate(contract, forecasts, now) {
                Some(estimate) => estimate,
                None => {
                    report.skipped += 1;
                    continue;
                }
            };

            if estimate.has_edge()
                && estimate.edge.abs() >= self.edge_threshold
                && self.dedup.check_and_record(&contract.id, now)
            {
                let signal = Signal::from_estimate(contract, &estimate, now);
                info!(
                    "📈 Signal {} {}: edge {:+.1}%, confidence {:.2} | {}",
                    signal.side,
                    signal.market_id,
                    signal.edge * 100.0,
                    signal.confidence,
                    signal.rationale
                );
                if let Some(logger) = &self.csv_logger {
                    if let Err(e) = logger.log_signal(&signal) {
                        warn!("Failed to write signal to CSV: {}", e);
                    }
                }
                report.signals.push(signal);
            }

            report.estimates.push(estimate);
        }

        report.groups = self.grouper.group(contracts);

        if let Some(budget) = self.default_budget {
            let fee = self.calculator.config().fee_per_contract;
            for group in &report.groups {
                match self.calculator.allocate(group, budget, fee, None, None) {
                    Ok(portfolio) => {
                        if let Some(logger) = &self.csv_logger {
                            if let Err(e) = logger.log_portfolio(&portfolio, now) {
                                warn!("Failed to write portfolio to CSV: {}", e);
                            }
                        }
                        report.portfolios.push(portfolio);
                    }
                    Err(e) => warn!("Skipping allocation for {}: {}", group.group_id, e),
                }
            }
        }

        info!(
            "Cycle complete: {} contracts, {} estimates, {} signals, {} groups, {} portfolios ({} skipped)",
            contracts.len(),
            report.estimates.len(),
            report.signals.len(),
            report.groups.len(),
            report.portfolios.len(),
            report.skipped
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::snapshot::ForecastBook;
    use crate::data::types::ForecastObservation;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap()
    }

    fn contract(id: &str, description: &str, yes: u32, bid: u32, ask: u32) -> Contract {
        Contract {
            id: id.to_string(),
            description: description.to_string(),
            yes_price: yes,
            no_price: 100 - yes,
            yes_bid: Some(bid),
            yes_ask: Some(ask),
            no_bid: None,
            no_ask: None,
            volume: 500,
            close_time: Utc.with_ymd_and_hms(2026, 2, 24, 23, 0, 0).unwrap(),
            fetched_at: now(),
        }
    }

    fn forecasts() -> ForecastBook {
        [ForecastObservation {
            location: "New York".to_string(),
            target_date: NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
            high_temp: 42.0,
            low_temp: 30.0,
            high_std: 1.0,
            low_std: 1.0,
            source: "mock".to_string(),
            fetched_at: now(),
            observed_temp: None,
        }]
        .into_iter()
        .collect()
    }

    fn snapshot() -> Vec<Contract> {
        vec![
            contract("KXHIGHNY-26FEB24-T39", "Highest temp: 40° or above", 60, 58, 62),
            contract("KXHIGHNY-26FEB24-B38.5", "Highest temp: 38° to 39°", 25, 23, 27),
            contract("KXHIGHNY-26FEB24-T37", "Highest temp: 36° or below", 15, 13, 17),
            contract("KXHIGHZZZ-26FEB24-T50", "Highest temp: 51° or above", 40, 38, 42),
            contract("NOT-A-TICKER", "", 50, 48, 52),
        ]
    }

    #[test]
    fn test_cycle_emits_signal_once() {
        let engine = EdgeEngine::new(&Config::default()).unwrap();
        let book = forecasts();

        let first = engine.run_cycle(&snapshot(), &book, now());
        assert_eq!(first.estimates.len(), 3);
        assert_eq!(first.skipped, 2);
        assert!(first
            .signals
            .iter()
            .any(|s| s.market_id == "KXHIGHNY-26FEB24-T39" && s.edge > 0.0));

        let second = engine.run_cycle(&snapshot(), &book, now() + Duration::seconds(60));
        assert!(second.signals.is_empty());
    }

    #[test]
    fn test_cycle_groups_and_sizes_with_default_budget() {
        let mut config = Config::default();
        config.hedge.default_budget = Some(100.0);
        let engine = EdgeEngine::new(&config).unwrap();

        let report = engine.run_cycle(&snapshot(), &forecasts(), now());
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.portfolios.len(), 2);

        let ny = report
            .portfolios
            .iter()
            .find(|p| p.group_id == "KXHIGHNY-26FEB24")
            .unwrap();
        assert_eq!(ny.scenarios.len(), 3);
        assert!(ny.total_outlay <= 100.0);
    }

    #[test]
    fn test_out_of_range_dedup_window_rejected() {
        let mut config = Config::default();
        config.signal.dedup_window_secs = i64::MAX;
        assert!(EdgeEngine::new(&config).is_err());

        config.signal.dedup_window_secs = -300;
        assert!(EdgeEngine::new(&config).is_err());
    }

    #[test]
    fn test_markets_per_cycle_limit() {
        let mut config = Config::default();
        config.polling.markets_per_cycle = Some(1);
        let engine = EdgeEngine::new(&config).unwrap();

        let report = engine.run_cycle(&snapshot(), &forecasts(), now());
        assert_eq!(report.estimates.len(), 1);
        assert_eq!(report.groups.len(), 1);
    }
}
