use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::data::stations::normalize_location;
use crate::data::types::{Contract, ForecastObservation, RawQuote};

/// Anything that can hand out a forecast for a location and day.
pub trait ForecastSource {
    fn forecast(&self, location: &str, date: NaiveDate) -> Option<&ForecastObservation>;
}

/// In-memory forecasts keyed by (canonical location, target date).
#[derive(Debug, Clone, Default)]
pub struct ForecastBook {
    forecasts: HashMap<(String, NaiveDate), ForecastObservation>,
}

impl ForecastBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a forecast, replacing any older one for the same key.
    pub fn insert(&mut self, forecast: ForecastObservation) {
        let key = (normalize_location(&forecast.location), forecast.target_date);
        match self.forecasts.get(&key) {
            Some(existing) if existing.fetched_at > forecast.fetched_at => {
                debug!("Ignoring stale forecast for {} on {}", key.0, key.1);
            }
            _ => {
                self.forecasts.insert(key, forecast);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.forecasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }
}

impl FromIterator<ForecastObservation> for ForecastBook {
    fn from_iter<I: IntoIterator<Item = ForecastObservation>>(iter: I) -> Self {
        let mut book = ForecastBook::new();
        for forecast in iter {
            book.insert(forecast);
        }
        book
    }
}

impl ForecastSource for ForecastBook {
    fn forecast(&self, location: &str, date: NaiveDate) -> Option<&ForecastObservation> {
        self.forecasts.get(&(normalize_location(location), date))
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSnapshot {
    fetched_at: DateTime<Utc>,
    #[serde(default)]
    markets: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
struct ForecastSnapshot {
    #[serde(default)]
    forecasts: Vec<ForecastObservation>,
}

/// Load a quote snapshot file and normalize every quote into a contract.
pub fn load_contracts(path: impl AsRef<Path>) -> Result<Vec<Contract>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read quote snapshot: {}", path.display()))?;
    parse_contracts(&contents)
        .with_context(|| format!("Failed to parse quote snapshot: {}", path.display()))
}

pub fn parse_contracts(json: &str) -> Result<Vec<Contract>> {
    let snapshot: QuoteSnapshot = serde_json::from_str(json)?;
    let fetched_at = snapshot.fetched_at;
    Ok(snapshot
        .markets
        .into_iter()
        .map(|raw| Contract::from_quote(raw, fetched_at))
        .collect())
}

/// Load a forecast snapshot file into a lookup book.
pub fn load_forecasts(path: impl AsRef<Path>) -> Result<ForecastBook> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read forecast snapshot: {}", path.display()))?;
    parse_forecasts(&contents)
        .with_context(|| format!("Failed to parse forecast snapshot: {}", path.display()))
}

pub fn parse_forecasts(json: &str) -> Result<ForecastBook> {
    let snapshot: ForecastSnapshot = serde_json::from_str(json)?;
    Ok(snapshot.forecasts.into_iter().collect())
}
