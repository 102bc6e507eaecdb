use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Widest bid/ask spread (cents) that still counts as an active market.
pub const MAX_LIQUID_SPREAD: i64 = 15;

/// Which daily extreme a contract settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    High,
    Low,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::High => "high",
            MeasurementKind::Low => "low",
        }
    }
}

impl std::fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quote as delivered by the exchange feed, before normalization.
/// Prices are integer cents; a zero or missing price means "no quote".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuote {
    pub ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub yes_bid: Option<u32>,
    #[serde(default)]
    pub yes_ask: Option<u32>,
    #[serde(default)]
    pub no_bid: Option<u32>,
    #[serde(default)]
    pub no_ask: Option<u32>,
    #[serde(default)]
    pub last_price: Option<u32>,
    #[serde(default)]
    pub volume: u64,
    pub close_time: DateTime<Utc>,
}

/// Immutable quote snapshot for one binary contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub description: String,
    pub yes_price: u32,
    pub no_price: u32,
    pub yes_bid: Option<u32>,
    pub yes_ask: Option<u32>,
    pub no_bid: Option<u32>,
    pub no_ask: Option<u32>,
    pub volume: u64,
    pub close_time: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl Contract {
    /// Normalize a raw feed quote into a contract snapshot.
    ///
    /// The yes price prefers the last trade, then the bid/ask midpoint when the
    /// book is liquid, then whichever side is quoted, and finally 50.
    pub fn from_quote(raw: RawQuote, fetched_at: DateTime<Utc>) -> Self {
        let yes_bid = raw.yes_bid.filter(|p| *p > 0);
        let yes_ask = raw.yes_ask.filter(|p| *p > 0);
        let no_bid = raw.no_bid.filter(|p| *p > 0);
        let no_ask = raw.no_ask.filter(|p| *p > 0);

        let yes_price = match (raw.last_price.filter(|p| *p > 0), yes_bid, yes_ask) {
            (Some(last), _, _) => last,
            (None, Some(bid), Some(ask)) if is_liquid(Some(bid), Some(ask)) => (bid + ask) / 2,
            (None, _, Some(ask)) => ask,
            (None, Some(bid), None) => bid,
            (None, None, None) => 50,
        }
        .min(100);

        let no_price = no_ask.unwrap_or(100 - yes_price).min(100);

        let description = match raw.subtitle.as_deref().filter(|s| !s.is_empty()) {
            Some(subtitle) => format!("{}: {}", raw.title, subtitle),
            None => raw.title,
        };

        Self {
            id: raw.ticker,
            description,
            yes_price,
            no_price,
            yes_bid,
            yes_ask,
            no_bid,
            no_ask,
            volume: raw.volume,
            close_time: raw.close_time,
            fetched_at,
        }
    }

    /// Market-implied probability of the YES outcome.
    pub fn implied_probability(&self) -> f64 {
        f64::from(self.yes_price) / 100.0
    }

    /// Both sides of the YES book are quoted and the spread is tight.
    pub fn has_liquidity(&self) -> bool {
        is_liquid(self.yes_bid, self.yes_ask)
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.fetched_at).num_seconds() as f64 / 3600.0
    }

    pub fn hours_until_close(&self, now: DateTime<Utc>) -> f64 {
        (self.close_time - now).num_seconds() as f64 / 3600.0
    }
}

fn is_liquid(bid: Option<u32>, ask: Option<u32>) -> bool {
    match (bid, ask) {
        (Some(bid), Some(ask)) if bid > 0 && ask > 0 => {
            i64::from(ask) - i64::from(bid) <= MAX_LIQUID_SPREAD
        }
        _ => false,
    }
}

/// Point forecast for one location and day, with per-quantity uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastObservation {
    pub location: String,
    pub target_date: NaiveDate,
    pub high_temp: f64,
    pub low_temp: f64,
    pub high_std: f64,
    pub low_std: f64,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    /// Temperature observed so far today, when the target date is today.
    #[serde(default)]
    pub observed_temp: Option<f64>,
}

impl ForecastObservation {
    /// (mean, standard deviation) of the quantity a contract settles on.
    pub fn for_kind(&self, kind: MeasurementKind) -> (f64, f64) {
        match kind {
            MeasurementKind::High => (self.high_temp, self.high_std),
            MeasurementKind::Low => (self.low_temp, self.low_std),
        }
    }

    pub fn average_std(&self) -> f64 {
        (self.high_std + self.low_std) / 2.0
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.fetched_at).num_seconds() as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(ticker: &str) -> RawQuote {
        RawQuote {
            ticker: ticker.to_string(),
            title: "Highest temperature in NYC".to_string(),
            subtitle: Some("40° or above".to_string()),
            yes_bid: None,
            yes_ask: None,
            no_bid: None,
            no_ask: None,
            last_price: None,
            volume: 120,
            close_time: Utc.with_ymd_and_hms(2026, 2, 24, 23, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_yes_price_prefers_last_trade() {
        let mut quote = raw("KXHIGHNY-26FEB24-T39");
        quote.last_price = Some(42);
        quote.yes_bid = Some(30);
        quote.yes_ask = Some(35);

        let contract = Contract::from_quote(quote, Utc::now());
        assert_eq!(contract.yes_price, 42);
        assert_eq!(contract.description, "Highest temperature in NYC: 40° or above");
    }

    #[test]
    fn test_yes_price_midpoint_when_liquid() {
        let mut quote = raw("KXHIGHNY-26FEB24-T39");
        quote.yes_bid = Some(30);
        quote.yes_ask = Some(35);

        let contract = Contract::from_quote(quote, Utc::now());
        assert_eq!(contract.yes_price, 32);
        assert!(contract.has_liquidity());
        assert!((contract.implied_probability() - 0.32).abs() < 1e-12);
    }

    #[test]
    fn test_wide_spread_is_not_liquid() {
        let mut quote = raw("KXHIGHNY-26FEB24-T39");
        quote.yes_bid = Some(10);
        quote.yes_ask = Some(40);

        let contract = Contract::from_quote(quote, Utc::now());
        assert!(!contract.has_liquidity());
        assert_eq!(contract.yes_price, 40);
    }

    #[test]
    fn test_unquoted_contract_defaults() {
        let contract = Contract::from_quote(raw("KXHIGHNY-26FEB24-T39"), Utc::now());
        assert_eq!(contract.yes_price, 50);
        assert_eq!(contract.no_price, 50);
        assert!(!contract.has_liquidity());
    }

    #[test]
    fn test_no_price_uses_no_ask() {
        let mut quote = raw("KXHIGHNY-26FEB24-T39");
        quote.last_price = Some(20);
        quote.no_ask = Some(83);

        let contract = Contract::from_quote(quote, Utc::now());
        assert_eq!(contract.no_price, 83);
    }

    #[test]
    fn test_contract_ages() {
        let fetched = Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap();
        let contract = Contract::from_quote(raw("KXHIGHNY-26FEB24-T39"), fetched);
        let now = fetched + chrono::Duration::minutes(90);

        assert!((contract.age_hours(now) - 1.5).abs() < 1e-12);
        assert!((contract.hours_until_close(now) - 9.5).abs() < 1e-12);
    }

    #[test]
    fn test_forecast_for_kind() {
        let forecast = ForecastObservation {
            location: "New York".to_string(),
            target_date: NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
            high_temp: 31.0,
            low_temp: 22.0,
            high_std: 3.0,
            low_std: 2.5,
            source: "mock".to_string(),
            fetched_at: Utc::now(),
            observed_temp: None,
        };

        assert_eq!(forecast.for_kind(MeasurementKind::High), (31.0, 3.0));
        assert_eq!(forecast.for_kind(MeasurementKind::Low), (22.0, 2.5));
        assert!((forecast.average_std() - 2.75).abs() < 1e-12);
    }
}
