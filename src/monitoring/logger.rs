use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::hedge::types::PortfolioResult;
use crate::strategies::types::Signal;

const HEADER: &str = "timestamp,kind,market_id,side,market_prob,fair_prob,edge,confidence,description";

/// Append-only CSV record of emitted signals and sized portfolios.
pub struct CsvLogger {
    log_path: PathBuf,
}

impl CsvLogger {
    pub fn new(log_path: impl AsRef<Path>) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();

        // Create CSV file with headers if it doesn't exist
        if !log_path.exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)
                .with_context(|| format!("Failed to create CSV log: {}", log_path.display()))?;

            writeln!(file, "{}", HEADER)?;
        }

        Ok(Self { log_path })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn log_signal(&self, signal: &Signal) -> Result<()> {
        let mut file = self.open()?;

        writeln!(
            file,
            "{},SIGNAL,{},{},{:.4},{:.4},{:.4},{:.3},{}",
            signal.emitted_at.to_rfc3339(),
            signal.market_id,
            signal.side,
            signal.market_prob,
            signal.fair_prob,
            signal.edge,
            signal.confidence,
            quote(&signal.description)
        )?;

        Ok(())
    }

    /// One row per sized group. The probability and edge columns stay empty;
    /// portfolio figures go into the description.
    pub fn log_portfolio(&self, portfolio: &PortfolioResult, at: DateTime<Utc>) -> Result<()> {
        let mut file = self.open()?;

        writeln!(
            file,
            "{},PORTFOLIO,{},NO,,,,,{}",
            at.to_rfc3339(),
            portfolio.group_id,
            quote(&format!(
                "{} contracts, outlay ${:.2}, EV ${:.2}, win {:.1}%, quality {}",
                portfolio.total_contracts,
                portfolio.total_outlay,
                portfolio.expected_profit,
                portfolio.win_probability * 100.0,
                portfolio.quality
            ))
        )?;

        Ok(())
    }

    pub fn log_event(&self, event: &str) -> Result<()> {
        let mut file = self.open()?;

        writeln!(file, "{},EVENT,,,,,,,{}", Utc::now().to_rfc3339(), quote(event))?;

        Ok(())
    }

    fn open(&self) -> Result<std::fs::File> {
        OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open CSV log: {}", self.log_path.display()))
    }
}

fn quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HedgeConfig;
    use crate::data::types::MeasurementKind;
    use crate::hedge::calculator::HedgeCalculator;
    use crate::hedge::types::OutcomeGroup;
    use crate::strategies::types::Side;
    use chrono::{NaiveDate, TimeZone};

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "edge-engine-{}-{}.csv",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_signal_row_appended_after_header() {
        let path = temp_log("signal");
        let logger = CsvLogger::new(&path).unwrap();

        let signal = Signal {
            market_id: "KXHIGHNY-26FEB24-T39".to_string(),
            description: "Highest temp, NYC: 40° or above".to_string(),
            market_prob: 0.6,
            fair_prob: 0.894,
            edge: 0.2,
            confidence: 0.85,
            side: Side::Yes,
            rationale: String::new(),
            emitted_at: Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap(),
        };
        logger.log_signal(&signal).unwrap();
        logger.log_event("cycle complete").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].contains(",SIGNAL,KXHIGHNY-26FEB24-T39,YES,0.6000,0.8940,0.2000,0.850,"));
        assert!(lines[1].ends_with("\"Highest temp, NYC: 40° or above\""));
        assert!(lines[2].contains(",EVENT,"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_portfolio_row_leaves_signal_columns_blank() {
        let path = temp_log("portfolio");
        let logger = CsvLogger::new(&path).unwrap();
        assert_eq!(logger.path(), path.as_path());

        let group = OutcomeGroup {
            group_id: "KXHIGHNY-26FEB24".to_string(),
            location: "New York".to_string(),
            date_code: "26FEB24".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
            kind: MeasurementKind::High,
            buckets: Vec::new(),
        };
        let portfolio = HedgeCalculator::new(HedgeConfig::default())
            .allocate(&group, 100.0, 0.011, None, None)
            .unwrap();
        let at = Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap();
        logger.log_portfolio(&portfolio, at).unwrap();

        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.starts_with("2026-02-24T12:00:00+00:00,PORTFOLIO,KXHIGHNY-26FEB24,NO,,,,,\""));
        assert!(row.contains("EV $0.00"));
        assert!(row.contains("win "));
        assert!(row.ends_with("quality fair\""));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_existing_file_keeps_single_header() {
        let path = temp_log("reopen");
        CsvLogger::new(&path).unwrap();
        let logger = CsvLogger::new(&path).unwrap();
        logger.log_event("again").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches(HEADER).count(), 1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
