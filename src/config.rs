use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

/// Longest accepted signal de-duplication window (one week).
pub const MAX_DEDUP_WINDOW_SECS: i64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub edge: EdgeConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub hedge: HedgeConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    #[serde(default = "default_decay_hours")]
    pub confidence_decay_hours: f64,
    /// Minimum |edge| that turns an estimate into a signal.
    #[serde(default = "default_edge_threshold")]
    pub threshold: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            confidence_decay_hours: default_decay_hours(),
            threshold: default_edge_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Location → σ_reporting overrides.
    #[serde(default)]
    pub reporting_noise: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HedgeConfig {
    #[serde(default = "default_exit_threshold")]
    pub exit_threshold: f64,
    #[serde(default = "default_true")]
    pub enable_dynamic_exit: bool,
    #[serde(default = "default_fee_per_contract")]
    pub fee_per_contract: f64,
    /// When set, every group is sized with this budget each cycle.
    #[serde(default)]
    pub default_budget: Option<f64>,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            exit_threshold: default_exit_threshold(),
            enable_dynamic_exit: true,
            fee_per_contract: default_fee_per_contract(),
            default_budget: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub markets_per_cycle: Option<usize>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            markets_per_cycle: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: i64,
    #[serde(default = "default_max_tracked")]
    pub max_tracked: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
            max_tracked: default_max_tracked(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_quotes_path")]
    pub quotes_path: String,
    #[serde(default = "default_forecasts_path")]
    pub forecasts_path: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            quotes_path: default_quotes_path(),
            forecasts_path: default_forecasts_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_log_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_decay_hours() -> f64 { 6.0 }
fn default_edge_threshold() -> f64 { 0.05 }
fn default_exit_threshold() -> f64 { 0.65 }
fn default_true() -> bool { true }
fn default_fee_per_contract() -> f64 { 0.011 }
fn default_interval_secs() -> u64 { 30 }
fn default_dedup_window_secs() -> i64 { 300 }
fn default_max_tracked() -> usize { 1024 }
fn default_quotes_path() -> String { "snapshots/quotes.json".to_string() }
fn default_forecasts_path() -> String { "snapshots/forecasts.json".to_string() }
fn default_csv_log_path() -> String { "signals.csv".to_string() }
fn default_log_level() -> String { "info".to_string() }

/// Process overrides taken from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: String,
    pub quotes_path: Option<String>,
    pub forecasts_path: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the core would refuse at call time anyway.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.hedge.exit_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            anyhow::bail!("hedge.exit_threshold must be in (0, 1), got {}", threshold);
        }
        if !(self.hedge.fee_per_contract.is_finite() && self.hedge.fee_per_contract >= 0.0) {
            anyhow::bail!(
                "hedge.fee_per_contract must be non-negative, got {}",
                self.hedge.fee_per_contract
            );
        }
        if let Some(budget) = self.hedge.default_budget {
            if !(budget.is_finite() && budget > 0.0) {
                anyhow::bail!("hedge.default_budget must be positive, got {}", budget);
            }
        }
        let window = self.signal.dedup_window_secs;
        if !(window > 0 && window <= MAX_DEDUP_WINDOW_SECS) {
            anyhow::bail!(
                "signal.dedup_window_secs must be in 1..={}, got {}",
                MAX_DEDUP_WINDOW_SECS,
                window
            );
        }
        if self.signal.max_tracked == 0 {
            anyhow::bail!("signal.max_tracked must be at least 1");
        }
        if !(self.edge.confidence_decay_hours > 0.0) {
            anyhow::bail!(
                "edge.confidence_decay_hours must be positive, got {}",
                self.edge.confidence_decay_hours
            );
        }
        Ok(())
    }

    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(path) = &env.quotes_path {
            self.snapshot.quotes_path = path.clone();
        }
        if let Some(path) = &env.forecasts_path {
            self.snapshot.forecasts_path = path.clone();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            config_path: std::env::var("EDGE_ENGINE_CONFIG")
                .unwrap_or_else(|_| "config.toml".to_string()),
            quotes_path: std::env::var("EDGE_ENGINE_QUOTES").ok(),
            forecasts_path: std::env::var("EDGE_ENGINE_FORECASTS").ok(),
        })
    }
}
