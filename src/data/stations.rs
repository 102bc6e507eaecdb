use std::collections::HashMap;

/// Reporting noise used for locations missing from the table.
pub const DEFAULT_REPORTING_NOISE: f64 = 1.5;

/// Gap (°F, one σ) between gridded model output and what the settlement
/// station reports. Coastal and microclimate stations sit higher, dry
/// continental stations lower.
const REPORTING_NOISE: &[(&str, f64)] = &[
    ("San Francisco", 2.5),
    ("Los Angeles", 2.2),
    ("Seattle", 2.0),
    ("Boston", 2.0),
    ("New York", 1.8),
    ("New Orleans", 1.8),
    ("Philadelphia", 1.7),
    ("Chicago", 1.7),
    ("Houston", 1.6),
    ("Miami", 1.4),
    ("Atlanta", 1.5),
    ("Dallas", 1.4),
    ("Minneapolis", 1.4),
    ("Denver", 1.4),
    ("Phoenix", 1.2),
    ("Las Vegas", 1.2),
];

const LOCATION_ALIASES: &[(&str, &str)] = &[
    ("NYC", "New York"),
    ("NY", "New York"),
    ("LA", "Los Angeles"),
    ("CHI", "Chicago"),
    ("SF", "San Francisco"),
];

/// Normalize free-form location names to the canonical city names used by
/// contract identifiers.
pub fn normalize_location(location: &str) -> String {
    let upper = location.trim().to_uppercase();
    LOCATION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| location.trim().to_string())
}

/// Per-station constants with configuration overrides layered on top.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    overrides: HashMap<String, f64>,
}

impl StationTable {
    pub fn new(overrides: HashMap<String, f64>) -> Self {
        let overrides = overrides
            .into_iter()
            .filter(|(_, noise)| noise.is_finite() && *noise >= 0.0)
            .map(|(location, noise)| (normalize_location(&location), noise))
            .collect();
        Self { overrides }
    }

    /// σ_reporting for a location: configured override, then the built-in
    /// table, then the default.
    pub fn reporting_noise(&self, location: &str) -> f64 {
        let location = normalize_location(location);
        if let Some(noise) = self.overrides.get(&location) {
            return *noise;
        }
        REPORTING_NOISE
            .iter()
            .find(|(name, _)| *name == location)
            .map(|(_, noise)| *noise)
            .unwrap_or(DEFAULT_REPORTING_NOISE)
    }
}
