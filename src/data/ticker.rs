use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data::types::{Contract, MeasurementKind};

/// Sentinel offset that pushes "or below" labels to the front of a group
/// and "or above" labels to the back.
const DIRECTIONAL_SORT_OFFSET: f64 = 1000.0;

/// Exchange location codes. Unknown codes pass through unchanged.
const CITY_CODES: &[(&str, &str)] = &[
    ("NY", "New York"),
    ("LAX", "Los Angeles"),
    ("LA", "Los Angeles"),
    ("CHI", "Chicago"),
    ("TCHI", "Chicago"),
    ("MIA", "Miami"),
    ("SF", "San Francisco"),
    ("DEN", "Denver"),
    ("ATL", "Atlanta"),
    ("TATL", "Atlanta"),
    ("DAL", "Dallas"),
    ("HOU", "Houston"),
    ("PHX", "Phoenix"),
    ("PHL", "Philadelphia"),
    ("BOS", "Boston"),
    ("TBOS", "Boston"),
    ("NOLA", "New Orleans"),
    ("LV", "Las Vegas"),
    ("VEG", "Las Vegas"),
    ("MSP", "Minneapolis"),
    ("TMSP", "Minneapolis"),
    ("MIN", "Minneapolis"),
    ("SEA", "Seattle"),
];

fn ticker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:KX)?(HIGH|LOW)([A-Z]{2,5})-(\d{2}[A-Z]{3}\d{2})-([BT])(\d+(?:\.\d+)?)$").ok()
    })
    .as_ref()
}

fn range_phrase_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+°?\s*(?:to|or\s+below|or\s+above|and\s+above)\s*\d*°?)").ok()
    })
    .as_ref()
}

fn number_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").ok()).as_ref()
}

/// Sub-range indicator in the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrikeKind {
    /// `T`: settles on one side of a threshold.
    Threshold,
    /// `B`: settles on a single integer bucket.
    Bucket,
}

/// Decomposed contract identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerParts {
    pub kind: MeasurementKind,
    pub location_code: String,
    pub date_code: String,
    pub date: NaiveDate,
    pub strike: StrikeKind,
    pub value: f64,
}

impl TickerParts {
    /// Series identifier shared by every contract of this kind and location.
    pub fn series(&self) -> String {
        let kind = match self.kind {
            MeasurementKind::High => "HIGH",
            MeasurementKind::Low => "LOW",
        };
        format!("KX{}{}", kind, self.location_code)
    }

    pub fn group_id(&self) -> String {
        format!("{}-{}", self.series(), self.date_code)
    }

    pub fn location(&self) -> String {
        city_name(&self.location_code).to_string()
    }
}

/// Reported-integer condition under which the YES side wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Settlement {
    /// Reported value ≥ threshold.
    Above(i32),
    /// Reported value ≤ threshold.
    Below(i32),
    /// Reported value == k.
    Bucket(i32),
}

/// Everything the probability model needs to know about a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractTerms {
    pub location: String,
    pub kind: MeasurementKind,
    pub date: NaiveDate,
    pub settlement: Settlement,
}

/// Threshold direction read from the contract wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
    Unknown,
}

/// Map an exchange location code to its canonical city name.
pub fn city_name(code: &str) -> &str {
    CITY_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// Parse an identifier such as `KXHIGHNY-26FEB24-B30.5`.
pub fn parse_ticker(id: &str) -> Option<TickerParts> {
    let caps = ticker_regex()?.captures(id)?;

    let kind = match &caps[1] {
        "HIGH" => MeasurementKind::High,
        _ => MeasurementKind::Low,
    };
    let date_code = caps[3].to_string();
    let date = parse_date_code(&date_code)?;
    let strike = match &caps[4] {
        "B" => StrikeKind::Bucket,
        _ => StrikeKind::Threshold,
    };
    let value: f64 = caps[5].parse().ok()?;

    Some(TickerParts {
        kind,
        location_code: caps[2].to_string(),
        date_code,
        date,
        strike,
        value,
    })
}

/// `26FEB24` → 2026-02-24.
pub fn parse_date_code(code: &str) -> Option<NaiveDate> {
    if code.len() != 7 || !code.is_ascii() {
        return None;
    }
    // chrono month names are matched as `Feb`, so normalize case first
    let normalized = format!("{}{}{}", &code[..2], title_case(&code[2..5]), &code[5..]);
    NaiveDate::parse_from_str(&normalized, "%y%b%d").ok()
}

fn title_case(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Read the threshold direction from the contract description.
pub fn threshold_direction(description: &str, raw_threshold: i64) -> Direction {
    let text = description.to_lowercase();
    let is_below = text.contains("below")
        || text.contains(&format!("<{}", raw_threshold))
        || text.contains(&format!("< {}", raw_threshold));
    let is_above = text.contains("above")
        || text.contains(&format!(">{}", raw_threshold))
        || text.contains(&format!("> {}", raw_threshold));

    match (is_above, is_below) {
        (true, false) => Direction::Above,
        (false, true) => Direction::Below,
        _ => Direction::Unknown,
    }
}

/// Resolve a contract into its settlement terms.
///
/// `T{n}` with "above" wording settles YES at n+1 or higher; with "below"
/// wording it settles YES at n-1 or lower. Ambiguous wording is read as
/// "above". `B{v}` settles YES on the single integer floor(v).
pub fn parse_contract_terms(contract: &Contract) -> Option<ContractTerms> {
    let parts = parse_ticker(&contract.id)?;
    let raw = parts.value.floor() as i64;
    let raw = i32::try_from(raw).ok()?;

    let settlement = match parts.strike {
        StrikeKind::Bucket => Settlement::Bucket(raw),
        StrikeKind::Threshold => match threshold_direction(&contract.description, i64::from(raw)) {
            Direction::Below => Settlement::Below(raw - 1),
            Direction::Above | Direction::Unknown => Settlement::Above(raw + 1),
        },
    };

    Some(ContractTerms {
        location: parts.location(),
        kind: parts.kind,
        date: parts.date,
        settlement,
    })
}

/// Human-readable range label: the description's own range phrase when it
/// has one, otherwise a label derived from the identifier.
pub fn range_label(description: &str, strike: StrikeKind, value: f64) -> String {
    let text = description.to_lowercase();
    if let Some(m) = range_phrase_regex().and_then(|re| re.find(&text)) {
        return m.as_str().trim().to_string();
    }

    let n = value.floor() as i64;
    match strike {
        StrikeKind::Bucket => format!("{}° to {}°", n, n + 1),
        StrikeKind::Threshold => {
            if text.contains("below") || text.contains('<') {
                format!("≤{}°", n)
            } else if text.contains("above") || text.contains('>') {
                format!("≥{}°", n)
            } else {
                format!("{}°", n)
            }
        }
    }
}

/// Ascending sort key for a range label; directional labels sort to the ends.
pub fn bucket_sort_key(label: &str) -> f64 {
    let text = label.to_lowercase();
    let first = match number_regex()
        .and_then(|re| re.find(&text))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        Some(n) => n,
        None => return 0.0,
    };

    if text.contains("below") || text.contains('≤') || text.contains('<') {
        first - DIRECTIONAL_SORT_OFFSET
    } else if text.contains("above") || text.contains('≥') || text.contains('>') {
        first + DIRECTIONAL_SORT_OFFSET
    } else {
        first
    }
}
