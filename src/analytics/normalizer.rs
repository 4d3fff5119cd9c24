//! Record normalization from backend JSON items to the canonical record set

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::rollup::TimeBucket;

/// Transaction identifier as sent by the backend (numeric or string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::Text(String::new())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Amount as sent by the backend: CSV-derived rows carry strings, ORM rows carry numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    /// Coerce to f64. Returns None for unparseable text and non-finite values.
    pub fn to_finite(&self) -> Option<f64> {
        let value = match self {
            RawAmount::Number(n) => *n,
            RawAmount::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Read a field that may carry the wrong JSON type. A type mismatch yields
/// `None` for that field only; the rest of the item still decodes.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Transaction item exactly as received from the transaction service
///
/// Every field is optional and decoded leniently. Whether the item is usable
/// is decided by `CanonicalRecord::from_raw`, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<RecordId>,
    /// Business identifier used by the upload pipeline
    #[serde(default, deserialize_with = "lenient")]
    pub transaction_id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    /// Day-level fallback used when `timestamp` is absent
    #[serde(default, deserialize_with = "lenient")]
    pub transaction_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub amount: Option<RawAmount>,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub merchant: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_credit: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub currency: Option<String>,
}

impl RawRecord {
    /// Parse a RawRecord from a single JSON value
    ///
    /// Only fails when the value is not an object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Stable identifier: `id` when present, else `transaction_id`
    pub fn record_id(&self) -> RecordId {
        self.id
            .clone()
            .or_else(|| self.transaction_id.clone())
            .unwrap_or_default()
    }
}

pub const DEFAULT_CATEGORY: &str = "Other";
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Validated transaction. Never mutated after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub id: RecordId,
    /// Wall-clock time as written by the backend
    pub occurred_at: NaiveDateTime,
    pub date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
    pub bucket: TimeBucket,
    pub amount: f64,
    pub category: String,
    pub merchant: String,
    pub is_credit: bool,
    pub currency: String,
}

impl CanonicalRecord {
    /// Convert one raw record, or None if it is malformed
    pub fn from_raw(raw: &RawRecord) -> Option<Self> {
        let stamp = raw.timestamp.as_deref().or(raw.transaction_date.as_deref())?;
        let occurred_at = parse_timestamp(stamp)?;
        let amount = raw.amount.as_ref()?.to_finite()?;

        let category = match raw.category.as_deref() {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => DEFAULT_CATEGORY.to_string(),
        };

        let hour = occurred_at.hour();

        Some(Self {
            id: raw.record_id(),
            occurred_at,
            date: occurred_at.date(),
            hour,
            minute: occurred_at.minute(),
            bucket: TimeBucket::from_hour(hour),
            amount,
            category,
            merchant: raw.merchant.clone().unwrap_or_default(),
            is_credit: raw.is_credit.unwrap_or(false),
            currency: raw
                .currency
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        })
    }

    /// Fractional hour of day, used as the x coordinate of the point set
    pub fn time_of_day(&self) -> f64 {
        self.hour as f64 + self.minute as f64 / 60.0
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a backend timestamp.
///
/// Offsets are honoured for validity but the wall-clock time as written is kept,
/// so the displayed day and hour match what the backend recorded.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Normalize a raw batch, dropping malformed records.
///
/// Output order follows input order; this is the insertion order every
/// rollup and tie-break relies on.
pub fn normalize(raw: &[RawRecord]) -> Vec<CanonicalRecord> {
    let records: Vec<CanonicalRecord> = raw.iter().filter_map(CanonicalRecord::from_raw).collect();

    let dropped = raw.len() - records.len();
    if dropped > 0 {
        log::debug!("Dropped {} malformed records out of {}", dropped, raw.len());
    }

    records
}
