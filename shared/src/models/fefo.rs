//! FEFO (first-expired, first-out) threshold model
//!
//! Maps a lot's expiration date to a severity tier using global thresholds
//! with per-product overrides of the critical threshold.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::{Collection, Record};

/// Document id of the FEFO configuration singleton
pub const FEFO_CONFIG_ID: &str = "fefo";

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Per-product override of the critical threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdException {
    pub product_id: String,
    pub critical_days: i64,
}

/// FEFO alert configuration (singleton `config/fefo`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfig {
    #[serde(default)]
    pub id: String,
    pub critical_days: i64,
    pub warning_days: i64,
    /// Checked in order; the first match wins
    #[serde(default)]
    pub exceptions: Vec<ThresholdException>,
}

impl AlertConfig {
    pub fn new(critical_days: i64, warning_days: i64) -> Self {
        Self {
            id: FEFO_CONFIG_ID.to_string(),
            critical_days,
            warning_days,
            exceptions: Vec::new(),
        }
    }

    pub fn with_exception(mut self, product_id: impl Into<String>, critical_days: i64) -> Self {
        self.exceptions.push(ThresholdException {
            product_id: product_id.into(),
            critical_days,
        });
        self
    }

    /// Critical threshold for a product. Exceptions never touch the warning threshold.
    pub fn critical_days_for(&self, product_id: &str) -> i64 {
        self.exceptions
            .iter()
            .find(|e| e.product_id == product_id)
            .map(|e| e.critical_days)
            .unwrap_or(self.critical_days)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self::new(7, 30)
    }
}

impl Record for AlertConfig {
    const COLLECTION: Collection = Collection::Config;
    const NAME: &'static str = "alert config";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Expiration-risk severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FefoTier {
    /// Outside both thresholds; no alert. This is the "none" tier of the
    /// threshold model, named so it does not read as `Option::None`.
    Clear,
    Warning,
    Critical,
}

impl FefoTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FefoTier::Clear => "clear",
            FefoTier::Warning => "warning",
            FefoTier::Critical => "critical",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, FefoTier::Clear)
    }
}

impl std::fmt::Display for FefoTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FefoTier::Clear => write!(f, "Clear"),
            FefoTier::Warning => write!(f, "Warning"),
            FefoTier::Critical => write!(f, "Critical"),
        }
    }
}

/// Result of evaluating one lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FefoAssessment {
    pub tier: FefoTier,
    pub days_remaining: i64,
    pub critical_threshold: i64,
    pub warning_threshold: i64,
}

/// Parse an expiration date given as RFC 3339 or `YYYY-MM-DD` (midnight UTC)
pub fn parse_expiration(value: &str) -> Result<DateTime<Utc>, ModelError> {
    let trimmed = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ModelError::MalformedDate(value.to_string()))
}

/// Whole days until expiration, rounded up. Negative once expired.
pub fn days_remaining(expiration: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expiration - now).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

/// Classify a lot against the configuration at a given instant
pub fn evaluate_at(
    product_id: &str,
    expiration: DateTime<Utc>,
    config: &AlertConfig,
    now: DateTime<Utc>,
) -> FefoAssessment {
    let days = days_remaining(expiration, now);
    let critical_threshold = config.critical_days_for(product_id);
    let warning_threshold = config.warning_days;

    let tier = if days <= critical_threshold {
        FefoTier::Critical
    } else if days <= warning_threshold {
        FefoTier::Warning
    } else {
        FefoTier::Clear
    };

    FefoAssessment {
        tier,
        days_remaining: days,
        critical_threshold,
        warning_threshold,
    }
}

/// Classify a lot against the configuration now
pub fn evaluate(product_id: &str, expiration: DateTime<Utc>, config: &AlertConfig) -> FefoAssessment {
    evaluate_at(product_id, expiration, config, Utc::now())
}

/// Marker recording that a FEFO alert was emitted for a lot at a tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FefoAlertMarker {
    #[serde(default)]
    pub id: String,
    pub lot_id: String,
    pub product_id: String,
    pub tier: FefoTier,
    pub expiration_date: String,
    pub created_at: DateTime<Utc>,
}

impl FefoAlertMarker {
    /// One marker per lot, tier and expiration date. A changed date re-arms the alert.
    pub fn key(lot_id: &str, tier: FefoTier, expiration_date: &str) -> String {
        format!("{}:{}:{}", lot_id, tier.as_str(), expiration_date.trim())
    }
}

impl Record for FefoAlertMarker {
    const COLLECTION: Collection = Collection::FefoAlerts;
    const NAME: &'static str = "fefo alert";

    fn id(&self) -> &str {
        &self.id
    }
}
