use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An optional numeric reading from the provider.
///
/// Humidity and wind speed are not guaranteed to be present in provider
/// responses; the sentinel keeps downstream formatting total instead of
/// threading a raw nullable through the data model. Serializes untagged,
/// so a snapshot stores either a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Value(f64),
    #[default]
    Unavailable,
}

impl Reading {
    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(v),
            Reading::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Reading::Value(_))
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Reading::Value(v),
            None => Reading::Unavailable,
        }
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reading::Value(v) => write!(f, "{v}"),
            Reading::Unavailable => f.write_str("data unavailable"),
        }
    }
}

/// One timestamped weather reading for a location. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub location: String,
    pub observed_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    #[serde(default)]
    pub humidity_pct: Reading,
    #[serde(default)]
    pub wind_speed_ms: Reading,
    pub condition: String,
}

/// One raw point of a multi-point forecast, as returned by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub forecast_at: DateTime<Utc>,
    pub temperature_c: f64,
    #[serde(default)]
    pub humidity_pct: Reading,
    #[serde(default)]
    pub wind_speed_ms: Reading,
    pub condition: String,
}

/// One summarized forecast point: the date portion of the forecast
/// timestamp plus the projected fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub temperature_c: f64,
    pub humidity_pct: Reading,
    pub wind_speed_ms: Reading,
    pub condition: String,
}

/// One date-labeled row of the historical trend for a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub temperature_c: f64,
    pub humidity_pct: Reading,
    pub wind_speed_ms: Reading,
}
