use crate::model::{ForecastEntry, ForecastPoint};

/// Project raw forecast entries into date-labeled summary points.
///
/// Each raw entry maps to exactly one point, in input order, with the
/// date portion of its timestamp and the sentinel carried through for
/// missing humidity/wind. No filtering, no cross-point aggregation.
pub fn summarize(entries: &[ForecastEntry]) -> Vec<ForecastPoint> {
    entries
        .iter()
        .map(|entry| ForecastPoint {
            date: entry.forecast_at.date_naive(),
            temperature_c: entry.temperature_c,
            humidity_pct: entry.humidity_pct,
            wind_speed_ms: entry.wind_speed_ms,
            condition: entry.condition.clone(),
        })
        .collect()
}
