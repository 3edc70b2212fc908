use crate::model::{ForecastEntry, Observation};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

pub use openweather::OpenWeatherSource;

/// External capability that produces weather data for a location.
///
/// Both operations may fail transiently per location; callers decide
/// whether to skip (bulk refresh) or surface the error (single-target
/// queries).
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Fetch the current observation for a location.
    async fn fetch_current(&self, location: &str) -> anyhow::Result<Observation>;

    /// Fetch the raw multi-point forecast for a location.
    async fn fetch_forecast(&self, location: &str) -> anyhow::Result<Vec<ForecastEntry>>;
}
