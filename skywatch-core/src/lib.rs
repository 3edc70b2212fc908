//! Core library for the `skywatch` weather monitor.
//!
//! This crate defines:
//! - Configuration handling
//! - The weather-source abstraction and its OpenWeather implementation
//! - The bounded per-location observation store and its snapshot
//! - Alert evaluation and notification delivery
//! - The query service orchestrating all of the above
//!
//! It is used by `skywatch-daemon`, but can also be reused by other
//! binaries or services.

pub mod alert;
pub mod config;
pub mod error;
pub mod forecast;
pub mod model;
pub mod notify;
pub mod service;
pub mod source;
pub mod store;

pub use alert::{AlertEngine, TemperatureAlert};
pub use config::{AlertConfig, Config, SmtpConfig};
pub use error::ServiceError;
pub use model::{ForecastEntry, ForecastPoint, Observation, Reading, TrendPoint};
pub use notify::{EmailSink, LogSink, NotificationSink};
pub use service::{AlertRequest, QueryService};
pub use source::{OpenWeatherSource, WeatherSource};
pub use store::{HISTORY_DEPTH, ObservationStore};
