use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::model::{ForecastEntry, Observation};

use super::WeatherSource;

const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// A timed-out request is handled the same way as any other failed fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    api_key: String,
    http: Client,
}

impl OpenWeatherSource {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }

    async fn get_body(&self, url: &str, location: &str, what: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            ));
        }

        Ok(body)
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherSource {
    async fn fetch_current(&self, location: &str) -> Result<Observation> {
        let body = self.get_body(CURRENT_URL, location, "current weather").await?;
        parse_current(location, &body)
    }

    async fn fetch_forecast(&self, location: &str) -> Result<Vec<ForecastEntry>> {
        let body = self.get_body(FORECAST_URL, location, "5-day forecast").await?;
        parse_forecast(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: Option<OwWind>,
}

#[derive(Debug, Deserialize)]
struct OwForecastItem {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: Option<OwWind>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastItem>,
}

/// The observation is keyed by the requested location name, not whatever
/// canonical name the API echoes back, so history buffers always line up
/// with the configured set.
fn parse_current(location: &str, body: &str) -> Result<Observation> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeather current JSON")?;

    let observed_at = unix_to_utc(parsed.dt).unwrap_or_else(Utc::now);
    let temperature_c = parsed.main.temp;

    Ok(Observation {
        location: location.to_string(),
        observed_at,
        temperature_c,
        feels_like_c: parsed.main.feels_like.unwrap_or(temperature_c),
        humidity_pct: parsed.main.humidity.into(),
        wind_speed_ms: parsed.wind.and_then(|w| w.speed).into(),
        condition: condition_label(&parsed.weather),
    })
}

fn parse_forecast(body: &str) -> Result<Vec<ForecastEntry>> {
    let parsed: OwForecastResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeather forecast JSON")?;

    if parsed.list.is_empty() {
        return Err(anyhow!("OpenWeather forecast response contained no data"));
    }

    Ok(parsed
        .list
        .into_iter()
        .map(|item| ForecastEntry {
            forecast_at: unix_to_utc(item.dt).unwrap_or_else(Utc::now),
            temperature_c: item.main.temp,
            humidity_pct: item.main.humidity.into(),
            wind_speed_ms: item.wind.and_then(|w| w.speed).into(),
            condition: condition_label(&item.weather),
        })
        .collect())
}

fn condition_label(weather: &[OwWeather]) -> String {
    weather
        .first()
        .map(|w| w.main.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reading;

    const CURRENT_FIXTURE: &str = r#"{
        "name": "Delhi",
        "dt": 1717232400,
        "main": { "temp": 31.2, "feels_like": 34.0, "humidity": 48 },
        "weather": [{ "main": "Haze" }],
        "wind": { "speed": 2.6 }
    }"#;

    #[test]
    fn parses_a_complete_current_response() {
        let obs = parse_current("Delhi", CURRENT_FIXTURE).expect("fixture must parse");

        assert_eq!(obs.location, "Delhi");
        assert_eq!(obs.temperature_c, 31.2);
        assert_eq!(obs.feels_like_c, 34.0);
        assert_eq!(obs.humidity_pct, Reading::Value(48.0));
        assert_eq!(obs.wind_speed_ms, Reading::Value(2.6));
        assert_eq!(obs.condition, "Haze");
        assert_eq!(obs.observed_at.timestamp(), 1_717_232_400);
    }

    #[test]
    fn missing_humidity_and_wind_become_the_sentinel() {
        let body = r#"{
            "dt": 1717232400,
            "main": { "temp": 28.0, "feels_like": 29.1 },
            "weather": [{ "main": "Clouds" }]
        }"#;

        let obs = parse_current("Mumbai", body).expect("partial fixture must parse");
        assert_eq!(obs.humidity_pct, Reading::Unavailable);
        assert_eq!(obs.wind_speed_ms, Reading::Unavailable);
    }

    #[test]
    fn empty_weather_array_falls_back_to_unknown() {
        let body = r#"{
            "dt": 1717232400,
            "main": { "temp": 28.0 }
        }"#;

        let obs = parse_current("Chennai", body).expect("fixture must parse");
        assert_eq!(obs.condition, "Unknown");
        assert_eq!(obs.feels_like_c, 28.0);
    }

    #[test]
    fn forecast_preserves_point_count_and_order() {
        let body = r#"{
            "list": [
                { "dt": 1717232400, "main": { "temp": 30.0, "humidity": 40 }, "weather": [{ "main": "Clear" }], "wind": { "speed": 1.0 } },
                { "dt": 1717243200, "main": { "temp": 32.0 }, "weather": [{ "main": "Clouds" }] },
                { "dt": 1717254000, "main": { "temp": 29.5, "humidity": 55 }, "weather": [], "wind": { "speed": 4.2 } }
            ]
        }"#;

        let entries = parse_forecast(body).expect("forecast fixture must parse");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].condition, "Clear");
        assert_eq!(entries[1].humidity_pct, Reading::Unavailable);
        assert_eq!(entries[1].wind_speed_ms, Reading::Unavailable);
        assert_eq!(entries[2].condition, "Unknown");
        assert!(entries[0].forecast_at < entries[1].forecast_at);
    }

    #[test]
    fn empty_forecast_list_is_an_error() {
        let err = parse_forecast(r#"{ "list": [] }"#).unwrap_err();
        assert!(err.to_string().contains("no data"));
    }
}
