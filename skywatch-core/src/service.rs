use crate::alert::AlertEngine;
use crate::error::ServiceError;
use crate::forecast;
use crate::model::{ForecastPoint, Observation, TrendPoint};
use crate::notify::NotificationSink;
use crate::source::WeatherSource;
use crate::store::ObservationStore;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Payload of a manually triggered alert e-mail. All three fields are
/// required; validation happens in [`QueryService::send_alert`] so the
/// transport layer stays a thin pass-through.
#[derive(Debug, Clone, Default)]
pub struct AlertRequest {
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Orchestrates the source, store, alert engine and notification sink to
/// answer the external query surface and drive the refresh cycle.
///
/// The refresh cycle is the single logical writer of the store; read
/// paths only ever observe complete buffers.
pub struct QueryService {
    source: Arc<dyn WeatherSource>,
    store: ObservationStore,
    alerts: AlertEngine,
    sink: Arc<dyn NotificationSink>,
    locations: Vec<String>,
    alert_recipient: String,
}

impl QueryService {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: ObservationStore,
        alerts: AlertEngine,
        sink: Arc<dyn NotificationSink>,
        locations: Vec<String>,
        alert_recipient: String,
    ) -> Self {
        Self {
            source,
            store,
            alerts,
            sink,
            locations,
            alert_recipient,
        }
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// One complete refresh cycle: fetch every configured location,
    /// record successes, evaluate alerts, then persist the snapshot
    /// exactly once. A location's failure never aborts its siblings, and
    /// nothing here can escape to the scheduler loop.
    ///
    /// Returns the observations fetched this cycle (partial on failures).
    pub async fn refresh_all(&self) -> Vec<Observation> {
        let mut fetched = Vec::new();

        for location in &self.locations {
            match self.source.fetch_current(location).await {
                Ok(observation) => {
                    self.store.append(location, observation.clone());

                    let history = self.store.history_of(location).unwrap_or_default();
                    if let Some(alert) = self.alerts.evaluate(location, &history) {
                        tracing::info!(
                            location = %location,
                            temperature_c = alert.temperature_c,
                            threshold_c = alert.threshold_c,
                            "Temperature exceeded threshold on consecutive readings"
                        );
                        if let Err(e) = self
                            .sink
                            .send(&self.alert_recipient, &alert.subject(), &alert.body())
                            .await
                        {
                            tracing::warn!(
                                location = %location,
                                error = %e,
                                "Failed to deliver alert notification"
                            );
                        }
                    }

                    fetched.push(observation);
                }
                Err(e) => {
                    tracing::warn!(
                        location = %location,
                        error = %e,
                        "Failed to fetch current weather, skipping until next cycle"
                    );
                }
            }
        }

        if let Err(e) = self.store.persist() {
            tracing::error!(error = %e, "Failed to persist history snapshot");
        }

        tracing::info!(
            fetched = fetched.len(),
            configured = self.locations.len(),
            "Refresh cycle complete"
        );

        fetched
    }

    /// Latest known observation for every configured location, in
    /// configured order. Locations never successfully fetched are
    /// skipped.
    pub fn current_all(&self) -> Vec<Observation> {
        self.locations
            .iter()
            .filter_map(|location| self.store.latest(location))
            .collect()
    }

    /// Latest observation for one location, fetching on demand (and
    /// recording the result) when no history exists yet.
    pub async fn get_current(&self, location: &str) -> Result<Observation, ServiceError> {
        if let Some(observation) = self.store.latest(location) {
            return Ok(observation);
        }

        match self.source.fetch_current(location).await {
            Ok(observation) => {
                self.store.append(location, observation.clone());
                Ok(observation)
            }
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "On-demand fetch failed");
                Err(ServiceError::NoData(location.to_string()))
            }
        }
    }

    /// The retained history as date-labeled trend points, oldest first.
    pub fn get_historical(&self, location: &str) -> Result<Vec<TrendPoint>, ServiceError> {
        let history = self
            .store
            .history_of(location)
            .ok_or_else(|| ServiceError::NoData(location.to_string()))?;

        Ok(history
            .iter()
            .map(|obs| TrendPoint {
                date: obs.observed_at.date_naive(),
                temperature_c: obs.temperature_c,
                humidity_pct: obs.humidity_pct,
                wind_speed_ms: obs.wind_speed_ms,
            })
            .collect())
    }

    /// Fetch and summarize the forecast for one location. Unlike the
    /// bulk paths, a fetch failure here surfaces to the caller.
    pub async fn get_forecast_for(&self, location: &str) -> Result<Vec<ForecastPoint>, ServiceError> {
        let entries = self
            .source
            .fetch_forecast(location)
            .await
            .map_err(|source| ServiceError::Fetch {
                location: location.to_string(),
                source,
            })?;

        Ok(forecast::summarize(&entries))
    }

    /// Best-effort forecast fan-out over every configured location; a
    /// failed location is omitted from the mapping, never an error for
    /// the whole call.
    pub async fn get_forecast_for_all(&self) -> HashMap<String, Vec<ForecastPoint>> {
        let fetches = self.locations.iter().map(|location| async move {
            (location.clone(), self.get_forecast_for(location).await)
        });

        let mut forecasts = HashMap::new();
        for (location, result) in join_all(fetches).await {
            match result {
                Ok(summary) => {
                    forecasts.insert(location, summary);
                }
                Err(e) => {
                    tracing::warn!(
                        location = %location,
                        error = %e,
                        "Omitting location from forecast fan-out"
                    );
                }
            }
        }

        forecasts
    }

    /// Manually triggered alert e-mail. Any absent or empty field is a
    /// validation error; delivery itself is fire-and-forget.
    pub async fn send_alert(&self, request: AlertRequest) -> Result<(), ServiceError> {
        let recipient = required(request.recipient, "recipient")?;
        let subject = required(request.subject, "subject")?;
        let body = required(request.body, "body")?;

        if let Err(e) = self.sink.send(&recipient, &subject, &body).await {
            tracing::warn!(recipient = %recipient, error = %e, "Manual alert delivery failed");
        }

        Ok(())
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ServiceError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ServiceError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForecastEntry, Reading};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn make_obs(location: &str, temperature_c: f64) -> Observation {
        Observation {
            location: location.to_string(),
            observed_at: Utc::now(),
            temperature_c,
            feels_like_c: temperature_c + 1.0,
            humidity_pct: Reading::Value(44.0),
            wind_speed_ms: Reading::Value(2.0),
            condition: "Clear".to_string(),
        }
    }

    fn make_entry(hours_ahead: i64) -> ForecastEntry {
        ForecastEntry {
            forecast_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
                + Duration::hours(hours_ahead),
            temperature_c: 26.0,
            humidity_pct: Reading::Value(60.0),
            wind_speed_ms: Reading::Unavailable,
            condition: "Rain".to_string(),
        }
    }

    /// Source with canned responses and a set of locations that always
    /// fail, standing in for a flaky upstream.
    #[derive(Debug, Default)]
    struct ScriptedSource {
        current: HashMap<String, Observation>,
        forecasts: HashMap<String, Vec<ForecastEntry>>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl WeatherSource for ScriptedSource {
        async fn fetch_current(&self, location: &str) -> anyhow::Result<Observation> {
            if self.failing.contains(location) {
                anyhow::bail!("simulated outage for {location}");
            }
            self.current
                .get(location)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no scripted observation for {location}"))
        }

        async fn fetch_forecast(&self, location: &str) -> anyhow::Result<Vec<ForecastEntry>> {
            if self.failing.contains(location) {
                anyhow::bail!("simulated outage for {location}");
            }
            self.forecasts
                .get(location)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no scripted forecast for {location}"))
        }
    }

    /// Sink recording everything sent through it.
    #[derive(Debug, Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<(String, String, String)> {
            self.sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push((recipient.into(), subject.into(), body.into()));
            Ok(())
        }
    }

    struct Fixture {
        service: QueryService,
        sink: Arc<RecordingSink>,
        snapshot_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture(source: ScriptedSource, locations: &[&str], threshold_c: f64) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let snapshot_path = dir.path().join("snapshot.json");
        let sink = Arc::new(RecordingSink::default());

        let service = QueryService::new(
            Arc::new(source),
            ObservationStore::open(&snapshot_path),
            AlertEngine::new(threshold_c),
            sink.clone(),
            locations.iter().map(|s| s.to_string()).collect(),
            "ops@example.com".to_string(),
        );

        Fixture {
            service,
            sink,
            snapshot_path,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn refresh_isolates_per_location_failures_and_still_persists() {
        let mut source = ScriptedSource::default();
        source.current.insert("A".into(), make_obs("A", 21.0));
        source.current.insert("C".into(), make_obs("C", 23.0));
        source.failing.insert("B".into());

        let fx = fixture(source, &["A", "B", "C"], 30.0);
        let fetched = fx.service.refresh_all().await;

        assert_eq!(fetched.len(), 2);
        assert!(fx.service.get_historical("A").is_ok());
        assert!(matches!(
            fx.service.get_historical("B"),
            Err(ServiceError::NoData(_))
        ));
        assert!(fx.service.get_historical("C").is_ok());

        // Persist still happened for the partial cycle.
        let snapshot = std::fs::read_to_string(&fx.snapshot_path).expect("snapshot written");
        assert!(snapshot.contains("\"A\""));
        assert!(snapshot.contains("\"C\""));
        assert!(!snapshot.contains("\"B\""));
    }

    #[tokio::test]
    async fn alert_fires_on_the_second_consecutive_hot_reading() {
        let mut source = ScriptedSource::default();
        source.current.insert("Delhi".into(), make_obs("Delhi", 31.5));

        let fx = fixture(source, &["Delhi"], 30.0);

        // First cycle: one sample, debounce holds.
        fx.service.refresh_all().await;
        assert!(fx.sink.sent().is_empty());

        // Second cycle: two consecutive exceedances.
        fx.service.refresh_all().await;
        let sent = fx.sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ops@example.com");
        assert!(sent[0].1.contains("Delhi"));
        assert!(sent[0].2.contains("31.50"));
    }

    #[tokio::test]
    async fn no_alert_below_threshold() {
        let mut source = ScriptedSource::default();
        source.current.insert("Delhi".into(), make_obs("Delhi", 29.0));

        let fx = fixture(source, &["Delhi"], 30.0);
        fx.service.refresh_all().await;
        fx.service.refresh_all().await;
        assert!(fx.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn current_all_serves_last_known_state_in_configured_order() {
        let mut source = ScriptedSource::default();
        source.current.insert("A".into(), make_obs("A", 20.0));
        source.current.insert("B".into(), make_obs("B", 22.0));

        let fx = fixture(source, &["B", "A", "never-fetched"], 30.0);
        fx.service.refresh_all().await;

        let current = fx.service.current_all();
        let names: Vec<&str> = current.iter().map(|o| o.location.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn get_current_falls_back_to_an_on_demand_fetch() {
        let mut source = ScriptedSource::default();
        source.current.insert("Delhi".into(), make_obs("Delhi", 24.0));

        let fx = fixture(source, &["Delhi"], 30.0);

        // No refresh has run; the fetch is on demand and recorded.
        let obs = fx.service.get_current("Delhi").await.expect("fetched");
        assert_eq!(obs.temperature_c, 24.0);
        assert_eq!(fx.service.get_historical("Delhi").expect("recorded").len(), 1);
    }

    #[tokio::test]
    async fn get_current_reports_no_data_when_the_fallback_fails() {
        let mut source = ScriptedSource::default();
        source.failing.insert("Delhi".into());

        let fx = fixture(source, &["Delhi"], 30.0);
        assert!(matches!(
            fx.service.get_current("Delhi").await,
            Err(ServiceError::NoData(_))
        ));
    }

    #[tokio::test]
    async fn forecast_for_one_surfaces_the_fetch_error() {
        let mut source = ScriptedSource::default();
        source.failing.insert("Delhi".into());

        let fx = fixture(source, &["Delhi"], 30.0);
        assert!(matches!(
            fx.service.get_forecast_for("Delhi").await,
            Err(ServiceError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn forecast_for_all_omits_the_failing_location() {
        let mut source = ScriptedSource::default();
        source
            .forecasts
            .insert("A".into(), vec![make_entry(3), make_entry(6)]);
        source
            .forecasts
            .insert("C".into(), vec![make_entry(3)]);
        source.failing.insert("B".into());

        let fx = fixture(source, &["A", "B", "C"], 30.0);
        let forecasts = fx.service.get_forecast_for_all().await;

        assert_eq!(forecasts.len(), 2);
        assert_eq!(forecasts.get("A").map(Vec::len), Some(2));
        assert!(!forecasts.contains_key("B"));
    }

    #[tokio::test]
    async fn manual_alert_requires_all_three_fields() {
        let fx = fixture(ScriptedSource::default(), &["Delhi"], 30.0);

        let missing_body = AlertRequest {
            recipient: Some("ops@example.com".into()),
            subject: Some("subject".into()),
            body: None,
        };
        assert!(matches!(
            fx.service.send_alert(missing_body).await,
            Err(ServiceError::MissingField("body"))
        ));

        let blank_subject = AlertRequest {
            recipient: Some("ops@example.com".into()),
            subject: Some("   ".into()),
            body: Some("body".into()),
        };
        assert!(matches!(
            fx.service.send_alert(blank_subject).await,
            Err(ServiceError::MissingField("subject"))
        ));

        let complete = AlertRequest {
            recipient: Some("ops@example.com".into()),
            subject: Some("subject".into()),
            body: Some("body".into()),
        };
        fx.service.send_alert(complete).await.expect("valid request acks");
        assert_eq!(fx.sink.sent().len(), 1);
    }
}
