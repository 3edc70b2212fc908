use anyhow::Result;
use clap::{Parser, Subcommand};
use skywatch_core::{
    AlertEngine, AlertRequest, Config, EmailSink, ForecastPoint, LogSink, NotificationSink,
    Observation, ObservationStore, OpenWeatherSource, QueryService, TrendPoint,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skywatch", version, about = "Weather polling and alerting daemon")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon: refresh immediately, then on a fixed interval.
    Run,

    /// Show the most recent observation for a location, or all of them.
    Current {
        /// Location name; all configured locations when omitted.
        location: Option<String>,
    },

    /// Show the retained historical trend for a location.
    History {
        /// Location name.
        location: String,
    },

    /// Fetch and show the forecast summary for a location, or all of them.
    Forecast {
        /// Location name; best-effort across all locations when omitted.
        location: Option<String>,
    },

    /// Send a manual alert e-mail.
    SendAlert {
        #[arg(long)]
        recipient: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let service = build_service(&config)?;

        match self.command {
            Command::Run => run_daemon(&config, &service).await,
            Command::Current { location } => {
                match location {
                    Some(location) => print_observation(&service.get_current(&location).await?),
                    None => {
                        // Serve whatever the last cycle recorded; refresh
                        // first so a cold start still has data to show.
                        if service.current_all().is_empty() {
                            service.refresh_all().await;
                        }
                        for observation in service.current_all() {
                            print_observation(&observation);
                        }
                    }
                }
                Ok(())
            }
            Command::History { location } => {
                let trend = service.get_historical(&location)?;
                println!("{location} - last {} readings", trend.len());
                for point in trend {
                    print_trend_point(&point);
                }
                Ok(())
            }
            Command::Forecast { location } => {
                match location {
                    Some(location) => {
                        let summary = service.get_forecast_for(&location).await?;
                        print_forecast(&location, &summary);
                    }
                    None => {
                        let forecasts = service.get_forecast_for_all().await;
                        for location in service.locations() {
                            if let Some(summary) = forecasts.get(location) {
                                print_forecast(location, summary);
                            }
                        }
                    }
                }
                Ok(())
            }
            Command::SendAlert {
                recipient,
                subject,
                body,
            } => {
                service
                    .send_alert(AlertRequest {
                        recipient,
                        subject,
                        body,
                    })
                    .await?;
                println!("Alert sent.");
                Ok(())
            }
        }
    }
}

fn build_service(config: &Config) -> Result<QueryService> {
    let api_key = config.api_key()?;
    let store = ObservationStore::open(config.snapshot_path()?);

    let sink: Arc<dyn NotificationSink> = match &config.smtp {
        Some(smtp) => Arc::new(EmailSink::from_config(smtp)?),
        None => Arc::new(LogSink),
    };

    Ok(QueryService::new(
        Arc::new(OpenWeatherSource::new(api_key)),
        store,
        AlertEngine::new(config.alert.threshold_c),
        sink,
        config.locations.clone(),
        config.alert.recipient.clone(),
    ))
}

/// Refresh once at startup, then on every tick. The cycle is awaited in
/// the loop body, so cycles never overlap: a tick that fires mid-cycle
/// is delayed behind the running one.
async fn run_daemon(config: &Config, service: &QueryService) -> Result<()> {
    info!(
        locations = config.locations.len(),
        poll_interval_secs = config.poll_interval_secs,
        "skywatch daemon started"
    );

    service.refresh_all().await;

    let mut tick = tokio::time::interval(config.poll_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a fresh interval completes immediately; the
    // startup refresh already covered it.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                service.refresh_all().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, exiting");
                return Ok(());
            }
        }
    }
}

fn print_observation(observation: &Observation) {
    println!(
        "{}: {:.2}°C (feels like {:.2}°C), {}, humidity: {}, wind: {} m/s, at {}",
        observation.location,
        observation.temperature_c,
        observation.feels_like_c,
        observation.condition,
        observation.humidity_pct,
        observation.wind_speed_ms,
        observation.observed_at.format("%Y-%m-%d %H:%M UTC"),
    );
}

fn print_trend_point(point: &TrendPoint) {
    println!(
        "{}: {:.2}°C, humidity: {}, wind: {} m/s",
        point.date.format("%m/%d/%Y"),
        point.temperature_c,
        point.humidity_pct,
        point.wind_speed_ms,
    );
}

fn print_forecast(location: &str, summary: &[ForecastPoint]) {
    println!("{location}:");
    for point in summary {
        println!(
            "  {}: {:.2}°C, {}, humidity: {}, wind: {} m/s",
            point.date.format("%Y-%m-%d"),
            point.temperature_c,
            point.condition,
            point.humidity_pct,
            point.wind_speed_ms,
        );
    }
}
