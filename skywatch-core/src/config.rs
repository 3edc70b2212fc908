use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Alert evaluation and delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Temperature that two consecutive readings must strictly exceed.
    #[serde(default = "default_threshold_c")]
    pub threshold_c: f64,

    /// Recipient of automatic alert e-mails.
    pub recipient: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold_c: default_threshold_c(),
            recipient: "alerts@example.com".to_string(),
        }
    }
}

/// SMTP settings for the e-mail notification sink. When the section is
/// absent, alerts are written to the log instead of delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fixed set of tracked locations; immutable for the process lifetime.
    pub locations: Vec<String>,

    /// Seconds between refresh cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// OpenWeather API key. Falls back to the `OPENWEATHER_API_KEY`
    /// environment variable when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Where the history snapshot is written. Defaults to the platform
    /// data directory.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    #[serde(default)]
    pub alert: AlertConfig,

    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locations: [
                "Delhi",
                "Mumbai",
                "Chennai",
                "Bangalore",
                "Kolkata",
                "Hyderabad",
            ]
            .map(String::from)
            .to_vec(),
            poll_interval_secs: default_poll_interval_secs(),
            api_key: None,
            snapshot_path: None,
            alert: AlertConfig::default(),
            smtp: None,
        }
    }
}

fn default_threshold_c() -> f64 {
    30.0
}

fn default_smtp_port() -> u16 {
    587
}

fn default_poll_interval_secs() -> u64 {
    300
}

impl Config {
    /// Load config from `path` if given, otherwise from the platform config
    /// directory. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if cfg.locations.is_empty() {
            return Err(anyhow!(
                "Config file {} lists no locations.\n\
                 Hint: add at least one entry to the `locations` array.",
                path.display()
            ));
        }

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Resolved API key: explicit config value, else environment.
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_owned());
        }

        std::env::var("OPENWEATHER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeather API key configured.\n\
                     Hint: set `api_key` in the config file or export OPENWEATHER_API_KEY."
                )
            })
    }

    /// Resolved snapshot location: explicit config value, else the
    /// platform data directory.
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.snapshot_path {
            return Ok(path.clone());
        }

        let dirs = project_dirs()?;
        Ok(dirs.data_dir().join("historical_weather.json"))
    }

    pub fn poll_interval(&self) -> Duration {
        // tokio::time::interval panics on a zero period
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "skywatch", "skywatch")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_track_six_locations_every_five_minutes() {
        let cfg = Config::default();
        assert_eq!(cfg.locations.len(), 6);
        assert_eq!(cfg.poll_interval_secs, 300);
        assert_eq!(cfg.alert.threshold_c, 30.0);
    }

    #[test]
    fn parses_a_minimal_config() {
        let cfg: Config = toml::from_str(
            r#"
            locations = ["Delhi", "Mumbai"]

            [alert]
            recipient = "ops@example.com"
            "#,
        )
        .expect("minimal config must parse");

        assert_eq!(cfg.locations, vec!["Delhi", "Mumbai"]);
        assert_eq!(cfg.poll_interval_secs, 300);
        assert_eq!(cfg.alert.threshold_c, 30.0);
        assert_eq!(cfg.alert.recipient, "ops@example.com");
        assert!(cfg.smtp.is_none());
    }

    #[test]
    fn parses_smtp_section_with_default_port() {
        let cfg: Config = toml::from_str(
            r#"
            locations = ["Delhi"]

            [smtp]
            host = "smtp.example.com"
            from = "noreply@example.com"
            "#,
        )
        .expect("smtp config must parse");

        let smtp = cfg.smtp.expect("smtp section present");
        assert_eq!(smtp.port, 587);
        assert!(smtp.username.is_none());
    }

    #[test]
    fn explicit_api_key_wins() {
        let cfg = Config {
            api_key: Some("KEY".into()),
            ..Config::default()
        };
        assert_eq!(cfg.api_key().expect("key must resolve"), "KEY");
    }

    #[test]
    fn empty_locations_rejected_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "locations = []\n").expect("write config");

        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("no locations"));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let cfg = Config {
            poll_interval_secs: 60,
            ..Config::default()
        };
        cfg.save(Some(path.as_path())).expect("save config");

        let loaded = Config::load(Some(path.as_path())).expect("load config");
        assert_eq!(loaded.poll_interval_secs, 60);
        assert_eq!(loaded.locations, cfg.locations);
    }
}
