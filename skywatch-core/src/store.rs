use crate::model::Observation;
use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

/// Number of observations retained per location.
pub const HISTORY_DEPTH: usize = 7;

/// Bounded per-location observation history with whole-file snapshot
/// persistence.
///
/// Eviction is strictly by count, not by age: a burst of appends within
/// one window still evicts oldest-first once the buffer holds
/// [`HISTORY_DEPTH`] entries. Readers get cloned views, so an in-flight
/// append is never observable as a torn buffer.
#[derive(Debug)]
pub struct ObservationStore {
    snapshot_path: PathBuf,
    histories: RwLock<HashMap<String, VecDeque<Observation>>>,
}

impl ObservationStore {
    /// Open the store, loading the snapshot at `snapshot_path` if one
    /// exists. An absent or malformed snapshot starts the store empty;
    /// neither is a fatal error.
    pub fn open(snapshot_path: impl Into<PathBuf>) -> Self {
        let snapshot_path = snapshot_path.into();

        let histories = match fs::read_to_string(&snapshot_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(
                        path = %snapshot_path.display(),
                        error = %e,
                        "History snapshot is malformed, starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %snapshot_path.display(),
                    error = %e,
                    "Could not read history snapshot, starting empty"
                );
                HashMap::new()
            }
        };

        Self {
            snapshot_path,
            histories: RwLock::new(histories),
        }
    }

    /// Append an observation to the location's buffer, creating the buffer
    /// on first sight and evicting the oldest entry beyond capacity.
    pub fn append(&self, location: &str, observation: Observation) {
        let mut histories = self
            .histories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let buffer = histories.entry(location.to_string()).or_default();
        buffer.push_back(observation);
        while buffer.len() > HISTORY_DEPTH {
            buffer.pop_front();
        }
    }

    /// The location's retained history, oldest first, as an owned copy.
    /// `None` when nothing has ever been recorded for the location.
    pub fn history_of(&self, location: &str) -> Option<Vec<Observation>> {
        let histories = self
            .histories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        histories
            .get(location)
            .filter(|buffer| !buffer.is_empty())
            .map(|buffer| buffer.iter().cloned().collect())
    }

    /// The most recent observation for the location, if any.
    pub fn latest(&self, location: &str) -> Option<Observation> {
        let histories = self
            .histories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        histories.get(location).and_then(|buffer| buffer.back().cloned())
    }

    /// Serialize the whole mapping to the snapshot file, fully overwriting
    /// prior content. Called once per refresh cycle; a failure is reported
    /// to the caller to log, never to abort the cycle.
    pub fn persist(&self) -> Result<()> {
        let json = {
            let histories = self
                .histories
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            serde_json::to_string_pretty(&*histories)
                .context("Failed to serialize history snapshot")?
        };

        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create snapshot directory: {}", parent.display())
            })?;
        }

        fs::write(&self.snapshot_path, json).with_context(|| {
            format!(
                "Failed to write history snapshot: {}",
                self.snapshot_path.display()
            )
        })
    }
}
