use thiserror::Error;

/// User-visible failures from the query surface.
///
/// Per-location failures inside bulk operations never surface here; they
/// are logged and the sibling work continues. Only single-target queries
/// and malformed manual requests reach the caller as errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Nothing has ever been recorded for this location.
    #[error("no data available for location '{0}'")]
    NoData(String),

    /// A required field of a manual alert request was absent or empty.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A single-target fetch failed; the underlying error is preserved.
    #[error("failed to fetch weather data for '{location}'")]
    Fetch {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}
