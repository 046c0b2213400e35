//! Domain error types.
//!
//! Conditions that abort a run (`DataUnavailable`, `NoFeeds`) are `Err`
//! values and bubble to the caller. Conditions the engine survives (unknown
//! assets in a weight table, skipped orders) are logged where they occur and
//! never appear here.

/// Top-level error type for glidepath.
#[derive(Debug, thiserror::Error)]
pub enum GlidepathError {
    /// A signal or price observation required for a rebalance decision is
    /// missing. Names the offending series so an operator can tell missing
    /// valuation data from missing yield data.
    #[error("data unavailable for {series}: {reason}")]
    DataUnavailable { series: String, reason: String },

    /// Zero price feeds loaded at setup. The engine refuses to start.
    #[error("no price feeds loaded, refusing to start")]
    NoFeeds,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data feed error: {reason}")]
    Feed { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GlidepathError {
    pub fn data_unavailable(series: &str, reason: impl Into<String>) -> Self {
        GlidepathError::DataUnavailable {
            series: series.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&GlidepathError> for std::process::ExitCode {
    fn from(err: &GlidepathError) -> Self {
        let code: u8 = match err {
            GlidepathError::Io(_) => 1,
            GlidepathError::ConfigParse { .. }
            | GlidepathError::ConfigMissing { .. }
            | GlidepathError::ConfigInvalid { .. } => 2,
            GlidepathError::Feed { .. } => 3,
            GlidepathError::NoFeeds => 4,
            GlidepathError::DataUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
