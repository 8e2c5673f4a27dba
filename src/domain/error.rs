//! Domain error types.

/// Top-level error type for midas.
#[derive(Debug, thiserror::Error)]
pub enum MidasError {
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

    /// A single fetch attempt failed; the loader may retry.
    #[error("fetch failed for {ticker}: {reason}")]
    DataFetch { ticker: String, reason: String },

    #[error("data unavailable for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("no data: {reason}")]
    NoData { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&MidasError> for std::process::ExitCode {
    fn from(err: &MidasError) -> Self {
        let code: u8 = match err {
            MidasError::Io(_) | MidasError::Report { .. } => 1,
            MidasError::ConfigParse { .. }
            | MidasError::ConfigMissing { .. }
            | MidasError::ConfigInvalid { .. } => 2,
            MidasError::DataFetch { .. } | MidasError::DataUnavailable { .. } => 3,
            MidasError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
