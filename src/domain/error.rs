//! Domain error types.

/// Top-level error type for gridtrader.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("empty simulation window for period {period}")]
    EmptyWindow { period: String },

    #[error("price source unavailable for {code}: {reason}")]
    SourceUnavailable { code: String, reason: String },

    #[error("malformed price source for {code}: {reason}")]
    MalformedSource { code: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("failed to write report {path}: {reason}")]
    Report { path: String, reason: String },

    #[error("worker for {code} panicked")]
    WorkerPanicked { code: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GridError {
    /// True for failures that invalidate a whole instrument rather than one period.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            GridError::SourceUnavailable { .. } | GridError::MalformedSource { .. }
        )
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        GridError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&GridError> for std::process::ExitCode {
    fn from(err: &GridError) -> Self {
        let code: u8 = match err {
            GridError::Io(_) | GridError::Report { .. } | GridError::WorkerPanicked { .. } => 1,
            GridError::ConfigParse { .. }
            | GridError::ConfigMissing { .. }
            | GridError::ConfigInvalid { .. } => 2,
            GridError::Database { .. } | GridError::DatabaseQuery { .. } => 3,
            GridError::SourceUnavailable { .. }
            | GridError::MalformedSource { .. }
            | GridError::EmptyWindow { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
