use thiserror::Error;

/// Errors that callers of a run or a query need to tell apart.
///
/// Everything else travels as a plain `anyhow::Error`.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("GitHub token is required. Set GITHUB_TOKEN or `repopulse config set token ...`")]
    MissingToken,
    #[error("Repository not accessible: {0}")]
    InvalidRepository(String),
    #[error("Metrics file not found: {0}")]
    MetricsNotFound(String),
    #[error("The {0} table has no Date column; only the daily table can be filtered by date")]
    DateFilterUnsupported(&'static str),
}

impl MetricsError {
    /// Whether the error was caused by the caller's input rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MetricsError::InvalidDate(_)
                | MetricsError::InvalidRequest(_)
                | MetricsError::DateFilterUnsupported(_)
        )
    }
}
