use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid source data: {0}")]
    InvalidData(String),

    #[error("Coordinate anchor missing: {0}")]
    AnchorMissing(String),

    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Application launch timed out: {0}")]
    LaunchTimeout(String),

    #[error("Input simulation failed: {0}")]
    InputFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AutomationError {
    /// UI-step failures are worth another attempt. Load-time and
    /// configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WindowNotFound(_) | Self::InputFailure(_))
    }
}
