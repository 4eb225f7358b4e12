/// Result alias that carries the custom [`MapError`] type.
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error type for the core crate.
///
/// Only the file and JSON plumbing ever reaches a caller. The session
/// controller logs initialization and injection failures and degrades instead
/// of returning them.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Missing or placeholder access token, or a map resource that failed to
    /// load.
    #[error("map initialization failed: {0}")]
    Initialization(String),
    /// The sandboxed host refused a forward command.
    #[error("script injection failed: {0}")]
    Injection(String),
    /// A state change arrived before the backend finished setting up.
    #[error("reconciliation skipped: backend not ready")]
    ReconciliationSkipped,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl MapError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Shorthand for [`MapError::Initialization`].
    pub fn init<T: Into<String>>(reason: T) -> Self {
        Self::Initialization(reason.into())
    }
}

impl From<&str> for MapError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MapError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
