//! Error types for calplan.

use thiserror::Error;

/// Errors that can occur in calplan operations.
#[derive(Error, Debug)]
pub enum CalPlanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid --since value '{0}'. Expected YYYY-MM-DD or a full ISO-8601 timestamp")]
    InvalidSince(String),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Schedule JSON error: {0}")]
    ScheduleJson(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calplan operations.
pub type CalPlanResult<T> = Result<T, CalPlanError>;

/// A malformed event. Raised before any remote call is made for it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Event #{index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Event #{index}: invalid {field} '{value}'")]
    InvalidTime {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("Event '{title}' ends before it starts (end <= start)")]
    EndNotAfterStart { title: String },

    #[error("Event '{title}' mixes an all-day date with a timed value")]
    MixedTimeKinds { title: String },
}

/// How the retry layer treats a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// Rate limited or forbidden; worth another attempt after backing off.
    Retryable,
    /// Everything else. Surfaced to the caller as is.
    Terminal,
}

impl RetryKind {
    pub fn for_status(status: u16) -> Self {
        match status {
            403 | 429 => RetryKind::Retryable,
            _ => RetryKind::Terminal,
        }
    }
}

/// A failed call against the remote calendar API.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", render_remote_error(.status, .message))]
pub struct RemoteError {
    kind: RetryKind,
    status: Option<u16>,
    message: String,
}

fn render_remote_error(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("Remote call failed ({}): {}", status, message),
        None => format!("Remote call failed: {}", message),
    }
}

impl RemoteError {
    /// Build an error from an HTTP-equivalent status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        RemoteError {
            kind: RetryKind::for_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    /// A failure with no status (connection refused, undecodable body, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        RemoteError {
            kind: RetryKind::Terminal,
            status: None,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        RemoteError::transport("operation cancelled")
    }

    pub fn kind(&self) -> RetryKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == RetryKind::Retryable
    }
}
