use std::io;
use std::time::Duration;
use thiserror::Error;

/// Custom error type for hostfacts
#[derive(Error, Debug)]
pub enum HostFactsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {}s: {what}", .after.as_secs_f64())]
    Timeout { what: String, after: Duration },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for hostfacts
pub type Result<T> = std::result::Result<T, HostFactsError>;

impl HostFactsError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        HostFactsError::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        HostFactsError::Transport(msg.into())
    }

    pub fn timeout<S: Into<String>>(what: S, after: Duration) -> Self {
        HostFactsError::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        HostFactsError::Parse(msg.into())
    }

    pub fn unknown_provider<S: Into<String>>(name: S) -> Self {
        HostFactsError::UnknownProvider(name.into())
    }

    pub fn invalid_host<S: Into<String>>(msg: S) -> Self {
        HostFactsError::InvalidHost(msg.into())
    }

    pub fn sink<S: Into<String>>(msg: S) -> Self {
        HostFactsError::Sink(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        HostFactsError::Other(msg.into())
    }
}
