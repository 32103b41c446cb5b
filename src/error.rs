//! Custom error types for the observatory pipeline.
//!
//! Adapter-level failures (transport, malformed responses) are caught close to
//! where they happen and degrade to empty results; only the variants that reach
//! the orchestrator or the CLI are surfaced to the user.

use thiserror::Error;

/// Main error type for observatory operations.
#[derive(Debug, Error)]
pub enum ObservatoryError {
    /// Network/HTTP request error, including request timeouts
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Markup or structured response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// External API answered with a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message
        message: String,
    },

    /// Every source came back empty
    #[error("No papers could be loaded from any source")]
    PipelineEmpty,

    /// Persisted snapshot is unreadable
    #[error("Cached snapshot is corrupt: {0}")]
    CacheCorrupt(String),

    /// A source task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `ObservatoryError`
pub type Result<T> = std::result::Result<T, ObservatoryError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ObservatoryError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u8> = None;
        match missing.ok_or_parse("no feed element") {
            Err(ObservatoryError::Parse(msg)) => assert_eq!(msg, "no feed element"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(Some(3).ok_or_parse("unused").ok(), Some(3));
    }
}
