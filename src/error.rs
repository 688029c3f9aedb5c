//! Custom error types for scholarmap.
//!
//! Library functions return `Result<T, ScholarMapError>`; the binary wraps
//! them in `anyhow` with context.
//!
//! An affiliation that cannot be matched is *not* an error: the resolver
//! returns [`crate::resolver::Resolution::Unresolved`] and the run goes on.

use thiserror::Error;

/// Main error type for scholarmap operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum ScholarMapError {
    /// API key missing or rejected by SerpApi
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// SerpApi quota exhausted or request throttled
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Connectivity problem (connect, timeout, broken transfer)
    #[error("Network error: {0}")]
    TransientNetwork(#[from] reqwest::Error),

    /// SerpApi returned an error we have no dedicated variant for
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// Response body or HTML did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reference table could not be loaded
    #[error("Reference table error: {0}")]
    Reference(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl ScholarMapError {
    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::RateLimited(_))
    }
}

/// Result type alias using `ScholarMapError`
pub type Result<T> = std::result::Result<T, ScholarMapError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ScholarMapError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u32> = None;
        match missing.ok_or_parse("no value") {
            Err(ScholarMapError::Parse(msg)) => assert_eq!(msg, "no value"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(Some(3).ok_or_parse("no value").expect("present"), 3);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ScholarMapError::RateLimited("quota".into()).is_transient());
        assert!(!ScholarMapError::Authentication("bad key".into()).is_transient());
        assert!(!ScholarMapError::Config("x".into()).is_transient());
    }
}
