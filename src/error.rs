//! Error types for llmrota.

/// Result type alias for llmrota operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for llmrota.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// No endpoints exist to select from. Returned by checkout when the
    /// registry came up empty; never raised during registry construction,
    /// which treats an empty credential set as a degraded-but-valid
    /// startup state.
    #[error("No LLM endpoints configured")]
    NoEndpoints,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_endpoints_message() {
        let err = Error::NoEndpoints;
        assert_eq!(err.to_string(), "No LLM endpoints configured");
    }
}
