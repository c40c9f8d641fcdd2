//! Error types used throughout the client

use thiserror::Error;

/// Main error type for the Nolij Web client
#[derive(Error, Debug)]
pub enum NolijError {
    /// Bad configuration input: wrong input type, missing file, or
    /// unparsable file contents. Raised at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server rejected or did not recognize the session.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A required logical parameter was absent or empty. Raised before any
    /// network call is attempted.
    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    /// A response status not covered by the active response policy. Carries
    /// the status and body so callers can inspect both.
    #[error("HTTP error (status {status}): {body}")]
    Http {
        /// HTTP status code of the response.
        status: u16,
        /// Response body, decoded lossily as UTF-8.
        body: String,
    },

    /// Transport-level failure before a response was produced.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered successfully but the body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for Nolij Web operations
pub type Result<T> = std::result::Result<T, NolijError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_message_names_the_category() {
        let err = NolijError::Config("invalid configuration options supplied".to_string());
        assert!(err.to_string().to_lowercase().contains("invalid configuration"));
    }

    #[test]
    fn http_error_carries_status_and_body() {
        let err = NolijError::Http { status: 503, body: "down for maintenance".to_string() };
        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("down for maintenance"));
    }
}
