//! Client error types.

/// Errors that can occur when using the shopforge client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient credits.
    #[error("insufficient credits: have={have}, need={need}")]
    InsufficientCredits {
        /// Current balance.
        have: i64,
        /// Required amount.
        need: i64,
    },

    /// The shop name collides with an existing shop.
    #[error("shop name taken: {message}")]
    SlugTaken {
        /// Server-provided message.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
