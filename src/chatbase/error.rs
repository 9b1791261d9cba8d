//! Error types for the Chatbase clients.

use thiserror::Error;

/// Error raised by the chat and history clients.
#[derive(Error, Debug)]
pub enum ChatbaseError {
    /// HTTP request failed or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if it could be read.
        body: String,
    },

    /// Settings are incomplete or malformed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatbaseError {
    /// Build a status error from a failed response, reading its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Status { status, body }
    }
}
