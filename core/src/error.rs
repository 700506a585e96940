//! Error types for the FounderWish client.
//!
//! # Design
//! `NotConfigured`, `InvalidResponse` and `ServerError` are the three kinds a
//! host application is expected to branch on: the first means `configure`
//! was never called, the second means the server answered with something
//! that has no usable shape, and the third carries the server's body (or a
//! local diagnostic) for display. The remaining variants cover failures that
//! happen before or around the HTTP exchange.

use thiserror::Error;

/// Result type alias for FounderWish operations.
pub type Result<T> = std::result::Result<T, WishError>;

/// Errors returned by the session store and the board clients.
#[derive(Debug, Error)]
pub enum WishError {
    /// `configure` has not been called on the session store.
    #[error("FounderWish is not configured; call configure with a board key first")]
    NotConfigured,

    /// The transport returned no usable HTTP status, or the payload shape is
    /// unusable (e.g. an upvote answer without `ok: true` and a count).
    #[error("invalid response from server")]
    InvalidResponse,

    /// Non-2xx status or an explicit decode failure. The message is the
    /// server body when there is one.
    #[error("{0}")]
    ServerError(String),

    /// The base URL override is not an absolute http(s) URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Feedback was submitted with an empty title.
    #[error("feedback title must not be empty")]
    EmptyTitle,

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP transport failed before a response was received.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The local key-value store could not be read or written.
    #[error("storage failed: {0}")]
    Storage(String),
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for WishError {
    fn from(err: reqwest::Error) -> Self {
        WishError::Transport(err.to_string())
    }
}
