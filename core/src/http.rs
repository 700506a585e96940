//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `BoardApi` builds `HttpRequest`
//! values and parses `HttpResponse` values without touching the network; the
//! async clients hand requests to an `HttpTransport` supplied by the host.
//! A mobile host that keeps its own HTTP stack can skip the trait entirely
//! and drive `BoardApi` through the FFI crate instead.
//!
//! All fields use owned types (`String`, `Vec`) so values can cross FFI
//! boundaries without lifetime concerns.

use async_trait::async_trait;

use crate::error::Result;

/// Header carrying the board's shared ingest secret.
pub const INGEST_SECRET_HEADER: &str = "x-ingest-secret";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `path` is the absolute URL, query string included.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Returns the first header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// A `status` of 0 means the transport produced no HTTP status at all.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// True when the status is a real HTTP status code.
    pub fn has_status(&self) -> bool {
        (100..600).contains(&self.status)
    }

    /// True for statuses in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one HTTP exchange.
///
/// Implementations return `Ok` for every response that carries a status,
/// including 4xx/5xx, and `Err(WishError::Transport)` only when no response
/// was received. Status interpretation belongs to `BoardApi`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            path: "http://localhost/api".to_string(),
            headers: vec![("X-Ingest-Secret".to_string(), "s".to_string())],
            body: None,
        };
        assert_eq!(req.header(INGEST_SECRET_HEADER), Some("s"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn success_range_is_half_open() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(299, "").is_success());
        assert!(!HttpResponse::new(300, "").is_success());
        assert!(!HttpResponse::new(0, "").has_status());
    }
}
