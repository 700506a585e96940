//! Stateless HTTP request builder and response parser for the board API.
//!
//! # Design
//! `BoardApi` is built from a `SessionConfig` snapshot and carries no mutable
//! state between calls. Each endpoint is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The async clients and the FFI layer both sit on top of
//! it; neither duplicates URL, header or status handling.

use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, WishError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, INGEST_SECRET_HEADER};
use crate::session::{IngestSecret, SessionConfig};
use crate::types::{
    FeedbackPayload, IngestInfo, PublicItem, PublicItemsEnvelope, UpvoteRequest, UpvoteResponse,
};

pub const INGEST_INFO_PATH: &str = "/api/ingest-info";
pub const FEEDBACK_PATH: &str = "/api/feedback";
pub const PUBLIC_FEEDBACK_PATH: &str = "/api/public-feedback";
pub const PUBLIC_UPVOTE_PATH: &str = "/api/public-upvote";

/// Number of body characters quoted in decode errors.
const BODY_EXCERPT_CHARS: usize = 200;

/// Synchronous, stateless client for the board API.
#[derive(Debug, Clone)]
pub struct BoardApi {
    base_url: String,
    secret: IngestSecret,
}

impl BoardApi {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            base_url: config.base_str().to_string(),
            secret: config.ingest_secret.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn secret_header(&self) -> (String, String) {
        (
            INGEST_SECRET_HEADER.to_string(),
            self.secret.expose().to_string(),
        )
    }

    fn json_headers(&self) -> Vec<(String, String)> {
        vec![
            ("content-type".to_string(), "application/json".to_string()),
            self.secret_header(),
        ]
    }

    pub fn build_ingest_info(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: self.url(INGEST_INFO_PATH),
            headers: vec![self.secret_header()],
            body: None,
        }
    }

    pub fn build_submit_feedback(&self, payload: &FeedbackPayload) -> Result<HttpRequest> {
        let body = serde_json::to_string(payload)?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: self.url(FEEDBACK_PATH),
            headers: self.json_headers(),
            body: Some(body),
        })
    }

    /// Public listing; carries no secret.
    pub fn build_list_public_items(&self, public_id: &str, limit: usize) -> Result<HttpRequest> {
        let raw = self.url(PUBLIC_FEEDBACK_PATH);
        let limit = limit.to_string();
        let params = [("public_id", public_id), ("limit", limit.as_str())];
        let url = Url::parse_with_params(&raw, &params)
            .map_err(|_| WishError::InvalidBaseUrl(self.base_url.clone()))?;
        Ok(HttpRequest {
            method: HttpMethod::Get,
            path: url.into(),
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn build_upvote(&self, feedback_id: &str) -> Result<HttpRequest> {
        let body = serde_json::to_string(&UpvoteRequest { feedback_id })?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: self.url(PUBLIC_UPVOTE_PATH),
            headers: self.json_headers(),
            body: Some(body),
        })
    }

    /// Returns the board's public identifier: `slug`, else `public_id`.
    pub fn parse_ingest_info(&self, response: HttpResponse) -> Result<String> {
        check_status(&response, "Server error")?;
        let info: IngestInfo = serde_json::from_str(&response.body).map_err(|e| {
            WishError::ServerError(format!(
                "Failed to decode board info: {e}. Response: {}",
                excerpt(&response.body)
            ))
        })?;
        info.identifier().ok_or_else(|| {
            WishError::ServerError("API did not return a valid slug or public_id".to_string())
        })
    }

    pub fn parse_submit_feedback(&self, response: HttpResponse) -> Result<()> {
        check_status(&response, "Server error")
    }

    /// Decodes `{items: [...]}`, keeping at most `limit` items.
    pub fn parse_list_public_items(
        &self,
        response: HttpResponse,
        limit: usize,
    ) -> Result<Vec<PublicItem>> {
        let fallback = format!("Server returned status {}", response.status);
        check_status(&response, &fallback)?;
        let envelope: PublicItemsEnvelope = serde_json::from_str(&response.body).map_err(|e| {
            warn!(error = %e, "Public items payload did not decode");
            WishError::ServerError(format!(
                "Failed to decode response: {e}. Response: {}",
                excerpt(&response.body)
            ))
        })?;
        let mut items = envelope.items;
        items.truncate(limit);
        Ok(items)
    }

    /// Returns the authoritative vote count after an upvote.
    pub fn parse_upvote(&self, response: HttpResponse) -> Result<i64> {
        check_status(&response, "Server error")?;
        let decoded: UpvoteResponse =
            serde_json::from_str(&response.body).map_err(|_| WishError::InvalidResponse)?;
        match decoded {
            UpvoteResponse {
                ok: true,
                votes: Some(votes),
            } => Ok(votes),
            _ => Err(WishError::InvalidResponse),
        }
    }
}

/// Maps a missing status to `InvalidResponse` and a non-2xx status to
/// `ServerError` carrying the body, or `fallback` when the body is empty.
fn check_status(response: &HttpResponse, fallback: &str) -> Result<()> {
    if !response.has_status() {
        return Err(WishError::InvalidResponse);
    }
    if response.is_success() {
        return Ok(());
    }
    debug!(status = response.status, "Board API returned an error status");
    let message = if response.body.trim().is_empty() {
        fallback.to_string()
    } else {
        response.body.clone()
    };
    Err(WishError::ServerError(message))
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::parse_base_url;

    fn api() -> BoardApi {
        let config = SessionConfig::new(
            parse_base_url("http://localhost:3000/").unwrap(),
            IngestSecret::new("secret-1"),
        );
        BoardApi::new(&config)
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let req = api().build_ingest_info();
        assert_eq!(req.path, "http://localhost:3000/api/ingest-info");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.header("x-ingest-secret"), Some("secret-1"));
        assert!(req.body.is_none());
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let config = SessionConfig::new(
            parse_base_url("https://example.com/board/").unwrap(),
            IngestSecret::new("s"),
        );
        let req = BoardApi::new(&config).build_ingest_info();
        assert_eq!(req.path, "https://example.com/board/api/ingest-info");
    }

    #[test]
    fn list_request_encodes_query_and_has_no_secret() {
        let req = api().build_list_public_items("my board&x", 10).unwrap();
        assert_eq!(
            req.path,
            "http://localhost:3000/api/public-feedback?public_id=my+board%26x&limit=10"
        );
        assert!(req.headers.is_empty());
    }

    #[test]
    fn upvote_request_has_json_body_and_secret() {
        let req = api().build_upvote("item-7").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/public-upvote");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("x-ingest-secret"), Some("secret-1"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"feedback_id": "item-7"}));
    }

    #[test]
    fn parse_ingest_info_variants() {
        let api = api();
        assert_eq!(
            api.parse_ingest_info(HttpResponse::new(200, r#"{"slug":"abc"}"#)).unwrap(),
            "abc"
        );
        assert_eq!(
            api.parse_ingest_info(HttpResponse::new(200, r#"{"public_id":"xyz"}"#)).unwrap(),
            "xyz"
        );
        assert!(matches!(
            api.parse_ingest_info(HttpResponse::new(200, "{}")),
            Err(WishError::ServerError(_))
        ));
        assert!(matches!(
            api.parse_ingest_info(HttpResponse::new(200, "<html>")),
            Err(WishError::ServerError(_))
        ));
    }

    #[test]
    fn parse_ingest_info_surfaces_error_body() {
        let err = api()
            .parse_ingest_info(HttpResponse::new(401, "bad secret"))
            .unwrap_err();
        assert!(matches!(err, WishError::ServerError(ref m) if m == "bad secret"));

        let err = api().parse_ingest_info(HttpResponse::new(500, "")).unwrap_err();
        assert!(matches!(err, WishError::ServerError(ref m) if m == "Server error"));
    }

    #[test]
    fn parse_list_public_items_success() {
        let body = r#"{"items":[{"id":"1","title":"T","status":"open","created_at":"2024-01-01T00:00:00Z","votes":5}]}"#;
        let items = api()
            .parse_list_public_items(HttpResponse::new(200, body), 50)
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].votes, Some(5));
    }

    #[test]
    fn parse_list_public_items_missing_items_is_decode_error() {
        let err = api()
            .parse_list_public_items(HttpResponse::new(200, r#"{"data":[]}"#), 50)
            .unwrap_err();
        match err {
            WishError::ServerError(message) => {
                assert!(message.starts_with("Failed to decode response"));
                assert!(message.contains(r#"{"data":[]}"#));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_list_public_items_truncates_excerpt() {
        let body = "x".repeat(1000);
        let err = api()
            .parse_list_public_items(HttpResponse::new(200, body), 50)
            .unwrap_err();
        let WishError::ServerError(message) = err else {
            panic!("expected ServerError");
        };
        assert!(message.len() < 400);
    }

    #[test]
    fn parse_list_public_items_without_status_is_invalid() {
        let err = api()
            .parse_list_public_items(HttpResponse::new(0, ""), 50)
            .unwrap_err();
        assert!(matches!(err, WishError::InvalidResponse));
    }

    #[test]
    fn parse_list_public_items_error_status_fallback_message() {
        let err = api()
            .parse_list_public_items(HttpResponse::new(503, ""), 50)
            .unwrap_err();
        assert!(matches!(err, WishError::ServerError(ref m) if m == "Server returned status 503"));
    }

    #[test]
    fn parse_list_public_items_honours_limit() {
        let body = r#"{"items":[
            {"id":"1","title":"A","status":"open","created_at":"2024-01-01T00:00:00Z"},
            {"id":"2","title":"B","status":"open","created_at":"2024-01-01T00:00:00Z"}
        ]}"#;
        let items = api()
            .parse_list_public_items(HttpResponse::new(200, body), 1)
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "1");
    }

    #[test]
    fn parse_upvote_requires_ok_and_votes() {
        let api = api();
        assert_eq!(
            api.parse_upvote(HttpResponse::new(200, r#"{"ok":true,"votes":6}"#)).unwrap(),
            6
        );
        assert!(matches!(
            api.parse_upvote(HttpResponse::new(200, r#"{"ok":false,"votes":6}"#)),
            Err(WishError::InvalidResponse)
        ));
        assert!(matches!(
            api.parse_upvote(HttpResponse::new(200, r#"{"ok":true}"#)),
            Err(WishError::InvalidResponse)
        ));
        assert!(matches!(
            api.parse_upvote(HttpResponse::new(404, "not found")),
            Err(WishError::ServerError(_))
        ));
    }

    #[test]
    fn parse_submit_feedback_accepts_any_2xx() {
        assert!(api()
            .parse_submit_feedback(HttpResponse::new(201, "whatever"))
            .is_ok());
        assert!(matches!(
            api().parse_submit_feedback(HttpResponse::new(422, "title required")),
            Err(WishError::ServerError(ref m)) if m == "title required"
        ));
    }
}
