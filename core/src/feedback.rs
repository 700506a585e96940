//! Feedback submission: draft + device metadata + profile snapshot, posted
//! to the ingestion endpoint.

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::BoardApi;
use crate::device::DeviceMetadataProvider;
use crate::error::{Result, WishError};
use crate::http::HttpTransport;
use crate::session::SessionStore;
use crate::types::{FeedbackDraft, FeedbackPayload};

#[derive(Clone)]
pub struct FeedbackClient {
    session: Arc<SessionStore>,
    transport: Arc<dyn HttpTransport>,
    device: Arc<dyn DeviceMetadataProvider>,
}

impl FeedbackClient {
    pub fn new(
        session: Arc<SessionStore>,
        transport: Arc<dyn HttpTransport>,
        device: Arc<dyn DeviceMetadataProvider>,
    ) -> Self {
        Self {
            session,
            transport,
            device,
        }
    }

    /// Builds the enriched payload for `draft` without sending it.
    pub fn compose(&self, draft: FeedbackDraft) -> Result<(BoardApi, FeedbackPayload)> {
        if draft.title.is_empty() {
            return Err(WishError::EmptyTitle);
        }
        let config = self.session.current_config()?;
        let profile = self.session.current_profile();
        let device = self.device.capture();
        Ok((
            BoardApi::new(&config),
            FeedbackPayload::compose(draft, device, profile),
        ))
    }

    /// Posts `draft` to the board. Single attempt, no deduplication.
    pub async fn submit(&self, draft: FeedbackDraft) -> Result<()> {
        let (api, payload) = self.compose(draft)?;
        let request = api.build_submit_feedback(&payload)?;
        debug!(url = %request.path, category = %payload.category, "Submitting feedback");

        let response = self.transport.execute(request).await?;
        api.parse_submit_feedback(response)?;

        info!(category = %payload.category, source = %payload.source, "Feedback submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceMetadata, StaticDeviceMetadata};
    use crate::profile::{FieldUpdate, ProfileUpdate};
    use crate::testing::ScriptedTransport;
    use chrono::{TimeZone, Utc};

    fn device() -> Arc<dyn DeviceMetadataProvider> {
        Arc::new(StaticDeviceMetadata(DeviceMetadata {
            app_name: "Demo".to_string(),
            app_version: "2.0".to_string(),
            os_version: "iOS 17.4".to_string(),
            device_model: "iPhone16,1".to_string(),
            device_type: "phone".to_string(),
            lang: "en".to_string(),
            timezone: "America/New_York".to_string(),
            screen_w: 1179,
            screen_h: 2556,
            user_identifier: "INSTALL-1".to_string(),
            install_date: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }))
    }

    fn client(transport: Arc<ScriptedTransport>) -> (Arc<SessionStore>, FeedbackClient) {
        let session = Arc::new(SessionStore::new());
        let client = FeedbackClient::new(Arc::clone(&session), transport, device());
        (session, client)
    }

    #[tokio::test]
    async fn submit_before_configure_makes_no_network_call() {
        let transport = Arc::new(ScriptedTransport::new());
        let (_, client) = client(Arc::clone(&transport));
        let err = client.submit(FeedbackDraft::new("Dark mode")).await.unwrap_err();
        assert!(matches!(err, WishError::NotConfigured));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn empty_title_is_rejected_locally() {
        let transport = Arc::new(ScriptedTransport::new());
        let (session, client) = client(Arc::clone(&transport));
        session.configure("secret", None, None).unwrap();
        assert!(matches!(
            client.submit(FeedbackDraft::new("")).await,
            Err(WishError::EmptyTitle)
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn submit_posts_enriched_payload() {
        let transport = Arc::new(ScriptedTransport::new().respond(201, r#"{"ok":true}"#));
        let (session, client) = client(Arc::clone(&transport));
        session
            .configure("secret", Some("http://localhost:9"), None)
            .unwrap();
        session.merge_profile(
            ProfileUpdate::new()
                .email(FieldUpdate::Set("user@example.com".to_string()))
                .subscription_status(FieldUpdate::Set("paid".to_string())),
        );

        client
            .submit(FeedbackDraft::new("Dark mode").description("Please"))
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.path, "http://localhost:9/api/feedback");
        assert_eq!(request.header("x-ingest-secret"), Some("secret"));
        assert_eq!(request.header("content-type"), Some("application/json"));

        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["title"], "Dark mode");
        assert_eq!(body["description"], "Please");
        assert_eq!(body["source"], "ios");
        assert_eq!(body["category"], "feature");
        assert_eq!(body["device_model"], "iPhone16,1");
        assert_eq!(body["user_identifier"], "INSTALL-1");
        assert_eq!(body["install_date"], "2024-01-02T03:04:05Z");
        assert_eq!(body["email"], "user@example.com");
        assert_eq!(body["subscription_status"], "paid");
    }

    #[tokio::test]
    async fn server_rejection_becomes_server_error() {
        let transport = Arc::new(ScriptedTransport::new().respond(500, ""));
        let (session, client) = client(transport);
        session.configure("secret", None, None).unwrap();
        let err = client.submit(FeedbackDraft::new("Bug")).await.unwrap_err();
        assert!(matches!(err, WishError::ServerError(ref m) if m == "Server error"));
    }
}
