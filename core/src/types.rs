//! Wire DTOs for the board API.
//!
//! # Design
//! These types mirror the board service's JSON but are defined independently
//! from the mock-server crate; integration tests catch schema drift. Optional
//! payload fields are omitted from the JSON when absent.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceMetadata;
use crate::profile::UserProfile;

/// Default `source` for submitted feedback.
pub const DEFAULT_SOURCE: &str = "ios";
/// Default `category` for submitted feedback.
pub const DEFAULT_CATEGORY: &str = "feature";
/// Default number of public items fetched at once.
pub const DEFAULT_ITEM_LIMIT: usize = 50;

/// A publicly visible feedback item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `open`, `in_progress`, `planned`, `closed`, ... kept opaque.
    pub status: String,
    #[serde(default)]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub votes: Option<i64>,
}

/// Body of `GET /api/public-feedback`.
#[derive(Debug, Deserialize)]
pub(crate) struct PublicItemsEnvelope {
    pub items: Vec<PublicItem>,
}

/// Body of `GET /api/ingest-info`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct IngestInfo {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
}

impl IngestInfo {
    /// `slug` when non-empty, else `public_id` when non-empty.
    pub fn identifier(self) -> Option<String> {
        self.slug
            .filter(|s| !s.is_empty())
            .or(self.public_id.filter(|s| !s.is_empty()))
    }
}

/// Body of `POST /api/public-upvote`.
#[derive(Debug, Serialize)]
pub(crate) struct UpvoteRequest<'a> {
    pub feedback_id: &'a str,
}

/// Answer of `POST /api/public-upvote`.
#[derive(Debug, Deserialize)]
pub(crate) struct UpvoteResponse {
    pub ok: bool,
    #[serde(default)]
    pub votes: Option<i64>,
}

/// What the user typed into the feedback form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackDraft {
    pub title: String,
    pub description: Option<String>,
    pub source: String,
    pub category: String,
}

impl FeedbackDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            source: DEFAULT_SOURCE.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Body of `POST /api/feedback`: the draft enriched with device and profile
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackPayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
    pub category: String,

    pub app_name: String,
    pub app_version: String,
    pub os_version: String,
    pub device_model: String,
    pub device_type: String,
    pub lang: String,
    pub tz: String,
    pub screen_w: u32,
    pub screen_h: u32,

    pub user_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_expires_at: Option<String>,
    pub install_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<BTreeMap<String, String>>,
}

impl FeedbackPayload {
    pub fn compose(
        draft: FeedbackDraft,
        device: DeviceMetadata,
        profile: Option<UserProfile>,
    ) -> Self {
        let (subscription_status, subscription_expires_at, email, custom_metadata) = match profile
        {
            Some(p) => (
                Some(p.subscription_status),
                p.subscription_expires_at.as_ref().map(iso8601),
                p.email,
                p.custom_metadata,
            ),
            None => (None, None, None, None),
        };

        Self {
            title: draft.title,
            description: draft.description,
            source: draft.source,
            category: draft.category,
            app_name: device.app_name,
            app_version: device.app_version,
            os_version: device.os_version,
            device_model: device.device_model,
            device_type: device.device_type,
            lang: device.lang,
            tz: device.timezone,
            screen_w: device.screen_w,
            screen_h: device.screen_h,
            user_identifier: device.user_identifier,
            subscription_status,
            subscription_expires_at,
            install_date: iso8601(&device.install_date),
            email,
            custom_metadata,
        }
    }
}

/// Internet date-time with whole seconds, e.g. `2024-01-01T00:00:00Z`.
pub fn iso8601(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
