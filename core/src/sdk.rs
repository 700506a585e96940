//! `FounderWish`: the application-facing entry point.
//!
//! # Design
//! An explicitly constructed object, not a process-wide singleton. The
//! builder wires one `SessionStore` into the resolver, the feedback client
//! and the public items client so they all observe the same configuration.
//! Hosts that want a shared instance keep it in their own app state.
//!
//! ```rust,ignore
//! let wish = FounderWish::builder().build()?;
//! wish.configure_board("board-key", BoardSetup::default().email("me@example.com"))?;
//! wish.send_feedback(FeedbackDraft::new("Dark mode")).await?;
//! let feed = wish.fetch_feed(DEFAULT_ITEM_LIMIT).await?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::device::{DeviceMetadataProvider, SystemDeviceMetadata};
use crate::error::Result;
use crate::feedback::FeedbackClient;
use crate::http::HttpTransport;
use crate::items::{PublicItemFeed, PublicItemsClient, VoteOutcome};
use crate::profile::{
    billing_metadata, BillingCycle, FieldUpdate, PaymentStatus, ProfileUpdate, UserProfile,
};
use crate::resolver::BoardResolver;
use crate::session::SessionStore;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::{FeedbackDraft, PublicItem};
use crate::votes::VoteLedger;

/// Initial user information for [`FounderWish::configure_board`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSetup {
    pub email: Option<String>,
    pub payment_status: PaymentStatus,
    pub billing_cycle: Option<BillingCycle>,
    pub amount: Option<String>,
    pub base_url: Option<String>,
}

impl Default for BoardSetup {
    fn default() -> Self {
        Self {
            email: None,
            payment_status: PaymentStatus::Free,
            billing_cycle: None,
            amount: None,
            base_url: None,
        }
    }
}

impl BoardSetup {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = status;
        self
    }

    pub fn billing_cycle(mut self, cycle: BillingCycle) -> Self {
        self.billing_cycle = Some(cycle);
        self
    }

    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn profile(&self) -> UserProfile {
        UserProfile {
            subscription_status: self.payment_status.as_str().to_string(),
            subscription_expires_at: None,
            email: self.email.clone(),
            custom_metadata: billing_metadata(self.billing_cycle, self.amount.as_deref()),
        }
    }
}

/// Simple profile update: only the fields that are present change.
///
/// When a billing cycle or an amount is given, the custom metadata is
/// replaced by a map holding just those two keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub billing_cycle: Option<BillingCycle>,
    pub amount: Option<String>,
}

impl UserUpdate {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn billing_cycle(mut self, cycle: BillingCycle) -> Self {
        self.billing_cycle = Some(cycle);
        self
    }

    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }
}

impl From<UserUpdate> for ProfileUpdate {
    fn from(update: UserUpdate) -> Self {
        ProfileUpdate {
            email: FieldUpdate::keep_or_set(update.email),
            subscription_status: FieldUpdate::keep_or_set(
                update.payment_status.map(|s| s.as_str().to_string()),
            ),
            subscription_expires_at: FieldUpdate::Keep,
            custom_metadata: FieldUpdate::keep_or_set(billing_metadata(
                update.billing_cycle,
                update.amount.as_deref(),
            )),
        }
    }
}

#[derive(Default)]
pub struct FounderWishBuilder {
    transport: Option<Arc<dyn HttpTransport>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    device: Option<Arc<dyn DeviceMetadataProvider>>,
    session: Option<Arc<SessionStore>>,
    app_name: Option<String>,
    app_version: Option<String>,
}

impl FounderWishBuilder {
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn device_metadata(mut self, device: Arc<dyn DeviceMetadataProvider>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// App name and version reported by the default device metadata provider.
    pub fn app(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self.app_version = Some(version.into());
        self
    }

    pub fn build(self) -> Result<FounderWish> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let device = match self.device {
            Some(device) => device,
            None => Arc::new(SystemDeviceMetadata::new(
                self.app_name.unwrap_or_default(),
                self.app_version.unwrap_or_default(),
                Arc::clone(&storage),
            )),
        };
        let session = self.session.unwrap_or_default();

        let votes = Arc::new(VoteLedger::load(storage)?);
        let resolver = BoardResolver::new(Arc::clone(&session), Arc::clone(&transport));
        let feedback = FeedbackClient::new(Arc::clone(&session), Arc::clone(&transport), device);
        let items = PublicItemsClient::new(
            Arc::clone(&session),
            resolver.clone(),
            transport,
            votes,
        );

        Ok(FounderWish {
            session,
            resolver,
            feedback,
            items,
        })
    }
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new()?))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
    Err(crate::error::WishError::Transport(
        "no HTTP transport configured; enable the `reqwest` feature or supply one".to_string(),
    ))
}

/// Feedback SDK handle. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct FounderWish {
    session: Arc<SessionStore>,
    resolver: BoardResolver,
    feedback: FeedbackClient,
    items: PublicItemsClient,
}

impl FounderWish {
    pub fn builder() -> FounderWishBuilder {
        FounderWishBuilder::default()
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn configure(
        &self,
        secret: impl Into<String>,
        base_url_override: Option<&str>,
        initial_profile: Option<UserProfile>,
    ) -> Result<()> {
        self.session
            .configure(secret, base_url_override, initial_profile)
    }

    /// Configures the board and the initial user profile in one call.
    pub fn configure_board(&self, board_key: impl Into<String>, setup: BoardSetup) -> Result<()> {
        let profile = setup.profile();
        self.session
            .configure(board_key, setup.base_url.as_deref(), Some(profile))?;
        info!(payment_status = %setup.payment_status, "Board configured");
        Ok(())
    }

    pub fn merge_profile(&self, update: ProfileUpdate) -> UserProfile {
        self.session.merge_profile(update)
    }

    pub fn set_user(&self, update: UserUpdate) -> UserProfile {
        self.session.merge_profile(update.into())
    }

    pub fn current_profile(&self) -> Option<UserProfile> {
        self.session.current_profile()
    }

    pub async fn ensure_slug(&self) -> Result<String> {
        self.resolver.ensure_slug().await
    }

    pub async fn send_feedback(&self, draft: FeedbackDraft) -> Result<()> {
        self.feedback.submit(draft).await
    }

    pub async fn fetch_public_items(&self, limit: usize) -> Result<Vec<PublicItem>> {
        self.items.fetch_public_items(limit).await
    }

    pub async fn fetch_feed(&self, limit: usize) -> Result<PublicItemFeed> {
        self.items.fetch_feed(limit).await
    }

    pub async fn upvote(&self, item_id: &str) -> Result<i64> {
        self.items.upvote(item_id).await
    }

    pub async fn vote(&self, feed: &PublicItemFeed, item_id: &str) -> Result<VoteOutcome> {
        self.items.vote(feed, item_id).await
    }

    pub fn has_voted(&self, item_id: &str) -> bool {
        self.items.has_voted(item_id)
    }

    pub fn is_voting(&self, item_id: &str) -> bool {
        self.items.is_voting(item_id)
    }
}
