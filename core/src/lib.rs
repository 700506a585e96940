//! Client core for FounderWish feedback boards.
//!
//! # Overview
//! Lets an application submit feedback, list a board's public items and
//! upvote them. Every network exchange is split into a synchronous
//! `build_*` / `parse_*` pair on [`BoardApi`] (host-does-IO pattern); the
//! async clients run those pairs over an injected [`HttpTransport`], and the
//! FFI crate exposes them to hosts that bring their own HTTP stack.
//!
//! # Design
//! - [`SessionStore`] is the single owner of configuration and user profile;
//!   everything else reads snapshots from it.
//! - [`BoardResolver`] resolves the board's public identifier once per
//!   configuration and caches it in the store.
//! - [`PublicItemsClient`] owns the optimistic upvote protocol, backed by the
//!   persisted [`VoteLedger`].
//! - [`FounderWish`] wires the pieces together around one session.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod device;
pub mod error;
pub mod feedback;
pub mod http;
pub mod items;
pub mod profile;
pub mod resolver;
pub mod sdk;
pub mod session;
pub mod storage;
#[cfg(feature = "reqwest")]
pub mod transport;
pub mod types;
pub mod votes;

#[cfg(test)]
mod testing;

pub use client::BoardApi;
pub use device::{DeviceMetadata, DeviceMetadataProvider, StaticDeviceMetadata, SystemDeviceMetadata};
pub use error::{Result, WishError};
pub use feedback::FeedbackClient;
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use items::{PublicItemFeed, PublicItemsClient, VoteOutcome};
pub use profile::{BillingCycle, FieldUpdate, PaymentStatus, ProfileUpdate, UserProfile};
pub use resolver::BoardResolver;
pub use sdk::{BoardSetup, FounderWish, FounderWishBuilder, UserUpdate};
pub use session::{IngestSecret, SessionConfig, SessionStore, DEFAULT_BASE_URL};
pub use storage::{FileStore, InstallIdentity, KeyValueStore, MemoryStore};
#[cfg(feature = "reqwest")]
pub use transport::{ClientConfig, ReqwestTransport};
pub use types::{FeedbackDraft, FeedbackPayload, PublicItem, DEFAULT_ITEM_LIMIT};
pub use votes::{VoteCheck, VoteLedger};
