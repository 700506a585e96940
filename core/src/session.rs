//! Session state: configuration plus the evolving user profile.
//!
//! # Design
//! `SessionStore` is a monitor: one lock guards both the configuration and
//! the profile, every operation takes it for a short synchronous critical
//! section, and callers only ever get cloned snapshots back. Nothing awaits
//! while holding the lock, so async clients can share an `Arc<SessionStore>`
//! freely.
//!
//! Each `configure` call bumps a generation counter that is carried in the
//! config snapshot. The board resolver caches a slug through
//! `cache_board_slug_for`, which refuses to write a slug resolved against a
//! configuration that has since been replaced.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};
use url::Url;
use zeroize::Zeroize;

use crate::error::{Result, WishError};
use crate::profile::{ProfileUpdate, UserProfile};

/// Board service host used when `configure` gets no override.
pub const DEFAULT_BASE_URL: &str = "https://indie-wish.vercel.app";

/// Shared secret identifying the board. Never printed, zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct IngestSecret(String);

impl IngestSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for the `x-ingest-secret` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IngestSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IngestSecret([REDACTED])")
    }
}

impl fmt::Display for IngestSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for IngestSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Snapshot of the board configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: Url,
    pub ingest_secret: IngestSecret,
    pub cached_board_slug: Option<String>,
    generation: u64,
}

impl SessionConfig {
    /// A standalone config, outside of any store.
    pub fn new(base_url: Url, ingest_secret: IngestSecret) -> Self {
        Self {
            base_url,
            ingest_secret,
            cached_board_slug: None,
            generation: 0,
        }
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base_str(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Parses a base URL, accepting only absolute http(s) URLs. Endpoint paths
/// are appended to it, so a query or fragment is rejected.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| WishError::InvalidBaseUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https")
        || url.cannot_be_a_base()
        || url.query().is_some()
        || url.fragment().is_some()
    {
        return Err(WishError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(url)
}

#[derive(Default)]
struct SessionState {
    config: Option<SessionConfig>,
    profile: Option<UserProfile>,
    generation: u64,
}

/// Single owner of the configuration and the user profile.
#[derive(Default)]
pub struct SessionStore {
    state: Mutex<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections only assign whole values, so a poisoned lock still
    // holds a committed state.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the configuration and the profile wholesale. Last call wins.
    pub fn configure(
        &self,
        secret: impl Into<String>,
        base_url_override: Option<&str>,
        initial_profile: Option<UserProfile>,
    ) -> Result<()> {
        let base_url = match base_url_override {
            Some(raw) => parse_base_url(raw)?,
            None => parse_base_url(DEFAULT_BASE_URL)?,
        };
        let secret = IngestSecret::new(secret);

        let mut state = self.lock();
        state.generation += 1;
        let generation = state.generation;
        info!(base_url = %base_url, generation, has_profile = initial_profile.is_some(), "Session configured");
        state.config = Some(SessionConfig {
            base_url,
            ingest_secret: secret,
            cached_board_slug: None,
            generation,
        });
        state.profile = initial_profile;
        Ok(())
    }

    /// Merges `update` onto the current profile, or onto a default profile
    /// when none exists yet, and returns the result.
    pub fn merge_profile(&self, update: ProfileUpdate) -> UserProfile {
        let mut state = self.lock();
        let merged = state.profile.take().unwrap_or_default().merged(update);
        state.profile = Some(merged.clone());
        debug!(subscription_status = %merged.subscription_status, "Profile merged");
        merged
    }

    pub fn current_config(&self) -> Result<SessionConfig> {
        self.lock().config.clone().ok_or(WishError::NotConfigured)
    }

    pub fn current_profile(&self) -> Option<UserProfile> {
        self.lock().profile.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.lock().config.is_some()
    }

    /// Stores the board slug on the current configuration.
    pub fn cache_board_slug(&self, slug: impl Into<String>) -> Result<()> {
        let mut state = self.lock();
        let config = state.config.as_mut().ok_or(WishError::NotConfigured)?;
        config.cached_board_slug = Some(slug.into());
        Ok(())
    }

    /// Stores the slug only if `resolved_against` is still the current
    /// configuration. Returns whether the slug was stored.
    pub fn cache_board_slug_for(
        &self,
        resolved_against: &SessionConfig,
        slug: impl Into<String>,
    ) -> Result<bool> {
        let mut state = self.lock();
        let config = state.config.as_mut().ok_or(WishError::NotConfigured)?;
        if config.generation != resolved_against.generation {
            debug!(
                resolved = resolved_against.generation,
                current = config.generation,
                "Discarding slug resolved against a replaced configuration"
            );
            return Ok(false);
        }
        config.cached_board_slug = Some(slug.into());
        Ok(true)
    }
}
