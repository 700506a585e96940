//! Resolves and caches the board's public identifier.
//!
//! The cache fill is not single-flight: callers racing before
//! the first resolution may each hit `/api/ingest-info`. The answers are
//! identical, and the last write to the cache wins.

use std::sync::Arc;

use tracing::debug;

use crate::client::BoardApi;
use crate::error::Result;
use crate::http::HttpTransport;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct BoardResolver {
    session: Arc<SessionStore>,
    transport: Arc<dyn HttpTransport>,
}

impl BoardResolver {
    pub fn new(session: Arc<SessionStore>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { session, transport }
    }

    /// Returns the cached slug, resolving it over the network first if needed.
    pub async fn ensure_slug(&self) -> Result<String> {
        let config = self.session.current_config()?;
        if let Some(slug) = config.cached_board_slug.clone() {
            debug!(slug = %slug, "Board slug served from cache");
            return Ok(slug);
        }

        let api = BoardApi::new(&config);
        let request = api.build_ingest_info();
        debug!(url = %request.path, "Resolving board slug");
        let response = self.transport.execute(request).await?;
        let slug = api.parse_ingest_info(response)?;

        self.session.cache_board_slug_for(&config, slug.as_str())?;
        debug!(slug = %slug, "Board slug resolved");
        Ok(slug)
    }
}
