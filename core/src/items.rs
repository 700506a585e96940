//! Public items: listing, upvoting, and the optimistic vote protocol.
//!
//! # Design
//! The vote state machine lives here rather than in the presentation layer.
//! A `PublicItemFeed` is the view's copy of the list; `vote` adjusts it
//! optimistically, then reconciles it with the server's count or rolls it
//! back. Views only read snapshots and the derived `has_voted` / `is_voting`
//! booleans.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::client::BoardApi;
use crate::error::Result;
use crate::http::HttpTransport;
use crate::resolver::BoardResolver;
use crate::session::SessionStore;
use crate::types::PublicItem;
use crate::votes::{VoteLedger, VoteStart};

/// Outcome of [`PublicItemsClient::vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The server accepted the vote; `votes` is its authoritative count.
    Recorded { votes: i64 },
    /// This install already voted for the item; nothing was sent.
    AlreadyVoted,
    /// A vote for the item is already in flight; nothing was sent.
    InFlight,
}

/// A view-owned list of public items. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct PublicItemFeed {
    items: Arc<Mutex<Vec<PublicItem>>>,
}

impl PublicItemFeed {
    pub fn new(items: Vec<PublicItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PublicItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<PublicItem> {
        self.lock().clone()
    }

    pub fn get(&self, item_id: &str) -> Option<PublicItem> {
        self.lock().iter().find(|item| item.id == item_id).cloned()
    }

    /// Local vote count of an item, `None` if absent or never counted.
    pub fn votes(&self, item_id: &str) -> Option<i64> {
        self.lock()
            .iter()
            .find(|item| item.id == item_id)
            .and_then(|item| item.votes)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Swaps in a freshly fetched list.
    pub fn replace(&self, items: Vec<PublicItem>) {
        *self.lock() = items;
    }

    fn update(&self, item_id: &str, f: impl FnOnce(&mut PublicItem)) -> bool {
        match self.lock().iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct PublicItemsClient {
    session: Arc<SessionStore>,
    resolver: BoardResolver,
    transport: Arc<dyn HttpTransport>,
    votes: Arc<VoteLedger>,
}

impl PublicItemsClient {
    pub fn new(
        session: Arc<SessionStore>,
        resolver: BoardResolver,
        transport: Arc<dyn HttpTransport>,
        votes: Arc<VoteLedger>,
    ) -> Self {
        Self {
            session,
            resolver,
            transport,
            votes,
        }
    }

    /// Fetches up to `limit` public items of the configured board.
    pub async fn fetch_public_items(&self, limit: usize) -> Result<Vec<PublicItem>> {
        let config = self.session.current_config()?;
        let slug = self.resolver.ensure_slug().await?;
        let api = BoardApi::new(&config);

        let request = api.build_list_public_items(&slug, limit)?;
        debug!(url = %request.path, "Fetching public items");
        let response = self.transport.execute(request).await?;
        let items = api.parse_list_public_items(response, limit)?;

        debug!(count = items.len(), slug = %slug, "Fetched public items");
        Ok(items)
    }

    pub async fn fetch_feed(&self, limit: usize) -> Result<PublicItemFeed> {
        Ok(PublicItemFeed::new(self.fetch_public_items(limit).await?))
    }

    /// Sends one upvote and returns the server's vote count. Does not consult
    /// or update the local vote ledger; see [`Self::vote`].
    pub async fn upvote(&self, item_id: &str) -> Result<i64> {
        let config = self.session.current_config()?;
        let api = BoardApi::new(&config);

        let request = api.build_upvote(item_id)?;
        debug!(url = %request.path, item_id = %item_id, "Sending upvote");
        let response = self.transport.execute(request).await?;
        api.parse_upvote(response)
    }

    /// Upvotes `item_id` with optimistic update of `feed`.
    ///
    /// Already-voted and in-flight items are a no-op. On success the id is
    /// recorded and the feed takes the server's count; on failure the
    /// optimistic increment is rolled back and the error returned.
    pub async fn vote(&self, feed: &PublicItemFeed, item_id: &str) -> Result<VoteOutcome> {
        let guard = match self.votes.begin(item_id) {
            VoteStart::Started(guard) => guard,
            VoteStart::AlreadyVoted => {
                debug!(item_id = %item_id, "Already voted, skipping");
                return Ok(VoteOutcome::AlreadyVoted);
            }
            VoteStart::InFlight => {
                debug!(item_id = %item_id, "Vote already in flight, skipping");
                return Ok(VoteOutcome::InFlight);
            }
        };

        feed.update(item_id, |item| item.votes = Some(item.votes.unwrap_or(0) + 1));

        match self.upvote(item_id).await {
            Ok(votes) => {
                if let Err(e) = guard.record() {
                    warn!(item_id = %item_id, error = %e, "Vote accepted but not persisted locally");
                }
                feed.update(item_id, |item| item.votes = Some(votes));
                info!(item_id = %item_id, votes, "Upvote recorded");
                Ok(VoteOutcome::Recorded { votes })
            }
            Err(e) => {
                feed.update(item_id, |item| {
                    item.votes = Some((item.votes.unwrap_or(1) - 1).max(0));
                });
                warn!(item_id = %item_id, error = %e, "Upvote failed, rolled back");
                Err(e)
            }
        }
    }

    pub fn has_voted(&self, item_id: &str) -> bool {
        self.votes.has_voted(item_id)
    }

    pub fn is_voting(&self, item_id: &str) -> bool {
        self.votes.is_voting(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WishError;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::storage::{KeyValueStore, MemoryStore, VOTED_IDS_KEY};
    use crate::testing::ScriptedTransport;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::Notify;

    fn item(id: &str, votes: Option<i64>) -> PublicItem {
        PublicItem {
            id: id.to_string(),
            title: format!("Item {id}"),
            description: None,
            status: "open".to_string(),
            source: Some("ios".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            votes,
        }
    }

    struct Harness {
        session: Arc<SessionStore>,
        store: Arc<MemoryStore>,
        client: PublicItemsClient,
    }

    fn harness(transport: Arc<dyn HttpTransport>) -> Harness {
        let session = Arc::new(SessionStore::new());
        session
            .configure("secret", Some("http://localhost:9"), None)
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let votes = Arc::new(VoteLedger::load(store.clone()).unwrap());
        let resolver = BoardResolver::new(Arc::clone(&session), Arc::clone(&transport));
        let client = PublicItemsClient::new(Arc::clone(&session), resolver, transport, votes);
        Harness {
            session,
            store,
            client,
        }
    }

    #[tokio::test]
    async fn fetch_resolves_slug_then_lists() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, r#"{"slug":"demo"}"#)
                .respond(
                    200,
                    r#"{"items":[{"id":"1","title":"T","status":"open","created_at":"2024-01-01T00:00:00Z","votes":5}]}"#,
                ),
        );
        let h = harness(transport.clone());

        let items = h.client.fetch_public_items(10).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].votes, Some(5));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].path,
            "http://localhost:9/api/public-feedback?public_id=demo&limit=10"
        );
        assert!(requests[1].header("x-ingest-secret").is_none());
    }

    #[tokio::test]
    async fn fetch_uses_cached_slug() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"items":[]}"#));
        let h = harness(transport.clone());
        h.session.cache_board_slug("cached").unwrap();

        let feed = h.client.fetch_feed(50).await.unwrap();
        assert!(feed.is_empty());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn fetch_before_configure_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = Arc::new(SessionStore::new());
        let resolver = BoardResolver::new(Arc::clone(&session), transport.clone());
        let client = PublicItemsClient::new(
            session,
            resolver,
            transport.clone(),
            Arc::new(VoteLedger::load(Arc::new(MemoryStore::new())).unwrap()),
        );
        assert!(matches!(
            client.fetch_public_items(50).await,
            Err(WishError::NotConfigured)
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn successful_vote_takes_server_count_and_records() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"ok":true,"votes":6}"#));
        let h = harness(transport.clone());
        let feed = PublicItemFeed::new(vec![item("a", Some(5))]);

        let outcome = h.client.vote(&feed, "a").await.unwrap();
        assert_eq!(outcome, VoteOutcome::Recorded { votes: 6 });
        assert_eq!(feed.votes("a"), Some(6));
        assert!(h.client.has_voted("a"));
        assert!(!h.client.is_voting("a"));
        assert_eq!(
            h.store.get(VOTED_IDS_KEY).unwrap().as_deref(),
            Some(r#"["a"]"#)
        );

        let body: serde_json::Value =
            serde_json::from_str(transport.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["feedback_id"], "a");
    }

    #[tokio::test]
    async fn failed_vote_rolls_back_and_does_not_record() {
        let transport = Arc::new(ScriptedTransport::new().respond(500, "boom"));
        let h = harness(transport);
        let feed = PublicItemFeed::new(vec![item("a", Some(5))]);

        let err = h.client.vote(&feed, "a").await.unwrap_err();
        assert!(matches!(err, WishError::ServerError(ref m) if m == "boom"));
        assert_eq!(feed.votes("a"), Some(5));
        assert!(!h.client.has_voted("a"));
        assert!(!h.client.is_voting("a"));
    }

    #[tokio::test]
    async fn rollback_never_goes_below_zero() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"ok":false}"#));
        let h = harness(transport);
        let feed = PublicItemFeed::new(vec![item("a", None)]);

        let err = h.client.vote(&feed, "a").await.unwrap_err();
        assert!(matches!(err, WishError::InvalidResponse));
        assert_eq!(feed.votes("a"), Some(0));
    }

    #[tokio::test]
    async fn already_voted_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"ok":true,"votes":6}"#));
        let h = harness(transport.clone());
        let feed = PublicItemFeed::new(vec![item("a", Some(5))]);

        h.client.vote(&feed, "a").await.unwrap();
        let outcome = h.client.vote(&feed, "a").await.unwrap();
        assert_eq!(outcome, VoteOutcome::AlreadyVoted);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(feed.votes("a"), Some(6));
    }

    #[tokio::test]
    async fn previously_persisted_vote_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = Arc::new(SessionStore::new());
        session.configure("secret", None, None).unwrap();
        let store = Arc::new(MemoryStore::new());
        store.set(VOTED_IDS_KEY, r#"["a"]"#).unwrap();
        let resolver = BoardResolver::new(Arc::clone(&session), transport.clone());
        let client = PublicItemsClient::new(
            session,
            resolver,
            transport.clone(),
            Arc::new(VoteLedger::load(store).unwrap()),
        );

        let feed = PublicItemFeed::new(vec![item("a", Some(3))]);
        assert_eq!(
            client.vote(&feed, "a").await.unwrap(),
            VoteOutcome::AlreadyVoted
        );
        assert_eq!(transport.request_count(), 0);
        assert_eq!(feed.votes("a"), Some(3));
    }

    struct GatedTransport {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl HttpTransport for GatedTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            self.gate.notified().await;
            Ok(HttpResponse::new(200, r#"{"ok":true,"votes":6}"#))
        }
    }

    #[tokio::test]
    async fn second_vote_while_in_flight_is_skipped() {
        let gate = Arc::new(Notify::new());
        let h = harness(Arc::new(GatedTransport {
            gate: Arc::clone(&gate),
        }));
        let client = Arc::new(h.client);
        let feed = PublicItemFeed::new(vec![item("a", Some(5))]);

        let task = {
            let client = Arc::clone(&client);
            let feed = feed.clone();
            tokio::spawn(async move { client.vote(&feed, "a").await })
        };
        while !client.is_voting("a") {
            tokio::task::yield_now().await;
        }
        assert_eq!(feed.votes("a"), Some(6));
        assert_eq!(
            client.vote(&feed, "a").await.unwrap(),
            VoteOutcome::InFlight
        );

        gate.notify_one();
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, VoteOutcome::Recorded { votes: 6 });
        assert!(!client.is_voting("a"));
        assert!(client.has_voted("a"));
    }
}
