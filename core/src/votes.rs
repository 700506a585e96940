//! Per-install vote bookkeeping: which items were upvoted, and which
//! upvotes are currently in flight.
//!
//! # Design
//! Both sets live behind one lock so "not voted, not in flight, mark in
//! flight" is a single atomic step. A successful `begin` hands out a
//! `VoteGuard`; dropping it clears the in-flight marker on every path,
//! including errors and cancelled futures. Callers that cannot hold a guard
//! across calls (the C ABI) use `start` / `finish` instead.
//!
//! The voted set is append-only and persisted as a JSON array under
//! `VOTED_IDS_KEY`. Writes go through a second lock and serialize the set
//! as it is at write time, so a slow write never lands after a newer one.
//!
//! This gives at most one successful vote per install, not per user: a second
//! install, or cleared storage, can vote again.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::error::Result;
use crate::storage::{KeyValueStore, VOTED_IDS_KEY};

#[derive(Default)]
struct VoteState {
    voted: BTreeSet<String>,
    in_flight: HashSet<String>,
}

pub struct VoteLedger {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<VoteState>,
    persist: Mutex<()>,
}

/// Result of trying to start a vote.
pub enum VoteStart<'a> {
    Started(VoteGuard<'a>),
    AlreadyVoted,
    InFlight,
}

/// Guard-free counterpart of [`VoteStart`], returned by [`VoteLedger::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteCheck {
    Started,
    AlreadyVoted,
    InFlight,
}

impl VoteLedger {
    /// Loads the voted set from `store`. An unreadable entry starts empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let voted = match store.get(VOTED_IDS_KEY)? {
            Some(raw) => serde_json::from_str::<BTreeSet<String>>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored voted ids are unreadable, starting empty");
                BTreeSet::new()
            }),
            None => BTreeSet::new(),
        };
        Ok(Self {
            store,
            state: Mutex::new(VoteState {
                voted,
                in_flight: HashSet::new(),
            }),
            persist: Mutex::new(()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, VoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_voted(&self, item_id: &str) -> bool {
        self.lock().voted.contains(item_id)
    }

    pub fn is_voting(&self, item_id: &str) -> bool {
        self.lock().in_flight.contains(item_id)
    }

    pub fn voted_ids(&self) -> Vec<String> {
        self.lock().voted.iter().cloned().collect()
    }

    pub fn begin(&self, item_id: &str) -> VoteStart<'_> {
        match self.start(item_id) {
            VoteCheck::Started => VoteStart::Started(VoteGuard {
                ledger: self,
                item_id: item_id.to_string(),
            }),
            VoteCheck::AlreadyVoted => VoteStart::AlreadyVoted,
            VoteCheck::InFlight => VoteStart::InFlight,
        }
    }

    /// Marks `item_id` in flight unless it is voted or already in flight.
    /// A `Started` check must be followed by exactly one [`Self::finish`].
    pub fn start(&self, item_id: &str) -> VoteCheck {
        let mut state = self.lock();
        if state.voted.contains(item_id) {
            VoteCheck::AlreadyVoted
        } else if state.in_flight.insert(item_id.to_string()) {
            VoteCheck::Started
        } else {
            VoteCheck::InFlight
        }
    }

    /// Ends a vote begun with [`Self::start`], recording it when the server
    /// accepted it. The in-flight marker is cleared even if persisting fails.
    pub fn finish(&self, item_id: &str, accepted: bool) -> Result<()> {
        let recorded = if accepted {
            self.record(item_id)
        } else {
            Ok(())
        };
        self.lock().in_flight.remove(item_id);
        recorded
    }

    /// Adds ids voted elsewhere (e.g. a host's own storage) and persists the
    /// union.
    pub fn restore(&self, ids: impl IntoIterator<Item = String>) -> Result<()> {
        self.lock().voted.extend(ids);
        self.persist()
    }

    fn record(&self, item_id: &str) -> Result<()> {
        self.lock().voted.insert(item_id.to_string());
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let _writing = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        let raw = serde_json::to_string(&self.lock().voted)?;
        self.store.set(VOTED_IDS_KEY, &raw)
    }
}

/// Marks one item as mid-vote until dropped.
pub struct VoteGuard<'a> {
    ledger: &'a VoteLedger,
    item_id: String,
}

impl VoteGuard<'_> {
    /// Adds the item to the voted set and persists the set. The in-memory set
    /// is updated even when persisting fails.
    pub fn record(self) -> Result<()> {
        self.ledger.record(&self.item_id)
    }
}

impl Drop for VoteGuard<'_> {
    fn drop(&mut self) {
        self.ledger.lock().in_flight.remove(&self.item_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WishError;
    use crate::storage::MemoryStore;

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(WishError::Storage("read-only".to_string()))
        }
    }

    fn ledger() -> (Arc<MemoryStore>, VoteLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = VoteLedger::load(store.clone()).unwrap();
        (store, ledger)
    }

    #[test]
    fn begin_marks_in_flight_until_dropped() {
        let (_, ledger) = ledger();
        let VoteStart::Started(guard) = ledger.begin("a") else {
            panic!("expected vote to start");
        };
        assert!(ledger.is_voting("a"));
        assert!(matches!(ledger.begin("a"), VoteStart::InFlight));
        drop(guard);
        assert!(!ledger.is_voting("a"));
        assert!(!ledger.has_voted("a"));
    }

    #[test]
    fn record_persists_and_blocks_revote() {
        let (store, ledger) = ledger();
        let VoteStart::Started(guard) = ledger.begin("a") else {
            panic!("expected vote to start");
        };
        guard.record().unwrap();
        assert!(ledger.has_voted("a"));
        assert!(!ledger.is_voting("a"));
        assert!(matches!(ledger.begin("a"), VoteStart::AlreadyVoted));
        assert_eq!(store.get(VOTED_IDS_KEY).unwrap().as_deref(), Some(r#"["a"]"#));
    }

    #[test]
    fn voted_set_is_reloaded_from_store() {
        let store = Arc::new(MemoryStore::new());
        store.set(VOTED_IDS_KEY, r#"["x","y"]"#).unwrap();
        let ledger = VoteLedger::load(store).unwrap();
        assert!(ledger.has_voted("x"));
        assert_eq!(ledger.voted_ids(), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn corrupt_voted_set_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(VOTED_IDS_KEY, "{").unwrap();
        let ledger = VoteLedger::load(store).unwrap();
        assert!(ledger.voted_ids().is_empty());
    }

    /// Holds its first write long enough for a later write to finish first.
    struct SlowFirstStore {
        inner: MemoryStore,
        writes: std::sync::atomic::AtomicUsize,
    }

    impl KeyValueStore for SlowFirstStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            let n = self
                .writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                std::thread::sleep(std::time::Duration::from_millis(200));
            }
            self.inner.set(key, value)
        }
    }

    #[test]
    fn concurrent_records_never_persist_a_stale_set() {
        let store = Arc::new(SlowFirstStore {
            inner: MemoryStore::new(),
            writes: std::sync::atomic::AtomicUsize::new(0),
        });
        let ledger = Arc::new(VoteLedger::load(store.clone()).unwrap());

        let first = {
            let ledger = Arc::clone(&ledger);
            std::thread::spawn(move || {
                let VoteStart::Started(guard) = ledger.begin("a") else {
                    panic!("expected vote to start");
                };
                guard.record().unwrap();
            })
        };
        while store.writes.load(std::sync::atomic::Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }
        let VoteStart::Started(guard) = ledger.begin("b") else {
            panic!("expected vote to start");
        };
        guard.record().unwrap();
        first.join().unwrap();

        let reloaded = VoteLedger::load(store).unwrap();
        assert_eq!(reloaded.voted_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn start_and_finish_without_a_guard() {
        let (store, ledger) = ledger();
        assert_eq!(ledger.start("a"), VoteCheck::Started);
        assert_eq!(ledger.start("a"), VoteCheck::InFlight);
        ledger.finish("a", false).unwrap();
        assert!(!ledger.is_voting("a"));
        assert!(!ledger.has_voted("a"));

        assert_eq!(ledger.start("a"), VoteCheck::Started);
        ledger.finish("a", true).unwrap();
        assert!(!ledger.is_voting("a"));
        assert_eq!(ledger.start("a"), VoteCheck::AlreadyVoted);
        assert_eq!(store.get(VOTED_IDS_KEY).unwrap().as_deref(), Some(r#"["a"]"#));
    }

    #[test]
    fn restore_unions_and_persists() {
        let (store, ledger) = ledger();
        ledger.finish("a", true).unwrap();
        ledger
            .restore(["c".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(
            ledger.voted_ids(),
            vec!["a".to_string(), "c".to_string()]
        );
        assert_eq!(
            store.get(VOTED_IDS_KEY).unwrap().as_deref(),
            Some(r#"["a","c"]"#)
        );
    }

    #[test]
    fn failed_persist_still_records_in_memory() {
        let ledger = VoteLedger::load(Arc::new(ReadOnlyStore)).unwrap();
        let VoteStart::Started(guard) = ledger.begin("a") else {
            panic!("expected vote to start");
        };
        assert!(matches!(guard.record(), Err(WishError::Storage(_))));
        assert!(ledger.has_voted("a"));
        assert!(!ledger.is_voting("a"));
    }
}
