//! Replay protection: timestamp freshness and nonce de-duplication.
//!
//! [`ReplayGuard`] enforces the freshness window and delegates nonce tracking to a [`NonceStore`]. The store's
//! insert-if-absent operation is the single point of mutual exclusion: two requests racing on the same nonce cannot
//! both be accepted.
//!
//! The in-memory store is local to one process. Running several instances behind a load balancer needs a shared
//! [`NonceStore`] implementation, otherwise a request can be replayed against another instance.

use {
    crate::SignatureError,
    async_trait::async_trait,
    dashmap::{mapref::entry::Entry, DashMap},
    log::{debug, trace},
    std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::{
            atomic::{AtomicI64, Ordering},
            Arc,
        },
    },
    tower::BoxError,
};

/// A nonce and the window during which it may not be reused. Times are seconds since the Unix epoch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NonceRecord {
    pub nonce: String,
    pub first_seen: i64,
    pub expires_at: i64,
}

impl NonceRecord {
    /// Whether this record still blocks its nonce at time `now`.
    #[inline]
    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// A time-bounded, concurrency-safe set of nonces.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Atomically record `record` unless a live record for the same nonce exists at `record.first_seen`.
    ///
    /// Returns `Ok(true)` if the record was inserted and `Ok(false)` if the nonce is already in use.
    async fn insert_if_absent(&self, record: NonceRecord) -> Result<bool, BoxError>;
}

/// [`NonceStore`] backed by a sharded concurrent map.
///
/// Expired records are treated as absent and replaced in place. The whole map is swept of expired records at most
/// once per sweep interval, piggybacking on inserts.
pub struct InMemoryNonceStore {
    entries: DashMap<String, NonceRecord>,
    sweep_interval: i64,
    last_sweep: AtomicI64,
}

impl InMemoryNonceStore {
    pub fn new(sweep_interval_seconds: u64) -> Self {
        Self {
            entries: DashMap::new(),
            sweep_interval: i64::try_from(sweep_interval_seconds).unwrap_or(i64::MAX),
            last_sweep: AtomicI64::new(0),
        }
    }

    /// Number of records held, live or not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a live record for `nonce` exists at time `now`.
    pub fn contains(&self, nonce: &str, now: i64) -> bool {
        self.entries.get(nonce).map(|record| record.is_live(now)).unwrap_or(false)
    }

    /// Remove every record that has expired at `now`. Returns the number removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, record| record.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Purged {} expired nonces", removed);
        }
        removed
    }

    fn maybe_sweep(&self, now: i64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.sweep_interval {
            return;
        }

        // Only one caller wins the sweep for this interval.
        if self.last_sweep.compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
            self.purge_expired(now);
        }
    }

    fn insert_if_absent_sync(&self, record: NonceRecord) -> bool {
        let now = record.first_seen;
        self.maybe_sweep(now);

        match self.entries.entry(record.nonce.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_live(now) {
                    false
                } else {
                    entry.insert(record);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
        }
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_NONCE_SWEEP_INTERVAL_SECONDS)
    }
}

impl Debug for InMemoryNonceStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InMemoryNonceStore")
            .field("entries", &self.entries.len())
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn insert_if_absent(&self, record: NonceRecord) -> Result<bool, BoxError> {
        Ok(self.insert_if_absent_sync(record))
    }
}

/// Enforces the freshness window and records nonces.
#[derive(Clone)]
pub struct ReplayGuard {
    store: Arc<dyn NonceStore>,
    max_age_seconds: u64,
}

impl ReplayGuard {
    /// Create a guard over an arbitrary nonce store. `max_age_seconds` is both the freshness window and the nonce TTL.
    pub fn new(store: Arc<dyn NonceStore>, max_age_seconds: u64) -> Self {
        Self {
            store,
            max_age_seconds,
        }
    }

    /// Create a guard over a fresh [`InMemoryNonceStore`].
    pub fn in_memory(max_age_seconds: u64, sweep_interval_seconds: u64) -> Self {
        Self::new(Arc::new(InMemoryNonceStore::new(sweep_interval_seconds)), max_age_seconds)
    }

    #[inline]
    pub fn max_age_seconds(&self) -> u64 {
        self.max_age_seconds
    }

    /// Check that `timestamp` is within the freshness window around `now` and that `nonce` has not been accepted
    /// within the window, recording it if so.
    ///
    /// A stale request is rejected before the nonce is consulted, and its nonce is not recorded.
    pub async fn check_and_record(&self, nonce: &str, timestamp: i64, now: i64) -> Result<(), SignatureError> {
        let skew = now.saturating_sub(timestamp);
        if skew.unsigned_abs() > self.max_age_seconds {
            trace!("check_and_record: timestamp {} is {}s from server time {}", timestamp, skew, now);
            return Err(SignatureError::StaleTimestamp(format!(
                "Request timestamp {} is {} seconds from server time {} (maximum {})",
                timestamp, skew, now, self.max_age_seconds
            )));
        }

        let max_age = i64::try_from(self.max_age_seconds).unwrap_or(i64::MAX);
        let record = NonceRecord {
            nonce: nonce.to_string(),
            first_seen: now,
            expires_at: now.saturating_add(max_age),
        };

        match self.store.insert_if_absent(record).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SignatureError::DuplicateNonce(format!("Nonce {} has already been used", nonce))),
            Err(e) => {
                debug!("check_and_record: nonce store failed: {}", e);
                Err(SignatureError::InternalFailure(e))
            }
        }
    }
}

impl Debug for ReplayGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ReplayGuard").field("max_age_seconds", &self.max_age_seconds).finish()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{InMemoryNonceStore, NonceRecord, NonceStore, ReplayGuard},
        crate::SignatureError,
        async_trait::async_trait,
        std::sync::Arc,
        tower::BoxError,
    };

    const NOW: i64 = 1_700_000_000;

    fn record(nonce: &str, now: i64, ttl: i64) -> NonceRecord {
        NonceRecord {
            nonce: nonce.to_string(),
            first_seen: now,
            expires_at: now + ttl,
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_accept_then_duplicate() {
        let guard = ReplayGuard::in_memory(300, 60);
        guard.check_and_record("n1", NOW, NOW).await.unwrap();
        match guard.check_and_record("n1", NOW, NOW + 10).await {
            Err(SignatureError::DuplicateNonce(msg)) => assert_eq!(msg, "Nonce n1 has already been used"),
            other => panic!("Expected DuplicateNonce; got {:?}", other),
        }

        // A different nonce is unaffected.
        guard.check_and_record("n2", NOW, NOW).await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_freshness_window_boundaries() {
        let guard = ReplayGuard::in_memory(300, 60);
        guard.check_and_record("past-edge", NOW - 300, NOW).await.unwrap();
        guard.check_and_record("future-edge", NOW + 300, NOW).await.unwrap();

        for (nonce, ts) in [("too-old", NOW - 301), ("too-new", NOW + 301)] {
            match guard.check_and_record(nonce, ts, NOW).await {
                Err(SignatureError::StaleTimestamp(_)) => (),
                other => panic!("Expected StaleTimestamp; got {:?}", other),
            }
        }

        // Extreme values do not overflow.
        assert!(matches!(guard.check_and_record("min", i64::MIN, NOW).await, Err(SignatureError::StaleTimestamp(_))));
        assert!(matches!(guard.check_and_record("max", i64::MAX, NOW).await, Err(SignatureError::StaleTimestamp(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_stale_wins_over_duplicate() {
        let guard = ReplayGuard::in_memory(300, 60);
        guard.check_and_record("n1", NOW, NOW).await.unwrap();
        assert!(matches!(guard.check_and_record("n1", NOW + 301, NOW).await, Err(SignatureError::StaleTimestamp(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_stale_request_does_not_record_nonce() {
        let guard = ReplayGuard::in_memory(300, 60);
        assert!(guard.check_and_record("n1", NOW - 1000, NOW).await.is_err());
        guard.check_and_record("n1", NOW, NOW).await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_nonce_expires() {
        let guard = ReplayGuard::in_memory(300, 60);
        guard.check_and_record("n1", NOW, NOW).await.unwrap();
        assert!(guard.check_and_record("n1", NOW + 299, NOW + 299).await.is_err());
        guard.check_and_record("n1", NOW + 300, NOW + 300).await.unwrap();
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 8))]
    async fn test_concurrent_same_nonce_exactly_one_wins() {
        for round in 0..20 {
            let guard = ReplayGuard::in_memory(300, 60);
            let nonce = format!("race-{}", round);
            let handles: Vec<_> = (0..32)
                .map(|_| {
                    let guard = guard.clone();
                    let nonce = nonce.clone();
                    tokio::spawn(async move { guard.check_and_record(&nonce, NOW, NOW).await })
                })
                .collect();

            let mut accepted = 0;
            let mut duplicates = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(()) => accepted += 1,
                    Err(SignatureError::DuplicateNonce(_)) => duplicates += 1,
                    Err(e) => panic!("Unexpected error: {:?}", e),
                }
            }
            assert_eq!(accepted, 1);
            assert_eq!(duplicates, 31);
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_in_memory_store_sweep() {
        let store = InMemoryNonceStore::new(10);
        assert!(store.insert_if_absent(record("a", NOW, 5)).await.unwrap());
        assert!(store.insert_if_absent(record("b", NOW, 100)).await.unwrap());
        assert!(store.contains("a", NOW + 4));
        assert!(!store.contains("a", NOW + 5));
        assert!(!store.contains("c", NOW));
        assert!(!store.insert_if_absent(record("b", NOW + 6, 100)).await.unwrap());
        assert_eq!(store.len(), 2);

        // Before the sweep interval elapses, expired records linger but do not block.
        assert!(store.insert_if_absent(record("a", NOW + 6, 100)).await.unwrap());
        assert_eq!(store.len(), 2);

        assert_eq!(store.purge_expired(NOW + 6), 0);
        assert_eq!(store.purge_expired(NOW + 200), 2);
        assert!(store.is_empty());

        // Inserts trigger a sweep once the interval has passed.
        assert!(store.insert_if_absent(record("d", NOW, 5)).await.unwrap());
        assert!(store.insert_if_absent(record("e", NOW + 50, 5)).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    struct FailingStore;

    #[async_trait]
    impl NonceStore for FailingStore {
        async fn insert_if_absent(&self, _record: NonceRecord) -> Result<bool, BoxError> {
            Err("replay store unreachable".into())
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_store_failure_is_internal_failure() {
        let guard = ReplayGuard::new(Arc::new(FailingStore), 300);
        match guard.check_and_record("n1", NOW, NOW).await {
            Err(SignatureError::InternalFailure(e)) => assert_eq!(e.to_string(), "replay store unreachable"),
            other => panic!("Expected InternalFailure; got {:?}", other),
        }
        let _ = format!("{:?}", guard);
    }
}
