//! Fingerprint dedup store — the one piece of mutable state shared across
//! reconciliation cycles.
//!
//! The store is an explicit dependency of [`crate::engine::DriftComputer`],
//! injected at construction so tests get an isolated instance. Two
//! implementations exist: the bounded in-memory store below and the
//! SQLite-backed [`crate::storage::SqliteFingerprintStore`] used by the
//! daemon so dedup state survives restarts.

use std::collections::HashMap;
use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Errors from a fingerprint store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("fingerprint store database error: {0}")]
    Database(String),
}

/// Dedup gate for drift fingerprints.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Record `fingerprint` as reported at `now` and return true iff the
    /// caller should emit it: the fingerprint is unseen, or was last reported
    /// longer than the retention window ago. A suppressed hit must not
    /// refresh the recorded timestamp — a persisting drift re-reports once
    /// per window, not never.
    async fn check_and_record(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// Bounded in-memory store with an optional retention window.
///
/// `retention_secs == 0` reproduces at-most-once-per-lifetime reporting.
/// Capacity is enforced oldest-first so the map cannot grow without bound.
pub struct MemoryFingerprintStore {
    inner: Mutex<MemoryStoreInner>,
    capacity: usize,
    retention_secs: u64,
}

struct MemoryStoreInner {
    seen: HashMap<String, DateTime<Utc>>,
    order: VecDeque<String>,
}

impl MemoryFingerprintStore {
    pub fn new(capacity: usize, retention_secs: u64) -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner {
                seen: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            retention_secs,
        }
    }

    /// Number of fingerprints currently tracked.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.seen.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    async fn check_and_record(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(reported_at) = inner.seen.get(fingerprint).copied() {
            let expired = self.retention_secs > 0
                && now - reported_at >= Duration::seconds(self.retention_secs as i64);
            if !expired {
                return Ok(false);
            }
            // Window lapsed — report again and restart the clock.
            inner.seen.insert(fingerprint.to_string(), now);
            return Ok(true);
        }

        inner.seen.insert(fingerprint.to_string(), now);
        inner.order.push_back(fingerprint.to_string());
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.seen.remove(&evicted);
            }
        }
        Ok(true)
    }
}
