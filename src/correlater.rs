//! Correlation between SMPP traffic and the caller's identifiers.
//!
//! A request is first keyed by its sequence number so the matching
//! response can be tied back to the caller's log_id. A successful
//! submit_sm_resp then re-keys the same pair by the SMSC-assigned
//! message_id, because the eventual delivery receipt (deliver_sm) carries
//! `receipted_message_id`, not the original sequence number.
//!
//! Correlation is best effort: sequence numbers wrap and entries expire
//! after a TTL, so a very late response may find nothing.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Default entry lifetime: long enough to cover an SMSC's response and
/// the usual delivery-receipt latency.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// What a pending request is remembered by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationEntry {
    pub log_id: String,
    pub hook_metadata: String,
    expires_at: Instant,
}

impl CorrelationEntry {
    fn new(log_id: &str, hook_metadata: &str, ttl: Duration) -> Self {
        Self {
            log_id: log_id.to_string(),
            hook_metadata: hook_metadata.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[async_trait]
pub trait Correlater: Send + Sync {
    /// Record a pending request before its bytes leave the socket.
    async fn put(&self, sequence_number: u32, log_id: &str, hook_metadata: &str);

    /// Look up the request context for a response.
    async fn get(&self, sequence_number: u32) -> Option<(String, String)>;

    /// After a submit_sm_resp, key the same pair by the SMSC message id.
    async fn put_message_id(&self, message_id: &str, log_id: &str, hook_metadata: &str);

    /// Look up by the receipted_message_id a delivery receipt carries.
    async fn get_by_message_id(&self, message_id: &str) -> Option<(String, String)>;

    /// Drop expired entries; called periodically by the session.
    async fn sweep(&self) {}
}

/// In-memory correlater with TTL eviction. Expired entries are purged
/// lazily on every store plus on the periodic sweep.
pub struct MemoryCorrelater {
    ttl: Duration,
    by_sequence: DashMap<u32, CorrelationEntry>,
    by_message_id: DashMap<String, CorrelationEntry>,
}

impl MemoryCorrelater {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            by_sequence: DashMap::new(),
            by_message_id: DashMap::new(),
        }
    }

    fn purge_expired(&self) {
        self.by_sequence.retain(|_, entry| !entry.expired());
        self.by_message_id.retain(|_, entry| !entry.expired());
    }
}

impl Default for MemoryCorrelater {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait]
impl Correlater for MemoryCorrelater {
    async fn put(&self, sequence_number: u32, log_id: &str, hook_metadata: &str) {
        self.purge_expired();
        self.by_sequence.insert(
            sequence_number,
            CorrelationEntry::new(log_id, hook_metadata, self.ttl),
        );
    }

    async fn get(&self, sequence_number: u32) -> Option<(String, String)> {
        let entry = self.by_sequence.remove(&sequence_number).map(|(_, e)| e)?;
        if entry.expired() {
            return None;
        }
        Some((entry.log_id, entry.hook_metadata))
    }

    async fn put_message_id(&self, message_id: &str, log_id: &str, hook_metadata: &str) {
        self.purge_expired();
        self.by_message_id.insert(
            message_id.to_string(),
            CorrelationEntry::new(log_id, hook_metadata, self.ttl),
        );
    }

    async fn get_by_message_id(&self, message_id: &str) -> Option<(String, String)> {
        let entry = self.by_message_id.remove(message_id).map(|(_, e)| e)?;
        if entry.expired() {
            return None;
        }
        Some((entry.log_id, entry.hook_metadata))
    }

    async fn sweep(&self) {
        self.purge_expired();
    }
}
