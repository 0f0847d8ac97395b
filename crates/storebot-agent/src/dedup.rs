// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suppression of redelivered webhook events.
//!
//! Meta retries a delivery when it does not see a `200` in time. Events are
//! acknowledged before processing, so a retry can arrive while the first copy
//! is still in flight. The cache remembers `(messageId, senderId)` pairs for a
//! TTL. State lives in this process only and is lost on restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use storebot_config::model::DedupConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Process-wide record of recently handled webhook messages.
pub struct DedupCache {
    entries: DashMap<String, Instant>,
    inserts: AtomicU64,
    ttl: Duration,
    sweep_every: u64,
}

impl DedupCache {
    pub fn new(ttl: Duration, sweep_every: u64) -> Self {
        Self {
            entries: DashMap::new(),
            inserts: AtomicU64::new(0),
            ttl,
            sweep_every: sweep_every.max(1),
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.sweep_every)
    }

    /// Composite key for one delivery.
    pub fn key(message_id: &str, sender_id: &str) -> String {
        format!("{message_id}-{sender_id}")
    }

    fn is_live(&self, inserted_at: Instant, now: Instant) -> bool {
        now.duration_since(inserted_at) < self.ttl
    }

    pub fn is_processed(&self, message_id: &str, sender_id: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(&Self::key(message_id, sender_id))
            .is_some_and(|at| self.is_live(*at, now))
    }

    pub fn mark_processed(&self, message_id: &str, sender_id: &str) {
        self.entries
            .insert(Self::key(message_id, sender_id), Instant::now());
        self.after_insert();
    }

    /// Marks the pair and reports whether this call was the first to see it.
    ///
    /// The check and the mark happen under one shard lock, so two concurrent
    /// deliveries of the same event cannot both return `true`.
    pub fn check_and_mark(&self, message_id: &str, sender_id: &str) -> bool {
        let now = Instant::now();
        let fresh = match self.entries.entry(Self::key(message_id, sender_id)) {
            Entry::Occupied(mut occupied) => {
                if self.is_live(*occupied.get(), now) {
                    false
                } else {
                    occupied.insert(now);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        };
        if fresh {
            self.after_insert();
        }
        fresh
    }

    fn after_insert(&self) {
        let count = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.sweep_every == 0 {
            self.sweep();
        }
    }

    /// Drops expired entries; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, at| self.is_live(*at, now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "dedup cache swept");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweeps on a timer until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                }
            }
            debug!("dedup sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_message_and_sender() {
        assert_eq!(DedupCache::key("m1", "u1"), "m1-u1");
    }

    #[tokio::test(start_paused = true)]
    async fn marked_pairs_are_processed_until_ttl() {
        let cache = DedupCache::new(Duration::from_secs(60), 100);
        assert!(!cache.is_processed("m1", "u1"));
        cache.mark_processed("m1", "u1");
        assert!(cache.is_processed("m1", "u1"));
        assert!(!cache.is_processed("m1", "u2"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!cache.is_processed("m1", "u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn check_and_mark_admits_only_the_first_copy() {
        let cache = DedupCache::new(Duration::from_secs(60), 100);
        assert!(cache.check_and_mark("m1", "u1"));
        assert!(!cache.check_and_mark("m1", "u1"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.check_and_mark("m1", "u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn every_nth_insert_sweeps_expired_entries() {
        let cache = DedupCache::new(Duration::from_secs(60), 3);
        cache.mark_processed("old-1", "u");
        cache.mark_processed("old-2", "u");
        tokio::time::advance(Duration::from_secs(120)).await;

        cache.mark_processed("new-1", "u");
        assert_eq!(cache.len(), 1);
        assert!(cache.is_processed("new-1", "u"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_evicts_on_its_interval() {
        let cache = Arc::new(DedupCache::new(Duration::from_secs(10), 1000));
        cache.mark_processed("m1", "u1");
        let cancel = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(cache.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
