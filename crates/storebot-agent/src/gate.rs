// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight admission per conversation thread.
//!
//! Entering a thread cancels the token of whichever turn currently owns it,
//! then waits (bounded) for that turn to release the thread lock. If the wait
//! runs out the new turn proceeds anyway, so a slow cancellation can overlap
//! with the next submission.
//!
//! A turn superseded while still waiting keeps its place in the lock queue,
//! so turns on one thread always take the lock in arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Slot {
    generation: u64,
    cancel: CancellationToken,
    lock: Arc<Mutex<()>>,
}

/// Tracks the newest turn of every active thread.
#[derive(Default)]
pub struct ThreadGate {
    slots: DashMap<String, Slot>,
    generations: AtomicU64,
}

/// Ownership of a thread for one turn. Released on drop.
pub struct TurnPermit {
    gate: Arc<ThreadGate>,
    thread_id: String,
    generation: u64,
    cancel: CancellationToken,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl TurnPermit {
    /// Cancelled as soon as a newer turn enters the same thread.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_superseded(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TurnPermit {
    fn drop(&mut self) {
        let generation = self.generation;
        self.gate
            .slots
            .remove_if(&self.thread_id, |_, slot| slot.generation == generation);
    }
}

impl ThreadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes the thread's current turn and admits a new one.
    ///
    /// The returned permit may already be superseded when a newer turn
    /// entered while this one waited; it still holds the lock then.
    pub async fn enter(self: &Arc<Self>, thread_id: &str, wait: Duration) -> TurnPermit {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();

        let lock = {
            let mut slot = self
                .slots
                .entry(thread_id.to_string())
                .or_insert_with(|| Slot {
                    generation: 0,
                    cancel: CancellationToken::new(),
                    lock: Arc::new(Mutex::new(())),
                });
            if slot.generation != 0 {
                debug!(thread_id, superseded = slot.generation, "cancelling in-flight turn");
            }
            slot.cancel.cancel();
            slot.generation = generation;
            slot.cancel = cancel.clone();
            Arc::clone(&slot.lock)
        };

        let guard = match tokio::time::timeout(wait, lock.lock_owned()).await {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!(thread_id, wait_ms = wait.as_millis() as u64, "previous turn still running, proceeding");
                None
            }
        };

        TurnPermit {
            gate: Arc::clone(self),
            thread_id: thread_id.to_string(),
            generation,
            cancel,
            _guard: guard,
        }
    }

    /// Threads with a turn in flight.
    pub fn active_threads(&self) -> usize {
        self.slots.len()
    }

    /// Generation of the newest turn on `thread_id`.
    #[cfg(test)]
    pub(crate) fn newest_generation(&self, thread_id: &str) -> Option<u64> {
        self.slots.get(thread_id).map(|slot| slot.generation)
    }
}
