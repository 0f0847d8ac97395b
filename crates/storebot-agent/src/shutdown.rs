// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the server monitors. Webhook work spawned after
//! the early acknowledgment is tracked in [`BackgroundTasks`] and drained
//! before the process exits.

use std::future::Future;
use std::time::Duration;

use storebot_core::StorebotError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Work spawned after a request was already answered.
///
/// Failures are logged with the task name instead of vanishing with a
/// detached future.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), StorebotError>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "background task failed");
            }
        });
    }

    /// Tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Stops accepting work and waits up to `timeout` for running tasks.
    ///
    /// Returns `true` when everything finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let running = self.tracker.len();
        if running == 0 {
            info!("no background tasks to drain");
            return true;
        }

        info!(count = running, "waiting for background tasks to complete");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("all background tasks drained");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "timeout reached, some background tasks interrupted"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_without_tasks_is_immediate() {
        let tasks = BackgroundTasks::new();
        assert!(tasks.drain(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn drain_waits_for_running_work() {
        let tasks = BackgroundTasks::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tasks.spawn("ok", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
            Ok(())
        });
        tasks.spawn("fails", async { Err(StorebotError::Internal("boom".into())) });

        assert!(tasks.drain(Duration::from_secs(5)).await);
        assert!(rx.await.is_ok());
        assert!(tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_after_timeout() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        assert!(!tasks.drain(Duration::from_secs(1)).await);
        assert_eq!(tasks.len(), 1);
    }
}
