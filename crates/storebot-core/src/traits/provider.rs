// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM generation runs.

use async_trait::async_trait;

use crate::error::StorebotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationRequest, RunSnapshot};

/// Adapter for LLM providers.
///
/// A run is started with [`start_run`](ProviderAdapter::start_run). Providers
/// that answer synchronously return a terminal snapshot straight away; those
/// with asynchronous runs return `Queued` or `InProgress` and are polled.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Issues a generation request.
    async fn start_run(&self, request: GenerationRequest) -> Result<RunSnapshot, StorebotError>;

    /// Fetches the current state of a previously started run.
    async fn poll_run(&self, run_id: &str) -> Result<RunSnapshot, StorebotError> {
        Err(StorebotError::provider(format!(
            "{} does not support polling (run {run_id})",
            self.name()
        )))
    }

    /// Requests cancellation of a run. Best-effort.
    async fn cancel_run(&self, _run_id: &str) -> Result<(), StorebotError> {
        Ok(())
    }
}
