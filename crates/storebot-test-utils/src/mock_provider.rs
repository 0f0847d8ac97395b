// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with a scripted queue of run
//! snapshots, enabling fast, CI-runnable orchestration tests without external
//! API calls. Every request is captured for assertions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use storebot_core::types::{
    AdapterType, GenerationRequest, HealthStatus, RunSnapshot, RunStatus, TokenUsage, ToolCall,
};
use storebot_core::{PluginAdapter, ProviderAdapter, StorebotError};

/// Usage reported by the snapshot helpers: 10 prompt + 20 completion tokens.
pub const MOCK_USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 10,
    completion_tokens: 20,
    total_tokens: 30,
};

fn run_id() -> String {
    format!("mock-run-{}", uuid::Uuid::new_v4())
}

/// A terminal snapshot carrying `text`.
pub fn completed(text: &str) -> RunSnapshot {
    RunSnapshot {
        run_id: run_id(),
        status: RunStatus::Completed {
            text: text.to_string(),
        },
        usage: MOCK_USAGE,
    }
}

/// A snapshot asking for the given `(id, name, arguments)` tool calls.
pub fn requires_tools(calls: &[(&str, &str, &str)]) -> RunSnapshot {
    RunSnapshot {
        run_id: run_id(),
        status: RunStatus::RequiresToolOutput(
            calls
                .iter()
                .map(|(id, name, arguments)| ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                })
                .collect(),
        ),
        usage: MOCK_USAGE,
    }
}

pub fn failed(reason: &str) -> RunSnapshot {
    RunSnapshot {
        run_id: run_id(),
        status: RunStatus::Failed {
            reason: reason.to_string(),
        },
        usage: TokenUsage::default(),
    }
}

/// A snapshot that must be polled; pair with [`MockProvider::add_poll`].
pub fn in_progress(id: &str) -> RunSnapshot {
    RunSnapshot {
        run_id: id.to_string(),
        status: RunStatus::InProgress,
        usage: TokenUsage::default(),
    }
}

/// A mock LLM provider that replays scripted snapshots.
///
/// `start_run` pops from the start queue; when it is empty a completed
/// "mock response" is returned. `poll_run` pops from a separate queue.
pub struct MockProvider {
    starts: Arc<Mutex<VecDeque<RunSnapshot>>>,
    polls: Arc<Mutex<VecDeque<RunSnapshot>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new mock provider with an empty script.
    pub fn new() -> Self {
        Self {
            starts: Arc::new(Mutex::new(VecDeque::new())),
            polls: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            cancelled: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Create a mock provider pre-loaded with `start_run` snapshots.
    pub fn with_script(script: Vec<RunSnapshot>) -> Self {
        Self {
            starts: Arc::new(Mutex::new(VecDeque::from(script))),
            ..Self::new()
        }
    }

    /// Delay every `start_run` by `delay`, to hold a turn in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn add_start(&self, snapshot: RunSnapshot) {
        self.starts.lock().await.push_back(snapshot);
    }

    pub async fn add_poll(&self, snapshot: RunSnapshot) {
        self.polls.lock().await.push_back(snapshot);
    }

    /// Every request passed to `start_run`, in order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Run ids passed to `cancel_run`.
    pub async fn cancelled_runs(&self) -> Vec<String> {
        self.cancelled.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, StorebotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StorebotError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn start_run(&self, request: GenerationRequest) -> Result<RunSnapshot, StorebotError> {
        self.requests.lock().await.push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.starts.lock().await.pop_front();
        Ok(next.unwrap_or_else(|| completed("mock response")))
    }

    async fn poll_run(&self, run_id: &str) -> Result<RunSnapshot, StorebotError> {
        self.polls
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| StorebotError::provider(format!("no scripted poll for {run_id}")))
    }

    async fn cancel_run(&self, run_id: &str) -> Result<(), StorebotError> {
        self.cancelled.lock().await.push(run_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            instructions: "be brief".into(),
            messages: vec![storebot_core::ChatMessage::user("hi")],
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replays_script_then_defaults() {
        let provider = MockProvider::with_script(vec![
            requires_tools(&[("call-1", "searchItems", "{}")]),
            completed("done"),
        ]);

        let first = provider.start_run(request()).await.unwrap();
        assert!(matches!(first.status, RunStatus::RequiresToolOutput(ref calls) if calls.len() == 1));
        let second = provider.start_run(request()).await.unwrap();
        assert_eq!(second.status, RunStatus::Completed { text: "done".into() });
        let third = provider.start_run(request()).await.unwrap();
        assert_eq!(
            third.status,
            RunStatus::Completed {
                text: "mock response".into()
            }
        );
        assert_eq!(provider.request_count().await, 3);
    }

    #[tokio::test]
    async fn poll_without_script_is_an_error() {
        let provider = MockProvider::new();
        provider.add_poll(completed("later")).await;
        assert!(provider.poll_run("r1").await.is_ok());
        assert!(provider.poll_run("r1").await.is_err());
    }
}
