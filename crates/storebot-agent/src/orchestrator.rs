// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn state machine driving one assistant exchange.
//!
//! A turn goes Created -> Submitted -> {RequiresToolOutput <-> ToolDispatch}
//! -> Completed | Failed. A turn cancelled by a newer message on the same
//! thread ends Superseded. Failures never reach the channel as errors: the
//! turn completes with the configured fallback reply instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use storebot_config::model::AssistantConfig;
use storebot_core::{
    ChatMessage, GenerationRequest, ProviderAdapter, RunSnapshot, RunStatus, StorebotError,
    TokenUsage, ToolCall,
};
use storebot_storage::queries::messages;
use storebot_storage::{Chat, Database, MessageRole, Store};
use storebot_tools::{ToolContext, ToolDispatcher};
use storebot_usage::UsageRecorder;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gate::{ThreadGate, TurnPermit};
use crate::instructions::store_instructions;

/// States of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Admitted to the thread; older turns cancelled.
    Created,
    /// Generation request issued.
    Submitted,
    /// The model asked for tools.
    RequiresToolOutput,
    /// Tool calls running.
    ToolDispatch,
    Completed,
    Failed,
    /// A newer message on the same thread took over.
    Superseded,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnState::Created => write!(f, "created"),
            TurnState::Submitted => write!(f, "submitted"),
            TurnState::RequiresToolOutput => write!(f, "requires_tool_output"),
            TurnState::ToolDispatch => write!(f, "tool_dispatch"),
            TurnState::Completed => write!(f, "completed"),
            TurnState::Failed => write!(f, "failed"),
            TurnState::Superseded => write!(f, "superseded"),
        }
    }
}

/// Input for one turn.
#[derive(Debug, Clone, Copy)]
pub struct AskRequest<'a> {
    pub chat: &'a Chat,
    pub store: &'a Store,
    /// Normalized user text.
    pub text: &'a str,
    /// Messenger sender id, exposed to the model for image pushes.
    pub recipient_id: Option<&'a str>,
}

/// Result of one turn.
///
/// Holds the thread until dropped, so the caller can deliver and record the
/// reply before the next turn on the thread reads history.
pub struct TurnOutcome {
    pub state: TurnState,
    /// Reply text; empty for a superseded turn.
    pub text: String,
    /// Usage summed over every generation of the turn. Already billed when
    /// the turn was superseded.
    pub usage: TokenUsage,
    _permit: Option<TurnPermit>,
}

impl TurnOutcome {
    pub fn is_superseded(&self) -> bool {
        self.state == TurnState::Superseded
    }
}

impl std::fmt::Debug for TurnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOutcome")
            .field("state", &self.state)
            .field("text", &self.text)
            .field("usage", &self.usage)
            .finish()
    }
}

enum TurnEnd {
    Completed(String),
    Superseded,
}

/// Drives turns against the provider with the fixed tool registry.
pub struct Orchestrator {
    db: Database,
    provider: Arc<dyn ProviderAdapter>,
    tools: Arc<ToolDispatcher>,
    recorder: UsageRecorder,
    gate: Arc<ThreadGate>,
    config: AssistantConfig,
}

impl Orchestrator {
    pub fn new(
        db: Database,
        provider: Arc<dyn ProviderAdapter>,
        tools: Arc<ToolDispatcher>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            recorder: UsageRecorder::new(db.clone()),
            db,
            provider,
            tools,
            gate: Arc::new(ThreadGate::new()),
            config,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn recorder(&self) -> &UsageRecorder {
        &self.recorder
    }

    /// Threads with a turn in flight.
    pub fn active_threads(&self) -> usize {
        self.gate.active_threads()
    }

    /// Runs one turn on the request's thread.
    ///
    /// Errors are storage failures only. A superseded turn has already
    /// recorded its user message and billed its spent tokens when this
    /// returns.
    pub async fn ask(&self, request: AskRequest<'_>) -> Result<TurnOutcome, StorebotError> {
        let thread_id = request.chat.thread_id.as_str();
        let wait = Duration::from_secs(self.config.cancel_wait_secs);

        let permit = self.gate.enter(thread_id, wait).await;
        if permit.is_superseded() {
            info!(thread_id, state = %TurnState::Superseded, "turn superseded before start");
            return self.superseded(request, permit, TokenUsage::default()).await;
        }
        debug!(thread_id, state = %TurnState::Created, "turn admitted");

        let mut usage = TokenUsage::default();
        let cancel = permit.cancellation().clone();
        match self.run(request, &cancel, &mut usage).await {
            Ok(TurnEnd::Completed(text)) => {
                info!(
                    thread_id,
                    state = %TurnState::Completed,
                    total_tokens = usage.total_tokens,
                    "turn completed"
                );
                Ok(TurnOutcome {
                    state: TurnState::Completed,
                    text,
                    usage,
                    _permit: Some(permit),
                })
            }
            Ok(TurnEnd::Superseded) => {
                info!(thread_id, state = %TurnState::Superseded, "turn superseded by a newer message");
                self.superseded(request, permit, usage).await
            }
            Err(e) => {
                warn!(thread_id, state = %TurnState::Failed, error = %e, "turn failed, sending fallback");
                Ok(TurnOutcome {
                    state: TurnState::Failed,
                    text: self.config.fallback_reply.clone(),
                    usage,
                    _permit: Some(permit),
                })
            }
        }
    }

    /// Records the user message and bills `usage` while still holding the
    /// thread, so the newer turn reads it in arrival order.
    async fn superseded(
        &self,
        request: AskRequest<'_>,
        permit: TurnPermit,
        usage: TokenUsage,
    ) -> Result<TurnOutcome, StorebotError> {
        self.recorder
            .record_user_only(request.chat, request.text, usage)
            .await?;
        drop(permit);
        Ok(TurnOutcome {
            state: TurnState::Superseded,
            text: String::new(),
            usage,
            _permit: None,
        })
    }

    async fn context(&self, request: &AskRequest<'_>) -> Result<Vec<ChatMessage>, StorebotError> {
        let history =
            messages::recent_messages(&self.db, &request.chat.id, self.config.history_limit)
                .await?;
        let mut context: Vec<ChatMessage> = history
            .into_iter()
            .map(|m| match m.role {
                MessageRole::User => ChatMessage::user(m.content),
                MessageRole::Assistant => ChatMessage::assistant(m.content),
            })
            .collect();
        context.push(ChatMessage::user(request.text));
        Ok(context)
    }

    async fn run(
        &self,
        request: AskRequest<'_>,
        cancel: &CancellationToken,
        usage: &mut TokenUsage,
    ) -> Result<TurnEnd, StorebotError> {
        let thread_id = request.chat.thread_id.as_str();
        let mut generation = GenerationRequest {
            instructions: store_instructions(request.store, request.recipient_id),
            messages: self.context(&request).await?,
            tools: self.tools.definitions(),
        };
        let tool_ctx = ToolContext {
            store_id: request.store.id.clone(),
            recipient_id: request.recipient_id.map(str::to_string),
        };

        for round in 1..=self.config.max_tool_rounds {
            debug!(thread_id, round, state = %TurnState::Submitted, "generation submitted");
            let started = match until_cancelled(cancel, self.provider.start_run(generation.clone())).await {
                Some(result) => result?,
                None => return Ok(TurnEnd::Superseded),
            };
            let Some(snapshot) = self.await_terminal(started, cancel).await? else {
                return Ok(TurnEnd::Superseded);
            };
            usage.accumulate(&snapshot.usage);

            match snapshot.status {
                RunStatus::Completed { text } => return Ok(TurnEnd::Completed(text)),
                RunStatus::RequiresToolOutput(calls) => {
                    debug!(
                        thread_id,
                        state = %TurnState::RequiresToolOutput,
                        calls = calls.len(),
                        "model requested tools"
                    );
                    let Some(results) = self.dispatch(&tool_ctx, &calls, cancel).await else {
                        return Ok(TurnEnd::Superseded);
                    };
                    generation
                        .messages
                        .push(ChatMessage::assistant_tool_calls(calls));
                    generation.messages.extend(results);
                }
                RunStatus::Failed { reason } => {
                    return Err(StorebotError::provider(format!("run failed: {reason}")));
                }
                RunStatus::Cancelled => {
                    return Err(StorebotError::provider("run cancelled by provider"));
                }
                RunStatus::Queued | RunStatus::InProgress => {
                    return Err(StorebotError::Internal(
                        "run left polling in a pending state".into(),
                    ));
                }
            }
        }

        Err(StorebotError::Tool {
            message: format!(
                "tool loop exceeded {} rounds",
                self.config.max_tool_rounds
            ),
        })
    }

    async fn dispatch(
        &self,
        ctx: &ToolContext,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Option<Vec<ChatMessage>> {
        debug!(state = %TurnState::ToolDispatch, calls = calls.len(), "dispatching tools");
        let outputs = until_cancelled(cancel, self.tools.dispatch_all(ctx, calls)).await?;
        Some(
            outputs
                .into_iter()
                .map(|out| ChatMessage::tool_result(out.call_id, out.content))
                .collect(),
        )
    }

    /// Polls a queued or in-progress run until it is terminal.
    ///
    /// `None` means the turn was superseded; the run is cancelled upstream.
    async fn await_terminal(
        &self,
        mut snapshot: RunSnapshot,
        cancel: &CancellationToken,
    ) -> Result<Option<RunSnapshot>, StorebotError> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let timeout = Duration::from_secs(self.config.poll_timeout_secs);
        let deadline = Instant::now() + timeout;

        while snapshot.status.is_pending() {
            if Instant::now() >= deadline {
                self.cancel_run(&snapshot.run_id).await;
                return Err(StorebotError::Timeout { duration: timeout });
            }
            let polled = until_cancelled(cancel, async {
                tokio::time::sleep(interval).await;
                self.provider.poll_run(&snapshot.run_id).await
            })
            .await;
            match polled {
                Some(result) => snapshot = result?,
                None => {
                    self.cancel_run(&snapshot.run_id).await;
                    return Ok(None);
                }
            }
        }
        Ok(Some(snapshot))
    }

    async fn cancel_run(&self, run_id: &str) {
        if let Err(e) = self.provider.cancel_run(run_id).await {
            warn!(run_id, error = %e, "failed to cancel run");
        }
    }
}

async fn until_cancelled<T>(cancel: &CancellationToken, work: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = work => Some(out),
    }
}
