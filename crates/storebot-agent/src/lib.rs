// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestration for Storebot.
//!
//! - **Orchestrator**: the per-turn state machine with single-flight per thread
//! - **Pipeline**: Messenger/Instagram webhook processing after the early ack
//! - **Web**: the synchronous ask path
//! - **Dedup**, **normalizer**, **thread**: the pipeline's building blocks
//! - **Shutdown**: signal handling and background task draining

pub mod dedup;
pub mod gate;
pub mod instructions;
pub mod normalizer;
pub mod orchestrator;
pub mod pipeline;
pub mod shutdown;
pub mod thread;
pub mod web;

pub use dedup::DedupCache;
pub use normalizer::AttachmentNormalizer;
pub use orchestrator::{AskRequest, Orchestrator, TurnOutcome, TurnState};
pub use pipeline::{DropReason, EventOutcome, MessengerPipeline};
pub use shutdown::{install_signal_handler, BackgroundTasks};
pub use thread::ThreadResolver;
pub use web::{UsageSummary, WebAssistant, WebReply};

#[cfg(test)]
mod testing;
