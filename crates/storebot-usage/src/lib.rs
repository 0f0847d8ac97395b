// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript recording and token-budget accounting.
//!
//! - **Budget**: active-subscription checks with an 80% usage warning
//! - **Recorder**: appends a turn's messages and bills its tokens in one
//!   SQLite transaction

pub mod budget;
pub mod recorder;

pub use budget::{active_subscription, require_active_subscription};
pub use recorder::{RecordedExchange, RecordedUserTurn, TurnRecord, UsageRecorder};
