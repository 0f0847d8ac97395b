// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assistant tools for the Storebot backend.
//!
//! [`ToolKind`] is the closed registry advertised to the model and
//! [`ToolDispatcher`] resolves each requested call to a JSON string. Tool
//! failures never propagate: they are returned as `{"message": ...}`
//! envelopes so one bad call cannot abort a conversation turn.

pub mod catalog;
pub mod dispatcher;
pub mod kind;
pub mod order;
pub mod policy;
mod push;

pub use catalog::{cosine_similarity, rank_by_similarity, ScoredItem, SEARCH_LIMIT};
pub use dispatcher::{ToolContext, ToolDispatcher, ToolOutput};
pub use kind::ToolKind;
pub use order::{format_money, OrderMailer, SmtpMailer};
