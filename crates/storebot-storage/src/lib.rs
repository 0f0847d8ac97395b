// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Storebot backend.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer concurrency
//! model via `tokio-rusqlite`. Query modules are free async functions over
//! [`Database`]; the `*_in` variants run on a caller-owned connection so
//! several writes can share one transaction.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{now_timestamp, Database};
pub use models::*;
