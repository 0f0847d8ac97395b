// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Storebot.
//!
//! Provides mock adapters for deterministic, CI-runnable tests:
//! - `MockProvider`: scripted generation runs with request capture
//! - `MockChannel`: captures outbound messages, with a failing mode
//! - `MockEmbedder` / `MockBlobStore`: table-driven media collaborators
//! - `TestHarness`: seeded temp database with the mocks wired in

pub mod harness;
pub mod mock_channel;
pub mod mock_media;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_channel::MockChannel;
pub use mock_media::{MockBlobStore, MockEmbedder, Upload};
pub use mock_provider::MockProvider;
