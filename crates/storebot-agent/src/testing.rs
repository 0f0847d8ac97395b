// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Harness plus an orchestrator built from its parts.

use std::ops::Deref;
use std::sync::Arc;

use storebot_test_utils::{TestHarness, TestHarnessBuilder};

use crate::orchestrator::Orchestrator;

pub(crate) struct Fixture {
    harness: TestHarness,
    pub orchestrator: Arc<Orchestrator>,
}

impl Fixture {
    /// Builds the harness and wires an orchestrator over it.
    pub async fn build(builder: TestHarnessBuilder) -> Self {
        let harness = builder.build().await.expect("test harness");
        Self::new(harness)
    }

    pub fn new(harness: TestHarness) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            harness.db().clone(),
            harness.provider.clone(),
            Arc::clone(&harness.tools),
            harness.assistant.clone(),
        ));
        Self {
            harness,
            orchestrator,
        }
    }
}

impl Deref for Fixture {
    type Target = TestHarness;

    fn deref(&self) -> &TestHarness {
        &self.harness
    }
}
