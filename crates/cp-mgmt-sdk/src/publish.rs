// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Auto-publish: commit the session after every N external calls.
//!
//! Every external call is admitted through [`AutoPublishCoordinator::admit`]
//! and reports completion through [`AutoPublishCoordinator::complete`]. The
//! call that completes the N-th slot of a batch becomes the publisher: it
//! waits for the calls still in flight, publishes, then opens the next batch.
//! Callers arriving while a batch is full or a publish runs block until then.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::info;

/// How often blocked callers log that they are still waiting.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot of the call accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounters {
    /// Admitted calls since the last publish.
    pub total_calls: i64,
    /// Admitted calls that have not completed yet.
    pub active_calls: i64,
    /// A publish cycle is running.
    pub publishing: bool,
    /// Configured batch size; 0 or less means disabled.
    pub batch_size: i64,
}

/// Shared call accounting for one client.
#[derive(Debug, Default)]
pub struct AutoPublishCoordinator {
    state: Mutex<CallCounters>,
    changed: Condvar,
}

/// Admission token of one external call.
#[derive(Debug)]
#[must_use = "an admitted call must be completed"]
pub struct CallPermit {
    _private: (),
}

/// Held by the caller that must run the publish. Dropping it ends the cycle.
#[derive(Debug)]
#[must_use = "dropping the cycle ends it immediately"]
pub struct PublishCycle<'a> {
    coordinator: &'a AutoPublishCoordinator,
}

impl AutoPublishCoordinator {
    pub fn new(batch_size: i64) -> Self {
        Self {
            state: Mutex::new(CallCounters {
                batch_size,
                ..Default::default()
            }),
            changed: Condvar::new(),
        }
    }

    pub fn batch_size(&self) -> i64 {
        self.state.lock().batch_size
    }

    pub fn is_enabled(&self) -> bool {
        self.batch_size() > 0
    }

    pub fn set_batch_size(&self, batch_size: i64) {
        self.state.lock().batch_size = batch_size;
        self.changed.notify_all();
    }

    /// Turn auto-publish off and forget the calls counted so far.
    pub fn disable(&self) {
        let mut state = self.state.lock();
        state.batch_size = -1;
        state.total_calls = 0;
        self.changed.notify_all();
    }

    pub fn reset_total_calls(&self) {
        self.state.lock().total_calls = 0;
        self.changed.notify_all();
    }

    pub fn counters(&self) -> CallCounters {
        *self.state.lock()
    }

    /// Block until the call fits into the current batch.
    ///
    /// Returns `None` when auto-publish is disabled; the call then runs
    /// without accounting.
    pub fn admit(&self) -> Option<CallPermit> {
        let mut state = self.state.lock();
        loop {
            if state.batch_size <= 0 {
                return None;
            }
            if state.total_calls < state.batch_size && !state.publishing {
                state.total_calls += 1;
                state.active_calls += 1;
                return Some(CallPermit { _private: () });
            }
            if self
                .changed
                .wait_for(&mut state, PROGRESS_INTERVAL)
                .timed_out()
            {
                info!(
                    total_calls = state.total_calls,
                    "waiting for auto publish to admit call"
                );
            }
        }
    }

    /// Record that an admitted call finished, successfully or not.
    ///
    /// Returns a [`PublishCycle`] when this call closed a batch and no publish
    /// is running; the caller must then publish.
    pub fn complete(&self, permit: CallPermit) -> Option<PublishCycle<'_>> {
        drop(permit);
        let mut state = self.state.lock();
        state.active_calls = (state.active_calls - 1).max(0);
        self.changed.notify_all();

        if state.batch_size > 0
            && state.total_calls > 0
            && state.total_calls % state.batch_size == 0
            && !state.publishing
        {
            state.publishing = true;
            return Some(PublishCycle { coordinator: self });
        }
        None
    }
}

impl PublishCycle<'_> {
    /// Block until no admitted call is in flight.
    pub fn wait_for_idle(&self) {
        let coordinator = self.coordinator;
        let mut state = coordinator.state.lock();
        while state.active_calls > 0 {
            if coordinator
                .changed
                .wait_for(&mut state, PROGRESS_INTERVAL)
                .timed_out()
            {
                info!(
                    active_calls = state.active_calls,
                    "waiting to start auto publish"
                );
            }
        }
    }
}

impl Drop for PublishCycle<'_> {
    fn drop(&mut self) {
        let mut state = self.coordinator.state.lock();
        state.total_calls = 0;
        state.publishing = false;
        self.coordinator.changed.notify_all();
    }
}
