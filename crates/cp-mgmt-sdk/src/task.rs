// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Waiting for asynchronous server tasks.
//!
//! Long-running commands (publish, install-policy, run-script, ...) answer with
//! a `task-id`. The poller issues `show-task` until every sub-task has left
//! `in progress`, then folds the sub-task statuses into the response.

use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::Result;
use crate::response::{ApiResponse, Payload};

/// Status string of a task that has not finished.
pub const IN_PROGRESS: &str = "in progress";
/// Extra `show-task` attempts after an unsuccessful poll.
pub const MAX_POLL_RETRIES: usize = 5;

/// Status of a server task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    InProgress,
    Succeeded,
    Failed,
    PartiallySucceeded,
    Other(String),
}

impl TaskStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            IN_PROGRESS => TaskStatus::InProgress,
            "succeeded" => TaskStatus::Succeeded,
            "failed" => TaskStatus::Failed,
            "partially succeeded" => TaskStatus::PartiallySucceeded,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    /// True for `failed` and `partially succeeded`.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::PartiallySucceeded)
    }
}

/// Statuses of the entries of the response's `tasks` array.
///
/// An entry without a string `status` yields `None`.
pub fn task_statuses(response: &ApiResponse) -> Vec<Option<TaskStatus>> {
    match response.get("tasks") {
        Some(Value::Array(tasks)) => tasks
            .iter()
            .map(|task| {
                task.get("status")
                    .and_then(Value::as_str)
                    .map(TaskStatus::parse)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// True once no sub-task is still running. A task without a status counts as
/// still running.
pub fn all_tasks_completed(response: &ApiResponse) -> bool {
    task_statuses(response)
        .iter()
        .all(|status| matches!(status, Some(s) if *s != TaskStatus::InProgress))
}

/// Downgrade the response to failure when a sub-task failed.
pub fn check_tasks_status(response: &mut ApiResponse) {
    let failed: Vec<String> = match response.get("tasks") {
        Some(Value::Array(tasks)) => tasks
            .iter()
            .filter(|task| {
                task.get("status")
                    .and_then(Value::as_str)
                    .map(|s| TaskStatus::parse(s).is_failure())
                    .unwrap_or(false)
            })
            .map(|task| {
                let name = task
                    .get("task-name")
                    .or_else(|| task.get("task-id"))
                    .and_then(Value::as_str)
                    .unwrap_or("task");
                let status = task.get("status").and_then(Value::as_str).unwrap_or("");
                format!("{} ({})", name, status)
            })
            .collect(),
        _ => return,
    };

    if failed.is_empty() {
        return;
    }

    response.status_code = None;
    let mut message = response.generic_error_message();
    message.push_str("\nFailed tasks:");
    for task in failed {
        message.push_str(&format!("\n- {}", task));
    }
    response.fail(message);
}

/// Task ids listed in a `tasks` array of a command response.
pub fn task_ids(tasks: &Value) -> Vec<String> {
    match tasks {
        Value::Array(items) => items
            .iter()
            .filter_map(|t| t.get("task-id").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Polls `show-task` at a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct TaskPoller {
    interval: Duration,
}

impl TaskPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until task `task_id` and all of its sub-tasks finish.
    ///
    /// `show_task` issues one `show-task` call with the given payload. An
    /// unsuccessful poll is retried [`MAX_POLL_RETRIES`] times; after that the
    /// last result is returned (a transport error is propagated).
    pub fn await_task<F>(&self, task_id: &str, mut show_task: F) -> Result<ApiResponse>
    where
        F: FnMut(&Payload) -> Result<ApiResponse>,
    {
        let mut payload = Payload::new();
        payload.insert("task-id".to_string(), json!(task_id));
        payload.insert("details-level".to_string(), json!("full"));

        loop {
            let result = self.poll_with_retries(&payload, &mut show_task)?;

            if !result.success {
                warn!(
                    task_id = %task_id,
                    "failed to follow asynchronous task, task result is undefined"
                );
                return Ok(result);
            }

            if all_tasks_completed(&result) {
                let mut result = result;
                check_tasks_status(&mut result);
                return Ok(result);
            }

            debug!(task_id = %task_id, "task still in progress");
            thread::sleep(self.interval);
        }
    }

    /// Wait for each task in turn, then fetch all of them in one `show-task`.
    ///
    /// When the combined call cannot be made the error is logged and `None`
    /// is returned.
    pub fn await_tasks<F>(&self, task_ids: &[String], mut show_task: F) -> Option<ApiResponse>
    where
        F: FnMut(&Payload) -> Result<ApiResponse>,
    {
        for task_id in task_ids {
            if let Err(e) = self.await_task(task_id, &mut show_task) {
                warn!(task_id = %task_id, error = %e, "problem waiting for task");
            }
        }

        let mut payload = Payload::new();
        payload.insert("task-id".to_string(), json!(task_ids));
        payload.insert("details-level".to_string(), json!("full"));

        match show_task(&payload) {
            Ok(mut result) => {
                check_tasks_status(&mut result);
                Some(result)
            }
            Err(e) => {
                warn!(error = %e, "problem showing tasks, try again");
                None
            }
        }
    }

    fn poll_with_retries<F>(&self, payload: &Payload, show_task: &mut F) -> Result<ApiResponse>
    where
        F: FnMut(&Payload) -> Result<ApiResponse>,
    {
        let mut attempt = show_task(payload);
        let mut retries = 0;

        while !matches!(&attempt, Ok(res) if res.success) && retries < MAX_POLL_RETRIES {
            retries += 1;
            debug!(retries, "show-task failed, retrying");
            thread::sleep(self.interval);
            attempt = show_task(payload);
        }

        attempt
    }
}
