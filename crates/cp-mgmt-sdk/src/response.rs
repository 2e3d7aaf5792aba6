// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Uniform result of a management API call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::HttpResponse;

/// JSON object carried in requests and responses.
pub type Payload = Map<String, Value>;

/// Outcome of one API call.
///
/// An unsuccessful server answer is still an `ApiResponse`; only transport and
/// usage faults surface as [`crate::SdkError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiResponse {
    /// True for a 2xx answer with a JSON object body (and no failed task).
    pub success: bool,
    /// HTTP status code. Cleared when a task failure downgrades the response.
    pub status_code: Option<u16>,
    /// Decoded response body.
    pub data: Payload,
    /// Response body as received.
    #[serde(skip)]
    pub raw_body: String,
    /// Populated only when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ApiResponse {
    /// Normalize a raw HTTP response.
    pub fn from_http(response: HttpResponse) -> Self {
        let is_2xx = (200..300).contains(&response.status);

        let (data, decode_error) = match serde_json::from_str::<Value>(&response.body) {
            Ok(Value::Object(map)) => (map, None),
            Ok(other) => (
                Map::new(),
                Some(format!("expected a JSON object, got {}", json_kind(&other))),
            ),
            Err(e) => (Map::new(), Some(format!("invalid JSON body: {}", e))),
        };

        let mut result = Self {
            success: is_2xx && decode_error.is_none(),
            status_code: Some(response.status),
            data,
            raw_body: response.body,
            error_message: None,
        };

        if !result.success {
            let mut message = result.generic_error_message();
            if let Some(decode_error) = decode_error {
                message.push('\n');
                message.push_str(&decode_error);
            }
            result.error_message = Some(message);
        }

        result
    }

    /// Mark the response failed and attach `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.success = false;
        self.error_message = Some(message.into());
    }

    /// Look up a top-level field of the payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Top-level string field, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Build a readable error message from status and the payload's
    /// `code`, `message`, `errors`, `warnings` and `blocking-errors` fields.
    pub fn generic_error_message(&self) -> String {
        let mut msg = String::from("Failed to execute API call.");

        if let Some(status) = self.status_code {
            msg.push_str(&format!("\nStatus: {}", status));
        }
        if let Some(code) = self.get_str("code") {
            msg.push_str(&format!("\nCode: {}", code));
        }
        if let Some(message) = self.get_str("message") {
            msg.push_str(&format!("\nMessage: {}", message));
        }

        for (field, title) in [
            ("errors", "Errors"),
            ("warnings", "Warnings"),
            ("blocking-errors", "Blocking errors"),
        ] {
            let lines = collect_messages(self.data.get(field));
            if !lines.is_empty() {
                msg.push_str(&format!("\n{}:", title));
                for line in lines {
                    msg.push_str(&format!("\n- {}", line));
                }
            }
        }

        msg
    }
}

fn collect_messages(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
