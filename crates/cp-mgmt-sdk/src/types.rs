// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Option and session types for the management client.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::response::Payload;

/// Authenticated session: set by a successful login, replaced by the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub sid: Option<String>,
    pub domain: Option<String>,
}

/// Login credentials.
#[derive(Clone)]
pub enum Credentials {
    /// Administrator name and password.
    Password { user: String, password: String },
    /// API key.
    ApiKey(String),
}

impl Credentials {
    pub fn password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Credentials::ApiKey(key.into())
    }

    /// Login payload fields for these credentials.
    pub fn into_payload(self) -> Payload {
        let mut payload = Payload::new();
        match self {
            Credentials::Password { user, password } => {
                payload.insert("user".to_string(), json!(user));
                payload.insert("password".to_string(), json!(password));
            }
            Credentials::ApiKey(key) => {
                payload.insert("api-key".to_string(), json!(key));
            }
        }
        payload
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Credentials::ApiKey(_) => f.debug_tuple("ApiKey").field(&"***").finish(),
        }
    }
}

/// Options for a login.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Continue the last session instead of opening a new one (web API only).
    pub continue_last_session: bool,
    /// Name, UID or IP address of the domain to log into.
    pub domain: Option<String>,
    /// Log in with read-only permissions (web API only). Ignored by the
    /// server when `continue_last_session` is set.
    pub read_only: bool,
    /// Further login fields, e.g. `session-name` or `session-timeout`.
    pub payload: Payload,
}

impl LoginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_continue_last_session(mut self, continue_last_session: bool) -> Self {
        self.continue_last_session = continue_last_session;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Add an extra login field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Options for a single API call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Session id for this call only; defaults to the logged-in session.
    pub sid: Option<String>,
    /// Follow a returned `task-id` / `tasks` until the work is done (default: true).
    pub wait_for_task: bool,
    /// Route through the configured proxy; defaults to whether one is configured.
    pub use_proxy: Option<bool>,
    /// HTTP method name: `GET`, `POST`, `PUT` or `DELETE` (default: `POST`).
    pub method: String,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            sid: None,
            wait_for_task: true,
            use_proxy: None,
            method: "POST".to_string(),
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_wait_for_task(mut self, wait: bool) -> Self {
        self.wait_for_task = wait;
        self
    }

    pub fn with_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = Some(use_proxy);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }
}
