// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Management API SDK
//!
//! Blocking client for the JSON web API of a security management server.
//!
//! The client logs in, runs commands, waits for the asynchronous tasks those
//! commands start, pages through `show-*` listings and, when enabled, publishes
//! the session after every N calls.
//!
//! # Architecture
//!
//! - [`trust`]: per-server SHA-1 fingerprints stored in a JSON file
//! - [`tls`] / [`http`]: HTTPS transport pinned to the trusted fingerprint
//! - [`task`]: `show-task` polling
//! - [`query`]: offset pagination of listing commands
//! - [`publish`]: auto-publish call accounting shared by all threads
//!
//! # Example
//!
//! ```no_run
//! use cp_mgmt_sdk::{ClientConfig, LoginOptions, ManagementClient, Payload};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("192.0.2.10").with_auto_publish_batch_size(50);
//! let client = ManagementClient::new(config);
//!
//! let login = client.login_with_password("admin", "secret", LoginOptions::new())?;
//! if !login.success {
//!     eprintln!("{}", login.error_message.unwrap_or_default());
//!     return Ok(());
//! }
//!
//! let mut host = Payload::new();
//! host.insert("name".into(), json!("web-01"));
//! host.insert("ip-address".into(), json!("192.0.2.20"));
//! client.call_simple("add-host", host)?;
//!
//! let hosts = client.query("show-hosts", "standard", None, true, Payload::new())?;
//! println!("{} hosts", hosts.data["objects"].as_array().map_or(0, Vec::len));
//!
//! client.call_simple("publish", Payload::new())?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
pub mod http;
pub mod publish;
pub mod query;
mod response;
pub mod task;
pub mod tls;
pub mod trust;
mod types;

pub use client::ManagementClient;
pub use config::{
    ApiContext, ClientConfig, DEFAULT_AUTO_PUBLISH_BATCH_SIZE, DEFAULT_FINGERPRINT_FILE,
    DEFAULT_POLL_INTERVAL, DEFAULT_PORT, DEFAULT_TIMEOUT, HttpDebugLevel, ProxyConfig,
};
pub use error::{Result, SdkError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportSettings, UreqTransport};
pub use publish::{AutoPublishCoordinator, CallCounters};
pub use response::{ApiResponse, Payload};
pub use task::{TaskPoller, TaskStatus};
pub use trust::{
    AcceptAll, FingerprintStore, InteractivePrompt, RejectAll, TrustDecision, TrustPolicy,
    TrustPrompt, TrustPromptReason,
};
pub use types::{CallOptions, Credentials, LoginOptions, Session};
