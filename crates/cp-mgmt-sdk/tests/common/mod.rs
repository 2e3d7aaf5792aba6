// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cp_mgmt_sdk::{
    AcceptAll, ClientConfig, HttpRequest, HttpResponse, ManagementClient, Result, Transport,
    TransportSettings,
};
use parking_lot::Mutex;
use serde_json::Value;

pub const FINGERPRINT: &str = "AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89:AB:CD:EF:01";

type Handler = Box<dyn Fn(&Value) -> (u16, Value) + Send + Sync>;

/// Answers each command from a per-command queue; the last entry of a queue
/// is repeated. A command may instead be served by a handler closure.
pub struct FakeTransport {
    fingerprint: String,
    scripted: Mutex<HashMap<String, VecDeque<(u16, Value)>>>,
    handlers: Mutex<HashMap<String, Arc<Handler>>>,
    requests: Mutex<Vec<HttpRequest>>,
    settings: Mutex<Vec<TransportSettings>>,
    probes: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Self::with_fingerprint(FINGERPRINT)
    }

    pub fn with_fingerprint(fingerprint: &str) -> Arc<Self> {
        Arc::new(Self {
            fingerprint: fingerprint.to_string(),
            scripted: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            settings: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        })
    }

    /// Queue an answer for `command`.
    pub fn respond(&self, command: &str, status: u16, body: Value) -> &Self {
        self.scripted
            .lock()
            .entry(command.to_string())
            .or_default()
            .push_back((status, body));
        self
    }

    /// Answer `command` by calling `handler` with the request body.
    pub fn handle<F>(&self, command: &str, handler: F) -> &Self
    where
        F: Fn(&Value) -> (u16, Value) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .insert(command.to_string(), Arc::new(Box::new(handler)));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, command: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| command_of(&r.url) == command)
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| command_of(&r.url).to_string())
            .collect()
    }

    pub fn settings(&self) -> Vec<TransportSettings> {
        self.settings.lock().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: &HttpRequest, settings: &TransportSettings) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());
        self.settings.lock().push(settings.clone());

        let command = command_of(&request.url).to_string();
        let body: Value = serde_json::from_str(&request.body)?;

        let handler = self.handlers.lock().get(&command).cloned();
        let (status, answer) = match handler {
            Some(handler) => handler(&body),
            None => {
                let mut scripted = self.scripted.lock();
                let queue = scripted.entry(command.clone()).or_default();
                let next = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                next.unwrap_or_else(|| {
                    (
                        404,
                        serde_json::json!({
                            "code": "generic_err_command_not_found",
                            "message": format!("no script for {}", command)
                        }),
                    )
                })
            }
        };

        Ok(HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: answer.to_string(),
        })
    }

    fn probe_fingerprint(&self, _server: &str, _port: u16, _timeout: Duration) -> Result<String> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.fingerprint.clone())
    }
}

pub fn command_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or_default()
}

/// Config pointing at a fingerprint file in `dir`, with fast polling.
pub fn config(dir: &tempfile::TempDir) -> ClientConfig {
    ClientConfig::new("192.0.2.10")
        .with_fingerprint_file(dir.path().join("fingerprints.json"))
        .with_poll_interval(Duration::from_millis(1))
}

pub fn client(dir: &tempfile::TempDir, transport: Arc<FakeTransport>) -> ManagementClient {
    client_with(config(dir), transport)
}

pub fn client_with(config: ClientConfig, transport: Arc<FakeTransport>) -> ManagementClient {
    ManagementClient::with_transport(config, transport).with_trust_prompt(AcceptAll)
}

pub fn body(request: &HttpRequest) -> Value {
    serde_json::from_str(&request.body).unwrap()
}
