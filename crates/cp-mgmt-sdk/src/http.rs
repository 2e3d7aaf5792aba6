// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP transport for the management client.
//!
//! The client describes each exchange as plain data ([`HttpRequest`] /
//! [`HttpResponse`]) and hands it to a [`Transport`]. [`UreqTransport`] is the
//! production implementation; tests plug in scripted transports.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{HttpDebugLevel, ProxyConfig};
use crate::error::{Result, SdkError};
use crate::tls;

/// HTTP methods accepted by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = SdkError;

    /// Method names are matched exactly, upper case only.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(SdkError::InvalidMethod(other.to_string())),
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    /// Value of the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Per-call transport settings.
#[derive(Debug, Clone, Default)]
pub struct TransportSettings {
    pub timeout: Duration,
    pub proxy: Option<ProxyConfig>,
    /// Fingerprint the live certificate must match. `None` disables pinning.
    pub pinned_fingerprint: Option<String>,
    pub debug_level: HttpDebugLevel,
}

/// Executes HTTP exchanges against the management server.
///
/// Implementations must not retry; a non-2xx status is a normal response.
pub trait Transport: Send + Sync {
    /// Send one request and return the server's answer.
    fn send(&self, request: &HttpRequest, settings: &TransportSettings) -> Result<HttpResponse>;

    /// Fetch the SHA-1 fingerprint of the certificate the server presents.
    fn probe_fingerprint(&self, server: &str, port: u16, timeout: Duration) -> Result<String>;
}

/// Blocking transport built on ureq and rustls.
#[derive(Debug, Default, Clone)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }

    /// Build an agent for one call: timeout, optional proxy and a TLS config
    /// that pins the given fingerprint.
    pub fn agent(&self, settings: &TransportSettings) -> Result<ureq::Agent> {
        let tls_config = tls::pinned_client_config(settings.pinned_fingerprint.clone())?;

        let mut builder = ureq::AgentBuilder::new()
            .timeout(settings.timeout)
            .tls_config(Arc::new(tls_config));

        if let Some(proxy) = &settings.proxy {
            let proxy = ureq::Proxy::new(proxy.url())
                .map_err(|e| SdkError::Config(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder.build())
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest, settings: &TransportSettings) -> Result<HttpResponse> {
        let agent = self.agent(settings)?;

        if settings.debug_level != HttpDebugLevel::Off {
            debug!(method = %request.method, url = %request.url, "sending HTTP request");
        }
        if settings.debug_level == HttpDebugLevel::Verbose {
            debug!(body = %request.body, "request body");
        }

        let mut req = agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }

        let response = match req.send_string(&request.body) {
            Ok(response) => response,
            // 4xx/5xx still carry a JSON body the caller needs.
            Err(ureq::Error::Status(_, response)) => response,
            Err(err) => return Err(err.into()),
        };

        let status = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = response.into_string()?;

        if settings.debug_level != HttpDebugLevel::Off {
            debug!(status, url = %request.url, "received HTTP response");
        }
        if settings.debug_level == HttpDebugLevel::Verbose {
            debug!(body = %body, "response body");
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn probe_fingerprint(&self, server: &str, port: u16, timeout: Duration) -> Result<String> {
        tls::probe_fingerprint(server, port, timeout)
    }
}
