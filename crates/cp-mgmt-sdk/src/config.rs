// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the management client.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SdkError};

/// Default HTTPS port of the management server.
pub const DEFAULT_PORT: u16 = 443;
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default interval between `show-task` polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Recommended auto-publish batch size. Auto-publish is off unless configured.
pub const DEFAULT_AUTO_PUBLISH_BATCH_SIZE: i64 = 100;
/// Default name of the local fingerprint trust file.
pub const DEFAULT_FINGERPRINT_FILE: &str = "fingerprints.json";
/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("cp-mgmt-sdk/", env!("CARGO_PKG_VERSION"));

/// The API the client talks to on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiContext {
    /// Management web API (`web_api`).
    #[default]
    WebApi,
    /// Gaia OS API (`gaia_api`).
    GaiaApi,
}

impl ApiContext {
    /// URL path segment for this context.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiContext::WebApi => "web_api",
            ApiContext::GaiaApi => "gaia_api",
        }
    }
}

impl fmt::Display for ApiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiContext {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "web_api" => Ok(ApiContext::WebApi),
            "gaia_api" => Ok(ApiContext::GaiaApi),
            other => Err(SdkError::Config(format!("unknown API context: {}", other))),
        }
    }
}

/// How much of each HTTP exchange is logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpDebugLevel {
    #[default]
    Off,
    /// Method, URL and status.
    Basic,
    /// Also request and response bodies.
    Verbose,
}

impl FromStr for HttpDebugLevel {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "off" | "none" => Ok(HttpDebugLevel::Off),
            "basic" | "debug" => Ok(HttpDebugLevel::Basic),
            "verbose" | "trace" => Ok(HttpDebugLevel::Verbose),
            other => Err(SdkError::Config(format!("unknown HTTP debug level: {}", other))),
        }
    }
}

/// HTTP proxy used for API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Proxy URL in the form ureq expects.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Configuration for the ManagementClient.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Management server host name or IP address.
    pub server: String,
    /// HTTPS port (default: 443).
    pub port: u16,
    /// API context (default: `web_api`).
    pub context: ApiContext,
    /// API version; adopted from the login response when unset.
    pub api_version: Option<String>,
    /// Optional proxy for API calls.
    pub proxy: Option<ProxyConfig>,
    /// Per-request timeout (default: 10s).
    pub timeout: Duration,
    /// Interval between task status polls (default: 2s).
    pub poll_interval: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Smart-1 Cloud management id, inserted as the first path segment.
    pub cloud_mgmt_id: Option<String>,
    /// Publish automatically after this many calls. 0 or less disables it.
    pub auto_publish_batch_size: i64,
    /// Skip certificate fingerprint checks entirely.
    pub ignore_server_certificate: bool,
    /// Accept and store a changed fingerprint without asking.
    pub accept_server_certificate: bool,
    /// Fingerprint the caller expects the server to present.
    pub fingerprint: Option<String>,
    /// Session id to use before (or instead of) a login.
    pub session_id: Option<String>,
    /// HTTP logging verbosity.
    pub http_debug_level: HttpDebugLevel,
    /// Local fingerprint trust file.
    pub fingerprint_file: PathBuf,
}

impl ClientConfig {
    /// Create a new configuration for the given server with default values.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            context: ApiContext::default(),
            api_version: None,
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cloud_mgmt_id: None,
            auto_publish_batch_size: 0,
            ignore_server_certificate: false,
            accept_server_certificate: false,
            fingerprint: None,
            session_id: None,
            http_debug_level: HttpDebugLevel::default(),
            fingerprint_file: PathBuf::from(DEFAULT_FINGERPRINT_FILE),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHECKPOINT_SERVER`: Server address (required)
    /// - `CHECKPOINT_PORT`: HTTPS port (default: 443)
    /// - `CHECKPOINT_CONTEXT`: `web_api` or `gaia_api` (default: `web_api`)
    /// - `CHECKPOINT_API_VERSION`: API version (default: server version)
    /// - `CHECKPOINT_TIMEOUT`: Request timeout in seconds (default: 10)
    /// - `CHECKPOINT_PROXY_HOST` / `CHECKPOINT_PROXY_PORT`: Proxy, used only when both are set
    /// - `CHECKPOINT_CLOUD_MGMT_ID`: Smart-1 Cloud management id
    /// - `CHECKPOINT_AUTO_PUBLISH_BATCH_SIZE`: Auto-publish batch size (default: 0, disabled)
    /// - `CHECKPOINT_IGNORE_SERVER_CERTIFICATE`: Skip fingerprint checks (default: false)
    /// - `CHECKPOINT_ACCEPT_SERVER_CERTIFICATE`: Accept changed fingerprints (default: false)
    /// - `CHECKPOINT_FINGERPRINT_FILE`: Trust file path (default: `fingerprints.json`)
    pub fn from_env() -> Result<Self> {
        let server = env::var("CHECKPOINT_SERVER")
            .map_err(|_| SdkError::Config("CHECKPOINT_SERVER is required".to_string()))?;

        let mut config = Self::new(server);

        if let Some(port) = parse_env::<u16>("CHECKPOINT_PORT")? {
            config.port = port;
        }
        if let Ok(context) = env::var("CHECKPOINT_CONTEXT") {
            config.context = context.parse()?;
        }
        config.api_version = env::var("CHECKPOINT_API_VERSION")
            .ok()
            .filter(|v| !v.is_empty());
        if let Some(secs) = parse_env::<u64>("CHECKPOINT_TIMEOUT")? {
            config.timeout = Duration::from_secs(secs);
        }

        let proxy_host = env::var("CHECKPOINT_PROXY_HOST")
            .ok()
            .filter(|v| !v.is_empty());
        let proxy_port = parse_env::<u16>("CHECKPOINT_PROXY_PORT")?;
        if let (Some(host), Some(port)) = (proxy_host, proxy_port) {
            config.proxy = Some(ProxyConfig::new(host, port));
        }

        config.cloud_mgmt_id = env::var("CHECKPOINT_CLOUD_MGMT_ID")
            .ok()
            .filter(|v| !v.is_empty());
        if let Some(batch) = parse_env::<i64>("CHECKPOINT_AUTO_PUBLISH_BATCH_SIZE")? {
            config.auto_publish_batch_size = batch;
        }
        config.ignore_server_certificate = env_flag("CHECKPOINT_IGNORE_SERVER_CERTIFICATE");
        config.accept_server_certificate = env_flag("CHECKPOINT_ACCEPT_SERVER_CERTIFICATE");
        if let Ok(path) = env::var("CHECKPOINT_FINGERPRINT_FILE") {
            config.fingerprint_file = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Returns true when the port is the default HTTPS port.
    pub fn is_port_default(&self) -> bool {
        self.port == DEFAULT_PORT
    }

    /// Returns true when API calls go through a proxy.
    pub fn is_proxy_used(&self) -> bool {
        self.proxy.is_some()
    }

    /// Set the HTTPS port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the API context.
    pub fn with_context(mut self, context: ApiContext) -> Self {
        self.context = context;
        self
    }

    /// Pin the API version instead of adopting the server's.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Route API calls through an HTTP proxy.
    pub fn with_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some(ProxyConfig::new(host, port));
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the task poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the cloud management id.
    pub fn with_cloud_mgmt_id(mut self, id: impl Into<String>) -> Self {
        self.cloud_mgmt_id = Some(id.into());
        self
    }

    /// Set the auto-publish batch size. 0 or less disables auto-publish.
    pub fn with_auto_publish_batch_size(mut self, batch_size: i64) -> Self {
        self.auto_publish_batch_size = batch_size;
        self
    }

    /// Skip certificate fingerprint checks (development only!).
    pub fn with_ignore_server_certificate(mut self, ignore: bool) -> Self {
        self.ignore_server_certificate = ignore;
        self
    }

    /// Accept changed server fingerprints without prompting.
    pub fn with_accept_server_certificate(mut self, accept: bool) -> Self {
        self.accept_server_certificate = accept;
        self
    }

    /// Expect the server to present this fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Reuse an existing session id.
    pub fn with_session_id(mut self, sid: impl Into<String>) -> Self {
        self.session_id = Some(sid.into());
        self
    }

    /// Set the HTTP debug level.
    pub fn with_http_debug_level(mut self, level: HttpDebugLevel) -> Self {
        self.http_debug_level = level;
        self
    }

    /// Set the fingerprint trust file path.
    pub fn with_fingerprint_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fingerprint_file = path.into();
        self
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map(Some)
            .map_err(|e| SdkError::Config(format!("invalid {}: {}", name, e))),
        _ => Ok(None),
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}
