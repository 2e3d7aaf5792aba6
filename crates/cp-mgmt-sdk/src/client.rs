// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ManagementClient for interacting with the management server web API.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::{ApiContext, ClientConfig};
use crate::error::{Result, SdkError};
use crate::http::{HttpMethod, HttpRequest, Transport, TransportSettings, UreqTransport};
use crate::publish::{AutoPublishCoordinator, CallCounters, PublishCycle};
use crate::query;
use crate::response::{ApiResponse, Payload};
use crate::task::{self, TaskPoller};
use crate::trust::{FingerprintStore, InteractivePrompt, TrustPolicy, TrustPrompt};
use crate::types::{CallOptions, Credentials, LoginOptions, Session};

const LOGIN_COMMAND: &str = "login";
const SHOW_TASK_COMMAND: &str = "show-task";
const PUBLISH_COMMAND: &str = "publish";
const SID_HEADER: &str = "X-chkp-sid";

/// How a request is dispatched.
#[derive(Debug, Clone)]
struct Dispatch {
    sid: Option<String>,
    wait_for_task: bool,
    use_proxy: bool,
    /// Internal calls bypass auto-publish accounting.
    internal: bool,
    method: HttpMethod,
}

/// Blocking client for the management server web API.
///
/// One client can be shared between threads. Each call verifies the server
/// certificate fingerprint, sends the request, follows asynchronous tasks and
/// takes part in auto-publish accounting.
pub struct ManagementClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    trust_store: FingerprintStore,
    trust_prompt: Arc<dyn TrustPrompt>,
    session: RwLock<Session>,
    fingerprint: RwLock<Option<String>>,
    api_version: RwLock<Option<String>>,
    auto_publish: AutoPublishCoordinator,
}

impl ManagementClient {
    /// Create a client that talks HTTPS through ureq and asks on the terminal
    /// before trusting an unknown certificate.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(UreqTransport::new()))
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Create a client on top of a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let session = Session {
            sid: config.session_id.clone().filter(|s| !s.is_empty()),
            domain: None,
        };

        Self {
            trust_store: FingerprintStore::new(config.fingerprint_file.clone()),
            trust_prompt: Arc::new(InteractivePrompt),
            session: RwLock::new(session),
            fingerprint: RwLock::new(config.fingerprint.clone().filter(|f| !f.is_empty())),
            api_version: RwLock::new(config.api_version.clone().filter(|v| !v.is_empty())),
            auto_publish: AutoPublishCoordinator::new(config.auto_publish_batch_size),
            transport,
            config,
        }
    }

    /// Replace the strategy used to decide on unknown or changed fingerprints.
    pub fn with_trust_prompt(mut self, prompt: impl TrustPrompt + 'static) -> Self {
        self.trust_prompt = Arc::new(prompt);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn server(&self) -> &str {
        &self.config.server
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn is_port_default(&self) -> bool {
        self.config.is_port_default()
    }

    pub fn context(&self) -> ApiContext {
        self.config.context
    }

    pub fn is_proxy_used(&self) -> bool {
        self.config.is_proxy_used()
    }

    /// Session id of the last successful login.
    pub fn session_id(&self) -> Option<String> {
        self.session.read().sid.clone()
    }

    /// Domain of the last successful login.
    pub fn domain(&self) -> Option<String> {
        self.session.read().domain.clone()
    }

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// API version used in request URLs.
    pub fn api_version(&self) -> Option<String> {
        self.api_version.read().clone()
    }

    /// Fingerprint of the last verified server certificate.
    pub fn fingerprint(&self) -> Option<String> {
        self.fingerprint.read().clone()
    }

    pub fn trust_store(&self) -> &FingerprintStore {
        &self.trust_store
    }

    // =========================================================================
    // Setters
    // =========================================================================

    pub fn set_port(&mut self, port: u16) {
        self.config.port = port;
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.config.poll_interval = interval;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    pub fn auto_publish_batch_size(&self) -> i64 {
        self.auto_publish.batch_size()
    }

    /// Set the auto-publish batch size. 0 or less disables auto-publish.
    pub fn set_auto_publish_batch_size(&self, batch_size: i64) {
        self.auto_publish.set_batch_size(batch_size);
    }

    pub fn disable_auto_publish(&self) {
        self.auto_publish.disable();
    }

    pub fn reset_total_calls_counter(&self) {
        self.auto_publish.reset_total_calls();
    }

    /// Current auto-publish accounting.
    pub fn auto_publish_counters(&self) -> CallCounters {
        self.auto_publish.counters()
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Log in and remember the returned session.
    ///
    /// `continue-last-session` and `read-only` are only sent to the web API.
    /// When no API version is configured the server's version is adopted.
    #[instrument(skip(self, credentials, options), fields(server = %self.config.server))]
    pub fn login(&self, credentials: Credentials, options: LoginOptions) -> Result<ApiResponse> {
        let domain = options.domain.filter(|d| !d.is_empty());

        let mut payload = credentials.into_payload();
        if self.config.context == ApiContext::WebApi {
            payload.insert(
                "continue-last-session".to_string(),
                json!(options.continue_last_session),
            );
            payload.insert("read-only".to_string(), json!(options.read_only));
        }
        if let Some(domain) = &domain {
            payload.insert("domain".to_string(), json!(domain));
        }
        payload.extend(options.payload);

        let response = self.api_call(
            LOGIN_COMMAND,
            payload,
            Dispatch {
                sid: None,
                wait_for_task: true,
                use_proxy: self.is_proxy_used(),
                internal: true,
                method: HttpMethod::Post,
            },
        )?;

        if response.success {
            let sid = response.get_str("sid").ok_or_else(|| {
                SdkError::UnexpectedResponse("login response has no sid".to_string())
            })?;
            *self.session.write() = Session {
                sid: Some(sid.to_string()),
                domain,
            };

            let mut version = self.api_version.write();
            if version.is_none()
                && let Some(server_version) = response.get_str("api-server-version")
            {
                *version = Some(server_version.to_string());
            }
            info!(api_version = ?*version, "logged in");
        } else {
            warn!("login failed");
        }

        Ok(response)
    }

    /// Log in with an administrator name and password.
    pub fn login_with_password(
        &self,
        user: &str,
        password: &str,
        options: LoginOptions,
    ) -> Result<ApiResponse> {
        self.login(Credentials::password(user, password), options)
    }

    /// Log in with an API key.
    pub fn login_with_api_key(&self, api_key: &str, options: LoginOptions) -> Result<ApiResponse> {
        self.login(Credentials::api_key(api_key), options)
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Run a command on the server.
    ///
    /// The method is validated before any network I/O. Unless
    /// `options.wait_for_task` is false, a returned `task-id` or `tasks` list
    /// is followed until the work completes and the `show-task` result is
    /// returned instead.
    #[instrument(skip(self, payload, options), fields(command = %command))]
    pub fn call(&self, command: &str, payload: Payload, options: CallOptions) -> Result<ApiResponse> {
        let method: HttpMethod = options.method.parse()?;
        let use_proxy = options.use_proxy.unwrap_or_else(|| self.is_proxy_used());

        self.api_call(
            command,
            payload,
            Dispatch {
                sid: options.sid,
                wait_for_task: options.wait_for_task,
                use_proxy,
                internal: false,
                method,
            },
        )
    }

    /// `call` with the session's sid, task waiting and default proxy use.
    pub fn call_simple(&self, command: &str, payload: Payload) -> Result<ApiResponse> {
        self.call(command, payload, CallOptions::default())
    }

    /// Wait for a task returned by a call made with `wait_for_task` off.
    pub fn await_task(&self, task_id: &str) -> Result<ApiResponse> {
        self.poller()
            .await_task(task_id, |payload| self.show_task(None, payload))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetch every object of a `show-*` listing command.
    ///
    /// `container_key` defaults to `objects`. See [`query::query_objects`] for
    /// the shape of the returned data.
    #[instrument(skip(self, payload), fields(command = %command))]
    pub fn query(
        &self,
        command: &str,
        details_level: &str,
        container_key: Option<&str>,
        include_container_key: bool,
        payload: Payload,
    ) -> Result<ApiResponse> {
        query::query_objects(
            details_level,
            container_key,
            include_container_key,
            payload,
            |page| self.query_page(command, page),
        )
    }

    /// Fetch every object of a listing command, returning each round.
    #[instrument(skip(self, payload), fields(command = %command))]
    pub fn query_all(
        &self,
        command: &str,
        details_level: &str,
        container_keys: &[&str],
        payload: Payload,
    ) -> Result<Vec<ApiResponse>> {
        query::query_all(details_level, container_keys, payload, |page| {
            self.query_page(command, page)
        })
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn poller(&self) -> TaskPoller {
        TaskPoller::new(self.config.poll_interval)
    }

    fn internal_dispatch(&self, wait_for_task: bool) -> Dispatch {
        Dispatch {
            sid: None,
            wait_for_task,
            use_proxy: self.is_proxy_used(),
            internal: true,
            method: HttpMethod::Post,
        }
    }

    /// Internal `show-task` under `sid`, or the session's sid when `None`.
    fn show_task(&self, sid: Option<&str>, payload: &Payload) -> Result<ApiResponse> {
        let dispatch = Dispatch {
            sid: sid.map(str::to_string),
            ..self.internal_dispatch(false)
        };
        self.api_call(SHOW_TASK_COMMAND, payload.clone(), dispatch)
    }

    fn query_page(&self, command: &str, payload: &Payload) -> Result<ApiResponse> {
        self.api_call(command, payload.clone(), self.internal_dispatch(false))
    }

    fn api_call(&self, command: &str, payload: Payload, dispatch: Dispatch) -> Result<ApiResponse> {
        let pinned_fingerprint = self.verify_server()?;

        let sid = dispatch
            .sid
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.session_id());
        let request = self.build_request(command, &payload, sid.as_deref(), dispatch.method)?;
        let settings = TransportSettings {
            timeout: self.config.timeout,
            proxy: self
                .config
                .proxy
                .clone()
                .filter(|_| dispatch.use_proxy),
            pinned_fingerprint,
            debug_level: self.config.http_debug_level,
        };

        let permit = if dispatch.internal {
            None
        } else {
            self.auto_publish.admit()
        };

        let result = self.execute(
            command,
            &request,
            &settings,
            sid.as_deref(),
            dispatch.wait_for_task,
        );

        if let Some(permit) = permit
            && let Some(cycle) = self.auto_publish.complete(permit)
        {
            self.run_auto_publish(cycle);
        }

        result
    }

    fn execute(
        &self,
        command: &str,
        request: &HttpRequest,
        settings: &TransportSettings,
        sid: Option<&str>,
        wait_for_task: bool,
    ) -> Result<ApiResponse> {
        let response = ApiResponse::from_http(self.transport.send(request, settings)?);

        if !wait_for_task || !response.success || command == SHOW_TASK_COMMAND {
            return Ok(response);
        }

        if let Some(task_id) = response.get_str("task-id") {
            debug!(task_id = %task_id, "following task");
            return self
                .poller()
                .await_task(task_id, |payload| self.show_task(sid, payload));
        }

        if let Some(tasks) = response.get("tasks") {
            let task_ids = task::task_ids(tasks);
            if !task_ids.is_empty() {
                debug!(count = task_ids.len(), "following tasks");
                let combined = self
                    .poller()
                    .await_tasks(&task_ids, |payload| self.show_task(sid, payload));
                return Ok(combined.unwrap_or(response));
            }
        }

        Ok(response)
    }

    /// Probe the server certificate and check it against the trust store.
    ///
    /// Returns the fingerprint the request must be pinned to, or `None` when
    /// certificate checks are disabled.
    fn verify_server(&self) -> Result<Option<String>> {
        if self.config.ignore_server_certificate {
            return Ok(None);
        }

        let presented =
            self.transport
                .probe_fingerprint(&self.config.server, self.config.port, self.config.timeout)?;
        let pinned = self.fingerprint();
        let policy = TrustPolicy {
            ignore_server_certificate: self.config.ignore_server_certificate,
            accept_server_certificate: self.config.accept_server_certificate,
        };

        let decision = self.trust_store.verify(
            &self.config.server,
            &presented,
            pinned.as_deref(),
            &policy,
            self.trust_prompt.as_ref(),
        )?;
        if !decision.is_trusted() {
            return Err(SdkError::UntrustedCertificate {
                server: self.config.server.clone(),
            });
        }

        *self.fingerprint.write() = Some(presented.clone());
        Ok(Some(presented))
    }

    /// Full URL of a command:
    /// `https://{server}:{port}[/{mgmt-id}]/{context}[/v{version}]/{command}`.
    pub fn url_for(&self, command: &str) -> String {
        let mut url = format!("https://{}:{}", self.config.server, self.config.port);

        if let Some(id) = self.config.cloud_mgmt_id.as_deref().filter(|s| !s.is_empty()) {
            url.push('/');
            url.push_str(id);
        }

        url.push('/');
        url.push_str(self.config.context.as_str());

        if let Some(version) = self.api_version() {
            url.push_str("/v");
            url.push_str(&version);
        }

        url.push('/');
        url.push_str(command);
        url
    }

    fn build_request(
        &self,
        command: &str,
        payload: &Payload,
        sid: Option<&str>,
        method: HttpMethod,
    ) -> Result<HttpRequest> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), self.config.user_agent.clone()),
            ("Accept".to_string(), "*/*".to_string()),
        ];
        if command != LOGIN_COMMAND
            && let Some(sid) = sid
        {
            headers.push((SID_HEADER.to_string(), sid.to_string()));
        }

        Ok(HttpRequest {
            method,
            url: self.url_for(command),
            headers,
            body: serde_json::to_string(payload)?,
        })
    }

    fn run_auto_publish(&self, cycle: PublishCycle<'_>) {
        cycle.wait_for_idle();

        info!("start auto publish");
        let result = self.api_call(PUBLISH_COMMAND, Payload::new(), self.internal_dispatch(true));
        match result {
            Ok(response) if response.success => info!("auto publish finished successfully"),
            Ok(response) => warn!(
                error = response.error_message.as_deref().unwrap_or_default(),
                "auto publish failed"
            ),
            Err(e) => warn!(error = %e, "auto publish failed"),
        }

        drop(cycle);
    }
}

impl std::fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementClient")
            .field("config", &self.config)
            .field("session", &*self.session.read())
            .field("fingerprint", &*self.fingerprint.read())
            .field("auto_publish", &self.auto_publish.counters())
            .finish_non_exhaustive()
    }
}
