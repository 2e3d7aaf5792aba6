// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Option, credential and response tests for cp-mgmt-sdk.

use cp_mgmt_sdk::{
    ApiContext, ApiResponse, CallOptions, Credentials, HttpMethod, HttpResponse, LoginOptions,
};
use serde_json::json;

#[test]
fn test_password_credentials_payload() {
    let payload = Credentials::password("admin", "secret").into_payload();
    assert_eq!(payload["user"], json!("admin"));
    assert_eq!(payload["password"], json!("secret"));
    assert!(!payload.contains_key("api-key"));
}

#[test]
fn test_api_key_credentials_payload() {
    let payload = Credentials::api_key("k3y").into_payload();
    assert_eq!(payload["api-key"], json!("k3y"));
    assert_eq!(payload.len(), 1);
}

#[test]
fn test_credentials_debug_hides_secrets() {
    let debug = format!("{:?}", Credentials::password("admin", "secret"));
    assert!(debug.contains("admin"));
    assert!(!debug.contains("secret"));

    let debug = format!("{:?}", Credentials::api_key("k3y"));
    assert!(!debug.contains("k3y"));
}

#[test]
fn test_login_options_builder() {
    let options = LoginOptions::new()
        .with_domain("Global")
        .with_read_only(true)
        .with_field("session-name", "nightly");

    assert_eq!(options.domain.as_deref(), Some("Global"));
    assert!(options.read_only);
    assert!(!options.continue_last_session);
    assert_eq!(options.payload["session-name"], json!("nightly"));
}

#[test]
fn test_call_options_defaults() {
    let options = CallOptions::default();
    assert!(options.wait_for_task);
    assert_eq!(options.method, "POST");
    assert!(options.sid.is_none());
    assert!(options.use_proxy.is_none());

    let options = CallOptions::new()
        .with_sid("abc")
        .with_wait_for_task(false)
        .with_method("GET")
        .with_proxy(false);
    assert_eq!(options.sid.as_deref(), Some("abc"));
    assert!(!options.wait_for_task);
    assert_eq!(options.use_proxy, Some(false));
}

#[test]
fn test_http_method_is_exact() {
    assert_eq!("PUT".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
    assert!("post".parse::<HttpMethod>().is_err());
    assert_eq!(HttpMethod::default(), HttpMethod::Post);
}

#[test]
fn test_api_context_names() {
    assert_eq!(ApiContext::WebApi.as_str(), "web_api");
    assert_eq!(ApiContext::GaiaApi.to_string(), "gaia_api");
    assert_eq!("gaia_api".parse::<ApiContext>().unwrap(), ApiContext::GaiaApi);
}

#[test]
fn test_response_from_error_status() {
    let res = ApiResponse::from_http(HttpResponse {
        status: 409,
        headers: Vec::new(),
        body: json!({
            "code": "err_validation_failed",
            "message": "Validation failed",
            "errors": [{"message": "More than one object named 'web-01' exists."}]
        })
        .to_string(),
    });

    assert!(!res.success);
    assert_eq!(res.status_code, Some(409));
    let message = res.error_message.unwrap();
    assert!(message.contains("Status: 409"));
    assert!(message.contains("err_validation_failed"));
    assert!(message.contains("More than one object named 'web-01' exists."));
}

#[test]
fn test_response_from_non_json_body() {
    let res = ApiResponse::from_http(HttpResponse {
        status: 200,
        headers: Vec::new(),
        body: "<html>gateway timeout</html>".to_string(),
    });

    assert!(!res.success);
    assert!(res.data.is_empty());
    assert_eq!(res.raw_body, "<html>gateway timeout</html>");
}
