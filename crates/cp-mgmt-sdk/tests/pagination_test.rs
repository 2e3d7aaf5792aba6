// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Query pagination through the client.

mod common;

use common::{FakeTransport, body, client};
use cp_mgmt_sdk::{Payload, SdkError};
use serde_json::{Value, json};

/// Serve `total` hosts in pages of the requested size.
fn serve_hosts(transport: &FakeTransport, command: &str, key: &'static str, total: u64) {
    transport.handle(command, move |req| {
        let offset = req["offset"].as_u64().unwrap_or(0);
        let limit = req["limit"].as_u64().unwrap_or(50);
        let to = (offset + limit).min(total);
        let objects: Vec<Value> = (offset..to)
            .map(|i| json!({"name": format!("host-{}", i), "type": "host"}))
            .collect();
        (
            200,
            json!({ key: objects, "from": offset + 1, "to": to, "total": total }),
        )
    });
}

#[test]
fn test_query_all_pages_through_every_object() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new();
    serve_hosts(&transport, "show-hosts", "objects", 120);
    let client = client(&dir, transport.clone());

    let rounds = client
        .query_all("show-hosts", "standard", &[], Payload::new())
        .unwrap();

    assert_eq!(rounds.len(), 3);
    assert_eq!(rounds[0].data["objects"].as_array().unwrap().len(), 50);
    assert_eq!(rounds[1].data["objects"].as_array().unwrap().len(), 50);
    assert_eq!(rounds[1].data["objects"][0]["name"], json!("host-50"));
    let last = rounds[2].data["objects"].as_array().unwrap();
    assert_eq!(last.len(), 120);
    assert_eq!(last[119]["name"], json!("host-119"));

    let offsets: Vec<Value> = transport
        .requests_for("show-hosts")
        .iter()
        .map(|r| body(r)["offset"].clone())
        .collect();
    assert_eq!(offsets, vec![json!(0), json!(50), json!(100)]);

    let first = body(&transport.requests_for("show-hosts")[0]);
    assert_eq!(first["limit"], json!(50));
    assert_eq!(first["details-level"], json!("standard"));
}

#[test]
fn test_query_keeps_caller_payload() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new();
    serve_hosts(&transport, "show-hosts", "objects", 3);
    let client = client(&dir, transport.clone());

    let mut payload = Payload::new();
    payload.insert("filter".into(), json!("web"));
    client
        .query("show-hosts", "uid", None, true, payload)
        .unwrap();

    let sent = body(&transport.requests_for("show-hosts")[0]);
    assert_eq!(sent["filter"], json!("web"));
    assert_eq!(sent["details-level"], json!("uid"));
}

#[test]
fn test_query_with_custom_container_key() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new();
    serve_hosts(&transport, "show-gateways-and-servers", "objects", 2);
    serve_hosts(&transport, "show-access-rulebase", "rulebase", 70);
    let client = client(&dir, transport);

    let res = client
        .query("show-access-rulebase", "standard", Some("rulebase"), true, Payload::new())
        .unwrap();
    assert_eq!(res.data["rulebase"].as_array().unwrap().len(), 70);
    assert_eq!(res.data["total"], json!(70));

    let res = client
        .query("show-gateways-and-servers", "standard", None, false, Payload::new())
        .unwrap();
    assert_eq!(res.data.len(), 2);
    assert_eq!(res.data["1"]["name"], json!("host-1"));
}

#[test]
fn test_missing_container_returns_single_round() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new();
    transport.respond("show-hosts", 200, json!({"total": 0}));
    let client = client(&dir, transport.clone());

    let rounds = client
        .query_all("show-hosts", "standard", &["objects"], Payload::new())
        .unwrap();

    assert_eq!(rounds.len(), 1);
    assert!(rounds[0].success);
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn test_missing_to_counts_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new();
    transport.respond("show-hosts", 200, json!({"objects": [], "total": 0}));
    let client = client(&dir, transport.clone());

    let rounds = client
        .query_all("show-hosts", "standard", &[], Payload::new())
        .unwrap();

    assert_eq!(rounds.len(), 1);
    assert!(rounds[0].data["objects"].as_array().unwrap().is_empty());
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn test_failed_round_ends_query() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new();
    transport.respond(
        "show-hosts",
        200,
        json!({"objects": [{"name": "a"}], "from": 1, "to": 1, "total": 3}),
    );
    transport.respond(
        "show-hosts",
        500,
        json!({"objects": [], "code": "generic_error", "message": "internal error"}),
    );
    let client = client(&dir, transport.clone());

    let rounds = client
        .query_all("show-hosts", "standard", &[], Payload::new())
        .unwrap();

    assert_eq!(rounds.len(), 2);
    assert!(rounds[0].success);
    assert!(!rounds[1].success);
    assert_eq!(transport.requests().len(), 2);
}

#[test]
fn test_untrusted_server_aborts_query() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::with_fingerprint("");
    let client = client(&dir, transport.clone());
    client
        .trust_store()
        .record("192.0.2.10", "AA:BB")
        .unwrap();

    let res = client.query_all("show-hosts", "standard", &[], Payload::new());

    assert!(matches!(res, Err(SdkError::UntrustedCertificate { .. })));
    assert!(transport.requests().is_empty());
}
