// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fingerprint trust store tests.

use std::fs;
use std::sync::Arc;
use std::thread;

use cp_mgmt_sdk::{FingerprintStore, RejectAll, TrustDecision, TrustPolicy};
use cp_mgmt_sdk::tls::{fingerprint_of, fingerprints_match};

#[test]
fn test_record_and_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let store = FingerprintStore::new(dir.path().join("fingerprints.json"));

    store.record("X", "AA:BB:CC").unwrap();

    assert_eq!(store.get("X").unwrap().as_deref(), Some("AA:BB:CC"));
    assert_eq!(store.get("Y").unwrap(), None);

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(on_disk, serde_json::json!({"X": "AA:BB:CC"}));
}

#[test]
fn test_identical_record_does_not_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = FingerprintStore::new(dir.path().join("fingerprints.json"));
    store.record("X", "AA:BB:CC").unwrap();
    let before = fs::metadata(store.path()).unwrap().modified().unwrap();

    thread::sleep(std::time::Duration::from_millis(20));
    assert!(!store.record("X", "AA:BB:CC").unwrap());

    let after = fs::metadata(store.path()).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fingerprints.json");
    FingerprintStore::new(&path).record("mgmt-1", "01:02").unwrap();
    FingerprintStore::new(&path).record("mgmt-2", "03:04").unwrap();

    let store = FingerprintStore::new(&path);
    let all = store.load().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["mgmt-1"], "01:02");
}

#[test]
fn test_concurrent_records_keep_all_servers() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FingerprintStore::new(dir.path().join("fingerprints.json")));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .record(&format!("server-{}", i), &format!("{:02X}", i))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.load().unwrap().len(), 8);
}

#[test]
fn test_fingerprint_format() {
    let fp = fingerprint_of(b"certificate bytes");
    assert_eq!(fp.len(), 59);
    assert_eq!(fp.matches(':').count(), 19);
    assert_eq!(fp, fp.to_uppercase());
    assert!(fingerprints_match(&fp, &fp.replace(':', "").to_lowercase()));
}

fn modified(store: &FingerprintStore) -> std::time::SystemTime {
    fs::metadata(store.path()).unwrap().modified().unwrap()
}

#[test]
fn test_verify_twice_same_decision_no_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = FingerprintStore::new(dir.path().join("fingerprints.json"));
    let policy = TrustPolicy::default();

    let first = store.verify("X", "AA:BB", None, &policy, &RejectAll).unwrap();
    let before = modified(&store);
    let content = fs::read_to_string(store.path()).unwrap();

    thread::sleep(std::time::Duration::from_millis(20));
    let second = store.verify("X", "AA:BB", None, &policy, &RejectAll).unwrap();

    assert_eq!(first, TrustDecision::Trusted);
    assert_eq!(first, second);
    assert_eq!(modified(&store), before);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), content);
}

#[test]
fn test_verify_after_accepted_change_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = FingerprintStore::new(dir.path().join("fingerprints.json"));
    store.record("X", "AA:BB").unwrap();
    let accept = TrustPolicy {
        accept_server_certificate: true,
        ..Default::default()
    };

    let first = store.verify("X", "CC:DD", None, &accept, &RejectAll).unwrap();
    assert_eq!(first, TrustDecision::Trusted);
    assert_eq!(store.get("X").unwrap().as_deref(), Some("CC:DD"));
    let before = modified(&store);

    thread::sleep(std::time::Duration::from_millis(20));
    let second = store
        .verify("X", "CC:DD", None, &TrustPolicy::default(), &RejectAll)
        .unwrap();

    assert_eq!(second, TrustDecision::Trusted);
    assert_eq!(modified(&store), before);
}
