// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fetching complete object lists from paginated `show-*` commands.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::Result;
use crate::response::{ApiResponse, Payload};

/// Objects requested per round.
pub const QUERY_LIMIT: u64 = 50;
/// Container key used when the caller names none.
pub const DEFAULT_CONTAINER_KEY: &str = "objects";

/// Call `call` with increasing offsets until the server reports that every
/// object was delivered.
///
/// Each round keeps the page the server sent. The last successful round is
/// rewritten to carry, under each container key, every object received in
/// server order. The loop ends when the server's `total` equals its `to`
/// cursor (a missing `to` counts as 0), when the first answer lacks a
/// container key, when a round is unsuccessful, or when a round delivers no
/// objects at all. A transport error aborts the whole query.
pub fn query_all<F>(
    details_level: &str,
    container_keys: &[&str],
    payload: Payload,
    mut call: F,
) -> Result<Vec<ApiResponse>>
where
    F: FnMut(&Payload) -> Result<ApiResponse>,
{
    let keys: Vec<&str> = if container_keys.is_empty() {
        vec![DEFAULT_CONTAINER_KEY]
    } else {
        container_keys.to_vec()
    };

    let mut payload = payload;
    let mut offset = 0u64;
    let mut all_objects: BTreeMap<&str, Vec<Value>> =
        keys.iter().map(|k| (*k, Vec::new())).collect();
    let mut rounds = Vec::new();

    let mut response = call(page(&mut payload, offset, details_level))?;

    if keys.iter().any(|key| !response.data.contains_key(*key)) {
        rounds.push(response);
        return Ok(rounds);
    }

    loop {
        if !response.success {
            warn!(offset, "query round failed");
            attach_objects(&mut rounds, all_objects);
            rounds.push(response);
            return Ok(rounds);
        }

        let mut delivered = 0usize;
        for key in &keys {
            if let Some(Value::Array(items)) = response.data.get(*key) {
                delivered += items.len();
                all_objects
                    .entry(*key)
                    .or_default()
                    .extend(items.iter().cloned());
            }
        }

        let done = is_last_page(&response);
        debug!(offset, delivered, done, "query round received");
        rounds.push(response);

        if done {
            break;
        }
        if delivered == 0 {
            warn!(offset, "server reported more objects but sent none, stopping");
            break;
        }

        offset += QUERY_LIMIT;
        response = call(page(&mut payload, offset, details_level))?;
    }

    attach_objects(&mut rounds, all_objects);
    Ok(rounds)
}

/// Move the accumulated objects into the last round.
fn attach_objects(rounds: &mut [ApiResponse], all_objects: BTreeMap<&str, Vec<Value>>) {
    let Some(last) = rounds.last_mut() else {
        return;
    };
    for (key, objects) in all_objects {
        last.data.insert(key.to_string(), Value::Array(objects));
    }
}

/// Single-container query returning only the final round.
///
/// With `include_container_key` false a successful result is re-keyed as
/// `{"0": obj, "1": obj, ...}`; otherwise the server shape
/// `{container_key: [...], "total": n, ...}` is kept.
pub fn query_objects<F>(
    details_level: &str,
    container_key: Option<&str>,
    include_container_key: bool,
    payload: Payload,
    call: F,
) -> Result<ApiResponse>
where
    F: FnMut(&Payload) -> Result<ApiResponse>,
{
    let key = container_key
        .filter(|k| !k.is_empty())
        .unwrap_or(DEFAULT_CONTAINER_KEY);

    let Some(mut last) = query_all(details_level, &[key], payload, call)?.pop() else {
        return Ok(ApiResponse::default());
    };

    if last.success && !include_container_key {
        if let Some(Value::Array(objects)) = last.data.get(key) {
            last.data = objects
                .iter()
                .enumerate()
                .map(|(i, obj)| (i.to_string(), obj.clone()))
                .collect();
        }
    }

    Ok(last)
}

fn page<'a>(payload: &'a mut Payload, offset: u64, details_level: &str) -> &'a Payload {
    payload.insert("limit".to_string(), json!(QUERY_LIMIT));
    payload.insert("offset".to_string(), json!(offset));
    payload.insert("details-level".to_string(), json!(details_level));
    payload
}

fn is_last_page(response: &ApiResponse) -> bool {
    let zero = json!(0);
    let total = response.get("total");
    let to = response.get("to").unwrap_or(&zero);

    match (total.and_then(Value::as_f64), to.as_f64()) {
        (Some(total), Some(to)) => total == to,
        _ => total == Some(to),
    }
}
