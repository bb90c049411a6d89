#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tallykeep::cache::DurableCache;
use tallykeep::remote::memory::MemoryRemote;
use tallykeep::sync::RetryPolicy;

pub fn memory_cache() -> Arc<DurableCache> {
    Arc::new(DurableCache::in_memory().expect("in-memory cache"))
}

pub fn memory_remote() -> Arc<MemoryRemote> {
    Arc::new(MemoryRemote::new())
}

pub fn doc(value: Value) -> Map<String, Value> {
    value.as_object().expect("object literal").clone()
}

pub fn expense_doc(amount: f64, description: &str) -> Map<String, Value> {
    doc(json!({
        "amount": amount,
        "description": description,
        "category": "food",
        "paymentMethod": "cash",
        "paidBy": "primary",
        "date": "2026-04-05",
    }))
}

pub fn goal_doc(name: &str, target: f64) -> Map<String, Value> {
    doc(json!({
        "name": name,
        "targetAmount": target,
        "currentAmount": 0.0,
        "icon": "target",
    }))
}

/// Reconnect pacing small enough for tests to ride through several retry
/// rounds without stalling the suite.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        base: Duration::from_millis(20),
        max: Duration::from_millis(100),
    }
}

/// Poll until `condition` holds; panics after two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}
