//! In-process reference backend for the remote-store boundary.
//!
//! Backs the integration tests and works as a standalone single-process
//! store. Every mutation fans a fresh full-collection snapshot out to the
//! live subscribers, and an offline toggle simulates an outage: writes fail
//! and open subscriptions receive an error and close.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    FieldOp, Patch, QueryOptions, RawDocument, RemoteError, RemoteStore, Subscription,
    SubscriptionEvent,
};
use crate::id::new_uuid_v7;
use crate::time::now_iso;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct StoredCollection {
    docs: Vec<RawDocument>,
    watchers: Vec<Watcher>,
}

struct Watcher {
    query: QueryOptions,
    sender: mpsc::Sender<SubscriptionEvent>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, StoredCollection>,
    offline: bool,
}

#[derive(Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        MemoryRemote::default()
    }

    /// Simulate connectivity loss or recovery. Going offline drops every
    /// live subscription with an error; recovery takes effect on the next
    /// subscribe call.
    pub fn set_offline(&self, offline: bool) {
        let mut inner = self.lock();
        inner.offline = offline;
        if offline {
            for state in inner.collections.values_mut() {
                for watcher in state.watchers.drain(..) {
                    let _ = watcher.sender.try_send(SubscriptionEvent::Error(
                        RemoteError::Unavailable("simulated outage".into()),
                    ));
                }
            }
        }
    }

    /// Current contents of a collection, unordered, for inspection.
    pub fn documents(&self, collection: &str) -> Vec<RawDocument> {
        let inner = self.lock();
        inner
            .collections
            .get(collection)
            .map(|state| state.docs.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, collection: &str) -> usize {
        let inner = self.lock();
        inner
            .collections
            .get(collection)
            .map(|state| state.docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(state: &mut StoredCollection) {
        let docs = state.docs.clone();
        state.watchers.retain(|watcher| {
            let snapshot = ordered_docs(&docs, &watcher.query);
            match watcher
                .sender
                .try_send(SubscriptionEvent::Snapshot(snapshot))
            {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Snapshots are full-state; a lagging subscriber just
                    // misses an intermediate one.
                    debug!(target: "tallykeep", event = "memory_remote_snapshot_dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

fn ordered_docs(docs: &[RawDocument], query: &QueryOptions) -> Vec<RawDocument> {
    let mut docs = docs.to_vec();
    if let Some(order) = &query.order_by {
        docs.sort_by(|a, b| {
            let ord = compare_field(a.data.get(&order.field), b.data.get(&order.field));
            if order.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
    docs
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(_), Some(_)) => Ordering::Equal,
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn subscribe(
        &self,
        collection: &str,
        query: QueryOptions,
    ) -> Result<Subscription, RemoteError> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(RemoteError::subscription(collection, "store is offline"));
        }
        let state = inner.collections.entry(collection.to_string()).or_default();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let initial = ordered_docs(&state.docs, &query);
        let _ = sender.try_send(SubscriptionEvent::Snapshot(initial));
        state.watchers.push(Watcher { query, sender });
        Ok(Subscription::new(receiver))
    }

    async fn add(
        &self,
        collection: &str,
        mut document: Map<String, Value>,
    ) -> Result<String, RemoteError> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(RemoteError::write(collection, "store is offline"));
        }
        // The store owns identifiers and creation stamps.
        document.remove("id");
        document
            .entry("createdAt".to_string())
            .or_insert_with(|| Value::String(now_iso()));
        let id = new_uuid_v7();
        let state = inner.collections.entry(collection.to_string()).or_default();
        state.docs.push(RawDocument {
            id: id.clone(),
            data: document,
        });
        Self::notify(state);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(RemoteError::write(collection, "store is offline"));
        }
        let state = inner.collections.entry(collection.to_string()).or_default();
        let doc = state
            .docs
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| RemoteError::write(collection, format!("no document {id}")))?;
        for (field, op) in patch.iter() {
            match op {
                FieldOp::Set(value) => {
                    doc.data.insert(field.clone(), value.clone());
                }
                FieldOp::Delete => {
                    doc.data.remove(field);
                }
            }
        }
        doc.data
            .insert("updatedAt".to_string(), Value::String(now_iso()));
        Self::notify(state);
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(RemoteError::write(collection, "store is offline"));
        }
        let state = inner.collections.entry(collection.to_string()).or_default();
        state.docs.retain(|doc| doc.id != id);
        Self::notify(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(fields: Value) -> Map<String, Value> {
        fields.as_object().expect("object literal").clone()
    }

    #[tokio::test]
    async fn add_assigns_id_and_creation_stamp() {
        let remote = MemoryRemote::new();
        let id = remote
            .add("expenses", doc(json!({ "amount": 10.0 })))
            .await
            .unwrap();
        let docs = remote.documents("expenses");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert!(docs[0].data.contains_key("createdAt"));
        assert!(!docs[0].data.contains_key("id"));
    }

    #[tokio::test]
    async fn add_preserves_explicit_creation_stamp() {
        let remote = MemoryRemote::new();
        remote
            .add(
                "expenses",
                doc(json!({ "createdAt": "2020-01-01T00:00:00.000Z" })),
            )
            .await
            .unwrap();
        let docs = remote.documents("expenses");
        assert_eq!(
            docs[0].data.get("createdAt"),
            Some(&json!("2020-01-01T00:00:00.000Z"))
        );
    }

    #[tokio::test]
    async fn subscription_sees_initial_and_updated_snapshots() {
        let remote = MemoryRemote::new();
        remote
            .add("goals", doc(json!({ "name": "bike" })))
            .await
            .unwrap();

        let mut sub = remote
            .subscribe("goals", QueryOptions::default())
            .await
            .unwrap();
        match sub.next_event().await {
            Some(SubscriptionEvent::Snapshot(docs)) => assert_eq!(docs.len(), 1),
            other => panic!("expected initial snapshot, got {other:?}"),
        }

        remote
            .add("goals", doc(json!({ "name": "trip" })))
            .await
            .unwrap();
        match sub.next_event().await {
            Some(SubscriptionEvent::Snapshot(docs)) => assert_eq!(docs.len(), 2),
            other => panic!("expected second snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn order_by_descending_created_at() {
        let remote = MemoryRemote::new();
        remote
            .add(
                "incomes",
                doc(json!({ "createdAt": "2026-01-01T00:00:00.000Z", "amount": 1.0 })),
            )
            .await
            .unwrap();
        remote
            .add(
                "incomes",
                doc(json!({ "createdAt": "2026-02-01T00:00:00.000Z", "amount": 2.0 })),
            )
            .await
            .unwrap();

        let mut sub = remote
            .subscribe("incomes", QueryOptions::order_by_desc("createdAt"))
            .await
            .unwrap();
        match sub.next_event().await {
            Some(SubscriptionEvent::Snapshot(docs)) => {
                assert_eq!(docs[0].data.get("amount"), Some(&json!(2.0)));
                assert_eq!(docs[1].data.get("amount"), Some(&json!(1.0)));
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_sets_deletes_and_stamps() {
        let remote = MemoryRemote::new();
        let id = remote
            .add(
                "expenses",
                doc(json!({ "amount": 10.0, "thirdPartyName": "neighbour" })),
            )
            .await
            .unwrap();

        remote
            .update(
                "expenses",
                &id,
                Patch::new().set("amount", 12.0).delete("thirdPartyName"),
            )
            .await
            .unwrap();

        let docs = remote.documents("expenses");
        assert_eq!(docs[0].data.get("amount"), Some(&json!(12.0)));
        assert!(!docs[0].data.contains_key("thirdPartyName"));
        assert!(docs[0].data.contains_key("updatedAt"));
    }

    #[tokio::test]
    async fn update_unknown_document_fails() {
        let remote = MemoryRemote::new();
        let err = remote
            .update("expenses", "missing", Patch::new().set("amount", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Write { .. }));
    }

    #[tokio::test]
    async fn remove_unknown_document_is_a_noop() {
        let remote = MemoryRemote::new();
        remote.remove("expenses", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn offline_fails_writes_and_breaks_subscriptions() {
        let remote = MemoryRemote::new();
        let mut sub = remote
            .subscribe("expenses", QueryOptions::default())
            .await
            .unwrap();
        // Drain the initial snapshot.
        let _ = sub.next_event().await;

        remote.set_offline(true);
        match sub.next_event().await {
            Some(SubscriptionEvent::Error(RemoteError::Unavailable(_))) => {}
            other => panic!("expected outage error, got {other:?}"),
        }
        assert!(sub.next_event().await.is_none());

        let err = remote.add("expenses", Map::new()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Write { .. }));
        let err = remote
            .subscribe("expenses", QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Subscription { .. }));

        remote.set_offline(false);
        let mut sub = remote
            .subscribe("expenses", QueryOptions::default())
            .await
            .unwrap();
        match sub.next_event().await {
            Some(SubscriptionEvent::Snapshot(_)) => {}
            other => panic!("expected snapshot after recovery, got {other:?}"),
        }
    }
}
