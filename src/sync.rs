//! Synchronized collection manager.
//!
//! Each instance mirrors one remote collection into an in-memory view that
//! readers snapshot cheaply, backed by the durable cache. The view is seeded
//! synchronously from the cache at construction, replaced wholesale on every
//! delivered remote snapshot, and falls back to the cached copy when the
//! subscription degrades. A single owner task drives the subscription, so
//! there is never more than one live subscription per instance and readers
//! can never observe a partial view.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::cache::{self, DurableCache};
use crate::error::{AppError, AppResult};
use crate::model::{CollectionKind, Record, SCHEMA_VERSION};
use crate::remote::{
    Patch, QueryOptions, RawDocument, RemoteError, RemoteStore, SubscriptionEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Serving the cached snapshot, no remote attempt made yet.
    Initializing,
    Subscribing,
    /// Remote snapshots are flowing; the remote is the source of truth.
    Live,
    /// The subscription broke; serving the cached snapshot if there is one.
    Degraded,
    Retrying,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub error: Option<RemoteError>,
}

impl SyncStatus {
    pub fn is_live(&self) -> bool {
        self.state == SyncState::Live
    }
}

/// Reconnect pacing for a broken subscription. The loop itself is unbounded;
/// only the delay between attempts grows, doubling from `base` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            base: Duration::from_secs(2),
            max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn next(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

struct CacheSlot {
    cache: Arc<DurableCache>,
    key: &'static str,
}

struct Shared<T> {
    kind: CollectionKind,
    view: RwLock<Arc<Vec<T>>>,
    status: RwLock<SyncStatus>,
    cache: Option<CacheSlot>,
}

pub struct SyncedCollection<T: Record> {
    shared: Arc<Shared<T>>,
    remote: Arc<dyn RemoteStore>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<T: Record> SyncedCollection<T> {
    pub fn spawn(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<DurableCache>,
        query: QueryOptions,
    ) -> Self {
        Self::spawn_with_retry(remote, cache, query, RetryPolicy::default())
    }

    pub fn spawn_with_retry(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<DurableCache>,
        query: QueryOptions,
        retry: RetryPolicy,
    ) -> Self {
        let kind = T::KIND;
        let slot = cache::collection_key(kind).map(|key| CacheSlot { cache, key });
        // Seed from the cache before any remote round-trip so the UI never
        // starts from empty when saved data exists.
        let initial: Vec<T> = slot
            .as_ref()
            .map(|slot| decode_cached(slot.cache.snapshot(slot.key)))
            .unwrap_or_default();
        if !initial.is_empty() {
            info!(
                target: "tallykeep",
                event = "view_seeded_from_cache",
                collection = %kind,
                records = initial.len()
            );
        }
        let shared = Arc::new(Shared {
            kind,
            view: RwLock::new(Arc::new(initial)),
            status: RwLock::new(SyncStatus {
                state: SyncState::Initializing,
                error: None,
            }),
            cache: slot,
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop::<T>(
            remote.clone(),
            shared.clone(),
            query,
            retry,
            shutdown_rx,
        ));
        Self {
            shared,
            remote,
            shutdown,
            task,
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.shared.kind
    }

    /// Consistent snapshot of the current view. Cheap; the underlying vec is
    /// shared and replaced atomically by the owner task.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        read_view(&self.shared)
    }

    pub fn status(&self) -> SyncStatus {
        self.shared
            .status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn state(&self) -> SyncState {
        self.status().state
    }

    /// Pass-through insert. The view is not touched; it changes when the
    /// subscription delivers the resulting snapshot. The store assigns the
    /// identifier and the creation stamp; the schema-version tag is added
    /// here.
    pub async fn add(&self, mut document: Map<String, Value>) -> AppResult<String> {
        document.remove("id");
        document.insert(
            "schemaVersion".to_string(),
            Value::String(SCHEMA_VERSION.to_string()),
        );
        self.remote
            .add(self.shared.kind.name(), document)
            .await
            .map_err(|err| write_error(self.shared.kind, err))
    }

    /// Pass-through partial update; `Patch::delete` clears an optional
    /// field entirely.
    pub async fn update(&self, id: &str, patch: Patch) -> AppResult<()> {
        self.remote
            .update(self.shared.kind.name(), id, patch)
            .await
            .map_err(|err| write_error(self.shared.kind, err).with_context("id", id))
    }

    /// Pass-through delete. Terminal; there is no undo.
    pub async fn remove(&self, id: &str) -> AppResult<()> {
        self.remote
            .remove(self.shared.kind.name(), id)
            .await
            .map_err(|err| write_error(self.shared.kind, err).with_context("id", id))
    }

    /// Stop the owner task. The retry timer is cancellable, so a pending
    /// reconnect never fires after teardown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl<T: Record> Drop for SyncedCollection<T> {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
    }
}

fn write_error(kind: CollectionKind, err: RemoteError) -> AppError {
    AppError::new("REMOTE/WRITE", err.to_string()).with_context("collection", kind.name())
}

fn read_view<T: Clone>(shared: &Shared<T>) -> Arc<Vec<T>> {
    shared
        .view
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

fn write_view<T>(shared: &Shared<T>, records: Arc<Vec<T>>) {
    let mut view = shared.view.write().unwrap_or_else(|e| e.into_inner());
    *view = records;
}

fn set_state<T>(shared: &Shared<T>, state: SyncState) {
    let mut status = shared.status.write().unwrap_or_else(|e| e.into_inner());
    status.state = state;
}

fn set_status<T>(shared: &Shared<T>, next: SyncStatus) {
    let mut status = shared.status.write().unwrap_or_else(|e| e.into_inner());
    *status = next;
}

fn decode_cached<T: Record>(docs: Vec<Value>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match doc {
            Value::Object(map) => {
                let id = map
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(T::from_raw(&map, &id))
            }
            _ => None,
        })
        .collect()
}

fn encode_records<T: Record>(records: &[T]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| serde_json::to_value(record).ok())
        .collect()
}

fn apply_snapshot<T: Record>(shared: &Shared<T>, docs: Vec<RawDocument>) {
    let records: Vec<T> = docs
        .iter()
        .map(|doc| T::from_raw(&doc.data, &doc.id))
        .collect();
    let encoded = encode_records(&records);
    write_view(shared, Arc::new(records));
    set_status(
        shared,
        SyncStatus {
            state: SyncState::Live,
            error: None,
        },
    );
    if let Some(slot) = &shared.cache {
        slot.cache.store_snapshot(slot.key, &encoded);
    }
}

fn degrade<T: Record>(shared: &Shared<T>, error: RemoteError) {
    warn!(
        target: "tallykeep",
        event = "subscription_degraded",
        collection = %shared.kind,
        error = %error
    );
    // Never drop to an empty view while the cache still has records.
    if let Some(slot) = &shared.cache {
        let cached: Vec<T> = decode_cached(slot.cache.snapshot(slot.key));
        if !cached.is_empty() {
            write_view(shared, Arc::new(cached));
        }
    }
    set_status(
        shared,
        SyncStatus {
            state: SyncState::Degraded,
            error: Some(error),
        },
    );
}

async fn run_loop<T: Record>(
    remote: Arc<dyn RemoteStore>,
    shared: Arc<Shared<T>>,
    query: QueryOptions,
    retry: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = retry.base;
    loop {
        if *shutdown.borrow() {
            return;
        }
        set_state(&shared, SyncState::Subscribing);
        match remote.subscribe(shared.kind.name(), query.clone()).await {
            Ok(mut subscription) => loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return;
                        }
                    }
                    event = subscription.next_event() => match event {
                        Some(SubscriptionEvent::Snapshot(docs)) => {
                            apply_snapshot(&shared, docs);
                            delay = retry.base;
                        }
                        Some(SubscriptionEvent::Error(err)) => {
                            degrade(&shared, err);
                            break;
                        }
                        None => {
                            degrade(
                                &shared,
                                RemoteError::subscription(
                                    shared.kind.name(),
                                    "snapshot stream closed",
                                ),
                            );
                            break;
                        }
                    }
                }
            },
            Err(err) => degrade(&shared, err),
        }
        // Sit out the backoff in Degraded, then flag the re-attempt. The
        // previous subscription is already torn down, so duplicate delivery
        // is impossible.
        tokio::select! {
            _ = sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
        delay = retry.next(delay);
        set_state(&shared, SyncState::Retrying);
    }
}
