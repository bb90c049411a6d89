//! Remote document-store boundary.
//!
//! The remote store is an opaque collaborator: a named collection supports a
//! live subscription delivering full-collection snapshots plus an error
//! channel, and `add`/`update`/`remove` writes. Partial updates carry an
//! explicit delete-this-field sentinel so callers can clear an optional
//! attribute, which is different from setting it to an empty string.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("subscription to {collection} failed: {reason}")]
    Subscription { collection: String, reason: String },
    #[error("write to {collection} failed: {reason}")]
    Write { collection: String, reason: String },
}

impl RemoteError {
    pub fn subscription(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        RemoteError::Subscription {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    pub fn write(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        RemoteError::Write {
            collection: collection.into(),
            reason: reason.into(),
        }
    }
}

/// A document as the store hands it out: the storage identifier next to the
/// raw payload. The payload never contains the identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// A full-collection snapshot; membership and order are authoritative.
    Snapshot(Vec<RawDocument>),
    /// The subscription broke; no further snapshots will arrive on it.
    Error(RemoteError),
}

/// Live subscription handle. Dropping it tears the subscription down.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<SubscriptionEvent>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<SubscriptionEvent>) -> Self {
        Self { receiver }
    }

    /// Next snapshot or error; `None` once the remote closed the stream.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = SubscriptionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub order_by: Option<OrderBy>,
}

impl QueryOptions {
    pub fn order_by_desc(field: impl Into<String>) -> Self {
        QueryOptions {
            order_by: Some(OrderBy {
                field: field.into(),
                descending: true,
            }),
        }
    }

    pub fn order_by_asc(field: impl Into<String>) -> Self {
        QueryOptions {
            order_by: Some(OrderBy {
                field: field.into(),
                descending: false,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Remove the field from the document entirely.
    Delete,
}

/// Partial-update payload for `update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    ops: Vec<(String, FieldOp)>,
}

impl Patch {
    pub fn new() -> Self {
        Patch::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((field.into(), FieldOp::Set(value.into())));
        self
    }

    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.ops.push((field.into(), FieldOp::Delete));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldOp)> {
        self.ops.iter()
    }
}

impl From<Map<String, Value>> for Patch {
    fn from(fields: Map<String, Value>) -> Self {
        Patch {
            ops: fields
                .into_iter()
                .map(|(k, v)| (k, FieldOp::Set(v)))
                .collect(),
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a live subscription. The first snapshot describes the current
    /// contents; later ones follow every change.
    async fn subscribe(
        &self,
        collection: &str,
        query: QueryOptions,
    ) -> Result<Subscription, RemoteError>;

    /// Insert a document. The store assigns the identifier and stamps
    /// `createdAt` when the payload carries none.
    async fn add(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<String, RemoteError>;

    /// Apply a partial update; the store stamps `updatedAt`.
    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<(), RemoteError>;

    /// Delete a document. Deleting an unknown identifier is a no-op.
    async fn remove(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}
