//! The consumed store abstraction: an untyped key tree with one-shot reads,
//! standing change subscriptions, and a disconnect-triggered cleanup hook.
//! The synchronizer owns its own serialization on top of these primitives.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[cfg(test)]
use mockall::automock;

pub use memory::MemoryStore;

/// An untyped node in the store's key tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    Int(i64),
    Text(String),
    Branch(BTreeMap<String, TreeValue>),
}

impl TreeValue {
    pub fn text(text: impl Into<String>) -> TreeValue {
        TreeValue::Text(text.into())
    }

    pub fn branch<'a>(entries: impl IntoIterator<Item = (&'a str, TreeValue)>) -> TreeValue {
        TreeValue::Branch(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    pub fn child(&self, key: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Branch(children) => children.get(key),
            _ => None,
        }
    }

    /// Descends a `/`-separated path; an empty path returns the node itself.
    pub fn at(&self, path: &str) -> Option<&TreeValue> {
        let mut node = self;
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            node = node.child(segment)?;
        }
        Some(node)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TreeValue::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl Default for TreeValue {
    fn default() -> Self {
        TreeValue::Branch(BTreeMap::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    InvalidPath(String),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::InvalidPath(path) => write!(f, "Invalid store path: {}", path),
            StoreError::Backend(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// A change notification delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Current value at the subscribed path (`None` when the path is unset).
    /// Delivered once on subscribe and again after every change.
    Value(Option<TreeValue>),
    /// A direct child appeared under the subscribed path. Existing children
    /// are replayed on subscribe.
    ChildAdded { key: String, value: TreeValue },
}

/// A standing subscription. Events arrive in store write order; dropping the
/// receiver or calling [`KeyedStore::unsubscribe`] with `id` ends delivery.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::UnboundedReceiver<StoreEvent>,
}

/// A keyed tree store with change notifications. Paths are `/`-separated key
/// sequences; values are untyped [`TreeValue`] nodes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// One-shot snapshot read.
    async fn get(&self, path: &str) -> Result<Option<TreeValue>, StoreError>;

    async fn set(&self, path: &str, value: TreeValue) -> Result<(), StoreError>;

    /// Writes only when the path is currently unset; returns whether the
    /// write happened. The check and the write are atomic.
    async fn set_if_absent(&self, path: &str, value: TreeValue) -> Result<bool, StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Arms a store-side removal of `path` that fires when this client's
    /// connection is lost before explicit cleanup.
    async fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError>;

    fn subscribe_value(&self, path: &str) -> Subscription;

    fn subscribe_child_added(&self, path: &str) -> Subscription;

    fn unsubscribe(&self, id: u64);
}
