//! In-process [`KeyedStore`] used by tests and local two-client demos. It
//! mirrors the remote store's observable behavior: notifications in write
//! order, current state replayed on subscribe, and armed disconnect cleanups.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;

use super::{KeyedStore, StoreError, StoreEvent, Subscription, TreeValue};

#[derive(Debug, Clone, Copy, PartialEq)]
enum SubscriberKind {
    Value,
    ChildAdded,
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    path: Vec<String>,
    kind: SubscriberKind,
    sender: UnboundedSender<StoreEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    root: TreeValue,
    subscribers: Vec<Subscriber>,
    cleanup_paths: Vec<Vec<String>>,
    next_subscription_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Simulates the store noticing this client's connection drop: removes
    /// every path armed with `remove_on_disconnect`.
    pub fn fire_disconnect_cleanups(&self) {
        let paths = {
            let mut inner = self.lock();
            std::mem::take(&mut inner.cleanup_paths)
        };
        for segments in paths {
            debug!(path = segments.join("/"), "disconnect cleanup");
            self.apply(&segments, None);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // A poisoned lock still holds a usable tree.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn apply(&self, segments: &[String], value: Option<TreeValue>) {
        let mut inner = self.lock();
        let old_root = inner.root.clone();
        match value {
            Some(value) => set_at(&mut inner.root, segments, value),
            None => remove_at(&mut inner.root, segments),
        }
        notify(&mut inner, &old_root);
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<TreeValue>, StoreError> {
        let segments = split_path(path)?;
        let inner = self.lock();
        Ok(value_at(&inner.root, &segments).cloned())
    }

    async fn set(&self, path: &str, value: TreeValue) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        debug!(path, "set");
        self.apply(&segments, Some(value));
        Ok(())
    }

    async fn set_if_absent(&self, path: &str, value: TreeValue) -> Result<bool, StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        if value_at(&inner.root, &segments).is_some() {
            debug!(path, "set_if_absent lost: path already set");
            return Ok(false);
        }
        let old_root = inner.root.clone();
        set_at(&mut inner.root, &segments, value);
        notify(&mut inner, &old_root);
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        debug!(path, "remove");
        self.apply(&segments, None);
        Ok(())
    }

    async fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        if !inner.cleanup_paths.contains(&segments) {
            inner.cleanup_paths.push(segments);
        }
        Ok(())
    }

    fn subscribe_value(&self, path: &str) -> Subscription {
        let segments = split_segments(path);
        let mut inner = self.lock();
        let (sender, events) = mpsc::unbounded_channel();
        let current = value_at(&inner.root, &segments).cloned();
        let _ = sender.send(StoreEvent::Value(current));
        let id = inner.next_subscription_id;
        inner.next_subscription_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            path: segments,
            kind: SubscriberKind::Value,
            sender,
        });
        Subscription { id, events }
    }

    fn subscribe_child_added(&self, path: &str) -> Subscription {
        let segments = split_segments(path);
        let mut inner = self.lock();
        let (sender, events) = mpsc::unbounded_channel();
        if let Some(TreeValue::Branch(children)) = value_at(&inner.root, &segments) {
            for (key, value) in children {
                let _ = sender.send(StoreEvent::ChildAdded {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        let id = inner.next_subscription_id;
        inner.next_subscription_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            path: segments,
            kind: SubscriberKind::ChildAdded,
            sender,
        });
        Subscription { id, events }
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subscribers.retain(|subscriber| subscriber.id != id);
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

fn split_path(path: &str) -> Result<Vec<String>, StoreError> {
    let segments = split_segments(path);
    if segments.is_empty() {
        return Err(StoreError::InvalidPath(path.to_owned()));
    }
    Ok(segments)
}

fn value_at<'a>(root: &'a TreeValue, segments: &[String]) -> Option<&'a TreeValue> {
    let mut node = root;
    for segment in segments {
        node = node.child(segment)?;
    }
    Some(node)
}

fn set_at(node: &mut TreeValue, segments: &[String], value: TreeValue) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !matches!(node, TreeValue::Branch(_)) {
        *node = TreeValue::Branch(BTreeMap::new());
    }
    if let TreeValue::Branch(children) = node {
        let child = children
            .entry(head.clone())
            .or_insert_with(|| TreeValue::Branch(BTreeMap::new()));
        set_at(child, rest, value);
    }
}

fn remove_at(node: &mut TreeValue, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let TreeValue::Branch(children) = node else {
        return;
    };
    if rest.is_empty() {
        children.remove(head);
    } else if let Some(child) = children.get_mut(head) {
        remove_at(child, rest);
    }
}

/// Fans a completed write out to every affected subscriber, pruning the ones
/// whose receivers are gone.
fn notify(inner: &mut Inner, old_root: &TreeValue) {
    let new_root = inner.root.clone();
    inner.subscribers.retain(|subscriber| {
        let old_value = value_at(old_root, &subscriber.path);
        let new_value = value_at(&new_root, &subscriber.path);
        match subscriber.kind {
            SubscriberKind::Value => {
                if old_value != new_value {
                    return subscriber
                        .sender
                        .send(StoreEvent::Value(new_value.cloned()))
                        .is_ok();
                }
            }
            SubscriberKind::ChildAdded => {
                for (key, value) in added_children(old_value, new_value) {
                    if subscriber
                        .sender
                        .send(StoreEvent::ChildAdded { key, value })
                        .is_err()
                    {
                        return false;
                    }
                }
            }
        }
        !subscriber.sender.is_closed()
    });
}

fn added_children(old: Option<&TreeValue>, new: Option<&TreeValue>) -> Vec<(String, TreeValue)> {
    let new_children = match new {
        Some(TreeValue::Branch(children)) => children,
        _ => return Vec::new(),
    };
    let old_keys: BTreeSet<&String> = match old {
        Some(TreeValue::Branch(children)) => children.keys().collect(),
        _ => BTreeSet::new(),
    };
    new_children
        .iter()
        .filter(|(key, _)| !old_keys.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
