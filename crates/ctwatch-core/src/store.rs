use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;

pub type UpdateFn = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream error: {0}")]
    Stream(String),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("subscription cancelled by store: {0}")]
    Revoked(String),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}

#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Starts delivering the full subtree at `path` to `on_update` on every
    /// change. Must be called from inside a tokio runtime.
    fn subscribe(&self, path: &str, on_update: UpdateFn) -> Subscription;
    async fn get(&self, path: &str) -> Result<Value, StoreError>;
    async fn get_shallow(&self, path: &str) -> Result<Vec<String>, StoreError>;
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;
}

/// Gate shared between a subscription handle and whatever delivers its
/// updates. Deliveries run while holding the lock, so once `close` returns
/// no callback is running and none will start.
#[derive(Clone, Default)]
pub struct DeliveryGate {
    closed: Arc<Mutex<bool>>,
}

impl DeliveryGate {
    pub fn deliver(&self, on_update: &UpdateFn, value: Value) -> bool {
        let closed = self.closed.lock();
        if *closed {
            return false;
        }
        on_update(value);
        true
    }

    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

pub struct Subscription {
    path: String,
    gate: DeliveryGate,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, gate: DeliveryGate, task: Option<JoinHandle<()>>) -> Self {
        Self {
            path: path.into(),
            gate,
            task,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_closed()
    }

    pub fn cancel(&mut self) {
        if self.gate.is_closed() && self.task.is_none() {
            return;
        }
        self.gate.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::debug!(path = %self.path, "subscription cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn validate_path(path: &str) -> Result<(), StoreError> {
    let bad = path
        .chars()
        .any(|c| matches!(c, '.' | '#' | '$' | '[' | ']') || c.is_control());
    if bad {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

pub fn apply_put(root: &mut Value, path: &str, data: Value) {
    let segments = split_path(path);
    put_segments(root, &segments, data);
}

fn put_segments(node: &mut Value, segments: &[&str], data: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = data;
        return;
    };

    if data.is_null() && !node.is_object() {
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() && data.is_null() {
        map.remove(*head);
    } else {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        put_segments(child, rest, data);
        if child.is_null() || child.as_object().is_some_and(Map::is_empty) {
            map.remove(*head);
        }
    }

    if map.is_empty() {
        *node = Value::Null;
    }
}

pub fn apply_patch(root: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        apply_put(root, path, data);
        return;
    };
    let base = split_path(path).join("/");
    for (key, value) in children {
        let child_path = if base.is_empty() {
            key
        } else {
            format!("{base}/{key}")
        };
        apply_put(root, &child_path, value);
    }
}

pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    split_path(path)
        .into_iter()
        .try_fold(root, |node, seg| node.get(seg))
}

struct Listener {
    path: String,
    gate: DeliveryGate,
    on_update: UpdateFn,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tree: Arc<Mutex<Value>>,
    // Never pruned: `replay` needs cancelled listeners too. Meant for tests
    // and short-lived sessions, not for long-running subscription churn.
    listeners: Arc<Mutex<Vec<Listener>>>,
    next_key: Arc<AtomicU64>,
    writes: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(tree: Value) -> Self {
        let store = Self::default();
        *store.tree.lock() = tree;
        store
    }

    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|l| !l.gate.is_closed())
            .count()
    }

    /// Hands `value` to every listener ever registered on `path`,
    /// cancelled ones included, the way a delivery already in flight would
    /// arrive. Returns how many listeners accepted it.
    pub fn replay(&self, path: &str, value: Value) -> usize {
        let targets: Vec<(DeliveryGate, UpdateFn)> = self
            .listeners
            .lock()
            .iter()
            .filter(|l| split_path(&l.path) == split_path(path))
            .map(|l| (l.gate.clone(), l.on_update.clone()))
            .collect();
        targets
            .into_iter()
            .filter(|(gate, f)| gate.deliver(f, value.clone()))
            .count()
    }

    fn write(&self, path: &str, value: Value) {
        apply_put(&mut self.tree.lock(), path, value.clone());
        self.writes.lock().push((path.to_string(), value));
        self.notify(path);
    }

    fn notify(&self, changed: &str) {
        let changed = split_path(changed);
        let targets: Vec<(DeliveryGate, UpdateFn, String)> = {
            let listeners = self.listeners.lock();
            listeners
                .iter()
                .filter(|l| !l.gate.is_closed())
                .filter(|l| {
                    let watched = split_path(&l.path);
                    watched.starts_with(&changed) || changed.starts_with(&watched)
                })
                .map(|l| (l.gate.clone(), l.on_update.clone(), l.path.clone()))
                .collect()
        };
        for (gate, on_update, path) in targets {
            let snapshot = self.snapshot(&path);
            gate.deliver(&on_update, snapshot);
        }
    }

    fn snapshot(&self, path: &str) -> Value {
        value_at(&self.tree.lock(), path)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    fn subscribe(&self, path: &str, on_update: UpdateFn) -> Subscription {
        let gate = DeliveryGate::default();
        self.listeners.lock().push(Listener {
            path: path.to_string(),
            gate: gate.clone(),
            on_update: on_update.clone(),
        });
        gate.deliver(&on_update, self.snapshot(path));
        Subscription::new(path, gate, None)
    }

    async fn get(&self, path: &str) -> Result<Value, StoreError> {
        validate_path(path)?;
        Ok(self.snapshot(path))
    }

    async fn get_shallow(&self, path: &str) -> Result<Vec<String>, StoreError> {
        validate_path(path)?;
        Ok(match self.snapshot(path) {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        validate_path(path)?;
        let key = format!("-m{:08}", self.next_key.fetch_add(1, Ordering::SeqCst));
        let child = format!("{}/{key}", split_path(path).join("/"));
        self.write(&child, value.clone());
        Ok(key)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        validate_path(path)?;
        self.write(path, value);
        Ok(())
    }
}
