// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory tree store
//!
//! Implements [`TreeStore`] over an in-process node tree with the semantics of
//! a hierarchical key/value store:
//!
//! - parent directories are created implicitly,
//! - every mutation bumps a global index recorded as the node's modified index,
//! - in-order children get 20-digit zero-padded keys, so key order is creation
//!   order,
//! - the last `history_limit` events are kept so watchers can resume from an
//!   index; older indexes fail with `EventIndexCleared`.
//!
//! Faults can be injected per operation and path, which is how tests exercise
//! failure handling without a real cluster. TTLs are recorded on nodes but
//! never expire.

use crate::node::{Action, Node, Response};
use crate::path::{self, ROOT};
use crate::store::{ErrorCode, StoreError, TreeStore, WatchFuture};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

/// Default number of events kept for watch resumption.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Store operations, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateDir,
    CreateInOrder,
    Set,
    Get,
    Watch,
}

struct Watcher {
    path: String,
    recursive: bool,
    since: u64,
    tx: oneshot::Sender<Result<Response, StoreError>>,
}

impl Watcher {
    fn matches(&self, event: &Response) -> bool {
        event.index >= self.since && key_matches(&self.path, &event.node.key, self.recursive)
    }
}

fn key_matches(watched: &str, key: &str, recursive: bool) -> bool {
    path::same(watched, key) || (recursive && path::is_within(key, watched))
}

fn ttl_of(ttl: u64) -> Option<u64> {
    (ttl > 0).then_some(ttl)
}

struct Inner {
    root: Node,
    index: u64,
    history: VecDeque<Response>,
    history_limit: usize,
    /// Index of the newest event evicted from `history`.
    cleared_through: u64,
    watchers: Vec<Watcher>,
    faults: HashMap<(Operation, String), StoreError>,
}

impl Inner {
    fn next_index(&mut self) -> u64 {
        self.index += 1;
        self.index
    }

    fn fail(&self, code: ErrorCode, cause: &str) -> StoreError {
        StoreError::remote(code, cause).at_index(self.index)
    }

    fn check_fault(&self, op: Operation, key: &str) -> Result<(), StoreError> {
        match self.faults.get(&(op, key.to_string())) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Fail with `NotDir` if a leaf sits where a directory is needed.
    ///
    /// Checks the ancestors of `key`, and `key` itself when `include_self`.
    fn check_dirs(&self, key: &str, include_self: bool) -> Result<(), StoreError> {
        let segments: Vec<&str> = path::segments(key).collect();
        let depth = if include_self {
            segments.len()
        } else {
            segments.len().saturating_sub(1)
        };

        let mut current = &self.root;
        let mut prefix = String::new();
        for segment in &segments[..depth] {
            prefix.push('/');
            prefix.push_str(segment);
            match current.nodes.iter().find(|n| n.key == prefix) {
                Some(node) if !node.dir => return Err(self.fail(ErrorCode::NotDir, &prefix)),
                Some(node) => current = node,
                None => return Ok(()),
            }
        }
        Ok(())
    }

    fn publish(&mut self, event: &Response) {
        if self.history_limit > 0 {
            self.history.push_back(event.clone());
            while self.history.len() > self.history_limit {
                if let Some(evicted) = self.history.pop_front() {
                    self.cleared_through = evicted.index;
                }
            }
        } else {
            self.cleared_through = event.index;
        }

        for watcher in std::mem::take(&mut self.watchers) {
            if watcher.tx.is_closed() {
                continue;
            }
            if watcher.matches(event) {
                let _ = watcher.tx.send(Ok(event.clone()));
            } else {
                self.watchers.push(watcher);
            }
        }
    }
}

fn find<'a>(root: &'a Node, key: &str) -> Option<&'a Node> {
    let mut current = root;
    let mut prefix = String::new();
    for segment in path::segments(key) {
        prefix.push('/');
        prefix.push_str(segment);
        current = current.nodes.iter().find(|n| n.key == prefix)?;
    }
    Some(current)
}

fn find_mut<'a>(root: &'a mut Node, key: &str) -> Option<&'a mut Node> {
    let mut current = root;
    let mut prefix = String::new();
    for segment in path::segments(key) {
        prefix.push('/');
        prefix.push_str(segment);
        current = current.nodes.iter_mut().find(|n| n.key == prefix)?;
    }
    Some(current)
}

/// Walk to `key`, creating missing directories with `index`.
fn ensure_dir<'a>(root: &'a mut Node, key: &str, index: u64) -> Result<&'a mut Node, StoreError> {
    let mut current = root;
    let mut prefix = String::new();
    for segment in path::segments(key) {
        prefix.push('/');
        prefix.push_str(segment);

        let position = match current.nodes.iter().position(|n| n.key == prefix) {
            Some(position) => position,
            None => {
                current.nodes.push(Node::dir(prefix.clone(), index));
                current.nodes.len() - 1
            }
        };

        let next = &mut current.nodes[position];
        if !next.dir {
            return Err(StoreError::remote(ErrorCode::NotDir, prefix).at_index(index));
        }
        current = next;
    }
    Ok(current)
}

/// In-process hierarchical store.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty store keeping at most `limit` events for watchers.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: Node::dir(ROOT, 0),
                index: 0,
                history: VecDeque::new(),
                history_limit: limit,
                cleared_through: 0,
                watchers: Vec::new(),
                faults: HashMap::new(),
            }),
        }
    }

    /// Current store index.
    pub fn index(&self) -> u64 {
        self.inner.lock().index
    }

    /// Sorted copy of the whole tree.
    pub fn snapshot(&self) -> Node {
        let mut root = self.inner.lock().root.clone();
        root.sort();
        root
    }

    /// Number of pending watchers.
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|w| !w.tx.is_closed());
        inner.watchers.len()
    }

    /// Make `op` on `path` fail with `error` until cleared.
    pub fn inject_fault(&self, op: Operation, path: &str, error: StoreError) {
        self.inner
            .lock()
            .faults
            .insert((op, path::canonical(path)), error);
    }

    /// Remove a fault injected for `op` on `path`.
    pub fn clear_fault(&self, op: Operation, path: &str) {
        self.inner.lock().faults.remove(&(op, path::canonical(path)));
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Delete a leaf, or a directory when `recursive` is set or it is empty.
    pub fn delete(&self, path: &str, recursive: bool) -> Result<Response, StoreError> {
        let key = path::canonical(path);
        tracing::trace!("MemoryStore: delete {}", key);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if key == ROOT {
            return Err(inner.fail(ErrorCode::RootReadOnly, &key));
        }

        let Some(existing) = find(&inner.root, &key) else {
            return Err(inner.fail(ErrorCode::KeyNotFound, &key));
        };
        if existing.dir && !recursive && !existing.nodes.is_empty() {
            return Err(inner.fail(ErrorCode::DirNotEmpty, &key));
        }

        let parent_key = path::parent(&key).unwrap_or_else(|| ROOT.to_string());
        let index = inner.next_index();
        let Some(parent) = find_mut(&mut inner.root, &parent_key) else {
            return Err(inner.fail(ErrorCode::KeyNotFound, &parent_key));
        };
        let Some(position) = parent.nodes.iter().position(|n| n.key == key) else {
            return Err(StoreError::remote(ErrorCode::KeyNotFound, key).at_index(index));
        };
        let removed = parent.nodes.remove(position);

        let node = Node {
            key: removed.key.clone(),
            dir: removed.dir,
            created_index: removed.created_index,
            modified_index: index,
            ..Default::default()
        };
        let mut response = Response::new(Action::Delete, node, index);
        response.prev_node = Some(removed);

        inner.publish(&response);
        Ok(response)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore for MemoryStore {
    fn create_dir(&self, path: &str, ttl: u64) -> Result<Response, StoreError> {
        let key = path::canonical(path);
        tracing::trace!("MemoryStore: create_dir {}", key);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.check_fault(Operation::CreateDir, &key)?;
        if key == ROOT {
            return Err(inner.fail(ErrorCode::RootReadOnly, &key));
        }
        if find(&inner.root, &key).is_some() {
            return Err(inner.fail(ErrorCode::NodeExist, &key));
        }
        inner.check_dirs(&key, false)?;

        let parent_key = path::parent(&key).unwrap_or_else(|| ROOT.to_string());
        let index = inner.next_index();
        let parent = ensure_dir(&mut inner.root, &parent_key, index)?;

        let mut node = Node::dir(key, index);
        node.ttl = ttl_of(ttl);
        parent.nodes.push(node.clone());

        let response = Response::new(Action::Create, node, index);
        inner.publish(&response);
        Ok(response)
    }

    fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> Result<Response, StoreError> {
        let key = path::canonical(path);
        tracing::trace!("MemoryStore: create_in_order {}", key);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.check_fault(Operation::CreateInOrder, &key)?;
        inner.check_dirs(&key, true)?;

        let index = inner.next_index();
        let dir = ensure_dir(&mut inner.root, &key, index)?;

        let mut node = Node::leaf(path::child(&key, &format!("{:020}", index)), value, index);
        node.ttl = ttl_of(ttl);
        dir.nodes.push(node.clone());

        let response = Response::new(Action::Create, node, index);
        inner.publish(&response);
        Ok(response)
    }

    fn set(&self, path: &str, value: &str, ttl: u64) -> Result<Response, StoreError> {
        let key = path::canonical(path);
        tracing::trace!("MemoryStore: set {} = {:?}", key, value);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.check_fault(Operation::Set, &key)?;
        if key == ROOT {
            return Err(inner.fail(ErrorCode::RootReadOnly, &key));
        }

        let existing_dir = find(&inner.root, &key).map(|n| n.dir);
        match existing_dir {
            Some(true) => return Err(inner.fail(ErrorCode::NotFile, &key)),
            Some(false) => {}
            None => inner.check_dirs(&key, false)?,
        }

        let index = inner.next_index();
        let response = match find_mut(&mut inner.root, &key) {
            Some(node) => {
                let prev = node.clone();
                node.value = Some(value.to_string());
                node.modified_index = index;
                node.ttl = ttl_of(ttl);

                let mut response = Response::new(Action::Set, node.clone(), index);
                response.prev_node = Some(prev);
                response
            }
            None => {
                let parent_key = path::parent(&key).unwrap_or_else(|| ROOT.to_string());
                let parent = ensure_dir(&mut inner.root, &parent_key, index)?;

                let mut node = Node::leaf(key, value, index);
                node.ttl = ttl_of(ttl);
                parent.nodes.push(node.clone());
                Response::new(Action::Set, node, index)
            }
        };

        inner.publish(&response);
        Ok(response)
    }

    fn get(&self, path: &str, sorted: bool, recursive: bool) -> Result<Response, StoreError> {
        let key = path::canonical(path);
        tracing::trace!("MemoryStore: get {} (sorted={}, recursive={})", key, sorted, recursive);

        let inner = self.inner.lock();
        inner.check_fault(Operation::Get, &key)?;

        let Some(node) = find(&inner.root, &key) else {
            return Err(inner.fail(ErrorCode::KeyNotFound, &key));
        };

        let mut node = node.clone();
        if !recursive {
            node.shallow();
        }
        if sorted {
            node.sort();
        }
        Ok(Response::new(Action::Get, node, inner.index))
    }

    fn watch(&self, path: &str, since: u64, recursive: bool) -> WatchFuture {
        let key = path::canonical(path);
        tracing::trace!("MemoryStore: watch {} since {}", key, since);

        let mut inner = self.inner.lock();
        if let Err(err) = inner.check_fault(Operation::Watch, &key) {
            return Box::pin(std::future::ready(Err(err)));
        }

        if since > 0 {
            if since <= inner.cleared_through {
                let err = inner.fail(ErrorCode::EventIndexCleared, &key);
                return Box::pin(std::future::ready(Err(err)));
            }
            let replay = inner
                .history
                .iter()
                .find(|event| event.index >= since && key_matches(&key, &event.node.key, recursive))
                .cloned();
            if let Some(event) = replay {
                return Box::pin(std::future::ready(Ok(event)));
            }
        }

        let (tx, rx) = oneshot::channel();
        inner.watchers.push(Watcher {
            path: key,
            recursive,
            since,
            tx,
        });

        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Unavailable("watch channel closed".into())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_set_and_get() {
        let store = MemoryStore::new();
        let resp = store.set("/name", "alpha", 0).unwrap();
        assert_eq!(resp.action, Action::Set);
        assert_eq!(resp.node.modified_index, 1);

        let got = store.get("/name", false, false).unwrap();
        assert_eq!(got.node.value_str(), "alpha");
        assert_eq!(got.index, 1);
    }

    #[test]
    fn test_set_update_keeps_prev_node() {
        let store = MemoryStore::new();
        store.set("/a", "1", 0).unwrap();
        let resp = store.set("a", "2", 0).unwrap();

        assert_eq!(resp.prev_node.as_ref().map(Node::value_str), Some("1"));
        assert_eq!(resp.node.value_str(), "2");
        assert_eq!(resp.node.created_index, 1);
        assert_eq!(resp.node.modified_index, 2);
    }

    #[test]
    fn test_set_creates_parents() {
        let store = MemoryStore::new();
        store.set("/a/b/c", "deep", 0).unwrap();

        let a = store.get("/a", true, true).unwrap().node;
        assert!(a.dir);
        assert_eq!(a.nodes[0].key, "/a/b");
        assert_eq!(a.nodes[0].nodes[0].value_str(), "deep");
    }

    #[test]
    fn test_set_on_dir_fails_not_file() {
        let store = MemoryStore::new();
        store.create_dir("/dir", 0).unwrap();
        let err = store.set("/dir", "x", 0).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotFile));
    }

    #[test]
    fn test_set_below_leaf_fails_not_dir() {
        let store = MemoryStore::new();
        store.set("/leaf", "x", 0).unwrap();
        let before = store.index();

        let err = store.set("/leaf/child", "y", 0).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotDir));
        assert_eq!(store.index(), before);
    }

    #[test]
    fn test_create_dir_twice() {
        let store = MemoryStore::new();
        store.create_dir("/dir", 30).unwrap();
        let err = store.create_dir("/dir", 0).unwrap_err();
        assert!(err.is_already_exists());

        let node = store.get("/dir", false, false).unwrap().node;
        assert_eq!(node.ttl, Some(30));
    }

    #[test]
    fn test_root_is_read_only() {
        let store = MemoryStore::new();
        assert_eq!(
            store.create_dir("/", 0).unwrap_err().code(),
            Some(ErrorCode::RootReadOnly)
        );
        assert_eq!(
            store.set("/", "x", 0).unwrap_err().code(),
            Some(ErrorCode::RootReadOnly)
        );
    }

    #[test]
    fn test_create_in_order_keys() {
        let store = MemoryStore::new();
        store.create_dir("/list", 0).unwrap();
        let first = store.create_in_order("/list", "a", 0).unwrap();
        let second = store.create_in_order("/list", "b", 0).unwrap();

        assert_eq!(first.node.key, "/list/00000000000000000002");
        assert!(first.node.key < second.node.key);

        let list = store.get("/list", true, true).unwrap().node;
        let values: Vec<_> = list.nodes.iter().map(Node::value_str).collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_get_missing_key() {
        let store = MemoryStore::new();
        let err = store.get("/missing", true, true).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::KeyNotFound));
    }

    #[test]
    fn test_get_shallow_and_sorted() {
        let store = MemoryStore::new();
        store.set("/cfg/z", "1", 0).unwrap();
        store.set("/cfg/a/deep", "2", 0).unwrap();

        let shallow = store.get("/cfg", true, false).unwrap().node;
        assert_eq!(shallow.nodes[0].key, "/cfg/a");
        assert!(shallow.nodes[0].nodes.is_empty());

        let unsorted = store.get("/cfg", false, true).unwrap().node;
        assert_eq!(unsorted.nodes[0].key, "/cfg/z");
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.set("/dir/a", "1", 0).unwrap();

        let err = store.delete("/dir", false).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DirNotEmpty));

        let resp = store.delete("/dir", true).unwrap();
        assert_eq!(resp.action, Action::Delete);
        assert!(resp.prev_node.is_some());
        assert!(store.get("/dir", false, false).is_err());
    }

    #[test]
    fn test_injected_fault() {
        let store = MemoryStore::new();
        store.inject_fault(
            Operation::Set,
            "/name",
            StoreError::remote(ErrorCode::RaftInternal, "/name"),
        );
        assert_eq!(
            store.set("name", "x", 0).unwrap_err().code(),
            Some(ErrorCode::RaftInternal)
        );

        store.clear_fault(Operation::Set, "/name");
        assert!(store.set("/name", "x", 0).is_ok());
    }

    #[tokio::test]
    async fn test_watch_next_change() {
        let store = MemoryStore::new();
        store.create_dir("/cfg", 0).unwrap();

        let pending = store.watch("/cfg", 0, true);
        assert_eq!(store.watcher_count(), 1);

        store.set("/other", "ignored", 0).unwrap();
        store.set("/cfg/name", "beta", 0).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.node.key, "/cfg/name");
        assert_eq!(event.node.value_str(), "beta");
        assert_eq!(store.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_replays_history() {
        let store = MemoryStore::new();
        store.set("/a", "1", 0).unwrap();
        store.set("/a", "2", 0).unwrap();

        let event = store.watch("/a", 2, false).await.unwrap();
        assert_eq!(event.index, 2);
        assert_eq!(event.node.value_str(), "2");
    }

    #[tokio::test]
    async fn test_watch_cleared_index() {
        let store = MemoryStore::with_history_limit(2);
        for i in 0..4 {
            store.set("/a", &i.to_string(), 0).unwrap();
        }

        let err = store.watch("/a", 1, false).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::EventIndexCleared));

        let event = store.watch("/a", 3, false).await.unwrap();
        assert_eq!(event.index, 3);
    }

    #[tokio::test]
    async fn test_dropped_watch_is_pruned() {
        let store = MemoryStore::new();
        let pending = store.watch("/a", 0, false);
        assert_eq!(store.watcher_count(), 1);

        drop(pending);
        assert_eq!(store.watcher_count(), 0);
    }
}
