// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Watch sessions
//!
//! A session is one tokio task long-polling the store at a field's path. On
//! each change it re-reads the subtree and refills the field in place on the
//! blocking pool, then runs the caller's callback. Errors inside the loop
//! are logged and dropped; the loop yields and polls again.
//!
//! ```text
//! Created -> Polling <-> Notified
//!               |
//!               v  (stop signal)
//!            Stopped
//! ```

use crate::error::{Error, Result};
use crate::field::{Locator, Tagged};
use crate::marshal::Marshaler;
use crate::registry::FieldRegistry;
use crate::store::{ErrorCode, TreeStore, WatchFuture};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Everything a watch task needs to refill one field.
pub(crate) struct Session<T, S> {
    pub path: String,
    pub locator: Locator,
    /// Resume point for the next poll, `0` = next change.
    pub since: u64,
    pub ttl: u64,
    pub store: Arc<S>,
    pub registry: Arc<Mutex<FieldRegistry>>,
    pub structure: Arc<RwLock<T>>,
}

impl<T, S> Clone for Session<T, S> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            locator: self.locator.clone(),
            since: self.since,
            ttl: self.ttl,
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            structure: Arc::clone(&self.structure),
        }
    }
}

impl<T, S> Session<T, S>
where
    T: Tagged + Send + Sync + 'static,
    S: TreeStore + 'static,
{
    /// Re-read the subtree and refill the field. Blocks on the store and on
    /// the structure lock.
    fn refill(&self) -> Result<()> {
        let response = self.store.get(&self.path, true, true)?;

        let mut structure = self.structure.write();
        let root: &mut dyn Tagged = &mut *structure;
        let slot = self
            .locator
            .resolve_mut(root)
            .ok_or_else(|| Error::FieldNotAddr(self.path.clone()))?;

        Marshaler::new(&*self.store, &self.registry, self.ttl).refill(
            slot,
            &response.node,
            &self.path,
        )
    }

    async fn run<F>(
        mut self,
        mut pending: WatchFuture,
        mut stop: oneshot::Receiver<()>,
        mut callback: F,
    ) where
        F: FnMut() + Send + 'static,
    {
        tracing::debug!("Watch on {} started (since {})", self.path, self.since);

        loop {
            let result = tokio::select! {
                biased;
                _ = &mut stop => break,
                result = &mut pending => result,
            };

            match result {
                Ok(event) => {
                    self.since = event.index + 1;
                    let session = self.clone();
                    match tokio::task::spawn_blocking(move || session.refill()).await {
                        Ok(Ok(())) => callback(),
                        Ok(Err(e)) => {
                            tracing::debug!("Watch on {}: dropped update: {}", self.path, e)
                        }
                        Err(e) => tracing::warn!("Watch on {}: refill task failed: {}", self.path, e),
                    }
                }
                Err(e) => {
                    if e.code() == Some(ErrorCode::EventIndexCleared) {
                        self.since = 0;
                    }
                    tracing::debug!("Watch on {}: poll failed: {}", self.path, e);
                    tokio::task::yield_now().await;
                }
            }

            pending = self.store.watch(&self.path, self.since, true);
        }

        tracing::debug!("Watch on {} stopped", self.path);
    }
}

/// Start a session whose first poll is already registered.
pub(crate) fn spawn<T, S, F>(
    runtime: &Handle,
    session: Session<T, S>,
    first: WatchFuture,
    callback: F,
) -> WatchHandle
where
    T: Tagged + Send + Sync + 'static,
    S: TreeStore + 'static,
    F: FnMut() + Send + 'static,
{
    let path = session.path.clone();
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = runtime.spawn(session.run(first, stop_rx, callback));

    WatchHandle {
        path,
        stop: Some(stop_tx),
        task: Some(task),
    }
}

/// Owner of a running watch session.
///
/// Dropping the handle signals the session to stop without waiting for it.
#[derive(Debug)]
pub struct WatchHandle {
    path: String,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Watched path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True once the session task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the session and wait for it to exit.
    ///
    /// No callback runs after this returns.
    pub async fn cancel(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Watch task on {} ended abnormally: {}", self.path, e);
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
