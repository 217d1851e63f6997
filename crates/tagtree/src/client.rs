// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client handle
//!
//! Ties a structure, a store and a field registry together. The client owns
//! the structure; callers reach it through [`Client::read`] and
//! [`Client::write`].

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::field::{SlotRef, Tagged};
use crate::marshal::{self, Marshaler};
use crate::path;
use crate::registry::{FieldId, FieldRegistry};
use crate::store::TreeStore;
use crate::watch::{self, Session, WatchHandle};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Mapper between a tagged structure and a hierarchical store.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(MemoryStore::new());
/// let client = Client::new(ClientConfig::default(), store, settings)?;
/// client.save()?;
///
/// let name = client.field("/name")?;
/// let handle = client.watch(name, || println!("name changed"))?;
/// ```
pub struct Client<T, S> {
    config: ClientConfig,
    store: Arc<S>,
    registry: Arc<Mutex<FieldRegistry>>,
    structure: Arc<RwLock<T>>,
}

impl<T, S> Client<T, S>
where
    T: Tagged + Send + Sync + 'static,
    S: TreeStore + 'static,
{
    /// Validate the configuration and register every tagged field.
    ///
    /// No store access happens here.
    pub fn new(config: ClientConfig, store: Arc<S>, structure: T) -> Result<Self> {
        config.validate()?;
        let registry = FieldRegistry::preload(&structure, &config.namespace)?;

        tracing::info!(
            "Client for {} created ({} paths, namespace {:?})",
            structure.type_name(),
            registry.len(),
            config.namespace
        );

        Ok(Self {
            config,
            store,
            registry: Arc::new(Mutex::new(registry)),
            structure: Arc::new(RwLock::new(structure)),
        })
    }

    fn marshaler(&self) -> Marshaler<'_> {
        Marshaler::new(&*self.store, &self.registry, self.config.ttl)
    }

    /// Write the structure to the store.
    pub fn save(&self) -> Result<()> {
        let structure = self.structure.read();
        self.marshaler().save(&*structure, &self.config.namespace)
    }

    /// Read the structure back from the store.
    pub fn load(&self) -> Result<()> {
        let mut structure = self.structure.write();
        self.marshaler().load(&mut *structure, &self.config.namespace)
    }

    /// Handle of the field tagged with `path`, relative to the namespace.
    pub fn field(&self, path: &str) -> Result<FieldId> {
        self.registry
            .lock()
            .lookup(&path::join(&self.config.namespace, path))
    }

    /// Handle of the structure itself.
    pub fn root(&self) -> FieldId {
        self.registry.lock().root()
    }

    /// Last version read into the field, `0` if never loaded.
    pub fn version(&self, id: FieldId) -> Result<u64> {
        self.registry.lock().version(id)
    }

    /// Keep the field in sync with the store.
    ///
    /// Must be called from within a tokio runtime. The first poll is
    /// registered before this returns; `callback` runs after every refill.
    pub fn watch<F>(&self, id: FieldId, callback: F) -> Result<WatchHandle>
    where
        F: FnMut() + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let (path, locator, version) = {
            let registry = self.registry.lock();
            let entry = registry.entry(id)?;
            let locator = entry
                .locator
                .clone()
                .ok_or_else(|| Error::FieldNotAddr(entry.path.clone()))?;
            (entry.path.clone(), locator, entry.version)
        };

        {
            let structure = self.structure.read();
            match locator.resolve(&*structure) {
                Some(SlotRef::Struct(inner)) => marshal::check_initialized(inner, &path)?,
                Some(SlotRef::Map(None)) => return Err(Error::NotInitialized { path }),
                Some(_) => {}
                None => return Err(Error::FieldNotAddr(path)),
            }
        }

        let since = if version == 0 { 0 } else { version + 1 };
        let first = self.store.watch(&path, since, true);
        tracing::debug!("Watching {} from index {}", path, since);

        let session = Session {
            path,
            locator,
            since,
            ttl: self.config.ttl,
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            structure: Arc::clone(&self.structure),
        };
        Ok(watch::spawn(&runtime, session, first, callback))
    }

    /// Shared access to the structure.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.structure.read()
    }

    /// Exclusive access to the structure.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.structure.write()
    }

    /// Registered paths, root first.
    pub fn paths(&self) -> Vec<String> {
        self.registry.lock().paths()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
