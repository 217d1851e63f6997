// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field registry
//!
//! Maps field handles to canonical paths, field kinds and last observed
//! versions. Entries created by preload carry a [`Locator`] and are
//! addressable; entries the engine adds later for struct sequence elements
//! are not. Map entries and scalar sequence elements are never registered.

use crate::error::{Error, Result};
use crate::field::{FieldKind, Locator, Tagged};
use crate::path;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Handle to a registered field, valid only for the client that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId {
    owner: u64,
    index: u32,
}

impl FieldId {
    /// Identifier of the issuing registry.
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// Position in the issuing registry.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}.{}", self.owner, self.index)
    }
}

/// One registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Canonical path.
    pub path: String,
    pub kind: FieldKind,
    /// Navigation from the structure root, `None` for engine-created slots.
    pub locator: Option<Locator>,
    /// Newest modified index in the subtree last read into the field, `0` if
    /// never read.
    pub version: u64,
}

/// Path and version table for one client.
#[derive(Debug)]
pub struct FieldRegistry {
    owner: u64,
    entries: Vec<Entry>,
    by_path: HashMap<String, usize>,
}

impl FieldRegistry {
    /// Empty registry with a fresh owner id.
    pub fn new() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Register the root and every tagged field reachable through nested
    /// structures.
    ///
    /// Two fields mapping to the same canonical path are rejected.
    pub fn preload(root: &dyn Tagged, prefix: &str) -> Result<Self> {
        let mut registry = Self::new();
        for mapped in path::map_fields(root, prefix) {
            let key = path::canonical(&mapped.path);
            if registry.by_path.contains_key(&key) {
                return Err(Error::InvalidConfig(format!(
                    "{} maps two fields to {}",
                    root.type_name(),
                    key
                )));
            }
            registry.insert(Entry {
                path: key,
                kind: mapped.kind,
                locator: Some(mapped.locator),
                version: 0,
            });
        }
        Ok(registry)
    }

    fn insert(&mut self, entry: Entry) -> usize {
        let position = self.entries.len();
        self.by_path.insert(entry.path.clone(), position);
        self.entries.push(entry);
        position
    }

    fn id(&self, position: usize) -> FieldId {
        FieldId {
            owner: self.owner,
            index: position as u32,
        }
    }

    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handle of the structure root.
    pub fn root(&self) -> FieldId {
        self.id(0)
    }

    /// Resolve a path to a handle.
    pub fn lookup(&self, path: &str) -> Result<FieldId> {
        let key = path::canonical(path);
        let Some(&position) = self.by_path.get(&key) else {
            return Err(Error::FieldNotMapped(key));
        };
        if self.entries[position].locator.is_none() {
            return Err(Error::FieldNotAddr(key));
        }
        Ok(self.id(position))
    }

    /// Entry behind a handle issued by this registry.
    pub fn entry(&self, id: FieldId) -> Result<&Entry> {
        if id.owner != self.owner {
            return Err(Error::FieldNotMapped(id.to_string()));
        }
        self.entries
            .get(id.index as usize)
            .ok_or_else(|| Error::FieldNotMapped(id.to_string()))
    }

    /// Last observed version of a field.
    pub fn version(&self, id: FieldId) -> Result<u64> {
        self.entry(id).map(|e| e.version)
    }

    /// Last observed version at a path, if registered.
    pub fn version_at(&self, path: &str) -> Option<u64> {
        self.by_path
            .get(&path::canonical(path))
            .map(|&position| self.entries[position].version)
    }

    /// Make sure a path is registered, leaving its version alone.
    pub fn record(&mut self, path: &str, kind: FieldKind) {
        let key = path::canonical(path);
        if !self.by_path.contains_key(&key) {
            self.insert(Entry {
                path: key,
                kind,
                locator: None,
                version: 0,
            });
        }
    }

    /// Register a path if needed and set its version.
    pub fn observe(&mut self, path: &str, kind: FieldKind, version: u64) {
        let key = path::canonical(path);
        match self.by_path.get(&key) {
            Some(&position) => self.entries[position].version = version,
            None => {
                self.insert(Entry {
                    path: key,
                    kind,
                    locator: None,
                    version,
                });
            }
        }
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}
