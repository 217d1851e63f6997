// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshaling engine
//!
//! Save walks a structure and writes one leaf per scalar, one directory per
//! map or sequence. Load fetches each top-level field's subtree and fills the
//! structure from the returned nodes. Both directions are fail-fast: the first
//! store or decoding error is returned and nothing is rolled back.

use crate::error::{Error, Result};
use crate::field::{ElementKind, FieldKind, SlotMut, SlotRef, Tagged};
use crate::node::Node;
use crate::path;
use crate::registry::FieldRegistry;
use crate::store::TreeStore;
use parking_lot::Mutex;

/// Text form of a scalar slot, `None` for composite slots.
pub fn encode(slot: SlotRef<'_>) -> Option<String> {
    match slot {
        SlotRef::Text(v) => Some(v.to_string()),
        SlotRef::Int32(v) => Some(v.to_string()),
        SlotRef::Int64(v) => Some(v.to_string()),
        SlotRef::Flag(v) => Some(if v { "true" } else { "false" }.to_string()),
        SlotRef::Struct(_) | SlotRef::Sequence(_) | SlotRef::Map(_) => None,
    }
}

/// Fail with `NotInitialized` if a caller-owned map reachable through nested
/// structures is `None`.
pub fn check_initialized(root: &dyn Tagged, prefix: &str) -> Result<()> {
    for field in root.fields() {
        if field.tag.is_empty() {
            continue;
        }
        let path = path::canonical(&path::join(prefix, field.tag));
        match field.slot {
            SlotRef::Struct(inner) => check_initialized(inner, &path)?,
            SlotRef::Map(None) => return Err(Error::NotInitialized { path }),
            _ => {}
        }
    }
    Ok(())
}

fn leaf_text<'n>(node: &'n Node, path: &str) -> Result<&'n str> {
    if node.dir {
        return Err(Error::decode(path, "", "expected a leaf, found a directory"));
    }
    Ok(node.value_str())
}

fn expect_dir(node: &Node, path: &str) -> Result<()> {
    if node.dir {
        Ok(())
    } else {
        Err(Error::decode(path, node.value_str(), "expected a directory, found a leaf"))
    }
}

fn parse_int<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    node: &Node,
    path: &str,
) -> Result<T> {
    let text = leaf_text(node, path)?;
    text.parse()
        .map_err(|e: std::num::ParseIntError| Error::decode(path, text, e.to_string()))
}

fn parse_flag(node: &Node, path: &str) -> Result<bool> {
    match leaf_text(node, path)? {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::decode(path, other, "expected true or false")),
    }
}

/// Numeric index segment of a struct sequence element.
fn element_index(node: &Node) -> Option<u64> {
    node.name().parse().ok()
}

/// One save or load pass against a store.
pub struct Marshaler<'a> {
    store: &'a dyn TreeStore,
    registry: &'a Mutex<FieldRegistry>,
    ttl: u64,
}

impl<'a> Marshaler<'a> {
    pub fn new(store: &'a dyn TreeStore, registry: &'a Mutex<FieldRegistry>, ttl: u64) -> Self {
        Self {
            store,
            registry,
            ttl,
        }
    }

    /// Write every tagged field of `root` below `prefix`.
    pub fn save(&self, root: &dyn Tagged, prefix: &str) -> Result<()> {
        self.save_struct(root, prefix)
    }

    fn save_struct(&self, node: &dyn Tagged, prefix: &str) -> Result<()> {
        for field in node.fields() {
            if field.tag.is_empty() {
                continue;
            }
            let path = path::join(prefix, field.tag);
            self.save_slot(field.slot, &path)?;
        }
        Ok(())
    }

    fn save_slot(&self, slot: SlotRef<'_>, path: &str) -> Result<()> {
        match slot {
            SlotRef::Struct(inner) => self.save_struct(inner, path)?,
            SlotRef::Map(entries) => {
                self.create_dir(path)?;
                let mut sorted: Vec<_> = entries.into_iter().flatten().collect();
                sorted.sort();
                for (key, value) in sorted {
                    let entry_path = path::child(path, key);
                    self.set(&entry_path, value)?;
                }
            }
            SlotRef::Sequence(seq) => {
                self.create_dir(path)?;
                let kind = FieldKind::from(seq.element_kind());
                for i in 0..seq.len() {
                    let Some(element) = seq.element(i) else {
                        continue;
                    };
                    match element {
                        SlotRef::Struct(inner) => {
                            let element_path = path::index(path, i);
                            self.create_dir(&element_path)?;
                            self.save_struct(inner, &element_path)?;
                            self.record(&element_path, kind);
                        }
                        scalar => {
                            let text = encode(scalar).unwrap_or_default();
                            self.store.create_in_order(path, &text, self.ttl)?;
                        }
                    }
                }
            }
            scalar => {
                let text = encode(scalar).unwrap_or_default();
                self.set(path, &text)?;
            }
        }
        self.record(path, slot.kind());
        Ok(())
    }

    fn create_dir(&self, path: &str) -> Result<()> {
        match self.store.create_dir(path, self.ttl) {
            Ok(_) => Ok(()),
            Err(err) if err.is_already_exists() => {
                tracing::trace!("Directory {} already exists", path);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, path: &str, value: &str) -> Result<()> {
        self.store.set(path, value, self.ttl)?;
        tracing::debug!("Saved {}", path);
        Ok(())
    }

    fn record(&self, path: &str, kind: FieldKind) {
        self.registry.lock().record(path, kind);
    }

    /// Read every tagged field of `root` from below `prefix`.
    ///
    /// Caller-owned maps must be initialized; this is checked before any
    /// store access.
    pub fn load(&self, root: &mut dyn Tagged, prefix: &str) -> Result<()> {
        check_initialized(root, prefix)?;

        for field in root.fields_mut() {
            if field.tag.is_empty() {
                continue;
            }
            let path = path::join(prefix, field.tag);
            let response = self.store.get(&path, true, true)?;
            self.fill(field.slot, &response.node, &path, false)?;
            tracing::debug!("Loaded {} (index {})", path, response.node.modified_index);
        }
        Ok(())
    }

    /// Fill one slot from a node fetched at `path`.
    pub fn refill(&self, slot: SlotMut<'_>, node: &Node, path: &str) -> Result<()> {
        self.fill(slot, node, path, false)
    }

    /// Assign a slot and record the newest index of its subtree.
    ///
    /// `fresh` marks slots the engine created itself, whose maps it may
    /// allocate.
    fn fill(&self, slot: SlotMut<'_>, node: &Node, path: &str, fresh: bool) -> Result<()> {
        let kind = slot.kind();
        self.assign(slot, node, path, fresh)?;
        self.observe(path, kind, node.newest_index());
        Ok(())
    }

    /// Assign a slot without touching the registry. Map entries and scalar
    /// sequence elements only go through here.
    fn assign(&self, slot: SlotMut<'_>, node: &Node, path: &str, fresh: bool) -> Result<()> {
        match slot {
            SlotMut::Struct(inner) => {
                expect_dir(node, path)?;
                for field in inner.fields_mut() {
                    if field.tag.is_empty() {
                        continue;
                    }
                    let child_path = path::canonical(&path::join(path, field.tag));
                    if let Some(child) = node.child(&child_path) {
                        self.fill(field.slot, child, &child_path, fresh)?;
                    }
                }
            }
            SlotMut::Map(map) => {
                expect_dir(node, path)?;
                let entries = if fresh {
                    map.initialize()
                } else {
                    match map.entries_mut() {
                        Some(entries) => entries,
                        None => {
                            return Err(Error::NotInitialized {
                                path: path.to_string(),
                            })
                        }
                    }
                };

                entries.clear();
                for child in node.nodes.iter().filter(|n| !n.dir) {
                    entries.insert(child.name().to_string(), child.value_str().to_string());
                }
            }
            SlotMut::Sequence(seq) => {
                expect_dir(node, path)?;
                seq.clear();

                let structs = seq.element_kind() == ElementKind::Struct;
                let mut children: Vec<&Node> = node.nodes.iter().collect();
                if structs {
                    children.sort_by(|a, b| {
                        element_index(a)
                            .cmp(&element_index(b))
                            .then_with(|| a.key.cmp(&b.key))
                    });
                }
                for child in children {
                    let element = seq.push_default();
                    if structs {
                        self.fill(element, child, &child.key, true)?;
                    } else {
                        self.assign(element, child, &child.key, true)?;
                    }
                }
            }
            SlotMut::Text(v) => *v = leaf_text(node, path)?.to_string(),
            SlotMut::Int32(v) => *v = parse_int(node, path)?,
            SlotMut::Int64(v) => *v = parse_int(node, path)?,
            SlotMut::Flag(v) => *v = parse_flag(node, path)?,
        }
        Ok(())
    }

    fn observe(&self, path: &str, kind: FieldKind, version: u64) {
        self.registry.lock().observe(path, kind, version);
    }
}
