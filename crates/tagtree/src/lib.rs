// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tagtree
//!
//! Maps tagged Rust structures onto a hierarchical key/value store.
//!
//! # Features
//!
//! - **Save** -- Write every tagged field as leaves and directories
//! - **Load** -- Read the tree back into the structure in place
//! - **Watch** -- Long-poll a field and refill it on every remote change
//! - **Versions** -- Track the store index last read into each field
//!
//! # Architecture
//!
//! ```text
//! Client
//! +-- FieldRegistry   (path, kind and version per field handle)
//! +-- Marshaler       (save / load walks over the structure)
//! +-- WatchHandle     (one tokio task per watched field)
//! +-- TreeStore       (remote store, or MemoryStore in-process)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagtree::{tagged, Client, ClientConfig, MemoryStore};
//!
//! #[derive(Default)]
//! struct Settings {
//!     name: String,
//!     count: i32,
//! }
//! tagged!(Settings { name => "/name", count => "/count" });
//!
//! let config = ClientConfig::builder().namespace("/app").build();
//! let store = Arc::new(MemoryStore::new());
//! let client = Client::new(config, store, Settings::default())?;
//!
//! client.write().name = "alpha".into();
//! client.save()?;
//! client.load()?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod field;
pub mod marshal;
pub mod memory;
pub mod node;
pub mod path;
pub mod registry;
pub mod store;
pub mod watch;

pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::{Error, Result};
pub use field::{
    Element, ElementKind, Field, FieldKind, FieldMut, Locator, MapSlot, ScalarKind, SequenceSlot,
    SlotMut, SlotRef, Slotted, Tagged,
};
pub use memory::{MemoryStore, Operation};
pub use node::{Action, Node, Response};
pub use registry::FieldId;
pub use store::{ErrorCode, StoreError, TreeStore, WatchFuture};
pub use watch::WatchHandle;
