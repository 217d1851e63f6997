// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote tree store abstraction
//!
//! The engine talks to the hierarchical store only through [`TreeStore`]. The
//! transport (HTTP, gRPC, an in-process tree) lives behind it.
//!
//! # Integration
//!
//! ```ignore
//! impl TreeStore for HttpTreeStore {
//!     fn set(&self, path: &str, value: &str, ttl: u64) -> Result<Response, StoreError> {
//!         // PUT /v2/keys{path} value=...&ttl=...
//!     }
//!     // ...
//! }
//! ```

use crate::node::Response;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Numeric error codes reported by the hierarchical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    KeyNotFound,
    TestFailed,
    NotFile,
    NotDir,
    NodeExist,
    RootReadOnly,
    DirNotEmpty,
    RaftInternal,
    EventIndexCleared,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::KeyNotFound => 100,
            ErrorCode::TestFailed => 101,
            ErrorCode::NotFile => 102,
            ErrorCode::NotDir => 104,
            ErrorCode::NodeExist => 105,
            ErrorCode::RootReadOnly => 107,
            ErrorCode::DirNotEmpty => 108,
            ErrorCode::RaftInternal => 300,
            ErrorCode::EventIndexCleared => 401,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            100 => Some(ErrorCode::KeyNotFound),
            101 => Some(ErrorCode::TestFailed),
            102 => Some(ErrorCode::NotFile),
            104 => Some(ErrorCode::NotDir),
            105 => Some(ErrorCode::NodeExist),
            107 => Some(ErrorCode::RootReadOnly),
            108 => Some(ErrorCode::DirNotEmpty),
            300 => Some(ErrorCode::RaftInternal),
            401 => Some(ErrorCode::EventIndexCleared),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::KeyNotFound => "Key not found",
            ErrorCode::TestFailed => "Compare failed",
            ErrorCode::NotFile => "Not a file",
            ErrorCode::NotDir => "Not a directory",
            ErrorCode::NodeExist => "Key already exists",
            ErrorCode::RootReadOnly => "Root is read only",
            ErrorCode::DirNotEmpty => "Directory not empty",
            ErrorCode::RaftInternal => "Raft Internal Error",
            ErrorCode::EventIndexCleared => "The event in requested index is outdated and cleared",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.as_u16())
    }
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{code}: {message} [{cause}] (index {index})")]
    Remote {
        code: ErrorCode,
        message: String,
        cause: String,
        index: u64,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Build a remote error with the code's default message.
    pub fn remote(code: ErrorCode, cause: impl Into<String>) -> Self {
        StoreError::Remote {
            code,
            message: code.message().to_string(),
            cause: cause.into(),
            index: 0,
        }
    }

    /// Attach the store index at the time of the failure.
    pub fn at_index(self, at: u64) -> Self {
        match self {
            StoreError::Remote {
                code,
                message,
                cause,
                ..
            } => StoreError::Remote {
                code,
                message,
                cause,
                index: at,
            },
            other => other,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            StoreError::Remote { code, .. } => Some(*code),
            StoreError::Unavailable(_) => None,
        }
    }

    /// True for "directory already exists", the one recoverable failure.
    pub fn is_already_exists(&self) -> bool {
        self.code() == Some(ErrorCode::NodeExist)
    }
}

/// Pending long-poll. Dropping it cancels the watch.
pub type WatchFuture = Pin<Box<dyn Future<Output = Result<Response, StoreError>> + Send + 'static>>;

/// Remote hierarchical key/value store.
///
/// `ttl` is in seconds, `0` meaning no expiry.
pub trait TreeStore: Send + Sync {
    /// Create a directory. Fails with `NodeExist` if the key is taken.
    fn create_dir(&self, path: &str, ttl: u64) -> Result<Response, StoreError>;

    /// Append a leaf under `path` with an automatically assigned,
    /// order-preserving key.
    fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> Result<Response, StoreError>;

    /// Create or update a leaf. Fails with `NotFile` if `path` is a directory.
    fn set(&self, path: &str, value: &str, ttl: u64) -> Result<Response, StoreError>;

    /// Fetch a node, and its whole subtree when `recursive` is set.
    fn get(&self, path: &str, sorted: bool, recursive: bool) -> Result<Response, StoreError>;

    /// Wait for the first change at or below `path` with index `>= since`
    /// (`0` = the next change).
    ///
    /// The watch is registered before this returns, so changes made after the
    /// call are never missed.
    fn watch(&self, path: &str, since: u64, recursive: bool) -> WatchFuture;
}

impl<S: TreeStore + ?Sized> TreeStore for Arc<S> {
    fn create_dir(&self, path: &str, ttl: u64) -> Result<Response, StoreError> {
        (**self).create_dir(path, ttl)
    }

    fn create_in_order(&self, path: &str, value: &str, ttl: u64) -> Result<Response, StoreError> {
        (**self).create_in_order(path, value, ttl)
    }

    fn set(&self, path: &str, value: &str, ttl: u64) -> Result<Response, StoreError> {
        (**self).set(path, value, ttl)
    }

    fn get(&self, path: &str, sorted: bool, recursive: bool) -> Result<Response, StoreError> {
        (**self).get(path, sorted, recursive)
    }

    fn watch(&self, path: &str, since: u64, recursive: bool) -> WatchFuture {
        (**self).watch(path, since, recursive)
    }
}
