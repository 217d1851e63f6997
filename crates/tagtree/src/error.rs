// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for save, load, watch and registry lookups.

use crate::config::ConfigError;
use crate::store::StoreError;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The client configuration or the structure shape is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A map slot owned by the caller is `None` on load.
    #[error("Field at {path} is not initialized (map)")]
    NotInitialized { path: String },

    /// The field handle or path is unknown to this client.
    #[error("Field not mapped: {0}")]
    FieldNotMapped(String),

    /// The path is known but has no stable slot in the structure.
    #[error("Field at {0} is not addressable")]
    FieldNotAddr(String),

    /// A node's text could not be decoded into the target field.
    #[error("Cannot decode {value:?} at {path}: {reason}")]
    Decode {
        path: String,
        value: String,
        reason: String,
    },

    /// Passthrough failure from the remote tree store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No tokio runtime was available to host a watch session.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    pub(crate) fn decode(
        path: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Decode {
            path: path.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}
