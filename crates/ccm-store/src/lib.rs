// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-store
//!
//! Typed blob store with conditional writes.
//!
//! The archive at `archive/{id}` is mutated exclusively through
//! [`ObjectStore::put_if_version`]; triggers under `customers/{code}/`
//! are created by the front-end and deleted here. The store guarantees
//! read-after-write consistency for a key following a successful put.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// HTTP-backed store speaking `ETag`/`If-Match`.
pub mod http;
/// In-memory store for tests and local runs.
pub mod memory;
/// Retry policy and the retrying store wrapper.
pub mod retry;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryPolicyBuilder, RetryingStore};

use async_trait::async_trait;
use ccm_error::{Fault, FaultKind};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Version tokens
// ---------------------------------------------------------------------------

/// Opaque entity tag identifying one stored object version.
///
/// Tokens are only ever compared for equality and echoed back on
/// conditional writes; their contents mean nothing to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw entity tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The raw tag, for the `If-Match` wire header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures a store operation can produce.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist.
    #[error("object not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// A conditional write found a different stored version.
    #[error("version mismatch on {key}")]
    VersionMismatch {
        /// The contested key.
        key: String,
    },

    /// The caller's credentials were rejected.
    #[error("authorization denied for {key}")]
    Unauthorized {
        /// The denied key.
        key: String,
    },

    /// Network failure, throttling, or a 5xx from the store.
    #[error("transient store failure on {key}: {reason}")]
    Transient {
        /// The affected key.
        key: String,
        /// What went wrong.
        reason: String,
    },
}

impl StoreError {
    /// Whether this failure is worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// The key the operation was addressing.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key }
            | Self::VersionMismatch { key }
            | Self::Unauthorized { key }
            | Self::Transient { key, .. } => key,
        }
    }
}

impl From<StoreError> for Fault {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound { .. } => FaultKind::NotFound,
            StoreError::VersionMismatch { .. } => FaultKind::VersionConflict,
            StoreError::Unauthorized { .. } => FaultKind::Authorization,
            StoreError::Transient { .. } => FaultKind::Transient,
        };
        let key = err.key().to_string();
        Fault::new(kind, err.to_string())
            .with_context("key", key)
            .with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Full object key.
    pub key: String,
    /// Last modification instant.
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing.
///
/// Listings are restartable: feed `next_start_after` back into
/// [`ObjectStore::list`] to resume after an interruption.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    /// Entries in key order.
    pub objects: Vec<ObjectSummary>,
    /// Where to resume; `None` when the listing is exhausted.
    pub next_start_after: Option<String>,
}

// ---------------------------------------------------------------------------
// The store trait
// ---------------------------------------------------------------------------

/// Typed blob store over one bucket namespace.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object and its current version token.
    async fn get(&self, key: &str) -> Result<(Vec<u8>, VersionToken), StoreError>;

    /// Unconditional write; returns the new version token.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<VersionToken, StoreError>;

    /// Conditional write; fails with [`StoreError::VersionMismatch`] when
    /// the stored version differs from `expected`.
    async fn put_if_version(
        &self,
        key: &str,
        body: Vec<u8>,
        expected: &VersionToken,
    ) -> Result<VersionToken, StoreError>;

    /// Existence probe without body transfer.
    async fn head(&self, key: &str) -> Result<Option<VersionToken>, StoreError>;

    /// Idempotent delete; deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// One page of keys under `prefix`, in key order, starting strictly
    /// after `start_after` when given.
    async fn list(&self, prefix: &str, start_after: Option<&str>)
    -> Result<ListPage, StoreError>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<(Vec<u8>, VersionToken), StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<VersionToken, StoreError> {
        (**self).put(key, body).await
    }

    async fn put_if_version(
        &self,
        key: &str,
        body: Vec<u8>,
        expected: &VersionToken,
    ) -> Result<VersionToken, StoreError> {
        (**self).put_if_version(key, body, expected).await
    }

    async fn head(&self, key: &str) -> Result<Option<VersionToken>, StoreError> {
        (**self).head(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        (**self).list(prefix, start_after).await
    }
}

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

/// The authoritative key for a record.
#[must_use]
pub fn archive_key(record_id: &str) -> String {
    format!("archive/{record_id}")
}

/// The transient trigger key for a record and customer.
#[must_use]
pub fn trigger_key(customer_code: &str, record_id: &str) -> String {
    format!("customers/{customer_code}/{record_id}")
}

/// Split a trigger key into `(customer_code, record_id)`.
#[must_use]
pub fn parse_trigger_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("customers/")?;
    let (code, id) = rest.split_once('/')?;
    if code.is_empty() || id.is_empty() || id.contains('/') {
        return None;
    }
    Some((code, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_helpers_round_trip() {
        let key = trigger_key("hts", "CHANGE-2025-001");
        assert_eq!(key, "customers/hts/CHANGE-2025-001");
        assert_eq!(parse_trigger_key(&key), Some(("hts", "CHANGE-2025-001")));
        assert_eq!(archive_key("CHANGE-2025-001"), "archive/CHANGE-2025-001");
    }

    #[test]
    fn malformed_trigger_keys_are_rejected() {
        for key in [
            "archive/CHANGE-2025-001",
            "customers/",
            "customers/hts",
            "customers//CHANGE-2025-001",
            "customers/hts/",
            "customers/hts/extra/CHANGE-2025-001",
        ] {
            assert_eq!(parse_trigger_key(key), None, "accepted {key:?}");
        }
    }

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        let cases: [(StoreError, FaultKind); 4] = [
            (
                StoreError::NotFound { key: "k".into() },
                FaultKind::NotFound,
            ),
            (
                StoreError::VersionMismatch { key: "k".into() },
                FaultKind::VersionConflict,
            ),
            (
                StoreError::Unauthorized { key: "k".into() },
                FaultKind::Authorization,
            ),
            (
                StoreError::Transient {
                    key: "k".into(),
                    reason: "x".into(),
                },
                FaultKind::Transient,
            ),
        ];
        for (err, kind) in cases {
            let fault = Fault::from(err);
            assert_eq!(fault.kind, kind);
            assert_eq!(fault.context("key"), Some("k"));
        }
    }
}
