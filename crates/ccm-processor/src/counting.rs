// SPDX-License-Identifier: MIT OR Apache-2.0
//! Store wrapper that counts operations for the execution summary.

use async_trait::async_trait;
use ccm_store::{ListPage, ObjectStore, StoreError, VersionToken};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Shared operation counters for one invocation.
#[derive(Debug, Default)]
pub struct StoreCounters {
    downloads: AtomicU64,
    uploads: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl StoreCounters {
    /// Point-in-time counter values: `(downloads, uploads, deletes, errors)`.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.downloads.load(Relaxed),
            self.uploads.load(Relaxed),
            self.deletes.load(Relaxed),
            self.errors.load(Relaxed),
        )
    }
}

/// Counts every operation passing through to the wrapped store.
///
/// Not-found on get/head is an answer, not an error; only genuine
/// failures bump the error counter.
#[derive(Clone)]
pub struct CountingStore {
    inner: Arc<dyn ObjectStore>,
    counters: Arc<StoreCounters>,
}

impl CountingStore {
    /// Wrap `inner`, reporting into `counters`.
    #[must_use]
    pub fn new(inner: Arc<dyn ObjectStore>, counters: Arc<StoreCounters>) -> Self {
        Self { inner, counters }
    }

    fn track<T>(
        &self,
        counter: &AtomicU64,
        result: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &result {
            Ok(_) | Err(StoreError::NotFound { .. }) => {
                counter.fetch_add(1, Relaxed);
            }
            Err(_) => {
                self.counters.errors.fetch_add(1, Relaxed);
            }
        }
        result
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn get(&self, key: &str) -> Result<(Vec<u8>, VersionToken), StoreError> {
        let result = self.inner.get(key).await;
        self.track(&self.counters.downloads, result)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<VersionToken, StoreError> {
        let result = self.inner.put(key, body).await;
        self.track(&self.counters.uploads, result)
    }

    async fn put_if_version(
        &self,
        key: &str,
        body: Vec<u8>,
        expected: &VersionToken,
    ) -> Result<VersionToken, StoreError> {
        let result = self.inner.put_if_version(key, body, expected).await;
        self.track(&self.counters.uploads, result)
    }

    async fn head(&self, key: &str) -> Result<Option<VersionToken>, StoreError> {
        let result = self.inner.head(key).await;
        self.track(&self.counters.downloads, result)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let result = self.inner.delete(key).await;
        self.track(&self.counters.deletes, result)
    }

    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let result = self.inner.list(prefix, start_after).await;
        self.track(&self.counters.downloads, result)
    }
}
