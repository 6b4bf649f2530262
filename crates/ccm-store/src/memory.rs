// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory store used by tests and local runs.

use crate::{ListPage, ObjectStore, ObjectSummary, StoreError, VersionToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

const PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct Stored {
    body: Vec<u8>,
    version: VersionToken,
    last_modified: DateTime<Utc>,
}

/// A [`BTreeMap`]-backed store with the same conditional-write semantics
/// as the production one.
///
/// Versions come from a process-local counter, so tokens are unique per
/// store instance for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Stored>>,
    counter: AtomicU64,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> VersionToken {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        VersionToken::new(format!("v{n}"))
    }

    /// Number of stored objects (test helper).
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects (test helper).
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<(Vec<u8>, VersionToken), StoreError> {
        let objects = self.objects.read().await;
        let stored = objects.get(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        Ok((stored.body.clone(), stored.version.clone()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<VersionToken, StoreError> {
        let version = self.next_version();
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            Stored {
                body,
                version: version.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        body: Vec<u8>,
        expected: &VersionToken,
    ) -> Result<VersionToken, StoreError> {
        let mut objects = self.objects.write().await;
        let stored = objects.get(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        if &stored.version != expected {
            return Err(StoreError::VersionMismatch {
                key: key.to_string(),
            });
        }
        let version = self.next_version();
        objects.insert(
            key.to_string(),
            Stored {
                body,
                version: version.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(version)
    }

    async fn head(&self, key: &str) -> Result<Option<VersionToken>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).map(|s| s.version.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let objects = self.objects.read().await;
        let mut page = Vec::new();
        for (key, stored) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(after) = start_after {
                if key.as_str() <= after {
                    continue;
                }
            }
            page.push(ObjectSummary {
                key: key.clone(),
                last_modified: stored.last_modified,
            });
            if page.len() == PAGE_SIZE + 1 {
                break;
            }
        }
        let next_start_after = if page.len() > PAGE_SIZE {
            page.truncate(PAGE_SIZE);
            page.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ListPage {
            objects: page,
            next_start_after,
        })
    }
}
