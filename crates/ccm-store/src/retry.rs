// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retry policy and the retrying store wrapper.

use crate::{ListPage, ObjectStore, StoreError, VersionToken};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, pre-jitter.
    pub initial_backoff: Duration,
    /// Ceiling applied before jitter.
    pub max_backoff: Duration,
    /// Growth factor per attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Start building a custom policy.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// The store's operational policy: five attempts in total.
    #[must_use]
    pub fn store_default() -> Self {
        Self {
            max_retries: 4,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based), with ±25% jitter.
    #[must_use]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64);
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((capped * jitter).round() as u64)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: Option<RetryPolicy>,
}

impl RetryPolicyBuilder {
    fn policy(&mut self) -> &mut RetryPolicy {
        self.policy.get_or_insert_with(RetryPolicy::default)
    }

    /// Set the number of retries after the first attempt.
    #[must_use]
    pub fn max_retries(mut self, value: u32) -> Self {
        self.policy().max_retries = value;
        self
    }

    /// Set the pre-jitter delay before the first retry.
    #[must_use]
    pub fn initial_backoff(mut self, value: Duration) -> Self {
        self.policy().initial_backoff = value;
        self
    }

    /// Set the backoff ceiling.
    #[must_use]
    pub fn max_backoff(mut self, value: Duration) -> Self {
        self.policy().max_backoff = value;
        self
    }

    /// Set the growth factor.
    #[must_use]
    pub fn backoff_multiplier(mut self, value: f64) -> Self {
        self.policy().backoff_multiplier = value;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// RetryingStore
// ---------------------------------------------------------------------------

/// Wraps any [`ObjectStore`], retrying transient failures.
///
/// Only [`StoreError::Transient`] is retried; version mismatches,
/// missing objects, and authorization failures pass straight through.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ObjectStore> RetryingStore<S> {
    /// Wrap `inner` with the given policy.
    #[must_use]
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Wrap `inner` with [`RetryPolicy::store_default`].
    #[must_use]
    pub fn with_defaults(inner: S) -> Self {
        Self::new(inner, RetryPolicy::store_default())
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, op: &str, key: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.compute_delay(attempt);
                    debug!(op, key, attempt, ?delay, "retrying transient store failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    async fn get(&self, key: &str) -> Result<(Vec<u8>, VersionToken), StoreError> {
        self.run("get", key, || self.inner.get(key)).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<VersionToken, StoreError> {
        self.run("put", key, || self.inner.put(key, body.clone()))
            .await
    }

    async fn put_if_version(
        &self,
        key: &str,
        body: Vec<u8>,
        expected: &VersionToken,
    ) -> Result<VersionToken, StoreError> {
        self.run("put_if_version", key, || {
            self.inner.put_if_version(key, body.clone(), expected)
        })
        .await
    }

    async fn head(&self, key: &str) -> Result<Option<VersionToken>, StoreError> {
        self.run("head", key, || self.inner.head(key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.run("delete", key, || self.inner.delete(key)).await
    }

    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        self.run("list", prefix, || self.inner.list(prefix, start_after))
            .await
    }
}
