// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-credentials
//!
//! Per-customer credential brokering.
//!
//! A [`CredentialSource`] knows how to assume a customer's email role;
//! the [`CredentialBroker`] in front of it caches the result per
//! customer code with a TTL shorter than the credential's true expiry.
//! Consumers that hit an authorization failure mid-use call
//! [`CredentialBroker::refresh`] exactly once before giving up on that
//! customer.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use ccm_config::CustomerDescriptor;
use ccm_error::{Fault, FaultKind};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Short-lived credentials for one customer's services.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key identifier.
    pub access_key_id: String,
    /// Signing secret.
    pub secret_access_key: String,
    /// Session token bound to the assumed role.
    pub session_token: String,
    /// Hard expiry as reported by the issuer.
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Credentials {
    // Secrets never reach logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures resolving credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The customer code is not in the directory.
    #[error("unknown customer: {0}")]
    CustomerUnknown(String),

    /// The issuer rejected the assumption outright.
    #[error("credential acquisition denied for {customer_code}: {reason}")]
    Denied {
        /// The affected customer.
        customer_code: String,
        /// Issuer-reported reason.
        reason: String,
    },

    /// The issuer could not be reached.
    #[error("credential acquisition failed for {customer_code}: {reason}")]
    Unavailable {
        /// The affected customer.
        customer_code: String,
        /// What went wrong.
        reason: String,
    },
}

impl From<CredentialError> for Fault {
    fn from(err: CredentialError) -> Self {
        let kind = match &err {
            CredentialError::CustomerUnknown(_) => FaultKind::NotFound,
            CredentialError::Denied { .. } => FaultKind::Authorization,
            CredentialError::Unavailable { .. } => FaultKind::Transient,
        };
        Fault::new(kind, err.to_string()).with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Source and broker
// ---------------------------------------------------------------------------

/// Acquires fresh credentials for a customer (role assumption).
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Assume the customer's email role and return fresh credentials.
    async fn acquire(&self, customer: &CustomerDescriptor) -> Result<Credentials, CredentialError>;
}

/// Fixed credentials per customer code, for tests and local runs.
#[derive(Debug, Default)]
pub struct StaticCredentialSource {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentialSource {
    /// Empty source; every acquisition is denied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register fixed credentials for a customer code.
    #[must_use]
    pub fn with_customer(mut self, code: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(code.into(), credentials);
        self
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn acquire(&self, customer: &CustomerDescriptor) -> Result<Credentials, CredentialError> {
        self.entries
            .get(&customer.customer_code)
            .cloned()
            .ok_or_else(|| CredentialError::Denied {
                customer_code: customer.customer_code.clone(),
                reason: "no static credentials registered".to_string(),
            })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    credentials: Credentials,
    stale_after: DateTime<Utc>,
}

/// Caching front over a [`CredentialSource`].
pub struct CredentialBroker {
    source: Arc<dyn CredentialSource>,
    customers: HashMap<String, CustomerDescriptor>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl_margin: Duration,
}

impl CredentialBroker {
    /// Broker over `source` for the given customer directory.
    ///
    /// `ttl_margin` is subtracted from each credential's expiry when
    /// computing cache staleness, so entries are refreshed before the
    /// issuer would reject them.
    #[must_use]
    pub fn new(
        source: Arc<dyn CredentialSource>,
        customers: impl IntoIterator<Item = CustomerDescriptor>,
        ttl_margin: Duration,
    ) -> Self {
        Self {
            source,
            customers: customers
                .into_iter()
                .map(|c| (c.customer_code.clone(), c))
                .collect(),
            cache: RwLock::new(HashMap::new()),
            ttl_margin,
        }
    }

    /// The descriptor for a customer code.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::CustomerUnknown`] for codes outside the
    /// directory.
    pub fn descriptor(&self, customer_code: &str) -> Result<&CustomerDescriptor, CredentialError> {
        self.customers
            .get(customer_code)
            .ok_or_else(|| CredentialError::CustomerUnknown(customer_code.to_string()))
    }

    /// Credentials for a customer, from cache when fresh enough.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::CustomerUnknown`] for unknown codes and
    /// the source's error when acquisition fails.
    pub async fn credentials_for(
        &self,
        customer_code: &str,
    ) -> Result<Credentials, CredentialError> {
        let customer = self.descriptor(customer_code)?.clone();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(customer_code) {
                if entry.stale_after > Utc::now() {
                    return Ok(entry.credentials.clone());
                }
            }
        }

        self.acquire_and_cache(&customer).await
    }

    /// Drop any cached entry and acquire fresh credentials.
    ///
    /// Called once by consumers whose request was rejected mid-use; a
    /// second rejection after this is fatal for the customer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::credentials_for`].
    pub async fn refresh(&self, customer_code: &str) -> Result<Credentials, CredentialError> {
        let customer = self.descriptor(customer_code)?.clone();
        self.invalidate(customer_code).await;
        self.acquire_and_cache(&customer).await
    }

    /// Drop any cached entry for the customer.
    pub async fn invalidate(&self, customer_code: &str) {
        self.cache.write().await.remove(customer_code);
    }

    async fn acquire_and_cache(
        &self,
        customer: &CustomerDescriptor,
    ) -> Result<Credentials, CredentialError> {
        let credentials = self.source.acquire(customer).await?;
        debug!(
            customer_code = customer.customer_code.as_str(),
            expires_at = %credentials.expires_at,
            "acquired credentials"
        );
        let entry = CacheEntry {
            credentials: credentials.clone(),
            stale_after: credentials.expires_at - self.ttl_margin,
        };
        self.cache
            .write()
            .await
            .insert(customer.customer_code.clone(), entry);
        Ok(credentials)
    }
}

impl fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("customers", &self.customers.len())
            .field("ttl_margin", &self.ttl_margin)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn descriptor(code: &str) -> CustomerDescriptor {
        CustomerDescriptor {
            customer_code: code.to_string(),
            display_name: code.to_uppercase(),
            region: "eu-central-1".to_string(),
            email_role_principal: format!("arn:aws:iam::1:role/{code}-email"),
            queue_identifier: format!("ccm-{code}-events"),
            restricted_recipients: None,
        }
    }

    fn credentials(expires_in: Duration) -> Credentials {
        Credentials {
            access_key_id: "AKIA_TEST".to_string(),
            secret_access_key: "wJalrXUtnFEMI".to_string(),
            session_token: "FwoGZXIvYXdzEBc".to_string(),
            expires_at: Utc::now() + expires_in,
        }
    }

    /// Counts acquisitions and hands out credentials with a fixed lifetime.
    struct CountingSource {
        lifetime: Duration,
        calls: AtomicU32,
    }

    impl CountingSource {
        fn new(lifetime: Duration) -> Self {
            Self {
                lifetime,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CredentialSource for CountingSource {
        async fn acquire(
            &self,
            _customer: &CustomerDescriptor,
        ) -> Result<Credentials, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(credentials(self.lifetime))
        }
    }

    #[tokio::test]
    async fn unknown_customer_is_rejected() {
        let broker = CredentialBroker::new(
            Arc::new(StaticCredentialSource::new()),
            vec![descriptor("hts")],
            Duration::minutes(2),
        );
        let err = broker.credentials_for("nope").await.unwrap_err();
        assert_eq!(err, CredentialError::CustomerUnknown("nope".to_string()));
    }

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let source = Arc::new(CountingSource::new(Duration::hours(1)));
        let broker = CredentialBroker::new(
            source.clone(),
            vec![descriptor("hts")],
            Duration::minutes(2),
        );

        broker.credentials_for("hts").await.unwrap();
        broker.credentials_for("hts").await.unwrap();
        broker.credentials_for("hts").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entries_inside_the_margin_are_reacquired() {
        // Lifetime shorter than the margin: every call re-acquires.
        let source = Arc::new(CountingSource::new(Duration::seconds(30)));
        let broker = CredentialBroker::new(
            source.clone(),
            vec![descriptor("hts")],
            Duration::minutes(2),
        );

        broker.credentials_for("hts").await.unwrap();
        broker.credentials_for("hts").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_bypasses_the_cache() {
        let source = Arc::new(CountingSource::new(Duration::hours(1)));
        let broker = CredentialBroker::new(
            source.clone(),
            vec![descriptor("hts")],
            Duration::minutes(2),
        );

        broker.credentials_for("hts").await.unwrap();
        broker.refresh("hts").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // The refreshed entry is cached again.
        broker.credentials_for("hts").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn per_customer_entries_are_independent() {
        let source = Arc::new(CountingSource::new(Duration::hours(1)));
        let broker = CredentialBroker::new(
            source.clone(),
            vec![descriptor("hts"), descriptor("cds")],
            Duration::minutes(2),
        );

        broker.credentials_for("hts").await.unwrap();
        broker.credentials_for("cds").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        broker.invalidate("hts").await;
        broker.credentials_for("cds").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        broker.credentials_for("hts").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", credentials(Duration::hours(1)));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
        assert!(!rendered.contains("FwoGZXIvYXdzEBc"));
    }
}
