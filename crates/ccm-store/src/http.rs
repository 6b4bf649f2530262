// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP-backed store speaking `ETag`/`If-Match`.
//!
//! The front-end upload component exposes the bucket namespace over
//! plain HTTP: object bodies under `/{bucket}/{key}`, entity tags in
//! `ETag`, conditional writes via `If-Match` (412 on mismatch), and a
//! JSON listing endpoint under `/{bucket}` with `prefix`/`start-after`
//! query parameters.

use crate::{ListPage, ObjectStore, ObjectSummary, StoreError, VersionToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// Store client for one bucket behind the upload component.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    objects: Vec<ListEntry>,
    #[serde(default)]
    next_start_after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    key: String,
    last_modified: DateTime<Utc>,
}

impl HttpStore {
    /// Client for `bucket` behind `base_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }

    fn transient(key: &str, err: &reqwest::Error) -> StoreError {
        StoreError::Transient {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }

    /// Map a non-success status onto the error taxonomy.
    fn classify(key: &str, status: StatusCode) -> StoreError {
        match status {
            StatusCode::NOT_FOUND => StoreError::NotFound {
                key: key.to_string(),
            },
            StatusCode::PRECONDITION_FAILED => StoreError::VersionMismatch {
                key: key.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized {
                key: key.to_string(),
            },
            other => StoreError::Transient {
                key: key.to_string(),
                reason: format!("unexpected status {other}"),
            },
        }
    }

    fn etag(key: &str, response: &Response) -> Result<VersionToken, StoreError> {
        response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(VersionToken::new)
            .ok_or_else(|| StoreError::Transient {
                key: key.to_string(),
                reason: "response carried no ETag".to_string(),
            })
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn get(&self, key: &str) -> Result<(Vec<u8>, VersionToken), StoreError> {
        let response = self
            .client
            .get(self.object_url(key))
            .send()
            .await
            .map_err(|e| Self::transient(key, &e))?;
        if !response.status().is_success() {
            return Err(Self::classify(key, response.status()));
        }
        let version = Self::etag(key, &response)?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transient(key, &e))?;
        Ok((body.to_vec(), version))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<VersionToken, StoreError> {
        let response = self
            .client
            .put(self.object_url(key))
            .body(body)
            .send()
            .await
            .map_err(|e| Self::transient(key, &e))?;
        if !response.status().is_success() {
            return Err(Self::classify(key, response.status()));
        }
        Self::etag(key, &response)
    }

    async fn put_if_version(
        &self,
        key: &str,
        body: Vec<u8>,
        expected: &VersionToken,
    ) -> Result<VersionToken, StoreError> {
        let response = self
            .client
            .put(self.object_url(key))
            .header(reqwest::header::IF_MATCH, expected.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| Self::transient(key, &e))?;
        if !response.status().is_success() {
            return Err(Self::classify(key, response.status()));
        }
        Self::etag(key, &response)
    }

    async fn head(&self, key: &str) -> Result<Option<VersionToken>, StoreError> {
        let response = self
            .client
            .head(self.object_url(key))
            .send()
            .await
            .map_err(|e| Self::transient(key, &e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Self::etag(key, &response).map(Some),
            status => Err(Self::classify(key, status)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.object_url(key))
            .send()
            .await
            .map_err(|e| Self::transient(key, &e))?;
        match response.status() {
            // Deleting a missing key is success.
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(Self::classify(key, status)),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let mut request = self
            .client
            .get(format!("{}/{}", self.base_url, self.bucket))
            .query(&[("prefix", prefix)]);
        if let Some(after) = start_after {
            request = request.query(&[("start-after", after)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Self::transient(prefix, &e))?;
        if !response.status().is_success() {
            return Err(Self::classify(prefix, response.status()));
        }
        let parsed: ListResponse = response
            .json()
            .await
            .map_err(|e| Self::transient(prefix, &e))?;
        Ok(ListPage {
            objects: parsed
                .objects
                .into_iter()
                .map(|e| ObjectSummary {
                    key: e.key,
                    last_modified: e.last_modified,
                })
                .collect(),
            next_start_after: parsed.next_start_after,
        })
    }
}
