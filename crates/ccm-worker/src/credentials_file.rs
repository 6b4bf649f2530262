// SPDX-License-Identifier: MIT OR Apache-2.0
//! Development credential source: a mounted TOML secret.
//!
//! Production deployments replace this with role assumption against the
//! customer's account; the broker in front is identical either way.

use anyhow::{Context, Result};
use ccm_credentials::{Credentials, StaticCredentialSource};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    customers: Vec<CustomerCredentials>,
}

#[derive(Debug, Deserialize)]
struct CustomerCredentials {
    customer_code: String,
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expires_at: DateTime<Utc>,
}

/// Load a static credential source from a TOML secret file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load(path: impl AsRef<Path>) -> Result<StaticCredentialSource> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read credentials file {}", path.display()))?;
    let parsed: CredentialsFile = toml::from_str(&raw)
        .with_context(|| format!("parse credentials file {}", path.display()))?;

    let mut source = StaticCredentialSource::new();
    for entry in parsed.customers {
        source = source.with_customer(
            entry.customer_code,
            Credentials {
                access_key_id: entry.access_key_id,
                secret_access_key: entry.secret_access_key,
                session_token: entry.session_token,
                expires_at: entry.expires_at,
            },
        );
    }
    Ok(source)
}
