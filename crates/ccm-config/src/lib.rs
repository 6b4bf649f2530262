// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and validation for the contact manager.
//!
//! This crate provides [`AppConfig`] — the settings a process is handed
//! once at startup — together with helpers for loading from TOML files
//! and producing advisory [`ConfigWarning`]s. There is no ambient global
//! state anywhere in the workspace; everything configurable flows through
//! this type.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use ccm_datetime::DateTimeConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A customer carries an empty restricted-recipients list, which
    /// filters out every recipient.
    EmptyAllowList {
        /// The affected customer code.
        customer_code: String,
    },
    /// The invocation deadline is unusually large.
    LargeDeadline {
        /// Deadline value in seconds.
        secs: u64,
    },
    /// No customers are configured; the processor will discard all work.
    NoCustomers,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// One tenant organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerDescriptor {
    /// Stable customer code; doubles as the trigger directory segment.
    pub customer_code: String,
    /// Human-facing name.
    pub display_name: String,
    /// Cloud region the customer's services live in.
    pub region: String,
    /// Role principal assumed to reach the customer's email service.
    pub email_role_principal: String,
    /// The customer's per-code queue.
    pub queue_identifier: String,
    /// Allow-list applied to every recipient sourced from this customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted_recipients: Option<Vec<String>>,
}

/// Datetime defaults handed to [`ccm_datetime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DateTimeSettings {
    /// IANA zone assumed for inputs without an offset.
    pub default_timezone: String,
    /// Skip past-date validation (bulk imports only).
    pub allow_past_dates: bool,
    /// Minutes of slack before a start counts as past.
    pub future_tolerance_minutes: i64,
}

impl Default for DateTimeSettings {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
            allow_past_dates: false,
            future_tolerance_minutes: 5,
        }
    }
}

impl DateTimeSettings {
    /// Resolve into the typed [`DateTimeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the zone name is not
    /// in the tz database.
    pub fn resolve(&self) -> Result<DateTimeConfig, ConfigError> {
        let default_timezone = ccm_datetime::parse_timezone(&self.default_timezone)
            .map_err(|e| ConfigError::ValidationError {
                reasons: vec![e.to_string()],
            })?;
        Ok(DateTimeConfig {
            default_timezone,
            allow_past_dates: self.allow_past_dates,
            future_tolerance: chrono::Duration::minutes(self.future_tolerance_minutes),
        })
    }
}

/// Retry and deadline tuning for the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Conditional-write attempts before surfacing a version conflict.
    pub max_etag_retries: u32,
    /// Object-store attempts for transient failures.
    pub store_max_attempts: u32,
    /// Wall-clock budget for one queue message, in seconds.
    pub invocation_deadline_secs: u64,
    /// Subtracted from credential expiry when computing cache TTL, seconds.
    pub credential_ttl_margin_secs: u64,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_etag_retries: 3,
            store_max_attempts: 5,
            invocation_deadline_secs: 45,
            credential_ttl_margin_secs: 120,
        }
    }
}

/// Where and how to reach the meeting provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MeetingProviderSettings {
    /// Base URL of the provider API.
    pub base_url: String,
    /// Organizer email stamped on every meeting.
    pub organizer: String,
}

/// Where the worker reaches the bucket namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(default)]
pub struct StoreSettings {
    /// Base URL of the upload component serving the bucket.
    pub endpoint: Option<String>,
}

/// Where the worker reaches the per-customer queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QueueSettings {
    /// Base URL of the queue service.
    pub endpoint: Option<String>,
    /// Long-poll wait per receive, seconds.
    pub wait_seconds: u64,
    /// Messages per receive.
    pub max_messages: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            wait_seconds: 20,
            max_messages: 10,
        }
    }
}

/// How per-customer email service endpoints are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EmailSettings {
    /// Endpoint template; `{region}` is replaced per customer.
    pub endpoint_template: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            endpoint_template: "https://email.{region}.example.com".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Top-level process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// Object-store bucket holding `archive/` and `customers/`.
    pub bucket: String,
    /// The processor's own role principal; events it emits are discarded.
    pub processor_principal: String,
    /// The tenant directory.
    #[serde(default)]
    pub customers: Vec<CustomerDescriptor>,
    /// Datetime defaults.
    #[serde(default)]
    pub datetime: DateTimeSettings,
    /// Retry and deadline tuning.
    #[serde(default)]
    pub processing: ProcessingSettings,
    /// Meeting provider endpoint and organizer.
    pub meeting_provider: MeetingProviderSettings,
    /// Email endpoint derivation.
    #[serde(default)]
    pub email: EmailSettings,
    /// Bucket namespace endpoint (worker deployments).
    #[serde(default)]
    pub store: StoreSettings,
    /// Queue service endpoint and polling knobs (worker deployments).
    #[serde(default)]
    pub queue: QueueSettings,
}

impl AppConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] on malformed TOML and
    /// [`ConfigError::ValidationError`] when semantic checks fail.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] when the path does not exist,
    /// plus everything [`Self::from_toml_str`] can return.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Semantic validation; problems are accumulated, not short-circuited.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();

        if self.bucket.trim().is_empty() {
            reasons.push("bucket must not be empty".to_string());
        }
        if self.processor_principal.trim().is_empty() {
            reasons.push("processor_principal must not be empty".to_string());
        }
        if self.meeting_provider.base_url.trim().is_empty() {
            reasons.push("meeting_provider.base_url must not be empty".to_string());
        }
        if !self.meeting_provider.organizer.contains('@') {
            reasons.push("meeting_provider.organizer must be an email address".to_string());
        }
        if !self.email.endpoint_template.contains("{region}") {
            reasons.push("email.endpoint_template must contain {region}".to_string());
        }
        if let Err(e) = ccm_datetime::parse_timezone(&self.datetime.default_timezone) {
            reasons.push(e.to_string());
        }
        if self.processing.max_etag_retries == 0 {
            reasons.push("processing.max_etag_retries must be at least 1".to_string());
        }

        let mut seen = BTreeSet::new();
        for customer in &self.customers {
            if customer.customer_code.trim().is_empty() {
                reasons.push("customer_code must not be empty".to_string());
            } else if !seen.insert(customer.customer_code.as_str()) {
                reasons.push(format!(
                    "duplicate customer_code {:?}",
                    customer.customer_code
                ));
            }
            if customer.email_role_principal.trim().is_empty() {
                reasons.push(format!(
                    "customer {:?} needs an email_role_principal",
                    customer.customer_code
                ));
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }

    /// Advisory problems worth logging at startup.
    #[must_use]
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.customers.is_empty() {
            warnings.push(ConfigWarning::NoCustomers);
        }
        for customer in &self.customers {
            if matches!(&customer.restricted_recipients, Some(list) if list.is_empty()) {
                warnings.push(ConfigWarning::EmptyAllowList {
                    customer_code: customer.customer_code.clone(),
                });
            }
        }
        if self.processing.invocation_deadline_secs > 300 {
            warnings.push(ConfigWarning::LargeDeadline {
                secs: self.processing.invocation_deadline_secs,
            });
        }
        warnings
    }

    /// Look up a customer by code.
    #[must_use]
    pub fn customer(&self, code: &str) -> Option<&CustomerDescriptor> {
        self.customers.iter().find(|c| c.customer_code == code)
    }

    /// The email service endpoint for a customer, derived from its region.
    #[must_use]
    pub fn email_endpoint(&self, customer: &CustomerDescriptor) -> String {
        self.email
            .endpoint_template
            .replace("{region}", &customer.region)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        bucket = "contact-manager-prod"
        processor_principal = "arn:aws:sts::111111111111:assumed-role/ccm-processor"

        [meeting_provider]
        base_url = "https://graph.example.com/v1"
        organizer = "ccoe@example.org"

        [[customers]]
        customer_code = "hts"
        display_name = "HTS Corp"
        region = "eu-central-1"
        email_role_principal = "arn:aws:iam::222222222222:role/ccm-email"
        queue_identifier = "ccm-hts-events"

        [[customers]]
        customer_code = "cds"
        display_name = "CDS GmbH"
        region = "eu-west-1"
        email_role_principal = "arn:aws:iam::333333333333:role/ccm-email"
        queue_identifier = "ccm-cds-events"
        restricted_recipients = ["ops@cds.example"]
    "#;

    #[test]
    fn loads_a_minimal_config() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.bucket, "contact-manager-prod");
        assert_eq!(config.customers.len(), 2);
        assert_eq!(config.processing.max_etag_retries, 3);
        assert_eq!(config.processing.invocation_deadline_secs, 45);
        assert_eq!(config.datetime.default_timezone, "UTC");
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn customer_lookup_and_endpoint_derivation() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        let hts = config.customer("hts").unwrap();
        assert_eq!(
            config.email_endpoint(hts),
            "https://email.eu-central-1.example.com"
        );
        assert!(config.customer("nope").is_none());
    }

    #[test]
    fn rejects_duplicate_customer_codes() {
        let raw = MINIMAL.replace("\"cds\"", "\"hts\"");
        let err = AppConfig::from_toml_str(&raw).unwrap_err();
        let ConfigError::ValidationError { reasons } = err else {
            panic!("expected validation error");
        };
        assert!(reasons.iter().any(|r| r.contains("duplicate")));
    }

    #[test]
    fn rejects_bad_timezone() {
        let raw = MINIMAL.replace(
            "[meeting_provider]",
            "[datetime]\ndefault_timezone = \"Middle/Earth\"\n\n[meeting_provider]",
        );
        let err = AppConfig::from_toml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = AppConfig::from_toml_str("bucket = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let err = AppConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ccm.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.customers[1].customer_code, "cds");
    }

    #[test]
    fn empty_allow_list_warns() {
        let raw = MINIMAL.replace(
            "restricted_recipients = [\"ops@cds.example\"]",
            "restricted_recipients = []",
        );
        let config = AppConfig::from_toml_str(&raw).unwrap();
        assert_eq!(
            config.warnings(),
            vec![ConfigWarning::EmptyAllowList {
                customer_code: "cds".to_string()
            }]
        );
    }

    #[test]
    fn datetime_settings_resolve() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        let resolved = config.datetime.resolve().unwrap();
        assert_eq!(resolved.default_timezone, chrono_tz::UTC);
        assert_eq!(resolved.future_tolerance, chrono::Duration::minutes(5));
    }
}
