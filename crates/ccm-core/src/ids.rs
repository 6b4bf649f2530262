// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical record identifiers.
//!
//! Changes are identified as `CHANGE-YYYY-NNN` and announcements as
//! `{CIC|FIN|INN|GEN}-YYYY-NNN`, where the sequence part is at least
//! three digits. The identifier string is the object key segment on the
//! wire, so it is validated once at the boundary and carried as a typed
//! value everywhere else.

use crate::model::AnnouncementType;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

static CHANGE_ID: OnceLock<Regex> = OnceLock::new();
static ANNOUNCEMENT_ID: OnceLock<Regex> = OnceLock::new();

fn change_id_pattern() -> &'static Regex {
    CHANGE_ID.get_or_init(|| Regex::new(r"^CHANGE-\d{4}-\d{3,}$").expect("static pattern"))
}

fn announcement_id_pattern() -> &'static Regex {
    ANNOUNCEMENT_ID
        .get_or_init(|| Regex::new(r"^(CIC|FIN|INN|GEN)-\d{4}-\d{3,}$").expect("static pattern"))
}

/// Which family of record an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A change request (`CHANGE-…`).
    Change,
    /// A typed announcement (`CIC-…`, `FIN-…`, `INN-…`, `GEN-…`).
    Announcement,
}

/// A malformed record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed record id: {0:?}")]
pub struct IdError(pub String);

/// Validated record identifier.
///
/// # Examples
///
/// ```
/// use ccm_core::{RecordId, RecordKind};
///
/// let id = RecordId::parse("CHANGE-2025-001").unwrap();
/// assert_eq!(id.kind(), RecordKind::Change);
/// assert!(RecordId::parse("CHANGE-25-1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Validate and wrap an identifier string.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] when the string matches neither the change nor
    /// the announcement pattern.
    pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
        let s = s.into();
        if change_id_pattern().is_match(&s) || announcement_id_pattern().is_match(&s) {
            Ok(Self(s))
        } else {
            Err(IdError(s))
        }
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a change or an announcement identifier.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        if self.0.starts_with("CHANGE-") {
            RecordKind::Change
        } else {
            RecordKind::Announcement
        }
    }

    /// The announcement type encoded in the prefix, for announcement ids.
    #[must_use]
    pub fn announcement_type(&self) -> Option<AnnouncementType> {
        match self.0.split('-').next() {
            Some("CIC") => Some(AnnouncementType::Cic),
            Some("FIN") => Some(AnnouncementType::Finops),
            Some("INN") => Some(AnnouncementType::Innersource),
            Some("GEN") => Some(AnnouncementType::General),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_change_ids() {
        for s in ["CHANGE-2025-001", "CHANGE-2024-999", "CHANGE-2025-1234"] {
            assert_eq!(RecordId::parse(s).unwrap().kind(), RecordKind::Change);
        }
    }

    #[test]
    fn accepts_announcement_ids() {
        for (s, ty) in [
            ("CIC-2025-001", AnnouncementType::Cic),
            ("FIN-2025-002", AnnouncementType::Finops),
            ("INN-2025-003", AnnouncementType::Innersource),
            ("GEN-2025-004", AnnouncementType::General),
        ] {
            let id = RecordId::parse(s).unwrap();
            assert_eq!(id.kind(), RecordKind::Announcement);
            assert_eq!(id.announcement_type(), Some(ty));
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        for s in [
            "",
            "CHANGE-25-001",
            "CHANGE-2025-01",
            "change-2025-001",
            "CHG-2025-001",
            "CIC-2025-01",
            "CHANGE-2025-001 ",
            "GEN_2025_001",
        ] {
            assert!(RecordId::parse(s).is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn serde_rejects_malformed_ids() {
        let ok: Result<RecordId, _> = serde_json::from_str("\"CHANGE-2025-001\"");
        assert!(ok.is_ok());
        let bad: Result<RecordId, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn display_is_verbatim() {
        let id = RecordId::parse("GEN-2025-010").unwrap();
        assert_eq!(id.to_string(), "GEN-2025-010");
        assert_eq!(id.as_str(), "GEN-2025-010");
    }
}
