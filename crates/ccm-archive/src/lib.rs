// SPDX-License-Identifier: MIT OR Apache-2.0
//! ccm-archive
//!
//! Optimistic-concurrency mutations of the authoritative record.
//!
//! `archive/{id}` is owned by this crate: every mutation re-reads the
//! record, applies a mutation function, and writes back conditionally on
//! the version it read. Concurrent per-customer fan-outs serialize here;
//! a lost race re-runs the mutation against the fresh record.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use ccm_core::{
    MeetingMetadata, ModificationEntry, ModificationType, Record, decode_record, encode_record,
    modlog,
};
use ccm_error::{Fault, FaultKind};
use ccm_store::{ObjectStore, StoreError, archive_key};
use chrono::Utc;
use tracing::{debug, warn};

/// Conditional-write attempts before a version conflict is surfaced.
pub const MAX_ETAG_RETRIES: u32 = 3;

/// All archive mutations go through this component.
pub struct ArchiveUpdater<S> {
    store: S,
    actor: String,
    max_etag_retries: u32,
}

impl<S: ObjectStore> ArchiveUpdater<S> {
    /// Updater writing modification entries as `actor` (the processor's
    /// role principal, or `"system"`).
    #[must_use]
    pub fn new(store: S, actor: impl Into<String>) -> Self {
        Self {
            store,
            actor: actor.into(),
            max_etag_retries: MAX_ETAG_RETRIES,
        }
    }

    /// Override the retry budget (configuration-driven).
    #[must_use]
    pub fn with_max_retries(mut self, max_etag_retries: u32) -> Self {
        self.max_etag_retries = max_etag_retries.max(1);
        self
    }

    /// The wrapped store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read-mutate-write with conditional-put retries.
    ///
    /// `mutate` runs against a freshly decoded record on every attempt,
    /// so it must be idempotent over re-reads (the specialized mutations
    /// below are). Returns the record as written.
    ///
    /// # Errors
    ///
    /// Store faults pass through; a mutation failure aborts without
    /// writing; exhausting the retry budget yields a
    /// [`FaultKind::VersionConflict`] fault.
    pub async fn update<F>(&self, record_id: &str, mut mutate: F) -> Result<Record, Fault>
    where
        F: FnMut(&mut Record) -> Result<(), Fault> + Send,
    {
        let key = archive_key(record_id);
        for attempt in 0..self.max_etag_retries {
            let (body, version) = self.store.get(&key).await.map_err(Fault::from)?;
            let mut record = decode_record(&body).map_err(|e| {
                Fault::new(FaultKind::Validation, "archive body is not a valid record")
                    .with_context("key", key.as_str())
                    .with_source(e)
            })?;

            mutate(&mut record)?;

            let bytes = encode_record(&record).map_err(|e| {
                Fault::new(FaultKind::Validation, "record failed to serialize").with_source(e)
            })?;
            match self.store.put_if_version(&key, bytes, &version).await {
                Ok(_) => return Ok(record),
                Err(StoreError::VersionMismatch { .. }) => {
                    debug!(key = key.as_str(), attempt, "archive write lost the race; retrying");
                }
                Err(err) => return Err(Fault::from(err)),
            }
        }

        warn!(key = key.as_str(), "archive update exhausted its retry budget");
        Err(
            Fault::new(FaultKind::VersionConflict, "concurrent archive modification")
                .with_context("key", key)
                .with_context("attempts", self.max_etag_retries),
        )
    }

    /// Record that this customer's fan-out finished.
    ///
    /// A `processed` entry already present for the customer makes this a
    /// no-op, so duplicate deliveries cannot double-book.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update`].
    pub async fn append_processed(
        &self,
        record_id: &str,
        customer_code: &str,
    ) -> Result<Record, Fault> {
        let actor = self.actor.clone();
        self.update(record_id, move |record| {
            if modlog::has_processed(record, customer_code) {
                return Ok(());
            }
            modlog::append(
                record,
                ModificationEntry::new(ModificationType::Processed, actor.clone(), Utc::now())
                    .with_customer(customer_code),
            );
            Ok(())
        })
        .await
    }

    /// Record a scheduled meeting and this customer's `processed` entry
    /// in one conditional write.
    ///
    /// The `meeting_scheduled` entry is skipped when the record already
    /// carries this meeting (another customer's fan-out won the race);
    /// the `processed` entry dedups like [`Self::append_processed`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::update`].
    pub async fn set_meeting_and_processed(
        &self,
        record_id: &str,
        customer_code: &str,
        metadata: MeetingMetadata,
    ) -> Result<Record, Fault> {
        let actor = self.actor.clone();
        self.update(record_id, move |record| {
            use ccm_core::WorkflowRecord;
            if record.meeting_id() != Some(metadata.meeting_id.as_str()) {
                modlog::append(
                    record,
                    ModificationEntry::new(
                        ModificationType::MeetingScheduled,
                        actor.clone(),
                        Utc::now(),
                    )
                    .with_meeting(metadata.clone()),
                );
            }
            if !modlog::has_processed(record, customer_code) {
                modlog::append(
                    record,
                    ModificationEntry::new(ModificationType::Processed, actor.clone(), Utc::now())
                        .with_customer(customer_code),
                );
            }
            Ok(())
        })
        .await
    }

    /// Record that the meeting was cancelled; clears the top-level
    /// meeting fields.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update`].
    pub async fn append_meeting_cancelled(&self, record_id: &str) -> Result<Record, Fault> {
        let actor = self.actor.clone();
        self.update(record_id, move |record| {
            modlog::append(
                record,
                ModificationEntry::new(
                    ModificationType::MeetingCancelled,
                    actor.clone(),
                    Utc::now(),
                ),
            );
            Ok(())
        })
        .await
    }
}
