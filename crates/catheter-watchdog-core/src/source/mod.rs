//! External collaborators: patient discovery and catheter data.
//!
//! The workflow only sees these through [`CatheterDataSource`]; transports
//! (FHIR REST, mock) live behind it.

mod discovery;
mod mock;

pub use discovery::*;
pub use mock::*;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CatheterRecord, PatientId};

/// Data source errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Data source unreachable: {0}")]
    DataSourceUnreachable(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

impl SourceError {
    /// Connectivity failures are worth another attempt; bad data is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::DataSourceUnreachable(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Source of catheter patients and device records.
#[async_trait]
pub trait CatheterDataSource: Send + Sync {
    /// Deduplicated identifiers of patients with any catheter device.
    /// Nothing found is an empty set, not an error.
    async fn discover_catheter_patients(&self) -> SourceResult<BTreeSet<PatientId>>;

    /// Most recent catheter record for a patient, `None` if none is known.
    async fn fetch_catheter_record(&self, patient_id: &str)
        -> SourceResult<Option<CatheterRecord>>;
}
