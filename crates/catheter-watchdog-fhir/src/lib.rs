//! FHIR R4 adapter for the catheter watchdog.
//!
//! Implements [`catheter_watchdog_core::CatheterDataSource`] over a FHIR REST
//! server: `Device?type=catheter&_include=Device:patient` for discovery and
//! `Device?patient={id}&type=catheter&_sort=-_lastUpdated` for the
//! per-patient record.

pub mod bundle;
pub mod client;

pub use bundle::*;
pub use client::*;

use catheter_watchdog_core::SourceError;
use thiserror::Error;

/// FHIR adapter errors.
#[derive(Error, Debug)]
pub enum FhirError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected resource shape: {0}")]
    Shape(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type FhirResult<T> = Result<T, FhirError>;

impl FhirError {
    /// Whether the server could not be reached or was temporarily failing.
    pub fn is_connectivity(&self) -> bool {
        match self {
            FhirError::Network(_) => true,
            FhirError::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            FhirError::Json(_) | FhirError::Shape(_) | FhirError::InvalidUrl(_) => false,
        }
    }
}

impl From<FhirError> for SourceError {
    fn from(e: FhirError) -> Self {
        if e.is_connectivity() {
            SourceError::DataSourceUnreachable(e.to_string())
        } else {
            SourceError::MalformedRecord(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: SourceError = FhirError::Status(503).into();
        assert!(matches!(err, SourceError::DataSourceUnreachable(_)));

        let err: SourceError = FhirError::Status(404).into();
        assert!(matches!(err, SourceError::MalformedRecord(_)));

        let err: SourceError = FhirError::Shape("entry is not an object".into()).into();
        assert!(matches!(err, SourceError::MalformedRecord(_)));
    }

    #[test]
    fn test_invalid_url_is_not_retried() {
        let err = FhirError::InvalidUrl("relative URL without a base".into());
        assert!(!err.is_connectivity());

        let err: SourceError = err.into();
        assert!(!err.is_retryable());
    }
}
