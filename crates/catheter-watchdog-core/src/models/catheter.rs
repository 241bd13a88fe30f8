//! Catheter device records.

use serde::{Deserialize, Serialize};

/// Opaque patient identifier as supplied by patient discovery.
pub type PatientId = String;

/// Most recent catheter device known for a patient.
///
/// Produced by a data source and never modified afterwards. The insertion
/// time is kept as the raw ISO-8601 string the source returned; it is parsed
/// when the elapsed time is computed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatheterRecord {
    /// Patient the device belongs to
    pub patient_id: PatientId,
    /// Insertion timestamp (ISO-8601, timezone-aware)
    pub inserted_at: String,
    /// Opaque device reference (e.g., "Device/123")
    pub device_reference: String,
}

impl CatheterRecord {
    /// Create a record from its three parts.
    pub fn new(
        patient_id: impl Into<PatientId>,
        inserted_at: impl Into<String>,
        device_reference: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            inserted_at: inserted_at.into(),
            device_reference: device_reference.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = CatheterRecord::new("patient-001", "2024-03-01T08:00:00Z", "Device/42");
        assert_eq!(record.patient_id, "patient-001");
        assert_eq!(record.inserted_at, "2024-03-01T08:00:00Z");
        assert_eq!(record.device_reference, "Device/42");
    }
}
