//! Per-cycle watchdog state and its outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catheter::{CatheterRecord, PatientId};
use crate::schedule::ProtocolThresholds;

/// Catheter change status derived from the elapsed hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CatheterStatus {
    /// Not yet classified
    Unknown,
    /// No catheter record could be obtained
    NoData,
    /// Within the protocol interval
    Ok,
    /// Inside the warning window just before the interval
    Borderline,
    /// Past the protocol interval
    Overdue,
}

impl CatheterStatus {
    /// Wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CatheterStatus::Unknown => "unknown",
            CatheterStatus::NoData => "no_data",
            CatheterStatus::Ok => "ok",
            CatheterStatus::Borderline => "borderline",
            CatheterStatus::Overdue => "overdue",
        }
    }

    /// Console icon used in summaries.
    pub fn icon(&self) -> &'static str {
        match self {
            CatheterStatus::Ok => "✅",
            CatheterStatus::Overdue => "🛑",
            CatheterStatus::Borderline => "⚠️",
            CatheterStatus::Unknown | CatheterStatus::NoData => "❓",
        }
    }
}

impl fmt::Display for CatheterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working state for one patient during one check cycle.
///
/// Fields are private so that `hours_since_insertion` only ever arrives
/// together with a record, and `status` only ever comes out of the
/// classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogState {
    cycle_id: String,
    patient_id: PatientId,
    catheter_record: Option<CatheterRecord>,
    hours_since_insertion: Option<f64>,
    status: CatheterStatus,
}

impl WatchdogState {
    /// Fresh state at the start of a cycle.
    pub fn new(patient_id: impl Into<PatientId>) -> Self {
        Self {
            cycle_id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.into(),
            catheter_record: None,
            hours_since_insertion: None,
            status: CatheterStatus::Unknown,
        }
    }

    /// Store a fetched record together with its elapsed hours.
    pub fn record_reading(&mut self, record: CatheterRecord, hours: f64) {
        self.catheter_record = Some(record);
        self.hours_since_insertion = Some(hours);
    }

    /// Derive `status` from the current hours.
    pub fn classify(&mut self, thresholds: &ProtocolThresholds) -> CatheterStatus {
        self.status = thresholds.classify(self.hours_since_insertion);
        self.status
    }

    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn catheter_record(&self) -> Option<&CatheterRecord> {
        self.catheter_record.as_ref()
    }

    pub fn hours_since_insertion(&self) -> Option<f64> {
        self.hours_since_insertion
    }

    pub fn status(&self) -> CatheterStatus {
        self.status
    }

    /// Consume the state into its final summary.
    pub fn into_summary(self) -> CycleSummary {
        CycleSummary {
            patient_id: self.patient_id,
            status: self.status,
            hours_since_insertion: self.hours_since_insertion,
        }
    }
}

/// Final record produced when a cycle reaches `DONE`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleSummary {
    pub patient_id: PatientId,
    pub status: CatheterStatus,
    pub hours_since_insertion: Option<f64>,
}

impl CycleSummary {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Alert emitted by the `NOTIFY_STAFF` stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverdueAlert {
    pub patient_id: PatientId,
    pub hours_since_insertion: f64,
    pub device_reference: String,
}

impl OverdueAlert {
    /// Human-readable alert text, hours to one decimal place.
    pub fn message(&self) -> String {
        format!(
            "ALERT: Patient {} needs catheter change! {:.1} hours since insertion.",
            self.patient_id, self.hours_since_insertion
        )
    }
}
