//! In-memory data source with scripted behaviour.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};

use super::{CatheterDataSource, SourceError, SourceResult};
use crate::models::{CatheterRecord, PatientId};

const MOCK_DEVICE_REFERENCE: &str = "Device/mock-device";

#[derive(Debug, Clone)]
enum MockEntry {
    Record(CatheterRecord),
    Missing,
}

/// Mock data source.
///
/// Insertion times are expressed as hours before a fixed anchor, so results
/// are reproducible when paired with a [`crate::schedule::FixedClock`] at the
/// same anchor.
#[derive(Debug)]
pub struct MockDataSource {
    anchor: DateTime<Utc>,
    entries: BTreeMap<PatientId, MockEntry>,
    /// Remaining scripted failures per patient, consumed one per fetch.
    failures: Mutex<HashMap<PatientId, Vec<SourceError>>>,
    fetch_counts: Mutex<HashMap<PatientId, usize>>,
    discovery_failure: Option<SourceError>,
}

impl MockDataSource {
    /// Empty source anchored at `anchor`.
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            entries: BTreeMap::new(),
            failures: Mutex::new(HashMap::new()),
            fetch_counts: Mutex::new(HashMap::new()),
            discovery_failure: None,
        }
    }

    /// The three ward patients: overdue, recent and borderline.
    pub fn ward_demo(anchor: DateTime<Utc>) -> Self {
        Self::new(anchor)
            .with_insertion_hours_ago("patient-001", 100.0)
            .with_insertion_hours_ago("patient-002", 12.0)
            .with_insertion_hours_ago("patient-003", 70.0)
    }

    /// Patient whose catheter went in `hours` before the anchor.
    pub fn with_insertion_hours_ago(mut self, patient_id: &str, hours: f64) -> Self {
        let millis = (hours * 3_600_000.0).round() as i64;
        let inserted = self.anchor - Duration::milliseconds(millis);
        let raw = inserted.to_rfc3339_opts(SecondsFormat::Millis, true);
        self.entries.insert(
            patient_id.to_string(),
            MockEntry::Record(CatheterRecord::new(patient_id, raw, MOCK_DEVICE_REFERENCE)),
        );
        self
    }

    /// Patient whose record carries `raw` as the insertion time verbatim.
    pub fn with_raw_timestamp(mut self, patient_id: &str, raw: &str) -> Self {
        self.entries.insert(
            patient_id.to_string(),
            MockEntry::Record(CatheterRecord::new(patient_id, raw, MOCK_DEVICE_REFERENCE)),
        );
        self
    }

    /// Patient that discovery reports but who has no catheter record.
    pub fn with_missing_record(mut self, patient_id: &str) -> Self {
        self.entries.insert(patient_id.to_string(), MockEntry::Missing);
        self
    }

    /// Fail the next `times` fetches for a patient with `error`.
    pub fn with_failures(self, patient_id: &str, error: SourceError, times: usize) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures
                .entry(patient_id.to_string())
                .or_default()
                .extend(std::iter::repeat(error).take(times));
        }
        self
    }

    /// Make discovery itself fail.
    pub fn with_discovery_failure(mut self, error: SourceError) -> Self {
        self.discovery_failure = Some(error);
        self
    }

    /// Number of fetch attempts made for a patient.
    pub fn fetch_count(&self, patient_id: &str) -> usize {
        self.fetch_counts
            .lock()
            .map(|counts| counts.get(patient_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock_error<T>(_: std::sync::PoisonError<T>) -> SourceError {
        SourceError::DataSourceUnreachable("mock source lock poisoned".into())
    }
}

#[async_trait]
impl CatheterDataSource for MockDataSource {
    async fn discover_catheter_patients(&self) -> SourceResult<BTreeSet<PatientId>> {
        if let Some(err) = &self.discovery_failure {
            return Err(err.clone());
        }
        Ok(self.entries.keys().cloned().collect())
    }

    async fn fetch_catheter_record(
        &self,
        patient_id: &str,
    ) -> SourceResult<Option<CatheterRecord>> {
        *self
            .fetch_counts
            .lock()
            .map_err(Self::lock_error)?
            .entry(patient_id.to_string())
            .or_insert(0) += 1;

        {
            let mut failures = self.failures.lock().map_err(Self::lock_error)?;
            if let Some(queue) = failures.get_mut(patient_id) {
                if !queue.is_empty() {
                    return Err(queue.remove(0));
                }
            }
        }

        Ok(match self.entries.get(patient_id) {
            Some(MockEntry::Record(record)) => Some(record.clone()),
            Some(MockEntry::Missing) | None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::hours_since_insertion;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ward_demo_discovery() {
        let source = MockDataSource::ward_demo(anchor());
        let ids = source.discover_catheter_patients().await.unwrap();
        let ids: Vec<_> = ids.into_iter().collect();
        assert_eq!(ids, vec!["patient-001", "patient-002", "patient-003"]);
    }

    #[tokio::test]
    async fn test_offsets_round_trip_through_calculator() {
        let source = MockDataSource::ward_demo(anchor());
        let record = source.fetch_catheter_record("patient-001").await.unwrap().unwrap();
        let hours = hours_since_insertion(&record.inserted_at, anchor()).unwrap();
        assert!((hours - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unknown_patient_has_no_record() {
        let source = MockDataSource::ward_demo(anchor());
        assert!(source.fetch_catheter_record("patient-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed() {
        let source = MockDataSource::ward_demo(anchor()).with_failures(
            "patient-002",
            SourceError::DataSourceUnreachable("down".into()),
            2,
        );

        assert!(source.fetch_catheter_record("patient-002").await.is_err());
        assert!(source.fetch_catheter_record("patient-002").await.is_err());
        assert!(source.fetch_catheter_record("patient-002").await.unwrap().is_some());
        assert_eq!(source.fetch_count("patient-002"), 3);
    }
}
