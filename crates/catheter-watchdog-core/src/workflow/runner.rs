//! Cycle runner and monitoring loop.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::machine::{transition, Event, MonitoringMode, Stage};
use super::notifier::Notifier;
use super::retry::RetryPolicy;
use crate::models::{CatheterRecord, CycleSummary, OverdueAlert, PatientId, WatchdogState};
use crate::schedule::{hours_since_insertion, Clock, ProtocolThresholds};
use crate::source::{CatheterDataSource, SourceResult};

/// Default delay before a patient is checked again.
pub const DEFAULT_RESCHEDULE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Knobs the workflow runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    pub thresholds: ProtocolThresholds,
    pub reschedule_interval: Duration,
    pub mode: MonitoringMode,
    pub retry: RetryPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            thresholds: ProtocolThresholds::default(),
            reschedule_interval: DEFAULT_RESCHEDULE_INTERVAL,
            mode: MonitoringMode::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of one patient cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub summary: CycleSummary,
    /// Set when `RESCHEDULE` looped back to `CHECK_SCHEDULE`.
    pub next_check_at: Option<DateTime<Utc>>,
}

/// Totals for a monitoring run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Patients returned by discovery
    pub discovered: usize,
    /// Cycles executed across all patients
    pub cycles: usize,
    /// Most recent summary per patient
    pub latest: BTreeMap<PatientId, CycleSummary>,
    /// Whether the run ended on a stop signal
    pub cancelled: bool,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct DueCheck {
    at: Instant,
    seq: u64,
    patient_id: PatientId,
}

/// Catheter watchdog: runs the cycle state machine per patient.
pub struct Watchdog<'a> {
    source: &'a dyn CatheterDataSource,
    notifier: &'a dyn Notifier,
    clock: &'a dyn Clock,
    settings: WorkflowSettings,
}

impl<'a> Watchdog<'a> {
    /// Create a new watchdog.
    pub fn new(
        source: &'a dyn CatheterDataSource,
        notifier: &'a dyn Notifier,
        clock: &'a dyn Clock,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Discover patients and monitor them until done or stopped.
    pub async fn run(&self, stop: watch::Receiver<bool>) -> RunReport {
        let patients = self.discover().await;
        self.run_patients(patients, stop).await
    }

    /// Patient discovery; failures degrade to an empty set.
    pub async fn discover(&self) -> BTreeSet<PatientId> {
        match self.source.discover_catheter_patients().await {
            Ok(patients) => {
                info!(count = patients.len(), "discovered catheter patients");
                patients
            }
            Err(e) => {
                error!(error = %e, "patient discovery failed");
                BTreeSet::new()
            }
        }
    }

    /// Monitor a fixed set of patients.
    ///
    /// Every patient is due immediately. In continuous mode each completed
    /// cycle re-queues the patient one reschedule interval later; patients
    /// that end in `DONE` drop out. The stop signal is observed before each
    /// cycle and while waiting for the next due patient, never mid-cycle.
    pub async fn run_patients<I>(&self, patients: I, mut stop: watch::Receiver<bool>) -> RunReport
    where
        I: IntoIterator<Item = PatientId>,
    {
        let mut report = RunReport::default();
        let mut queue = BinaryHeap::new();
        let mut seq = 0u64;
        let start = Instant::now();

        for patient_id in patients {
            queue.push(Reverse(DueCheck {
                at: start,
                seq,
                patient_id,
            }));
            seq += 1;
        }
        report.discovered = queue.len();

        loop {
            if *stop.borrow() {
                info!("stop requested, ending monitoring run");
                report.cancelled = true;
                break;
            }

            let Some(Reverse(due)) = queue.pop() else {
                break;
            };

            if due.at > Instant::now() {
                debug!(patient_id = %due.patient_id, "waiting for next scheduled check");
                tokio::select! {
                    _ = tokio::time::sleep_until(due.at) => {}
                    changed = stop.changed() => {
                        if changed.is_ok() {
                            queue.push(Reverse(due));
                            continue;
                        }
                        // Sender dropped: no stop can arrive any more.
                        tokio::time::sleep_until(due.at).await;
                    }
                }
            }

            let outcome = self.run_cycle(&due.patient_id).await;
            report.cycles += 1;
            self.notifier.report_summary(&outcome.summary);

            if outcome.next_check_at.is_some() {
                match Instant::now().checked_add(self.settings.reschedule_interval) {
                    Some(at) => {
                        queue.push(Reverse(DueCheck {
                            at,
                            seq,
                            patient_id: due.patient_id.clone(),
                        }));
                        seq += 1;
                    }
                    None => warn!(
                        patient_id = %due.patient_id,
                        "reschedule interval out of range, not checking again"
                    ),
                }
            }
            report.latest.insert(due.patient_id, outcome.summary);
        }

        report
    }

    /// Run one cycle for a patient, from `CHECK_SCHEDULE` to `DONE` or back
    /// to `CHECK_SCHEDULE`.
    pub async fn run_cycle(&self, patient_id: &str) -> CycleOutcome {
        let mut state = WatchdogState::new(patient_id);
        let span = info_span!("cycle", patient_id = %patient_id, cycle_id = %state.cycle_id());

        async move {
            self.notifier.report_cycle_start(patient_id);

            let mut stage = Stage::CheckSchedule;
            let mut next_check_at = None;

            loop {
                let event = match stage {
                    Stage::CheckSchedule => self.check_schedule(&mut state).await,
                    Stage::DecideAction => self.decide_action(&mut state),
                    Stage::NotifyStaff => self.notify_staff(&state),
                    Stage::Reschedule => {
                        let (event, at) = self.reschedule();
                        next_check_at = at;
                        event
                    }
                    Stage::Done => break,
                };

                let next = match transition(stage, event) {
                    Ok(next) => next,
                    Err(e) => {
                        error!(error = %e, "workflow transition failed");
                        Stage::Done
                    }
                };
                debug!(from = %stage, to = %next, ?event, "transition");

                if next == Stage::CheckSchedule {
                    // Next pass belongs to the scheduler.
                    break;
                }
                stage = next;
            }

            let summary = state.into_summary();
            info!(status = %summary.status, hours = ?summary.hours_since_insertion, "cycle complete");
            CycleOutcome {
                summary,
                next_check_at,
            }
        }
        .instrument(span)
        .await
    }

    async fn check_schedule(&self, state: &mut WatchdogState) -> Event {
        let patient_id = state.patient_id().to_string();

        let record = match self.fetch_with_retry(&patient_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("no catheter record found");
                state.classify(&self.settings.thresholds);
                return Event::NoRecord;
            }
            Err(e) => {
                warn!(error = %e, "catheter record unavailable");
                self.notifier.report_diagnostic(&patient_id, &e.to_string());
                state.classify(&self.settings.thresholds);
                return Event::NoRecord;
            }
        };

        match hours_since_insertion(&record.inserted_at, self.clock.now()) {
            Ok(hours) => {
                debug!(hours, device = %record.device_reference, "computed elapsed hours");
                state.record_reading(record, hours);
                Event::RecordFound
            }
            Err(e) => {
                warn!(error = %e, "cannot compute elapsed hours");
                self.notifier.report_diagnostic(&patient_id, &e.to_string());
                state.classify(&self.settings.thresholds);
                Event::NoRecord
            }
        }
    }

    fn decide_action(&self, state: &mut WatchdogState) -> Event {
        let status = state.classify(&self.settings.thresholds);
        info!(%status, "classified");
        Event::from_status(status)
    }

    /// Alerts staff. Without a reading there is nothing to send, so the
    /// stage yields `NoData`, which has no transition out of `NOTIFY_STAFF`.
    fn notify_staff(&self, state: &WatchdogState) -> Event {
        match (state.catheter_record(), state.hours_since_insertion()) {
            (Some(record), Some(hours)) => {
                let alert = overdue_alert(record, hours);
                self.notifier.notify_overdue(&alert);
                Event::Notified
            }
            _ => {
                warn!("overdue without a catheter reading, no alert sent");
                Event::NoData
            }
        }
    }

    fn reschedule(&self) -> (Event, Option<DateTime<Utc>>) {
        let event = self.settings.mode.reschedule_event();
        match self.settings.mode {
            MonitoringMode::Continuous => {
                let next = chrono::Duration::from_std(self.settings.reschedule_interval)
                    .ok()
                    .and_then(|d| self.clock.now().checked_add_signed(d));
                info!(
                    hours = self.settings.reschedule_interval.as_secs() / 3600,
                    "rescheduling check"
                );
                (event, next)
            }
            MonitoringMode::SinglePass => (event, None),
        }
    }

    async fn fetch_with_retry(&self, patient_id: &str) -> SourceResult<Option<CatheterRecord>> {
        let mut attempt = 0;
        loop {
            match self.source.fetch_catheter_record(patient_id).await {
                Err(e) if e.is_retryable() && self.settings.retry.should_retry(attempt) => {
                    let delay = self.settings.retry.delay(attempt);
                    warn!(error = %e, attempt, ?delay, "fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn overdue_alert(record: &CatheterRecord, hours: f64) -> OverdueAlert {
    OverdueAlert {
        patient_id: record.patient_id.clone(),
        hours_since_insertion: hours,
        device_reference: record.device_reference.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatheterStatus;
    use crate::schedule::FixedClock;
    use crate::source::{MockDataSource, SourceError};
    use crate::workflow::RecordingNotifier;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn single_pass() -> WorkflowSettings {
        WorkflowSettings {
            mode: MonitoringMode::SinglePass,
            retry: RetryPolicy::none(),
            ..WorkflowSettings::default()
        }
    }

    #[tokio::test]
    async fn test_overdue_cycle_alerts() {
        let source = MockDataSource::ward_demo(anchor());
        let notifier = RecordingNotifier::new();
        let clock = FixedClock(anchor());
        let watchdog = Watchdog::new(&source, &notifier, &clock, single_pass());

        let outcome = watchdog.run_cycle("patient-001").await;
        assert_eq!(outcome.summary.status, CatheterStatus::Overdue);
        assert!(outcome.next_check_at.is_none());

        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].patient_id, "patient-001");
        assert!((alerts[0].hours_since_insertion - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_notify_without_reading_is_not_a_notification() {
        let source = MockDataSource::ward_demo(anchor());
        let notifier = RecordingNotifier::new();
        let clock = FixedClock(anchor());
        let watchdog = Watchdog::new(&source, &notifier, &clock, single_pass());

        let event = watchdog.notify_staff(&WatchdogState::new("patient-001"));
        assert_eq!(event, Event::NoData);
        assert!(notifier.alerts().is_empty());
        assert!(transition(Stage::NotifyStaff, event).is_err());
    }

    #[tokio::test]
    async fn test_continuous_cycle_schedules_next_check() {
        let source = MockDataSource::ward_demo(anchor());
        let notifier = RecordingNotifier::new();
        let clock = FixedClock(anchor());
        let watchdog = Watchdog::new(&source, &notifier, &clock, WorkflowSettings::default());

        let outcome = watchdog.run_cycle("patient-002").await;
        assert_eq!(outcome.summary.status, CatheterStatus::Ok);
        assert_eq!(
            outcome.next_check_at,
            Some(anchor() + chrono::Duration::hours(24))
        );
        assert!(notifier.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_timestamp_degrades_to_no_data() {
        let source = MockDataSource::new(anchor()).with_raw_timestamp("patient-010", "not-a-date");
        let notifier = RecordingNotifier::new();
        let clock = FixedClock(anchor());
        let watchdog = Watchdog::new(&source, &notifier, &clock, single_pass());

        let outcome = watchdog.run_cycle("patient-010").await;
        assert_eq!(outcome.summary.status, CatheterStatus::NoData);
        assert!(outcome.summary.hours_since_insertion.is_none());
        assert_eq!(notifier.diagnostics().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_is_retried_then_succeeds() {
        let source = MockDataSource::ward_demo(anchor()).with_failures(
            "patient-002",
            SourceError::DataSourceUnreachable("connection refused".into()),
            2,
        );
        let notifier = RecordingNotifier::new();
        let clock = FixedClock(anchor());
        let settings = WorkflowSettings {
            retry: RetryPolicy::default(),
            ..single_pass()
        };
        let watchdog = Watchdog::new(&source, &notifier, &clock, settings);

        let outcome = watchdog.run_cycle("patient-002").await;
        assert_eq!(outcome.summary.status, CatheterStatus::Ok);
        assert_eq!(source.fetch_count("patient-002"), 3);
        assert!(notifier.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_is_not_retried() {
        let source = MockDataSource::ward_demo(anchor()).with_failures(
            "patient-002",
            SourceError::MalformedRecord("missing meta.lastUpdated".into()),
            1,
        );
        let notifier = RecordingNotifier::new();
        let clock = FixedClock(anchor());
        let settings = WorkflowSettings {
            retry: RetryPolicy::default(),
            ..single_pass()
        };
        let watchdog = Watchdog::new(&source, &notifier, &clock, settings);

        let outcome = watchdog.run_cycle("patient-002").await;
        assert_eq!(outcome.summary.status, CatheterStatus::NoData);
        assert_eq!(source.fetch_count("patient-002"), 1);
    }
}
