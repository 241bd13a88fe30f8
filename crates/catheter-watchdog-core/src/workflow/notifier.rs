//! Where alerts, diagnostics and summaries go.

use std::sync::Mutex;

use tracing::warn;

use crate::models::{CycleSummary, OverdueAlert};

/// Receiver for everything the workflow reports.
pub trait Notifier: Send + Sync {
    /// A patient is about to be checked.
    fn report_cycle_start(&self, _patient_id: &str) {}

    /// Staff must change a catheter.
    fn notify_overdue(&self, alert: &OverdueAlert);

    /// A check could not determine the schedule.
    fn report_diagnostic(&self, _patient_id: &str, _message: &str) {}

    /// A cycle finished.
    fn report_summary(&self, _summary: &CycleSummary) {}
}

const SEPARATOR_WIDTH: usize = 40;

/// Line announcing a patient check.
pub fn progress_line(patient_id: &str) -> String {
    format!("\n▶ Checking catheter schedule for patient {}...", patient_id)
}

pub fn alert_line(alert: &OverdueAlert) -> String {
    format!("🚨 {}", alert.message())
}

pub fn diagnostic_line(patient_id: &str, message: &str) -> String {
    format!("⚠️ Unable to determine schedule for {}: {}", patient_id, message)
}

/// `{icon} Summary for {id}: status={status} hours_since_insertion={h}`,
/// with `n/a` when no reading was taken.
pub fn summary_line(summary: &CycleSummary) -> String {
    let hours = summary
        .hours_since_insertion
        .map(|h| format!("{:.1}h", h))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{} Summary for {}: status={} hours_since_insertion={}",
        summary.status.icon(),
        summary.patient_id,
        summary.status,
        hours
    )
}

pub fn separator_line() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

/// Prints to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn report_cycle_start(&self, patient_id: &str) {
        println!("{}", progress_line(patient_id));
    }

    fn notify_overdue(&self, alert: &OverdueAlert) {
        warn!(
            patient_id = %alert.patient_id,
            hours = alert.hours_since_insertion,
            device = %alert.device_reference,
            "catheter change overdue"
        );
        println!("{}", alert_line(alert));
    }

    fn report_diagnostic(&self, patient_id: &str, message: &str) {
        println!("{}", diagnostic_line(patient_id, message));
    }

    fn report_summary(&self, summary: &CycleSummary) {
        println!("{}", summary_line(summary));
        println!("{}", separator_line());
    }
}

/// Something a [`RecordingNotifier`] saw.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifierEvent {
    CycleStart(String),
    Overdue(OverdueAlert),
    Diagnostic { patient_id: String, message: String },
    Summary(CycleSummary),
}

/// Keeps every report in memory (for testing).
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn alerts(&self) -> Vec<OverdueAlert> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotifierEvent::Overdue(alert) => Some(alert),
                _ => None,
            })
            .collect()
    }

    pub fn summaries(&self) -> Vec<CycleSummary> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotifierEvent::Summary(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotifierEvent::Diagnostic { patient_id, message } => Some((patient_id, message)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: NotifierEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Notifier for RecordingNotifier {
    fn report_cycle_start(&self, patient_id: &str) {
        self.push(NotifierEvent::CycleStart(patient_id.to_string()));
    }

    fn notify_overdue(&self, alert: &OverdueAlert) {
        self.push(NotifierEvent::Overdue(alert.clone()));
    }

    fn report_diagnostic(&self, patient_id: &str, message: &str) {
        self.push(NotifierEvent::Diagnostic {
            patient_id: patient_id.to_string(),
            message: message.to_string(),
        });
    }

    fn report_summary(&self, summary: &CycleSummary) {
        self.push(NotifierEvent::Summary(summary.clone()));
    }
}
