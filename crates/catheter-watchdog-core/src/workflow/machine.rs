//! Explicit transition table for the watchdog cycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CatheterStatus;

/// Workflow stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CheckSchedule,
    DecideAction,
    NotifyStaff,
    Reschedule,
    /// Terminal
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CheckSchedule => "CHECK_SCHEDULE",
            Stage::DecideAction => "DECIDE_ACTION",
            Stage::NotifyStaff => "NOTIFY_STAFF",
            Stage::Reschedule => "RESCHEDULE",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Outcome of executing a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A catheter record was fetched and its elapsed hours computed
    RecordFound,
    /// No usable record (absent, unreachable, malformed)
    NoRecord,
    /// Classified overdue
    Overdue,
    /// Classified ok or borderline
    WithinInterval,
    /// Classified no_data
    NoData,
    /// Staff alert emitted
    Notified,
    /// Next check scheduled (continuous monitoring)
    RecheckScheduled,
    /// No further checks (single pass)
    MonitoringEnded,
}

impl Event {
    /// Event produced by `DECIDE_ACTION` for a status.
    pub fn from_status(status: CatheterStatus) -> Self {
        match status {
            CatheterStatus::Overdue => Event::Overdue,
            CatheterStatus::Ok | CatheterStatus::Borderline => Event::WithinInterval,
            CatheterStatus::NoData | CatheterStatus::Unknown => Event::NoData,
        }
    }
}

/// What `RESCHEDULE` leads to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    /// Loop back to `CHECK_SCHEDULE` after the reschedule delay
    #[default]
    Continuous,
    /// Finish after one check per patient
    SinglePass,
}

impl MonitoringMode {
    /// Event emitted by the `RESCHEDULE` stage in this mode.
    pub fn reschedule_event(&self) -> Event {
        match self {
            MonitoringMode::Continuous => Event::RecheckScheduled,
            MonitoringMode::SinglePass => Event::MonitoringEnded,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No transition from {stage} on {event:?}")]
    InvalidTransition { stage: Stage, event: Event },
}

pub type TransitionResult<T> = Result<T, TransitionError>;

/// `{stage, event} → next stage`.
pub fn transition(stage: Stage, event: Event) -> TransitionResult<Stage> {
    use Event::*;
    use Stage::*;

    let next = match (stage, event) {
        (CheckSchedule, RecordFound) => DecideAction,
        (CheckSchedule, NoRecord) => Done,
        (DecideAction, Overdue) => NotifyStaff,
        (DecideAction, WithinInterval) => Reschedule,
        (DecideAction, NoData) => Done,
        (NotifyStaff, Notified) => Reschedule,
        (Reschedule, RecheckScheduled) => CheckSchedule,
        (Reschedule, MonitoringEnded) => Done,
        (stage, event) => return Err(TransitionError::InvalidTransition { stage, event }),
    };

    Ok(next)
}
