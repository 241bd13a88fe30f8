//! Catheter Watchdog Core Library
//!
//! Monitors patients with catheter devices and flags those overdue for a
//! change under the hospital protocol interval.
//!
//! # Architecture
//!
//! ```text
//!   Patient Discovery ──► { patient ids }
//!                               │  one cycle per patient
//!                               ▼
//!                  ┌────── CHECK_SCHEDULE ◄──────────────┐
//!                  │  fetch record, elapsed hours        │
//!                  ▼                                     │ after reschedule
//!            DECIDE_ACTION ── classify ──┐               │ interval
//!                  │ overdue             │ ok/borderline │
//!                  ▼                     ▼               │
//!            NOTIFY_STAFF ────────► RESCHEDULE ──────────┘
//!
//!   no record / unreachable / malformed ──► DONE (no_data)
//! ```
//!
//! # Core Principle
//!
//! **No single patient can end the run.** Every failure for a patient
//! degrades to a `no_data` summary; only an external stop signal ends
//! monitoring.
//!
//! # Modules
//!
//! - [`models`]: Domain types (CatheterRecord, WatchdogState, CycleSummary)
//! - [`schedule`]: Elapsed-time calculator and status classifier
//! - [`source`]: Data source trait, discovery merging, mock source
//! - [`workflow`]: Transition table, cycle runner, scheduling loop
//! - [`config`]: Layered configuration

pub mod config;
pub mod models;
pub mod schedule;
pub mod source;
pub mod workflow;

// Re-export commonly used types
pub use config::{ConfigError, FhirConfig, WatchdogConfig};
pub use models::{
    CatheterRecord, CatheterStatus, CycleSummary, OverdueAlert, PatientId, WatchdogState,
};
pub use schedule::{
    hours_since_insertion, Clock, FixedClock, ProtocolThresholds, ScheduleError, SystemClock,
};
pub use source::{CatheterDataSource, DiscoveredResource, MockDataSource, SourceError};
pub use workflow::{
    ConsoleNotifier, MonitoringMode, Notifier, RunReport, Watchdog, WorkflowSettings,
};

use thiserror::Error;

/// Any error the library can produce.
#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("Schedule error: {0}")]
    Schedule(#[from] schedule::ScheduleError),

    #[error("Source error: {0}")]
    Source(#[from] source::SourceError),

    #[error("Workflow error: {0}")]
    Transition(#[from] workflow::TransitionError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type WatchdogResult<T> = Result<T, WatchdogError>;
