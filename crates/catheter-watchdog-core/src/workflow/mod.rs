//! Watchdog workflow.
//!
//! ```text
//!   CHECK_SCHEDULE ──no record──────────────────────────────► DONE
//!        │ record found                                        ▲
//!        ▼                                                     │ no_data
//!   DECIDE_ACTION ──────────────────────────────────────────────┘
//!        │ overdue            │ ok / borderline
//!        ▼                    ▼
//!   NOTIFY_STAFF ──────► RESCHEDULE ──continuous──► CHECK_SCHEDULE
//!                             │
//!                             └──single pass──► DONE
//! ```
//!
//! [`machine`] holds the transition table, [`Watchdog`] runs one cycle per
//! patient and drives the due-time queue between cycles.

pub mod machine;
mod notifier;
mod retry;
mod runner;

pub use machine::{transition, Event, MonitoringMode, Stage, TransitionError};
pub use notifier::*;
pub use retry::*;
pub use runner::*;
