//! Catheter schedule evaluation.
//!
//! Timestamp → elapsed hours → status, against the hospital protocol interval.

mod classifier;
mod clock;
mod elapsed;

pub use classifier::*;
pub use clock::*;
pub use elapsed::*;

use thiserror::Error;

/// Schedule evaluation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
