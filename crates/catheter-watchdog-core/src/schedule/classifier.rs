//! Status classifier.
//!
//! - absent → `no_data`
//! - `>= interval` → `overdue` (the interval itself counts as due)
//! - `[interval - window, interval)` → `borderline`
//! - otherwise → `ok`

use serde::{Deserialize, Serialize};

use crate::models::CatheterStatus;

/// Hospital protocol: maximum catheter dwell time.
pub const DEFAULT_CHANGE_INTERVAL_HOURS: f64 = 72.0;

/// Lead time before the interval reported as borderline.
pub const DEFAULT_BORDERLINE_WINDOW_HOURS: f64 = 2.0;

/// Thresholds the classifier evaluates against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProtocolThresholds {
    pub change_interval_hours: f64,
    /// Zero disables the borderline state.
    pub borderline_window_hours: f64,
}

impl Default for ProtocolThresholds {
    fn default() -> Self {
        Self {
            change_interval_hours: DEFAULT_CHANGE_INTERVAL_HOURS,
            borderline_window_hours: DEFAULT_BORDERLINE_WINDOW_HOURS,
        }
    }
}

impl ProtocolThresholds {
    pub fn new(change_interval_hours: f64, borderline_window_hours: f64) -> Self {
        Self {
            change_interval_hours,
            borderline_window_hours,
        }
    }

    /// Map optional elapsed hours to a status. Total over all inputs.
    pub fn classify(&self, hours_since_insertion: Option<f64>) -> CatheterStatus {
        let Some(hours) = hours_since_insertion else {
            return CatheterStatus::NoData;
        };

        if hours >= self.change_interval_hours {
            CatheterStatus::Overdue
        } else if hours >= self.change_interval_hours - self.borderline_window_hours {
            CatheterStatus::Borderline
        } else {
            CatheterStatus::Ok
        }
    }
}
