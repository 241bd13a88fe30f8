//! Domain models for the catheter watchdog.

mod catheter;
mod state;

pub use catheter::*;
pub use state::*;
