//! Reconfiguration modes
//!
//! Modes are ranked. The controller keeps the highest permitted mode and
//! the derived set of enabled modes, replaced together on every recompute.

mod controller;
mod mode;

pub use controller::{ReconfigModeController, ReconfigModeState};
pub use mode::{enabled_modes_for, ReconfigMode};
