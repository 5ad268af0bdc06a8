//! Velocity control module
//!
//! Two stage cascade run once per control period:
//!
//! 1. Body velocity control: the commanded vx and wz are low-pass filtered, wz is corrected by a
//!    PID on the measured rate, and the result is mapped to wheel velocity targets.
//! 2. Wheel velocity control: a PID per wheel turns the velocity error into a PWM demand.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod filter;
mod kinematics;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use filter::*;
pub use kinematics::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during VelCtrl operation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VelCtrlError {
    #[error("Invalid velocity controller parameter {0}: {1}")]
    InvalidParams(&'static str, String),

    #[error("The velocity controller was used before being initialised")]
    NotInitialised,
}
