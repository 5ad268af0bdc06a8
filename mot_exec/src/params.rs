//! Parameters of the motor control executable

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::motor_io::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters loaded from `mot_exec.toml`. The control period comes from `vel_ctrl.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct MotExecParams {
    /// Time without a velocity command after which the loop enters safe mode and commands zero
    /// velocity.
    ///
    /// Units: seconds
    pub cmd_timeout_s: f64,

    /// Number of consecutive cycle overruns after which the executable stops.
    pub max_consec_overruns: u64,

    /// Publish telemetry every this many cycles.
    pub tm_every_n_cycles: u64,

    pub sim: SimParams,
}
