//! # Motor control library
//!
//! Cascaded velocity control of the robot's drive motors, from a commanded body twist down to
//! per-motor PWM.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod motor_io;
pub mod params;
pub mod vel_ctrl;
