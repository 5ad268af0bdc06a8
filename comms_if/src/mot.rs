//! # Motor Control Messages
//!
//! Body and wheel level quantities used by the velocity controller. All values are single
//! precision to match the controller's arithmetic.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of drive motors on any supported drive type.
pub const NUM_MOTORS: usize = 3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A body twist, either commanded or measured, in the robot body frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2D {
    /// Forward velocity.
    ///
    /// Units: meters/second
    pub vx: f32,

    /// Lateral velocity, only used by the omni drive.
    ///
    /// Units: meters/second
    pub vy: f32,

    /// Rotation rate about the body Z axis.
    ///
    /// Units: radians/second
    pub wz: f32,
}

/// Per-wheel angular velocities, indexed by [`Motor`].
///
/// Units: radians/second
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorVel {
    pub velocity: [f32; NUM_MOTORS],
}

/// Per-wheel actuation demand, indexed by [`Motor`].
///
/// No limits are applied to these values by the controller, the motor driver is responsible for
/// saturating them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorPwm {
    pub pwm: [f32; NUM_MOTORS],
}

/// Telemetry published by the motor control executable once per cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct MotorTm {
    /// Number of control cycles executed so far
    pub cycle: u64,

    /// The velocity command currently being tracked
    pub cmd_twist: Twist2D,

    /// The body twist measured at the start of the cycle
    pub meas_twist: Twist2D,

    /// Wheel velocity targets produced by the body velocity stage
    pub target_vel: MotorVel,

    /// Wheel velocities measured at the start of the cycle
    pub meas_vel: MotorVel,

    /// PWM produced by the wheel velocity stage
    pub pwm: MotorPwm,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Role of each drive motor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motor {
    Left = 0,
    Right = 1,
    /// Only present on the omni drive
    Back = 2,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Twist2D {
    pub const fn new(vx: f32, vy: f32, wz: f32) -> Self {
        Self { vx, vy, wz }
    }
}

impl MotorVel {
    pub const fn new(left: f32, right: f32, back: f32) -> Self {
        Self {
            velocity: [left, right, back],
        }
    }
}

impl MotorPwm {
    pub const fn new(left: f32, right: f32, back: f32) -> Self {
        Self {
            pwm: [left, right, back],
        }
    }
}

impl Index<Motor> for MotorVel {
    type Output = f32;

    fn index(&self, motor: Motor) -> &Self::Output {
        &self.velocity[motor as usize]
    }
}

impl IndexMut<Motor> for MotorVel {
    fn index_mut(&mut self, motor: Motor) -> &mut Self::Output {
        &mut self.velocity[motor as usize]
    }
}

impl Index<Motor> for MotorPwm {
    type Output = f32;

    fn index(&self, motor: Motor) -> &Self::Output {
        &self.pwm[motor as usize]
    }
}

impl IndexMut<Motor> for MotorPwm {
    fn index_mut(&mut self, motor: Motor) -> &mut Self::Output {
        &mut self.pwm[motor as usize]
    }
}
