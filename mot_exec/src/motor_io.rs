//! # Motor I/O
//!
//! Interface between the control loop and the motors. Hardware drivers implement [`MotorIo`];
//! [`SimMotorIo`] provides a simple first order plant for running the loop without a robot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{convert::Infallible, fmt::Display};

use comms_if::mot::{MotorPwm, MotorVel, Twist2D, NUM_MOTORS};
use serde::Deserialize;

use crate::vel_ctrl::Geometry;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Access to the drive motors and their encoders.
pub trait MotorIo {
    type Error: Display;

    /// Read the wheel velocities and the body twist derived from them.
    fn read_feedback(&mut self) -> Result<Feedback, Self::Error>;

    /// Apply PWM demands to the motors.
    fn write_pwm(&mut self, pwm: &MotorPwm) -> Result<(), Self::Error>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Measurements taken at the start of a cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Feedback {
    pub vel: MotorVel,
    pub twist: Twist2D,
}

/// Parameters of the simulated motors.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Steady state wheel velocity per unit PWM.
    ///
    /// Units: radians/second
    pub gain_rads: f32,

    /// Time constant of the motor response.
    ///
    /// Units: seconds
    pub time_const_s: f32,
}

/// Simulated motors, each a first order lag from PWM to wheel velocity.
pub struct SimMotorIo {
    params: SimParams,

    geometry: Geometry,

    /// Units: seconds
    dt: f32,

    vel: MotorVel,

    pwm: MotorPwm,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimMotorIo {
    pub fn new(params: SimParams, geometry: Geometry, dt: f32) -> Self {
        Self {
            params,
            geometry,
            dt,
            vel: MotorVel::default(),
            pwm: MotorPwm::default(),
        }
    }

    /// Advance the simulated motors by one period under the last written PWM.
    fn step(&mut self) {
        let alpha = (self.dt / self.params.time_const_s).min(1.0);

        for i in 0..NUM_MOTORS {
            let target = self.params.gain_rads * self.pwm.pwm[i];
            self.vel.velocity[i] += alpha * (target - self.vel.velocity[i]);
        }
    }
}

impl MotorIo for SimMotorIo {
    type Error = Infallible;

    fn read_feedback(&mut self) -> Result<Feedback, Self::Error> {
        self.step();

        Ok(Feedback {
            vel: self.vel,
            twist: self.geometry.forward(&self.vel),
        })
    }

    fn write_pwm(&mut self, pwm: &MotorPwm) -> Result<(), Self::Error> {
        // The motor driver saturates the demand
        for (out, demand) in self.pwm.pwm.iter_mut().zip(pwm.pwm.iter()) {
            *out = demand.max(-1.0).min(1.0);
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::vel_ctrl::DriveType;
    use comms_if::mot::Motor;

    fn sim() -> SimMotorIo {
        SimMotorIo::new(
            SimParams {
                gain_rads: 20.0,
                time_const_s: 0.1,
            },
            Geometry {
                drive_type: DriveType::Differential,
                base_radius_m: 0.0775,
                wheel_radius_m: 0.042,
            },
            0.04,
        )
    }

    #[test]
    fn test_sim_settles() {
        let mut io = sim();
        io.write_pwm(&MotorPwm::new(0.5, -0.5, 0.0)).unwrap();

        for _ in 0..100 {
            io.read_feedback().unwrap();
        }
        let fb = io.read_feedback().unwrap();

        assert!((fb.vel[Motor::Left] - 10.0).abs() < 1e-3);
        assert!((fb.vel[Motor::Right] + 10.0).abs() < 1e-3);
        assert!((fb.twist.vx - 0.42).abs() < 1e-4);
        assert!(fb.twist.wz.abs() < 1e-4);
    }

    #[test]
    fn test_sim_saturates() {
        let mut io = sim();
        io.write_pwm(&MotorPwm::new(5.0, -5.0, 0.0)).unwrap();

        for _ in 0..100 {
            io.read_feedback().unwrap();
        }

        assert!((io.read_feedback().unwrap().vel[Motor::Left] - 20.0).abs() < 1e-3);
    }
}
