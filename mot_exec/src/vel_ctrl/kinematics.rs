//! Mapping between body twist and wheel velocities
//!
//! The differential drive wheels are mounted mirrored, so a positive forward velocity turns the
//! left wheel positive and the right wheel negative.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::mot::{Motor, MotorVel, Twist2D};
use std::f32::consts::{FRAC_PI_3, PI};

use super::DriveType;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Drive direction of each omni wheel, measured from the body X axis, indexed by [`Motor`].
///
/// Units: radians
pub const OMNI_WHEEL_ANGLES_RAD: [f32; 3] = [-FRAC_PI_3, FRAC_PI_3, PI];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Wheel geometry of the robot.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub drive_type: DriveType,

    /// Units: meters
    pub base_radius_m: f32,

    /// Units: meters
    pub wheel_radius_m: f32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Geometry {
    /// Wheel velocities which achieve the given body twist.
    ///
    /// `vy` is ignored by the differential drive and the back wheel is left at zero.
    pub fn inverse(&self, twist: &Twist2D) -> MotorVel {
        let r = self.wheel_radius_m;
        let b = self.base_radius_m;

        match self.drive_type {
            DriveType::Differential => MotorVel::new(
                (twist.vx - b * twist.wz) / r,
                (-twist.vx - b * twist.wz) / r,
                0.0,
            ),
            DriveType::Omni => {
                let mut vel = MotorVel::default();

                for (i, a) in OMNI_WHEEL_ANGLES_RAD.iter().enumerate() {
                    vel.velocity[i] = (-a.sin() * twist.vx + a.cos() * twist.vy + b * twist.wz) / r;
                }

                vel
            }
        }
    }

    /// Body twist resulting from the given wheel velocities.
    pub fn forward(&self, vel: &MotorVel) -> Twist2D {
        let r = self.wheel_radius_m;
        let b = self.base_radius_m;

        let wl = vel[Motor::Left];
        let wr = vel[Motor::Right];

        match self.drive_type {
            DriveType::Differential => {
                Twist2D::new(r * (wl - wr) / 2.0, 0.0, -r * (wl + wr) / (2.0 * b))
            }
            DriveType::Omni => {
                let wb = vel[Motor::Back];

                Twist2D::new(
                    r * (wl - wr) / 3f32.sqrt(),
                    r * (wl + wr - 2.0 * wb) / 3.0,
                    r * (wl + wr + wb) / (3.0 * b),
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn geom(drive_type: DriveType) -> Geometry {
        Geometry {
            drive_type,
            base_radius_m: 0.0775,
            wheel_radius_m: 0.042,
        }
    }

    fn assert_twist_close(a: Twist2D, b: Twist2D) {
        assert!(
            (a.vx - b.vx).abs() < 1e-4 && (a.vy - b.vy).abs() < 1e-4 && (a.wz - b.wz).abs() < 1e-4,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_differential_inverse() {
        let g = geom(DriveType::Differential);

        let vel = g.inverse(&Twist2D::new(0.3, 0.0, 0.0));
        assert_eq!(vel[Motor::Left], 0.3 / 0.042);
        assert_eq!(vel[Motor::Right], -0.3 / 0.042);
        assert_eq!(vel[Motor::Back], 0.0);

        // Turning on the spot drives both wheels the same way
        let vel = g.inverse(&Twist2D::new(0.0, 0.0, 1.0));
        assert_eq!(vel[Motor::Left], vel[Motor::Right]);
        assert!(vel[Motor::Left] < 0.0);
    }

    #[test]
    fn test_round_trip() {
        for drive_type in &[DriveType::Differential, DriveType::Omni] {
            let g = geom(*drive_type);
            let vy = match drive_type {
                DriveType::Differential => 0.0,
                DriveType::Omni => -0.15,
            };
            let twist = Twist2D::new(0.25, vy, 0.8);

            assert_twist_close(g.forward(&g.inverse(&twist)), twist);
        }
    }

    #[test]
    fn test_omni_lateral() {
        let g = geom(DriveType::Omni);

        // Pure lateral motion: front wheels equal, back wheel opposing at twice the speed
        let vel = g.inverse(&Twist2D::new(0.0, 0.2, 0.0));
        assert!((vel[Motor::Left] - vel[Motor::Right]).abs() < 1e-5);
        assert!((vel[Motor::Back] + 2.0 * vel[Motor::Left]).abs() < 1e-4);
    }
}
