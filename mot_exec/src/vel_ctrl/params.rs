//! Parameters structure for VelCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{PidGains, VelCtrlError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for velocity control.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VelCtrlParams {
    pub drive_type: DriveType,

    // ---- TIMING ----

    /// Period between successive calls to the controller.
    ///
    /// Units: seconds
    pub period_s: f32,

    /// Time constant of the vx command low-pass filter.
    ///
    /// Units: seconds
    #[serde(default = "default_lpf_tc_s")]
    pub vx_lpf_tc_s: f32,

    /// Time constant of the wz command low-pass filter.
    ///
    /// Units: seconds
    #[serde(default = "default_lpf_tc_s")]
    pub wz_lpf_tc_s: f32,

    // ---- GEOMETRY ----

    /// Distance from the body centre to each wheel.
    ///
    /// Units: meters
    pub base_radius_m: f32,

    /// Units: meters
    pub wheel_radius_m: f32,

    // ---- GAINS ----
    pub left: PidGains,
    pub right: PidGains,

    /// Required for the omni drive
    pub back: Option<PidGains>,

    pub vx: PidGains,

    /// Required for the omni drive
    pub vy: Option<PidGains>,

    pub wz: PidGains,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Wheel arrangement of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DriveType {
    /// Two wheels, left and right, on a common axle
    Differential,

    /// Three omni wheels at 120 degree spacing
    Omni,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelCtrlParams {
    /// Check that the parameters describe a usable controller.
    pub fn validate(&self) -> Result<(), VelCtrlError> {
        positive("period_s", self.period_s)?;
        positive("vx_lpf_tc_s", self.vx_lpf_tc_s)?;
        positive("wz_lpf_tc_s", self.wz_lpf_tc_s)?;
        positive("base_radius_m", self.base_radius_m)?;
        positive("wheel_radius_m", self.wheel_radius_m)?;

        // The low-pass filters are unstable below the sample period
        for (name, tc) in &[
            ("vx_lpf_tc_s", self.vx_lpf_tc_s),
            ("wz_lpf_tc_s", self.wz_lpf_tc_s),
        ] {
            if *tc < self.period_s {
                return Err(VelCtrlError::InvalidParams(
                    *name,
                    format!(
                        "time constant {} s is shorter than the period {} s",
                        tc, self.period_s
                    ),
                ));
            }
        }

        gains("left", &self.left)?;
        gains("right", &self.right)?;
        gains("vx", &self.vx)?;
        gains("wz", &self.wz)?;

        if self.drive_type == DriveType::Omni {
            match self.back {
                Some(ref g) => gains("back", g)?,
                None => {
                    return Err(VelCtrlError::InvalidParams(
                        "back",
                        "required by the omni drive".into(),
                    ))
                }
            }
            match self.vy {
                Some(ref g) => gains("vy", g)?,
                None => {
                    return Err(VelCtrlError::InvalidParams(
                        "vy",
                        "required by the omni drive".into(),
                    ))
                }
            }
        }

        Ok(())
    }
}

impl Default for VelCtrlParams {
    /// Differential drive MBot geometry with proportional-only loops.
    fn default() -> Self {
        let p = PidGains {
            kp: 1.0,
            ..Default::default()
        };

        Self {
            drive_type: DriveType::Differential,
            period_s: 0.04,
            vx_lpf_tc_s: default_lpf_tc_s(),
            wz_lpf_tc_s: default_lpf_tc_s(),
            base_radius_m: 0.0775,
            wheel_radius_m: 0.042,
            left: p,
            right: p,
            back: None,
            vx: p,
            vy: None,
            wz: p,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_lpf_tc_s() -> f32 {
    0.25
}

fn positive(name: &'static str, value: f32) -> Result<(), VelCtrlError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VelCtrlError::InvalidParams(
            name,
            format!("expected a finite positive value, got {}", value),
        ))
    }
}

fn gains(name: &'static str, g: &PidGains) -> Result<(), VelCtrlError> {
    let all_finite = [g.kp, g.ki, g.kd, g.tf].iter().all(|v| v.is_finite());

    if !all_finite {
        return Err(VelCtrlError::InvalidParams(
            name,
            format!("gains must be finite, got {:?}", g),
        ));
    }

    if g.ki < 0.0 || g.kd < 0.0 || g.tf < 0.0 {
        return Err(VelCtrlError::InvalidParams(
            name,
            format!("ki, kd and tf must not be negative, got {:?}", g),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        let params: VelCtrlParams = util::params::from_str(
            r#"
            drive_type = "Differential"
            period_s = 0.04
            base_radius_m = 0.0775
            wheel_radius_m = 0.042

            [left]
            kp = 0.1
            ki = 0.0
            kd = 0.0
            tf = 0.0

            [right]
            kp = 0.1
            ki = 0.0
            kd = 0.0
            tf = 0.0

            [vx]
            kp = 0.0
            ki = 0.0
            kd = 0.0
            tf = 0.0

            [wz]
            kp = 0.5
            ki = 0.1
            kd = 0.0
            tf = 0.02
            "#,
        )
        .unwrap();

        assert_eq!(params.vx_lpf_tc_s, 0.25);
        assert_eq!(params.back, None);
        assert_eq!(params.wz.tf, 0.02);
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_validate() {
        assert_eq!(VelCtrlParams::default().validate(), Ok(()));

        let mut p = VelCtrlParams::default();
        p.wz.ki = -1.0;
        assert!(matches!(
            p.validate(),
            Err(VelCtrlError::InvalidParams("wz", _))
        ));

        let mut p = VelCtrlParams::default();
        p.left.kp = std::f32::NAN;
        assert!(matches!(
            p.validate(),
            Err(VelCtrlError::InvalidParams("left", _))
        ));

        let mut p = VelCtrlParams::default();
        p.period_s = 0.0;
        assert!(matches!(
            p.validate(),
            Err(VelCtrlError::InvalidParams("period_s", _))
        ));

        let mut p = VelCtrlParams::default();
        p.wz_lpf_tc_s = 0.01;
        assert!(matches!(
            p.validate(),
            Err(VelCtrlError::InvalidParams("wz_lpf_tc_s", _))
        ));

        let mut p = VelCtrlParams::default();
        p.drive_type = DriveType::Omni;
        assert!(matches!(
            p.validate(),
            Err(VelCtrlError::InvalidParams("back", _))
        ));
        p.back = Some(p.left);
        p.vy = Some(p.vx);
        assert_eq!(p.validate(), Ok(()));
    }
}
