//! Implementations for the VelCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::{
    DriveType, Geometry, LowPassFilter, PidFilter, VelCtrlError, VelCtrlParams,
};
use comms_if::mot::{Motor, MotorPwm, MotorVel, Twist2D, NUM_MOTORS};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity control module state.
///
/// Created uninitialised by `Default`, [`State::init`] must be called before any control
/// function. Calling `init` again resets every filter.
#[derive(Default)]
pub struct VelCtrl {
    filters: Option<Filters>,

    pub(crate) report: StatusReport,
}

/// Every filter of the cascade, all running at the control period.
struct Filters {
    geometry: Geometry,

    left_wheel_pid: PidFilter,
    right_wheel_pid: PidFilter,
    /// Omni drive only
    back_wheel_pid: Option<PidFilter>,

    /// Declared for tuning, the cascade currently passes vx through
    #[allow(dead_code)]
    body_vx_pid: PidFilter,
    /// Omni drive only, passed through like vx
    #[allow(dead_code)]
    body_vy_pid: Option<PidFilter>,
    body_wz_pid: PidFilter,

    vx_cmd_lpf: LowPassFilter,
    wz_cmd_lpf: LowPassFilter,
}

/// Input data to velocity control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// The body twist to achieve
    pub cmd: Twist2D,

    /// The body twist measured this cycle
    pub meas_twist: Twist2D,

    /// The wheel velocities measured this cycle
    pub meas_vel: MotorVel,
}

/// Output of velocity control for the motor driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputData {
    /// Wheel velocity targets from the body velocity stage.
    ///
    /// Units: radians/second
    pub target_vel: MotorVel,

    /// PWM demand from the wheel velocity stage
    pub pwm: MotorPwm,
}

/// Intermediate values of the cascade from the last cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusReport {
    /// Low-pass filtered vx command
    pub vx_filt: f32,

    /// Low-pass filtered wz command
    pub wz_filt: f32,

    /// Filtered wz command minus measured wz
    pub wz_error: f32,

    /// wz after the body rate PID correction
    pub wz_corrected: f32,

    /// Wheel velocity error per wheel
    pub wheel_error: [f32; NUM_MOTORS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for VelCtrl {
    type InitData = VelCtrlParams;
    type InitError = VelCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = VelCtrlError;

    /// Initialise the VelCtrl module, creating every filter with zeroed state.
    fn init(&mut self, params: Self::InitData) -> Result<(), Self::InitError> {
        params.validate()?;

        self.filters = Some(Filters::new(&params));
        self.report = StatusReport::default();

        Ok(())
    }

    /// Perform one cycle of the cascade, body velocity then wheel velocity control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        let target_vel = self.body_vel_ctrl(&input_data.cmd, &input_data.meas_twist)?;
        let pwm = self.wheel_vel_ctrl(&target_vel, &input_data.meas_vel)?;

        trace!(
            "VelCtrl output:\n    target: {:?}\n    pwm: {:?}",
            target_vel.velocity,
            pwm.pwm
        );

        Ok((OutputData { target_vel, pwm }, self.report))
    }
}

impl VelCtrl {
    /// Turn a body twist command into wheel velocity targets.
    ///
    /// The vx and wz commands are low-pass filtered, and the filtered wz is corrected by the body
    /// rate PID acting on the error to the measured wz.
    pub fn body_vel_ctrl(
        &mut self,
        cmd: &Twist2D,
        meas: &Twist2D,
    ) -> Result<MotorVel, VelCtrlError> {
        let f = self.filters.as_mut().ok_or(VelCtrlError::NotInitialised)?;

        let vx_filt = f.vx_cmd_lpf.march(cmd.vx);
        let wz_filt = f.wz_cmd_lpf.march(cmd.wz);

        let wz_error = wz_filt - meas.wz;
        let wz_corrected = wz_filt + f.body_wz_pid.march(wz_error);

        let vy = match f.geometry.drive_type {
            DriveType::Differential => 0.0,
            DriveType::Omni => cmd.vy,
        };

        self.report.vx_filt = vx_filt;
        self.report.wz_filt = wz_filt;
        self.report.wz_error = wz_error;
        self.report.wz_corrected = wz_corrected;

        Ok(f
            .geometry
            .inverse(&Twist2D::new(vx_filt, vy, wz_corrected)))
    }

    /// Turn wheel velocity targets into PWM demands.
    ///
    /// PWM is not limited here.
    pub fn wheel_vel_ctrl(
        &mut self,
        cmd: &MotorVel,
        meas: &MotorVel,
    ) -> Result<MotorPwm, VelCtrlError> {
        let f = self.filters.as_mut().ok_or(VelCtrlError::NotInitialised)?;

        let report = &mut self.report;
        let mut pwm = MotorPwm::default();

        let mut march = |motor: Motor, pid: &mut PidFilter| {
            let error = cmd[motor] - meas[motor];
            report.wheel_error[motor as usize] = error;
            pwm[motor] = pid.march(error);
        };

        march(Motor::Left, &mut f.left_wheel_pid);
        march(Motor::Right, &mut f.right_wheel_pid);
        if let Some(back) = f.back_wheel_pid.as_mut() {
            march(Motor::Back, back);
        }

        Ok(pwm)
    }

    /// Returns `true` once `init` has succeeded.
    pub fn is_initialised(&self) -> bool {
        self.filters.is_some()
    }

    /// Get the geometry the controller was initialised with.
    pub fn geometry(&self) -> Option<Geometry> {
        self.filters.as_ref().map(|f| f.geometry)
    }
}

impl Filters {
    /// Params must already be validated.
    fn new(params: &VelCtrlParams) -> Self {
        let dt = params.period_s;
        let omni = params.drive_type == DriveType::Omni;

        Self {
            geometry: Geometry {
                drive_type: params.drive_type,
                base_radius_m: params.base_radius_m,
                wheel_radius_m: params.wheel_radius_m,
            },
            left_wheel_pid: PidFilter::new(params.left, dt),
            right_wheel_pid: PidFilter::new(params.right, dt),
            back_wheel_pid: params
                .back
                .filter(|_| omni)
                .map(|g| PidFilter::new(g, dt)),
            body_vx_pid: PidFilter::new(params.vx, dt),
            body_vy_pid: params.vy.filter(|_| omni).map(|g| PidFilter::new(g, dt)),
            body_wz_pid: PidFilter::new(params.wz, dt),
            vx_cmd_lpf: LowPassFilter::new(params.vx_lpf_tc_s, dt),
            wz_cmd_lpf: LowPassFilter::new(params.wz_lpf_tc_s, dt),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::vel_ctrl::PidGains;

    const B: f32 = 0.0775;
    const R: f32 = 0.042;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    fn zero_gains() -> PidGains {
        PidGains::default()
    }

    fn init(params: VelCtrlParams) -> VelCtrl {
        let mut ctrl = VelCtrl::default();
        ctrl.init(params).unwrap();
        ctrl
    }

    #[test]
    fn test_wheel_proportional_scenario() {
        let mut ctrl = init(VelCtrlParams::default());

        let pwm = ctrl
            .wheel_vel_ctrl(&MotorVel::new(1.0, 1.0, 0.0), &MotorVel::new(0.0, 0.0, 0.0))
            .unwrap();

        assert_eq!(pwm[Motor::Left], 1.0);
        assert_eq!(pwm[Motor::Right], 1.0);
        assert_eq!(pwm[Motor::Back], 0.0);
    }

    #[test]
    fn test_not_initialised() {
        let mut ctrl = VelCtrl::default();

        assert!(!ctrl.is_initialised());
        assert_eq!(
            ctrl.wheel_vel_ctrl(&MotorVel::default(), &MotorVel::default()),
            Err(VelCtrlError::NotInitialised)
        );
        assert_eq!(
            ctrl.body_vel_ctrl(&Twist2D::default(), &Twist2D::default()),
            Err(VelCtrlError::NotInitialised)
        );
        assert!(ctrl.proc(&InputData::default()).is_err());
    }

    #[test]
    fn test_invalid_params_leave_uninitialised() {
        let mut params = VelCtrlParams::default();
        params.wz.kd = -0.1;

        let mut ctrl = VelCtrl::default();
        assert!(ctrl.init(params).is_err());
        assert!(!ctrl.is_initialised());
    }

    #[test]
    fn test_kinematic_mapping() {
        // With no wz correction the targets follow directly from the filtered setpoints
        let params = VelCtrlParams {
            wz: zero_gains(),
            ..Default::default()
        };
        let mut ctrl = init(params);

        let cmd = Twist2D::new(0.5, 0.0, 1.0);
        let vel = ctrl.body_vel_ctrl(&cmd, &Twist2D::default()).unwrap();

        let vx_f = ctrl.report.vx_filt;
        let wz_f = ctrl.report.wz_filt;
        assert_eq!(ctrl.report.wz_corrected, wz_f);
        assert_eq!(vel[Motor::Left], (vx_f - B * wz_f) / R);
        assert_eq!(vel[Motor::Right], (-vx_f - B * wz_f) / R);
    }

    #[test]
    fn test_outer_loop_uses_filtered_setpoint() {
        let params = VelCtrlParams {
            wz: PidGains {
                kp: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut ctrl = init(params);

        // Unit step in wz with zero measured rate
        ctrl.body_vel_ctrl(&Twist2D::new(0.0, 0.0, 1.0), &Twist2D::default())
            .unwrap();

        let wz_f = ctrl.report.wz_filt;
        assert!(wz_f > 0.0 && wz_f < 1.0);
        assert_close(wz_f, 0.04 / 0.25);

        // The error seen by the PID is the filtered value, not the raw step
        assert_eq!(ctrl.report.wz_error, wz_f);
        assert_eq!(ctrl.report.wz_corrected, wz_f + wz_f);
    }

    #[test]
    fn test_integrator_persists_between_cycles() {
        let ki = 0.5;
        let params = VelCtrlParams {
            left: PidGains {
                kp: 0.2,
                ki,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut ctrl = init(params);

        let cmd = MotorVel::new(2.0, 0.0, 0.0);
        let meas = MotorVel::new(1.5, 0.0, 0.0);
        let e = 0.5;

        let mut prev = ctrl.wheel_vel_ctrl(&cmd, &meas).unwrap()[Motor::Left];
        for _ in 0..10 {
            let out = ctrl.wheel_vel_ctrl(&cmd, &meas).unwrap()[Motor::Left];
            assert_close(out - prev, ki * e * 0.04);
            prev = out;
        }
    }

    #[test]
    fn test_reinit_resets_filters() {
        let params = VelCtrlParams {
            wz: PidGains {
                kp: 0.3,
                ki: 1.0,
                kd: 0.01,
                tf: 0.05,
            },
            ..Default::default()
        };
        let input = InputData {
            cmd: Twist2D::new(0.3, 0.0, 0.7),
            meas_twist: Twist2D::new(0.1, 0.0, 0.2),
            meas_vel: MotorVel::new(1.0, -1.0, 0.0),
        };

        let mut fresh = init(params.clone());
        let (first_out, first_report) = fresh.proc(&input).unwrap();

        let mut ctrl = init(params.clone());
        for _ in 0..25 {
            ctrl.proc(&input).unwrap();
        }
        assert_ne!(ctrl.proc(&input).unwrap().0.pwm, first_out.pwm);

        ctrl.init(params).unwrap();
        let (out, report) = ctrl.proc(&input).unwrap();

        assert_eq!(out.pwm, first_out.pwm);
        assert_eq!(out.target_vel, first_out.target_vel);
        assert_eq!(report.wz_corrected, first_report.wz_corrected);
    }

    #[test]
    fn test_proc_cascade() {
        let mut ctrl = init(VelCtrlParams::default());

        let input = InputData {
            cmd: Twist2D::new(0.25, 0.0, 0.0),
            meas_twist: Twist2D::default(),
            meas_vel: MotorVel::default(),
        };
        let (out, report) = ctrl.proc(&input).unwrap();

        // Proportional wheel loops with zero measurement pass the targets straight to PWM
        assert_eq!(out.pwm[Motor::Left], out.target_vel[Motor::Left]);
        assert_eq!(out.pwm[Motor::Right], out.target_vel[Motor::Right]);
        assert_eq!(report.wheel_error[0], out.target_vel[Motor::Left]);
        assert_close(report.vx_filt, 0.25 * 0.16);
    }

    #[test]
    fn test_omni_drives_back_wheel() {
        let params = VelCtrlParams {
            drive_type: DriveType::Omni,
            back: Some(PidGains {
                kp: 1.0,
                ..Default::default()
            }),
            vy: Some(zero_gains()),
            wz: zero_gains(),
            ..Default::default()
        };
        let mut ctrl = init(params);

        let input = InputData {
            cmd: Twist2D::new(0.0, 0.3, 0.0),
            ..Default::default()
        };
        let (out, _) = ctrl.proc(&input).unwrap();

        // The lateral command is not filtered and needs the back wheel
        assert_close(out.target_vel[Motor::Back], -0.3 / R);
        assert_eq!(out.pwm[Motor::Back], out.target_vel[Motor::Back]);
    }

    #[test]
    fn test_back_wheel_only_driven_by_omni() {
        let target = MotorVel::new(1.0, -1.0, 2.0);
        let meas = MotorVel::new(0.5, -0.5, 0.5);

        // A differential drive has no back wheel loop, whatever the targets say
        let mut ctrl = init(VelCtrlParams::default());
        for _ in 0..3 {
            let pwm = ctrl.wheel_vel_ctrl(&target, &meas).unwrap();
            assert_eq!(pwm[Motor::Left], 0.5);
            assert_eq!(pwm[Motor::Right], -0.5);
            assert_eq!(pwm[Motor::Back], 0.0);
            assert_eq!(ctrl.report.wheel_error, [0.5, -0.5, 0.0]);
        }

        let mut ctrl = init(VelCtrlParams {
            drive_type: DriveType::Omni,
            back: Some(PidGains {
                kp: 2.0,
                ..Default::default()
            }),
            vy: Some(zero_gains()),
            ..Default::default()
        });
        for _ in 0..3 {
            let pwm = ctrl.wheel_vel_ctrl(&target, &meas).unwrap();
            assert_eq!(pwm[Motor::Left], 0.5);
            assert_eq!(pwm[Motor::Back], 3.0);
            assert_eq!(ctrl.report.wheel_error, [0.5, -0.5, 1.5]);
        }
    }
}
