//! # Motor Control Executable
//!
//! Runs the cascaded velocity controller at a fixed period:
//! - Receive the latest body velocity command
//! - Read wheel feedback from the motors
//! - Run body then wheel velocity control
//! - Write PWM to the motors and publish telemetry

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use comms_if::{
    mot::{MotorTm, Twist2D},
    net::{zmq, NetParams, Publisher, SocketOptions, Subscriber},
};
use log::{debug, info, trace, warn};
use std::{
    thread,
    time::{Duration, Instant},
};

// Internal
use mot_lib::{
    motor_io::{MotorIo, SimMotorIo},
    params::MotExecParams,
    vel_ctrl::{InputData, VelCtrl, VelCtrlParams},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    raise_error,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("mot_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Motor Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load network parameters")?;
    let vel_ctrl_params: VelCtrlParams =
        util::params::load("vel_ctrl.toml").wrap_err("Could not load VelCtrl parameters")?;
    let params: MotExecParams =
        util::params::load("mot_exec.toml").wrap_err("Could not load mot_exec parameters")?;

    info!("Parameters loaded");

    // ---- MODULE INITIALISATION ----

    let period = Duration::from_secs_f32(vel_ctrl_params.period_s);
    let cmd_timeout = Duration::from_secs_f64(params.cmd_timeout_s);
    let tm_every_n_cycles = params.tm_every_n_cycles.max(1);

    let mut vel_ctrl = VelCtrl::default();
    vel_ctrl
        .init(vel_ctrl_params.clone())
        .wrap_err("Failed to initialise VelCtrl")?;

    let geometry = vel_ctrl
        .geometry()
        .ok_or_else(|| eyre!("VelCtrl has no geometry after initialisation"))?;
    let mut motor_io = SimMotorIo::new(params.sim.clone(), geometry, vel_ctrl_params.period_s);

    info!("VelCtrl initialised for a {:?} drive", geometry.drive_type);

    // ---- NETWORK INITIALISATION ----

    let ctx = zmq::Context::new();

    // Zero receive timeout, commands are polled once per cycle
    let cmd_sub: Subscriber<Twist2D> = Subscriber::new(
        &ctx,
        SocketOptions::server(0),
        &net_params.vel_cmd_endpoint,
    )
    .wrap_err("Failed to open the velocity command subscriber")?;

    let tm_pub: Publisher<MotorTm> = Publisher::new(
        &ctx,
        SocketOptions::server(0),
        &net_params.motor_tm_endpoint,
    )
    .wrap_err("Failed to open the telemetry publisher")?;

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop in safe mode");

    let mut safe_mode = true;
    let mut cmd = Twist2D::default();
    let mut last_cmd_instant: Option<Instant> = None;
    let mut num_cycles: u64 = 0;
    let mut num_consec_overruns: u64 = 0;

    loop {
        let cycle_start_instant = Instant::now();

        // ---- COMMAND ----

        // Only the latest command matters, drain everything received since the last cycle
        match cmd_sub.recv_latest() {
            Some(c) => {
                if safe_mode {
                    info!("Received velocity command, exiting safe mode");
                    safe_mode = false;
                }
                cmd = c;
                last_cmd_instant = Some(cycle_start_instant);
            }
            None => {
                let timed_out = match last_cmd_instant {
                    Some(t) => cycle_start_instant - t > cmd_timeout,
                    None => true,
                };

                if timed_out && !safe_mode {
                    warn!("No velocity command for {:?}, entering safe mode", cmd_timeout);
                    safe_mode = true;
                }
            }
        }

        if safe_mode {
            cmd = Twist2D::default();
        }

        // ---- CONTROL ----

        let feedback = motor_io
            .read_feedback()
            .map_err(|e| eyre!("Could not read motor feedback: {}", e))?;

        let (output, report) = vel_ctrl
            .proc(&InputData {
                cmd,
                meas_twist: feedback.twist,
                meas_vel: feedback.vel,
            })
            .wrap_err("Error during VelCtrl processing")?;

        trace!("VelCtrl status: {:?}", report);

        motor_io
            .write_pwm(&output.pwm)
            .map_err(|e| eyre!("Could not write motor PWM: {}", e))?;

        // ---- TELEMETRY ----

        if num_cycles % tm_every_n_cycles == 0 {
            let tm = MotorTm {
                cycle: num_cycles,
                cmd_twist: cmd,
                meas_twist: feedback.twist,
                target_vel: output.target_vel,
                meas_vel: feedback.vel,
                pwm: output.pwm,
            };

            if let Err(e) = tm_pub.publish(&tm) {
                debug!("Could not publish telemetry: {}", e);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - period.as_secs_f64()
                );
                num_consec_overruns += 1;

                if num_consec_overruns > params.max_consec_overruns {
                    raise_error!(
                        "More than {} consecutive cycle overruns!",
                        params.max_consec_overruns
                    );
                }
            }
        }

        num_cycles += 1;
    }
}
