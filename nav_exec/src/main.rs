//! # Navigation Executable
//!
//! Runs the planning dispatch service. Pose, map and path requests are received on their own
//! threads, and each request produces one path on the controller path channel.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use comms_if::{
    nav::Path2D,
    net::{zmq, NetParams, Publisher, SocketOptions},
};
use log::{info, warn};
use std::{sync::Arc, thread, time::Duration};

// Internal
use nav_lib::{
    delivery::DeliveryThreads,
    params::NavExecParams,
    plan_server::PlanServer,
    planner::AStarPlanner,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Navigation Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load network parameters")?;
    let params: NavExecParams =
        util::params::load("nav_exec.toml").wrap_err("Could not load nav_exec parameters")?;

    info!("Parameters loaded");

    // ---- SERVER INITIALISATION ----

    let ctx = zmq::Context::new();

    let path_pub: Publisher<Path2D> = Publisher::new(
        &ctx,
        SocketOptions::server(params.recv_timeout_ms),
        &net_params.controller_path_endpoint,
    )
    .wrap_err("Failed to open the controller path publisher")?;

    let server = Arc::new(PlanServer::new(
        AStarPlanner::new(params.astar.clone()),
        path_pub,
    ));

    let archive_reports = params.archive_reports;
    let delivery = DeliveryThreads::spawn(
        server.clone(),
        &ctx,
        &net_params,
        params.recv_timeout_ms,
        move |report| {
            if archive_reports {
                session::save_with_timestamp("dispatch/report.json", report);
            }
        },
    )
    .wrap_err("Failed to start message delivery")?;

    info!("Server initialised, waiting for requests");

    // ---- MAIN LOOP ----

    let monitor_period = Duration::from_secs_f64(params.monitor_period_s);

    while !delivery.any_finished() {
        thread::sleep(monitor_period);
    }

    warn!("A delivery thread has stopped, shutting down");

    let result = delivery.stop();

    match server.num_requests() {
        Ok(n) => info!("Served {} requests", n),
        Err(e) => warn!("{}", e),
    }

    session.exit();

    result.wrap_err("Message delivery failed")
}
