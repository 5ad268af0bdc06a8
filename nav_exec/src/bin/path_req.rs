//! # Path Request Tool
//!
//! Sends a single path request to the navigation executable and prints the path it publishes.
//!
//! ```text
//! path_req 2.0 0.0 --theta 1.57 --plan
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use comms_if::{
    nav::{Path2D, PathRequest, Pose2D},
    net::{zmq, NetParams, Publisher, SocketOptions, Subscriber},
};
use std::{
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time allowed for subscriptions to propagate before the request is sent.
const SUBSCRIBE_SETTLE_TIME: Duration = Duration::from_millis(250);

/// Receive timeout of the path subscriber.
const RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(
    name = "path_req",
    about = "Request a path from the navigation executable",
    setting = structopt::clap::AppSettings::AllowNegativeNumbers
)]
struct Opt {
    /// X position of the goal in the world frame (meters)
    x: f64,

    /// Y position of the goal in the world frame (meters)
    y: f64,

    /// Heading of the goal (radians)
    #[structopt(short, long, default_value = "0.0")]
    theta: f64,

    /// Search through the map rather than driving directly to the goal
    #[structopt(short, long)]
    plan: bool,

    /// Time to wait for the path before giving up (seconds)
    #[structopt(long, default_value = "5.0")]
    timeout: f64,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load network parameters")?;

    let ctx = zmq::Context::new();

    let path_sub: Subscriber<Path2D> = Subscriber::new(
        &ctx,
        SocketOptions::client(RECV_TIMEOUT_MS),
        &net_params.controller_path_endpoint,
    )
    .wrap_err("Could not connect to the controller path channel, is nav_exec running?")?;

    let req_pub: Publisher<PathRequest> = Publisher::new(
        &ctx,
        SocketOptions::client(RECV_TIMEOUT_MS),
        &net_params.path_request_endpoint,
    )
    .wrap_err("Could not connect to the path request channel, is nav_exec running?")?;

    thread::sleep(SUBSCRIBE_SETTLE_TIME);

    let request = PathRequest {
        goal: Pose2D::new(opt.x, opt.y, opt.theta),
        require_plan: opt.plan,
    };
    req_pub
        .publish(&request)
        .wrap_err("Could not send the request")?;

    println!("Sent {:?}", request);

    let deadline = Instant::now() + Duration::from_secs_f64(opt.timeout);

    while Instant::now() < deadline {
        if let Some(path) = path_sub.recv().wrap_err("Could not receive the path")? {
            if path.is_sentinel() {
                println!("Planning failed, received the empty path");
            } else {
                println!("Received path with {} poses:", path.path_length);
                for (i, p) in path.path.iter().enumerate() {
                    println!("    {:3}: x = {:8.3}, y = {:8.3}, theta = {:6.3}", i, p.x, p.y, p.theta);
                }
            }

            return Ok(());
        }
    }

    Err(eyre!("No path received within {} s", opt.timeout))
}
