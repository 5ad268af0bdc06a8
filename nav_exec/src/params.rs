//! Parameters of the navigation executable

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::planner::AStarParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters loaded from `nav_exec.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NavExecParams {
    /// Receive timeout of the delivery sockets, bounds how long shutdown takes.
    ///
    /// Units: milliseconds
    pub recv_timeout_ms: i32,

    /// Period at which the main thread checks on the delivery threads.
    ///
    /// Units: seconds
    pub monitor_period_s: f64,

    /// If `true` every dispatch report is archived in the session directory.
    pub archive_reports: bool,

    pub astar: AStarParams,
}
