//! # Navigation Messages
//!
//! Messages exchanged between the SLAM system, the planning dispatch service and the path
//! follower.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A pose in the world frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    /// Position along the world X axis.
    ///
    /// Units: meters
    pub x: f64,

    /// Position along the world Y axis.
    ///
    /// Units: meters
    pub y: f64,

    /// Heading, measured counter-clockwise from the world X axis.
    ///
    /// Units: radians
    pub theta: f64,
}

/// A one-shot request for a path from the robot's current pose to the goal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PathRequest {
    /// The pose the path shall end at.
    pub goal: Pose2D,

    /// If `true` a full search through the current map is performed, otherwise a direct path
    /// from the current pose to the goal is produced.
    pub require_plan: bool,
}

/// An ordered sequence of poses for the path follower.
///
/// A path with `path_length == 0` is the sentinel published when no path could be planned.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Path2D {
    /// Number of poses in the path, always equal to `path.len()` when built with
    /// [`Path2D::from_poses`].
    pub path_length: usize,

    /// The poses making up the path, first to last.
    pub path: Vec<Pose2D>,
}

/// An occupancy grid as transmitted by the SLAM system.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OccupancyGridMsg {
    /// World X position of cell (0, 0).
    ///
    /// Units: meters
    pub origin_x: f64,

    /// World Y position of cell (0, 0).
    ///
    /// Units: meters
    pub origin_y: f64,

    /// Side length of a single (square) cell.
    ///
    /// Units: meters/cell
    pub meters_per_cell: f64,

    /// Number of cells along the X axis
    pub width: usize,

    /// Number of cells along the Y axis
    pub height: usize,

    /// Total number of cells, expected to be `width * height`
    pub num_cells: usize,

    /// Row-major log-odds of occupancy, `cells[y * width + x]`.
    pub cells: Vec<i8>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose2D {
    /// Construct a new pose.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }
}

impl Path2D {
    /// Build a path from the given poses, setting the length to match.
    pub fn from_poses(path: Vec<Pose2D>) -> Self {
        Self {
            path_length: path.len(),
            path,
        }
    }

    /// The empty path published when planning fails.
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// Returns `true` if this is the empty sentinel path.
    pub fn is_sentinel(&self) -> bool {
        self.path_length == 0 && self.path.is_empty()
    }
}
