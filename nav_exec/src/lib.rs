//! # Navigation library
//!
//! Planning dispatch for the robot: keeps the latest SLAM pose and map, and answers path requests
//! with either a direct path or a path searched through the map.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod delivery;
pub mod map;
pub mod params;
pub mod plan_server;
pub mod planner;
