//! # Motion planner
//!
//! The [`MotionPlanner`] trait is the seam between the planning dispatch service and whatever
//! search algorithm produces paths. [`AStarPlanner`] is the default implementation, an 8-connected
//! A* search over the occupancy grid.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{cmp::Reverse, collections::BinaryHeap, sync::Arc};

use comms_if::nav::{Path2D, Pose2D};
use log::{debug, trace};
use ordered_float::OrderedFloat;
use serde::Deserialize;

use crate::map::OccupancyGrid;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Offsets and step costs of the 8 neighbours of a cell
const NEIGHBOURS: [(i64, i64, f64); 8] = [
    (1, 0, 1.0),
    (-1, 0, 1.0),
    (0, 1, 1.0),
    (0, -1, 1.0),
    (1, 1, std::f64::consts::SQRT_2),
    (1, -1, std::f64::consts::SQRT_2),
    (-1, 1, std::f64::consts::SQRT_2),
    (-1, -1, std::f64::consts::SQRT_2),
];

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A path search algorithm.
pub trait MotionPlanner: Send {
    /// Give the planner the map to search in subsequent calls to `plan_path`.
    fn set_map(&mut self, map: Arc<OccupancyGrid>);

    /// Plan a path from `start` to `goal`.
    ///
    /// A successful path starts at `start` and ends at `goal`.
    fn plan_path(&mut self, start: Pose2D, goal: Pose2D) -> Result<Path2D, PlanError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the [`AStarPlanner`].
#[derive(Debug, Clone, Deserialize)]
pub struct AStarParams {
    /// Cells with a log-odds strictly greater than this value are obstacles.
    pub occupied_threshold: i8,

    /// If `true` cells with a log-odds of exactly zero (never observed) are obstacles.
    #[serde(default)]
    pub unknown_is_obstacle: bool,

    /// Maximum number of cells expanded before the search gives up.
    pub max_expansions: usize,
}

/// A* search over the occupancy grid.
pub struct AStarPlanner {
    params: AStarParams,

    map: Option<Arc<OccupancyGrid>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("No map has been provided to the planner")]
    NoMap,

    #[error("The start pose ({0}, {1}) is outside the map")]
    StartOutsideMap(f64, f64),

    #[error("The goal pose ({0}, {1}) is outside the map")]
    GoalOutsideMap(f64, f64),

    #[error("The start pose ({0}, {1}) is in an occupied cell")]
    StartOccupied(f64, f64),

    #[error("The goal pose ({0}, {1}) is in an occupied cell")]
    GoalOccupied(f64, f64),

    #[error("No route exists between the start and goal")]
    NoRoute,

    #[error("Search gave up after expanding {0} cells")]
    ExpansionLimit(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AStarPlanner {
    pub fn new(params: AStarParams) -> Self {
        Self { params, map: None }
    }

    fn is_free(&self, map: &OccupancyGrid, cx: i64, cy: i64) -> bool {
        match map.log_odds(cx, cy) {
            Some(0) if self.params.unknown_is_obstacle => false,
            Some(l) => l <= self.params.occupied_threshold,
            None => false,
        }
    }

    /// Search for the sequence of cells from `start` to `goal` inclusive.
    fn search(
        &self,
        map: &OccupancyGrid,
        start: (i64, i64),
        goal: (i64, i64),
    ) -> Result<Vec<(i64, i64)>, PlanError> {
        let num_cells = map.width() * map.height();
        let mut cost = vec![std::f64::INFINITY; num_cells];
        let mut parent: Vec<Option<usize>> = vec![None; num_cells];
        let mut closed = vec![false; num_cells];

        let start_idx = map.index(start.0, start.1).ok_or(PlanError::NoRoute)?;
        let goal_idx = map.index(goal.0, goal.1).ok_or(PlanError::NoRoute)?;

        let mut open = BinaryHeap::new();
        cost[start_idx] = 0.0;
        open.push(Reverse((OrderedFloat(octile(start, goal)), start_idx)));

        let mut num_expanded = 0;

        while let Some(Reverse((_, idx))) = open.pop() {
            if closed[idx] {
                continue;
            }
            closed[idx] = true;

            if idx == goal_idx {
                debug!("A* reached the goal after expanding {} cells", num_expanded);
                return Ok(self.trace_back(map, &parent, goal_idx));
            }

            num_expanded += 1;
            if num_expanded > self.params.max_expansions {
                return Err(PlanError::ExpansionLimit(self.params.max_expansions));
            }

            let cell = ((idx % map.width()) as i64, (idx / map.width()) as i64);

            for (dx, dy, step) in NEIGHBOURS.iter() {
                let next = (cell.0 + dx, cell.1 + dy);

                if !self.is_free(map, next.0, next.1) {
                    continue;
                }

                // No cutting corners past obstacles
                if *dx != 0
                    && *dy != 0
                    && !(self.is_free(map, cell.0 + dx, cell.1)
                        && self.is_free(map, cell.0, cell.1 + dy))
                {
                    continue;
                }

                let next_idx = match map.index(next.0, next.1) {
                    Some(i) => i,
                    None => continue,
                };

                let next_cost = cost[idx] + step;
                if next_cost < cost[next_idx] {
                    cost[next_idx] = next_cost;
                    parent[next_idx] = Some(idx);
                    open.push(Reverse((
                        OrderedFloat(next_cost + octile(next, goal)),
                        next_idx,
                    )));
                }
            }
        }

        Err(PlanError::NoRoute)
    }

    fn trace_back(
        &self,
        map: &OccupancyGrid,
        parent: &[Option<usize>],
        goal_idx: usize,
    ) -> Vec<(i64, i64)> {
        let mut cells = vec![];
        let mut current = Some(goal_idx);

        while let Some(idx) = current {
            cells.push(((idx % map.width()) as i64, (idx / map.width()) as i64));
            current = parent[idx];
        }

        cells.reverse();
        cells
    }
}

impl MotionPlanner for AStarPlanner {
    fn set_map(&mut self, map: Arc<OccupancyGrid>) {
        self.map = Some(map);
    }

    fn plan_path(&mut self, start: Pose2D, goal: Pose2D) -> Result<Path2D, PlanError> {
        let map = self.map.as_ref().ok_or(PlanError::NoMap)?;

        let start_cell = map.world_to_grid(start.x, start.y);
        let goal_cell = map.world_to_grid(goal.x, goal.y);

        if !map.is_in_grid(start_cell.0, start_cell.1) {
            return Err(PlanError::StartOutsideMap(start.x, start.y));
        }
        if !map.is_in_grid(goal_cell.0, goal_cell.1) {
            return Err(PlanError::GoalOutsideMap(goal.x, goal.y));
        }
        if !self.is_free(map, start_cell.0, start_cell.1) {
            return Err(PlanError::StartOccupied(start.x, start.y));
        }
        if !self.is_free(map, goal_cell.0, goal_cell.1) {
            return Err(PlanError::GoalOccupied(goal.x, goal.y));
        }

        let cells = self.search(map, start_cell, goal_cell)?;

        // The start and goal cells are replaced by the exact poses
        let mut poses = Vec::with_capacity(cells.len().max(2));
        poses.push(start);
        if cells.len() > 2 {
            for &(cx, cy) in &cells[1..cells.len() - 1] {
                let (x, y) = map.cell_centre(cx, cy);
                poses.push(Pose2D::new(x, y, 0.0));
            }
        }
        poses.push(goal);

        // Intermediate waypoints face the next waypoint
        for i in 1..poses.len() - 1 {
            let next = poses[i + 1];
            let this = &mut poses[i];
            this.theta = (next.y - this.y).atan2(next.x - this.x);
        }

        trace!("A* path: {:?}", poses);

        Ok(Path2D::from_poses(poses))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Octile distance between two cells, admissible for 8-connected motion.
fn octile(a: (i64, i64), b: (i64, i64)) -> f64 {
    let dx = (a.0 - b.0).abs() as f64;
    let dy = (a.1 - b.1).abs() as f64;

    (dx + dy) + (std::f64::consts::SQRT_2 - 2.0) * dx.min(dy)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
