//! # Occupancy grid map
//!
//! Immutable snapshot of the SLAM occupancy grid. A new [`OccupancyGrid`] is built for every map
//! message and swapped in whole, so a snapshot which has been handed to a planner never changes
//! underneath it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::nav::OccupancyGridMsg;
use nalgebra::{Point2, Vector2};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A grid of log-odds occupancy values.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    /// World position of the corner of cell (0, 0).
    ///
    /// Units: meters
    origin: Point2<f64>,

    /// Units: meters/cell
    meters_per_cell: f64,

    width: usize,

    height: usize,

    /// Row-major cells, `cells[y * width + x]`
    cells: Vec<i8>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MapError {
    #[error("Map is {width}x{height} cells but claims to contain {num_cells} cells")]
    SizeMismatch {
        width: usize,
        height: usize,
        num_cells: usize,
    },

    #[error("Map claims to contain {expected} cells but {found} were received")]
    CellCountMismatch { expected: usize, found: usize },

    #[error("Map resolution must be finite and positive, got {0} m/cell")]
    InvalidResolution(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OccupancyGrid {
    /// Decode a map message into a grid, checking that its size fields are consistent.
    pub fn from_msg(msg: OccupancyGridMsg) -> Result<Self, MapError> {
        if !msg.meters_per_cell.is_finite() || msg.meters_per_cell <= 0.0 {
            return Err(MapError::InvalidResolution(msg.meters_per_cell));
        }

        if msg.width.checked_mul(msg.height) != Some(msg.num_cells) {
            return Err(MapError::SizeMismatch {
                width: msg.width,
                height: msg.height,
                num_cells: msg.num_cells,
            });
        }

        if msg.cells.len() != msg.num_cells {
            return Err(MapError::CellCountMismatch {
                expected: msg.num_cells,
                found: msg.cells.len(),
            });
        }

        Ok(Self {
            origin: Point2::new(msg.origin_x, msg.origin_y),
            meters_per_cell: msg.meters_per_cell,
            width: msg.width,
            height: msg.height,
            cells: msg.cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn meters_per_cell(&self) -> f64 {
        self.meters_per_cell
    }

    pub fn origin(&self) -> Point2<f64> {
        self.origin
    }

    /// Get the cell containing the given world position.
    ///
    /// The returned cell may lie outside the grid, check it with [`OccupancyGrid::is_in_grid`].
    pub fn world_to_grid(&self, x: f64, y: f64) -> (i64, i64) {
        let rel: Vector2<f64> = (Point2::new(x, y) - self.origin) / self.meters_per_cell;

        (rel.x.floor() as i64, rel.y.floor() as i64)
    }

    /// Get the world position of the corner of the given cell.
    pub fn grid_to_world(&self, cx: i64, cy: i64) -> (f64, f64) {
        let p = self.origin + Vector2::new(cx as f64, cy as f64) * self.meters_per_cell;

        (p.x, p.y)
    }

    /// Get the world position of the centre of the given cell.
    pub fn cell_centre(&self, cx: i64, cy: i64) -> (f64, f64) {
        let (x, y) = self.grid_to_world(cx, cy);
        let half = 0.5 * self.meters_per_cell;

        (x + half, y + half)
    }

    /// Returns `true` if the cell is within the grid.
    pub fn is_in_grid(&self, cx: i64, cy: i64) -> bool {
        cx >= 0 && cy >= 0 && (cx as u64) < self.width as u64 && (cy as u64) < self.height as u64
    }

    /// Get the log-odds of the given cell, or `None` if it is outside the grid.
    pub fn log_odds(&self, cx: i64, cy: i64) -> Option<i8> {
        self.index(cx, cy).map(|i| self.cells[i])
    }

    /// Get the row-major index of the given cell, or `None` if it is outside the grid.
    pub fn index(&self, cx: i64, cy: i64) -> Option<usize> {
        if self.is_in_grid(cx, cy) {
            Some(cy as usize * self.width + cx as usize)
        } else {
            None
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn msg(width: usize, height: usize) -> OccupancyGridMsg {
        OccupancyGridMsg {
            origin_x: -1.0,
            origin_y: -2.0,
            meters_per_cell: 0.5,
            width,
            height,
            num_cells: width * height,
            cells: vec![0; width * height],
        }
    }

    #[test]
    fn test_decode_rejects_inconsistent_sizes() {
        let mut m = msg(4, 3);
        m.num_cells = 11;
        m.cells.pop();
        assert_eq!(
            OccupancyGrid::from_msg(m).unwrap_err(),
            MapError::SizeMismatch {
                width: 4,
                height: 3,
                num_cells: 11
            }
        );

        let mut m = msg(4, 3);
        m.cells.push(0);
        assert_eq!(
            OccupancyGrid::from_msg(m).unwrap_err(),
            MapError::CellCountMismatch {
                expected: 12,
                found: 13
            }
        );

        let mut m = msg(4, 3);
        m.meters_per_cell = 0.0;
        assert_eq!(
            OccupancyGrid::from_msg(m).unwrap_err(),
            MapError::InvalidResolution(0.0)
        );
    }

    #[test]
    fn test_transforms() {
        let grid = OccupancyGrid::from_msg(msg(4, 3)).unwrap();

        assert_eq!(grid.world_to_grid(-1.0, -2.0), (0, 0));
        assert_eq!(grid.world_to_grid(-0.26, -1.49), (1, 1));
        assert_eq!(grid.world_to_grid(-1.01, -2.0), (-1, 0));
        assert_eq!(grid.grid_to_world(2, 1), (0.0, -1.5));
        assert_eq!(grid.cell_centre(2, 1), (0.25, -1.25));

        // A cell's corner maps back into the same cell
        let (x, y) = grid.grid_to_world(3, 2);
        assert_eq!(grid.world_to_grid(x, y), (3, 2));
    }

    #[test]
    fn test_bounds_and_lookup() {
        let mut m = msg(4, 3);
        m.cells[2 * 4 + 3] = 100;
        let grid = OccupancyGrid::from_msg(m).unwrap();

        assert!(grid.is_in_grid(3, 2));
        assert!(!grid.is_in_grid(4, 2));
        assert!(!grid.is_in_grid(0, -1));

        assert_eq!(grid.log_odds(3, 2), Some(100));
        assert_eq!(grid.log_odds(0, 0), Some(0));
        assert_eq!(grid.log_odds(0, 3), None);
    }
}
