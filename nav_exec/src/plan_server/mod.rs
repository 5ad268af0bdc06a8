//! # Planning dispatch service
//!
//! Holds the latest pose and map received from SLAM and turns each [`PathRequest`] into exactly
//! one published [`Path2D`]. All handlers share a single lock, so a request always sees a
//! consistent pose and map pair, and pose or map updates arriving during a replan wait for it to
//! finish.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fmt::Display,
    sync::{mpsc, Arc, Mutex, MutexGuard},
};

use comms_if::{
    nav::{OccupancyGridMsg, Path2D, PathRequest, Pose2D},
    net::{Publisher, TopicError},
};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    map::{MapError, OccupancyGrid},
    planner::MotionPlanner,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Outbound channel for planned paths.
pub trait PathPublisher: Send {
    type Error: Display;

    fn publish_path(&mut self, path: &Path2D) -> Result<(), Self::Error>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The planning dispatch service.
pub struct PlanServer<P, T> {
    inner: Mutex<Inner<P, T>>,
}

/// Everything guarded by the server's lock.
struct Inner<P, T> {
    pose: Pose2D,
    pose_received: bool,

    map: Option<Arc<OccupancyGrid>>,

    planner: P,
    publisher: T,

    num_requests: u64,
}

/// Summary of how a single request was served.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchReport {
    /// Sequence number of the request, starting at 1
    pub request_num: u64,

    pub mode: DispatchMode,

    /// The pose used as the start of the path
    pub start: Pose2D,

    pub goal: Pose2D,

    /// Length of the published path, zero if the sentinel was published
    pub path_length: usize,

    /// State which had not been received when the request was served
    pub stale: Vec<StaleState>,

    pub outcome: DispatchOutcome,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum DispatchMode {
    /// Straight from the current pose to the goal
    Direct,

    /// Searched through the current map
    Replan,
}

/// State missing when a request was served.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum StaleState {
    /// No pose has been received, the start is the default pose
    NoPose,

    /// No map has been received, a replan cannot succeed
    NoMap,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum DispatchOutcome {
    /// A path was published
    Published,

    /// Planning failed and the empty sentinel path was published instead
    PlanningFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlanServerError {
    #[error("The plan server's lock is poisoned")]
    PoisonError,

    #[error("Could not decode the map: {0}")]
    MapError(#[from] MapError),

    #[error("Could not publish the path: {0}")]
    PublishError(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P, T> PlanServer<P, T>
where
    P: MotionPlanner,
    T: PathPublisher,
{
    /// Create a new server with no pose or map.
    pub fn new(planner: P, publisher: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pose: Pose2D::default(),
                pose_received: false,
                map: None,
                planner,
                publisher,
                num_requests: 0,
            }),
        }
    }

    /// Replace the current pose.
    pub fn handle_pose(&self, pose: Pose2D) -> Result<(), PlanServerError> {
        let mut inner = self.lock()?;

        inner.pose = pose;
        inner.pose_received = true;

        Ok(())
    }

    /// Decode and replace the current map.
    ///
    /// If the map can't be decoded the previous map is kept.
    pub fn handle_map(&self, msg: OccupancyGridMsg) -> Result<(), PlanServerError> {
        let map = Arc::new(OccupancyGrid::from_msg(msg)?);

        debug!(
            "New map: {}x{} cells at {} m/cell",
            map.width(),
            map.height(),
            map.meters_per_cell()
        );

        self.lock()?.map = Some(map);

        Ok(())
    }

    /// Serve a path request, publishing exactly one path.
    ///
    /// The lock is held for the whole request, including the search.
    pub fn handle_request(&self, request: PathRequest) -> Result<DispatchReport, PlanServerError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        inner.num_requests += 1;

        let start = inner.pose;
        let goal = request.goal;

        let mode = if request.require_plan {
            DispatchMode::Replan
        } else {
            DispatchMode::Direct
        };

        let mut stale = vec![];
        if !inner.pose_received {
            stale.push(StaleState::NoPose);
        }
        if mode == DispatchMode::Replan && inner.map.is_none() {
            stale.push(StaleState::NoMap);
        }
        for s in &stale {
            warn!("Request {} served with stale state: {:?}", inner.num_requests, s);
        }

        let (path, outcome) = match mode {
            DispatchMode::Direct => (
                Path2D::from_poses(vec![start, goal]),
                DispatchOutcome::Published,
            ),
            DispatchMode::Replan => {
                if let Some(map) = &inner.map {
                    inner.planner.set_map(map.clone());
                }

                match inner.planner.plan_path(start, goal) {
                    Ok(p) if p.path_length > 0 && p.path_length == p.path.len() => {
                        (p, DispatchOutcome::Published)
                    }
                    Ok(p) => {
                        let reason = format!(
                            "planner returned an empty or inconsistent path ({} poses, length {})",
                            p.path.len(),
                            p.path_length
                        );
                        (Path2D::sentinel(), DispatchOutcome::PlanningFailed(reason))
                    }
                    Err(e) => (Path2D::sentinel(), DispatchOutcome::PlanningFailed(e.to_string())),
                }
            }
        };

        if let DispatchOutcome::PlanningFailed(reason) = &outcome {
            warn!(
                "Planning from {:?} to {:?} failed ({}), publishing empty path",
                start, goal, reason
            );
        }

        inner
            .publisher
            .publish_path(&path)
            .map_err(|e| PlanServerError::PublishError(e.to_string()))?;

        info!(
            "Request {}: {:?} path with {} poses published",
            inner.num_requests, mode, path.path_length
        );

        Ok(DispatchReport {
            request_num: inner.num_requests,
            mode,
            start,
            goal,
            path_length: path.path_length,
            stale,
            outcome,
        })
    }

    /// Get the current pose.
    pub fn pose(&self) -> Result<Pose2D, PlanServerError> {
        Ok(self.lock()?.pose)
    }

    /// Get the number of requests served so far.
    pub fn num_requests(&self) -> Result<u64, PlanServerError> {
        Ok(self.lock()?.num_requests)
    }

    fn lock(&self) -> Result<MutexGuard<Inner<P, T>>, PlanServerError> {
        self.inner.lock().map_err(|_| PlanServerError::PoisonError)
    }
}

impl PathPublisher for Publisher<Path2D> {
    type Error = TopicError;

    fn publish_path(&mut self, path: &Path2D) -> Result<(), Self::Error> {
        self.publish(path)
    }
}

impl PathPublisher for mpsc::Sender<Path2D> {
    type Error = mpsc::SendError<Path2D>;

    fn publish_path(&mut self, path: &Path2D) -> Result<(), Self::Error> {
        self.send(path.clone())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
