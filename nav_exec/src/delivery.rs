//! # Message delivery
//!
//! One thread per inbound channel, each owning its subscriber and calling into the shared
//! [`PlanServer`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use comms_if::{
    nav::{OccupancyGridMsg, PathRequest, Pose2D},
    net::{zmq, Message, NetParams, SocketOptions, Subscriber, TopicError},
};
use log::{error, info, warn};

use crate::{
    plan_server::{DispatchReport, PathPublisher, PlanServer, PlanServerError},
    planner::MotionPlanner,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handles to the running delivery threads.
pub struct DeliveryThreads {
    shutdown: Arc<AtomicBool>,

    handles: Vec<(&'static str, JoinHandle<Result<(), DeliveryError>>)>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    TopicError(#[from] TopicError),

    #[error("Plan server error: {0}")]
    PlanServerError(#[from] PlanServerError),

    #[error("The delivery thread for {0} panicked")]
    Panicked(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DeliveryThreads {
    /// Bind a subscriber for each inbound channel and start delivering messages to the server.
    ///
    /// `on_report` is called from the request thread with the report of every served request.
    pub fn spawn<P, T, F>(
        server: Arc<PlanServer<P, T>>,
        ctx: &zmq::Context,
        net: &NetParams,
        recv_timeout_ms: i32,
        mut on_report: F,
    ) -> Result<Self, DeliveryError>
    where
        P: MotionPlanner + 'static,
        T: PathPublisher + 'static,
        F: FnMut(DispatchReport) + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let opts = SocketOptions::server(recv_timeout_ms);

        let pose_sub: Subscriber<Pose2D> =
            Subscriber::new(ctx, opts.clone(), &net.slam_pose_endpoint)?;
        let map_sub: Subscriber<OccupancyGridMsg> =
            Subscriber::new(ctx, opts.clone(), &net.slam_map_endpoint)?;
        let req_sub: Subscriber<PathRequest> =
            Subscriber::new(ctx, opts, &net.path_request_endpoint)?;

        let mut handles = Vec::with_capacity(3);

        {
            let server = server.clone();
            handles.push(spawn_channel(pose_sub, shutdown.clone(), move |pose| {
                server.handle_pose(pose)
            }));
        }

        {
            let server = server.clone();
            handles.push(spawn_channel(map_sub, shutdown.clone(), move |msg| {
                match server.handle_map(msg) {
                    Err(PlanServerError::MapError(e)) => {
                        warn!("Discarding map: {}", e);
                        Ok(())
                    }
                    r => r,
                }
            }));
        }

        handles.push(spawn_channel(req_sub, shutdown.clone(), move |req| {
            info!("Path request received: {:?}", req);
            match server.handle_request(req) {
                Ok(report) => {
                    on_report(report);
                    Ok(())
                }
                Err(PlanServerError::PublishError(e)) => {
                    warn!("Could not publish path: {}", e);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }));

        Ok(Self { shutdown, handles })
    }

    /// Returns `true` if any delivery thread has stopped.
    pub fn any_finished(&self) -> bool {
        self.handles.iter().any(|(_, h)| h.is_finished())
    }

    /// Stop every thread and wait for them, returning the first error any of them hit.
    pub fn stop(self) -> Result<(), DeliveryError> {
        self.shutdown.store(true, Ordering::Relaxed);

        let mut result = Ok(());

        for (topic, handle) in self.handles {
            let r = handle
                .join()
                .unwrap_or(Err(DeliveryError::Panicked(topic)));

            if let Err(e) = r {
                error!("Delivery of {} stopped with an error: {}", topic, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        result
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn spawn_channel<M, H>(
    sub: Subscriber<M>,
    shutdown: Arc<AtomicBool>,
    mut handler: H,
) -> (&'static str, JoinHandle<Result<(), DeliveryError>>)
where
    M: Message + Send + 'static,
    H: FnMut(M) -> Result<(), PlanServerError> + Send + 'static,
{
    let handle = thread::spawn(move || {
        while !shutdown.load(Ordering::Relaxed) {
            match sub.recv() {
                Ok(Some(msg)) => handler(msg)?,
                Ok(None) => (),
                Err(TopicError::RecvError(e)) => return Err(TopicError::RecvError(e).into()),
                Err(e) => warn!("Discarding message on {}: {}", M::TOPIC, e),
            }
        }

        Ok(())
    });

    (M::TOPIC, handle)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{map::OccupancyGrid, planner::PlanError};
    use comms_if::nav::Path2D;
    use comms_if::net::Publisher;
    use std::{
        sync::mpsc,
        time::{Duration, Instant},
    };

    /// Planner which plans straight to the goal, or panics while the server's lock is held.
    struct StraightPlanner {
        panic_on_plan: bool,
    }

    impl MotionPlanner for StraightPlanner {
        fn set_map(&mut self, _map: Arc<OccupancyGrid>) {}

        fn plan_path(&mut self, start: Pose2D, goal: Pose2D) -> Result<Path2D, PlanError> {
            if self.panic_on_plan {
                panic!("planner failure");
            }
            Ok(Path2D::from_poses(vec![start, goal]))
        }
    }

    /// Inbound channels of one test, each on its own `inproc` endpoint.
    struct Inbound {
        pose: Publisher<Pose2D>,
        map: Publisher<OccupancyGridMsg>,
        req: Publisher<PathRequest>,
    }

    fn net_params(name: &str) -> NetParams {
        let ep = |channel: &str| format!("inproc://{}_{}", name, channel);

        NetParams {
            slam_pose_endpoint: ep("pose"),
            slam_map_endpoint: ep("map"),
            path_request_endpoint: ep("req"),
            controller_path_endpoint: ep("path"),
            vel_cmd_endpoint: ep("vel_cmd"),
            motor_tm_endpoint: ep("motor_tm"),
        }
    }

    fn connect(ctx: &zmq::Context, net: &NetParams) -> Inbound {
        let opts = SocketOptions {
            block_on_first_connect: false,
            ..SocketOptions::client(0)
        };

        let inbound = Inbound {
            pose: Publisher::new(ctx, opts.clone(), &net.slam_pose_endpoint).unwrap(),
            map: Publisher::new(ctx, opts.clone(), &net.slam_map_endpoint).unwrap(),
            req: Publisher::new(ctx, opts, &net.path_request_endpoint).unwrap(),
        };

        // Let the subscriptions reach the publishers
        thread::sleep(Duration::from_millis(200));

        inbound
    }

    fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn request(x: f64) -> PathRequest {
        PathRequest {
            goal: Pose2D::new(x, 0.0, 0.0),
            require_plan: false,
        }
    }

    #[test]
    fn test_bad_map_is_discarded() {
        let ctx = zmq::Context::new();
        let net = net_params("bad_map");

        let (path_tx, path_rx) = mpsc::channel();
        let (report_tx, report_rx) = mpsc::channel();
        let server = Arc::new(PlanServer::new(
            StraightPlanner {
                panic_on_plan: false,
            },
            path_tx,
        ));

        let delivery = DeliveryThreads::spawn(server.clone(), &ctx, &net, 20, move |report| {
            report_tx.send(report).ok();
        })
        .unwrap();
        let inbound = connect(&ctx, &net);

        let pose = Pose2D::new(1.0, 2.0, 0.5);
        assert!(wait_for(|| {
            inbound.pose.publish(&pose).unwrap();
            server.pose().unwrap() == pose
        }));

        let bad_map = OccupancyGridMsg {
            origin_x: 0.0,
            origin_y: 0.0,
            meters_per_cell: 0.1,
            width: 2,
            height: 2,
            num_cells: 5,
            cells: vec![0; 5],
        };
        inbound.map.publish(&bad_map).unwrap();
        inbound.req.publish(&request(3.0)).unwrap();

        let report = report_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.request_num, 1);
        assert_eq!(
            path_rx.recv_timeout(Duration::from_secs(5)).unwrap().path,
            vec![pose, Pose2D::new(3.0, 0.0, 0.0)]
        );

        // The map thread outlives the bad map
        thread::sleep(Duration::from_millis(100));
        assert!(!delivery.any_finished());
        assert!(delivery.stop().is_ok());
    }

    #[test]
    fn test_publish_error_keeps_serving() {
        let ctx = zmq::Context::new();
        let net = net_params("publish_error");

        // Nothing receives the paths, so every publish fails
        let (path_tx, path_rx) = mpsc::channel::<Path2D>();
        drop(path_rx);

        let (report_tx, report_rx) = mpsc::channel();
        let server = Arc::new(PlanServer::new(
            StraightPlanner {
                panic_on_plan: false,
            },
            path_tx,
        ));

        let delivery = DeliveryThreads::spawn(server.clone(), &ctx, &net, 20, move |report| {
            report_tx.send(report).ok();
        })
        .unwrap();
        let inbound = connect(&ctx, &net);

        inbound.req.publish(&request(1.0)).unwrap();
        inbound.req.publish(&request(2.0)).unwrap();

        assert!(wait_for(|| server.num_requests().unwrap() == 2));
        assert!(!delivery.any_finished());
        assert!(report_rx.try_recv().is_err());
        assert!(delivery.stop().is_ok());
    }

    #[test]
    fn test_poisoned_server_stops_delivery() {
        let ctx = zmq::Context::new();
        let net = net_params("poisoned");

        let (path_tx, _path_rx) = mpsc::channel();
        let server = Arc::new(PlanServer::new(
            StraightPlanner {
                panic_on_plan: true,
            },
            path_tx,
        ));

        let delivery = DeliveryThreads::spawn(server.clone(), &ctx, &net, 20, |_| ()).unwrap();
        let inbound = connect(&ctx, &net);

        // The request thread panics while holding the lock
        inbound
            .req
            .publish(&PathRequest {
                goal: Pose2D::new(1.0, 0.0, 0.0),
                require_plan: true,
            })
            .unwrap();
        assert!(wait_for(|| delivery.any_finished()));

        // The pose thread then finds the lock poisoned and stops too
        assert!(wait_for(|| {
            inbound.pose.publish(&Pose2D::new(1.0, 0.0, 0.0)).ok();
            delivery
                .handles
                .iter()
                .filter(|(_, h)| h.is_finished())
                .count()
                == 2
        }));

        assert!(matches!(
            delivery.stop(),
            Err(DeliveryError::PlanServerError(PlanServerError::PoisonError))
        ));
    }
}
