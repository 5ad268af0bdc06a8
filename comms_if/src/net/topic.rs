//! # Topics
//!
//! Typed publish/subscribe over [`MonitoredSocket`]. Each message is sent as a single frame of the
//! form `"<TOPIC> <json>"`, allowing subscribers to filter on the topic prefix.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

use super::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions};
use crate::{
    mot::{MotorTm, Twist2D},
    nav::{OccupancyGridMsg, Path2D, PathRequest, Pose2D},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

pub const SLAM_POSE: &str = "SLAM_POSE";
pub const SLAM_MAP: &str = "SLAM_MAP";
pub const PATH_REQUEST: &str = "PATH_REQUEST";
pub const CONTROLLER_PATH: &str = "CONTROLLER_PATH";
pub const MBOT_VEL_CMD: &str = "MBOT_VEL_CMD";
pub const MBOT_MOTOR_TM: &str = "MBOT_MOTOR_TM";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A message which is carried on a named topic.
pub trait Message: Serialize + DeserializeOwned {
    /// The topic this message is published on. Must not contain spaces.
    const TOPIC: &'static str;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Publishes messages of type `M` on `M::TOPIC`.
pub struct Publisher<M> {
    socket: MonitoredSocket,
    _msg: PhantomData<fn(M)>,
}

/// Receives messages of type `M` from `M::TOPIC`.
pub struct Subscriber<M> {
    socket: MonitoredSocket,
    _msg: PhantomData<fn() -> M>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a message: {0}")]
    RecvError(zmq::Error),

    #[error("Could not subscribe to {0}: {1}")]
    SubscribeError(&'static str, zmq::Error),

    #[error("Received a message which was not valid UTF-8")]
    NonUtf8,

    #[error("Expected a message on topic {expected}, got {found:?}")]
    WrongTopic {
        expected: &'static str,
        found: String,
    },

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the message: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Message for Pose2D {
    const TOPIC: &'static str = SLAM_POSE;
}

impl Message for OccupancyGridMsg {
    const TOPIC: &'static str = SLAM_MAP;
}

impl Message for PathRequest {
    const TOPIC: &'static str = PATH_REQUEST;
}

impl Message for Path2D {
    const TOPIC: &'static str = CONTROLLER_PATH;
}

impl Message for Twist2D {
    const TOPIC: &'static str = MBOT_VEL_CMD;
}

impl Message for MotorTm {
    const TOPIC: &'static str = MBOT_MOTOR_TM;
}

impl<M: Message> Publisher<M> {
    /// Open a publisher on the given endpoint.
    pub fn new(
        ctx: &zmq::Context,
        options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, TopicError> {
        let socket = MonitoredSocket::new(ctx, zmq::PUB, options, endpoint)?;

        Ok(Self {
            socket,
            _msg: PhantomData,
        })
    }

    /// Publish a single message.
    pub fn publish(&self, msg: &M) -> Result<(), TopicError> {
        let frame = encode(msg)?;

        self.socket
            .send(frame.as_str(), 0)
            .map_err(TopicError::SendError)
    }
}

impl<M: Message> Subscriber<M> {
    /// Open a subscriber on the given endpoint, filtered to `M::TOPIC`.
    pub fn new(
        ctx: &zmq::Context,
        options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, TopicError> {
        let socket = MonitoredSocket::new(ctx, zmq::SUB, options, endpoint)?;

        socket
            .set_subscribe(M::TOPIC.as_bytes())
            .map_err(|e| TopicError::SubscribeError(M::TOPIC, e))?;

        Ok(Self {
            socket,
            _msg: PhantomData,
        })
    }

    /// Receive the next message.
    ///
    /// Returns `Ok(None)` if the socket's receive timeout elapsed without a message.
    pub fn recv(&self) -> Result<Option<M>, TopicError> {
        let frame = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(TopicError::NonUtf8),
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(TopicError::RecvError(e)),
        };

        decode(&frame).map(Some)
    }

    /// Receive every pending message, returning the most recent one.
    ///
    /// See [`drain_latest`] for how errors are handled.
    pub fn recv_latest(&self) -> Option<M> {
        drain_latest(|| self.recv())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Encode a message into a topic-prefixed frame.
pub fn encode<M: Message>(msg: &M) -> Result<String, TopicError> {
    let json = serde_json::to_string(msg).map_err(TopicError::SerializationError)?;

    Ok(format!("{} {}", M::TOPIC, json))
}

/// Call `recv` until it has nothing left, returning the most recent message.
///
/// Frames which can't be decoded are logged and skipped. A transport error ends the drain.
pub fn drain_latest<M, R>(mut recv: R) -> Option<M>
where
    M: Message,
    R: FnMut() -> Result<Option<M>, TopicError>,
{
    let mut latest = None;

    loop {
        match recv() {
            Ok(Some(m)) => latest = Some(m),
            Ok(None) => break,
            Err(e @ TopicError::RecvError(_)) => {
                warn!("Could not receive on {}: {}", M::TOPIC, e);
                break;
            }
            Err(e) => warn!("Discarding message on {}: {}", M::TOPIC, e),
        }
    }

    latest
}

/// Decode a topic-prefixed frame, checking the topic matches exactly.
pub fn decode<M: Message>(frame: &str) -> Result<M, TopicError> {
    let (topic, json) = match frame.find(' ') {
        Some(i) => (&frame[..i], &frame[i + 1..]),
        None => (frame, ""),
    };

    if topic != M::TOPIC {
        return Err(TopicError::WrongTopic {
            expected: M::TOPIC,
            found: topic.to_string(),
        });
    }

    serde_json::from_str(json).map_err(TopicError::DeserializeError)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_has_topic_prefix() {
        let req = PathRequest {
            goal: Pose2D::new(2.0, 0.0, 0.0),
            require_plan: false,
        };

        let frame = encode(&req).unwrap();
        assert!(frame.starts_with("PATH_REQUEST {"));

        let decoded: PathRequest = decode(&frame).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_topic_prefix_must_match_exactly() {
        // A subscriber filtering on "SLAM_POSE" would also receive "SLAM_POSE_X" frames
        let frame = "SLAM_POSE_X {\"x\":0.0,\"y\":0.0,\"theta\":0.0}";

        match decode::<Pose2D>(frame) {
            Err(TopicError::WrongTopic { expected, found }) => {
                assert_eq!(expected, SLAM_POSE);
                assert_eq!(found, "SLAM_POSE_X");
            }
            r => panic!("Expected a wrong topic error, got {:?}", r),
        }
    }

    #[test]
    fn test_drain_skips_bad_frames() {
        let frames = vec![
            "MBOT_VEL_CMD {\"vx\":0.1,\"vy\":0.0,\"wz\":0.0}",
            "MBOT_VEL_CMD {\"vx\":",
            "MBOT_VEL_CMD_X {\"vx\":0.5,\"vy\":0.0,\"wz\":0.0}",
            "MBOT_VEL_CMD {\"vx\":0.2,\"vy\":0.0,\"wz\":0.3}",
        ];
        let mut queue = frames.into_iter();

        // Valid commands behind a malformed one are still reached in the same drain
        let latest = drain_latest(|| queue.next().map(decode::<Twist2D>).transpose());
        assert_eq!(latest, Some(Twist2D::new(0.2, 0.0, 0.3)));
    }

    #[test]
    fn test_drain_stops_on_transport_error() {
        let mut queue = vec![
            Ok(Some(Twist2D::new(0.1, 0.0, 0.0))),
            Err(TopicError::RecvError(zmq::Error::ETERM)),
            Ok(Some(Twist2D::new(0.2, 0.0, 0.0))),
        ]
        .into_iter();

        let latest = drain_latest(|| queue.next().unwrap_or(Ok(None)));
        assert_eq!(latest, Some(Twist2D::new(0.1, 0.0, 0.0)));

        // The message after the error is left for the next drain
        assert_eq!(queue.next().unwrap().unwrap(), Some(Twist2D::new(0.2, 0.0, 0.0)));

        let mut empty = std::iter::empty();
        assert_eq!(drain_latest::<Twist2D, _>(|| empty.next().unwrap_or(Ok(None))), None);
    }

    #[test]
    fn test_bad_payload() {
        assert!(matches!(
            decode::<Pose2D>("SLAM_POSE {\"x\":"),
            Err(TopicError::DeserializeError(_))
        ));
        assert!(matches!(
            decode::<Pose2D>("SLAM_POSE"),
            Err(TopicError::DeserializeError(_))
        ));
    }
}
