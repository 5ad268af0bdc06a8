//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the messages carried on each
//! channel and the networking layer that carries them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Navigation messages (poses, maps, path requests and paths)
pub mod nav;

/// Motor control messages (body twists, wheel velocities, PWM and telemetry)
pub mod mot;

/// Network module
pub mod net;
