//! Discrete filters used by the velocity controller
//!
//! All filters run at a fixed sample period given at construction and keep their state between
//! calls to `march`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains of a PID filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PidGains {
    /// Proportional gain
    pub kp: f32,

    /// Integral gain
    pub ki: f32,

    /// Derivative gain
    pub kd: f32,

    /// Time constant of the derivative roll-off.
    ///
    /// Units: seconds
    pub tf: f32,
}

/// A parallel form PID filter with a first order low-pass on the derivative.
///
/// The integrator is not bounded.
#[derive(Debug)]
pub struct PidFilter {
    gains: PidGains,

    /// Units: seconds
    dt: f32,

    integral: f32,

    derivative: f32,

    /// `None` until the first sample
    prev_error: Option<f32>,
}

/// First order low-pass filter.
#[derive(Debug)]
pub struct LowPassFilter {
    /// `dt / tc`
    coeff: f32,

    prev_output: f32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidFilter {
    /// Create a new filter with zeroed state.
    pub fn new(gains: PidGains, dt: f32) -> Self {
        Self {
            gains,
            dt,
            integral: 0.0,
            derivative: 0.0,
            prev_error: None,
        }
    }

    /// Advance the filter by one sample, returning the control output for the given error.
    pub fn march(&mut self, error: f32) -> f32 {
        self.integral += error * self.dt;

        if let Some(prev) = self.prev_error {
            self.derivative =
                (self.gains.tf * self.derivative + (error - prev)) / (self.gains.tf + self.dt);
        }
        self.prev_error = Some(error);

        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * self.derivative
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}

impl LowPassFilter {
    /// Create a new filter with time constant `tc`, sampled every `dt`, and a zero output.
    pub fn new(tc: f32, dt: f32) -> Self {
        Self {
            coeff: dt / tc,
            prev_output: 0.0,
        }
    }

    /// Advance the filter by one sample, returning the filtered value.
    pub fn march(&mut self, input: f32) -> f32 {
        self.prev_output = self.coeff * input + (1.0 - self.coeff) * self.prev_output;
        self.prev_output
    }

    pub fn output(&self) -> f32 {
        self.prev_output
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
