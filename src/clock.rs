//! The parameter-automation clock.
//!
//! Every scheduled change in the engine — gain ramps, crossfades, position
//! interpolation — is expressed in frames on this clock, never in wall-clock
//! timers. The [`SignalGraph`](crate::graph::SignalGraph) owns the clock and
//! advances it once per rendered block; the director and spatial scene read
//! it to place their automation.

use crate::error::{MeadowSonicError, Result};

/// Monotonic frame counter at the engine sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioClock {
    sample_rate: u32,
    frame: u64,
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(MeadowSonicError::Configuration(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            sample_rate,
            frame: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current position in frames since engine start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current position in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    /// Advances the clock by `frames`. Called once per rendered block.
    #[inline]
    pub fn advance(&mut self, frames: u64) {
        self.frame += frames;
    }

    /// Converts a duration in seconds to a frame count (round to nearest).
    ///
    /// Negative or non-finite durations count as zero.
    #[inline]
    pub fn frames_in(&self, seconds: f64) -> u64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        (seconds * self.sample_rate as f64).round() as u64
    }
}
