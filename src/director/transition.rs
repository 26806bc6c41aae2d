//! Transition timing between music states.
//!
//! A transition splits its duration into two phases on the shared audio
//! clock: the outgoing state's layers fade to silence first, then the
//! incoming state's layers fade up. At most one transition is in flight;
//! further requests queue behind it.

/// Fraction of the transition spent fading the outgoing layers.
pub const FADE_OUT_FRACTION: f64 = 0.4;
/// Fraction of the transition spent fading the incoming layers.
pub const FADE_IN_FRACTION: f64 = 0.6;

/// An in-flight state change, all times in clock seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub started_at: f64,
    /// End of the fade-out phase and start of the fade-in phase
    pub fade_out_ends: f64,
    pub completes_at: f64,
}

impl Transition {
    pub fn new(from: &str, to: &str, now: f64, duration_seconds: f64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            started_at: now,
            fade_out_ends: now + duration_seconds * FADE_OUT_FRACTION,
            completes_at: now + duration_seconds,
        }
    }

    pub fn fade_out_seconds(&self) -> f64 {
        self.fade_out_ends - self.started_at
    }

    pub fn fade_in_seconds(&self) -> f64 {
        self.completes_at - self.fade_out_ends
    }

    pub fn is_complete(&self, now: f64) -> bool {
        now >= self.completes_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_boundaries() {
        let transition = Transition::new("exploration", "celebration", 2.0, 3.0);
        assert_eq!(transition.started_at, 2.0);
        assert!((transition.fade_out_ends - 3.2).abs() < 1e-9);
        assert_eq!(transition.completes_at, 5.0);
        assert!((transition.fade_out_seconds() - 1.2).abs() < 1e-9);
        assert!((transition.fade_in_seconds() - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_completion_check() {
        let transition = Transition::new("a", "b", 0.0, 3.0);
        assert!(!transition.is_complete(2.999));
        assert!(transition.is_complete(3.0));
        assert!(transition.is_complete(10.0));
    }
}
