use crate::math::Vec3;
use crate::playback::LoopMode;

/// Per-source playback options passed to
/// [`SignalGraph::connect_source`](crate::graph::SignalGraph::connect_source).
///
/// Every field has an explicit default: play once, unity volume, no fade-in,
/// non-spatial at the origin.
#[derive(Debug, Clone, Copy)]
pub struct MixOptions {
    /// How the source loops
    pub loop_mode: LoopMode,
    /// Initial source gain (0.0 = silent, 1.0 = unity)
    pub volume: f32,
    /// Fade-in duration in seconds; 0.0 starts at full volume
    pub fade_in: f64,
    /// Whether the source is positioned in 3D space
    pub spatial: bool,
    /// Initial position for spatial sources
    pub position: Vec3,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            loop_mode: LoopMode::Once,
            volume: 1.0,
            fade_in: 0.0,
            spatial: false,
            position: Vec3::ZERO,
        }
    }
}

impl MixOptions {
    /// Options for a 3D-positioned source at `position`.
    pub fn spatial(position: Vec3) -> Self {
        Self {
            spatial: true,
            position,
            ..Default::default()
        }
    }

    pub fn with_loop(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_fade_in(mut self, seconds: f64) -> Self {
        self.fade_in = seconds;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.spatial = true;
        self.position = position;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MixOptions::default();
        assert_eq!(options.loop_mode, LoopMode::Once);
        assert_eq!(options.volume, 1.0);
        assert_eq!(options.fade_in, 0.0);
        assert!(!options.spatial);
        assert_eq!(options.position, Vec3::ZERO);
    }

    #[test]
    fn test_builder_chain() {
        let options = MixOptions::default()
            .with_loop(LoopMode::Infinite)
            .with_volume(0.5)
            .with_fade_in(2.0)
            .with_position(Vec3::new(1.0, 0.0, -3.0));
        assert_eq!(options.loop_mode, LoopMode::Infinite);
        assert_eq!(options.volume, 0.5);
        assert_eq!(options.fade_in, 2.0);
        assert!(options.spatial);
        assert_eq!(options.position, Vec3::new(1.0, 0.0, -3.0));
    }
}
