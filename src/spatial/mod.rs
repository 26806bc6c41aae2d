//! 3D spatial positioning.
//!
//! The [`SpatialScene`] tracks positioned sources and the listener pose,
//! computes distance gain and lateral pan for each source, and feeds the
//! results into the signal graph via
//! [`set_source_spatial`](crate::graph::SignalGraph::set_source_spatial).
//! The scene runs on the main thread next to the graph lock; creation,
//! movement and listener updates are never interleaved.

pub mod attenuation;
pub mod environment;

pub use attenuation::AttenuationModel;
pub use environment::{DEFAULT_ENVIRONMENT, EnvironmentPreset, builtin_environments};

use crate::config::AttenuationDesc;
use crate::error::{MeadowSonicError, Result};
use crate::graph::{ParamTarget, SignalGraph, SourceHandle};
use crate::math::{Pose, Vec3, vec3_is_finite};

/// Duration of the shared reverb ramp when switching environments.
pub const ENVIRONMENT_FADE_SECONDS: f64 = 0.05;

/// Identifier for a positioned source in the scene.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpatialSourceId(u64);

impl SpatialSourceId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SpatialSourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpatialSourceId({})", self.0)
    }
}

/// An in-flight position interpolation, in seconds on the shared clock.
#[derive(Debug, Clone, Copy)]
struct MotionRamp {
    from: Vec3,
    target: Vec3,
    start_time: f64,
    end_time: f64,
}

impl MotionRamp {
    fn position_at(&self, now: f64) -> Vec3 {
        if now <= self.start_time {
            self.from
        } else if now >= self.end_time {
            self.target
        } else {
            let t = ((now - self.start_time) / (self.end_time - self.start_time)) as f32;
            self.from.lerp(self.target, t)
        }
    }

    fn is_complete(&self, now: f64) -> bool {
        now >= self.end_time
    }
}

#[derive(Debug)]
struct SpatialSource {
    id: SpatialSourceId,
    handle: SourceHandle,
    position: Vec3,
    motion: Option<MotionRamp>,
    gain: f32,
    pan: f32,
    /// Levels changed since the last tick pushed them to the graph
    dirty: bool,
}

pub struct SpatialScene {
    sources: Vec<SpatialSource>,
    listener: Pose,
    attenuation: AttenuationModel,
    environments: Vec<(String, EnvironmentPreset)>,
    environment: String,
    next_id: u64,
}

impl SpatialScene {
    pub fn new(attenuation: AttenuationDesc) -> Self {
        Self {
            sources: Vec::new(),
            listener: Pose::identity(),
            attenuation: AttenuationModel::new(&attenuation),
            environments: builtin_environments(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            next_id: 0,
        }
    }

    /// Registers a positioned source bound to a graph source.
    ///
    /// # Errors
    ///
    /// Returns a spatialization error when `position` has a non-finite
    /// component — the one class of input the scene rejects instead of
    /// absorbing.
    pub fn create_source(
        &mut self,
        handle: SourceHandle,
        position: Vec3,
    ) -> Result<SpatialSourceId> {
        if !vec3_is_finite(position) {
            return Err(MeadowSonicError::Spatialization(format!(
                "Source position must be finite (got {:?})",
                position
            )));
        }

        let id = SpatialSourceId(self.next_id);
        self.next_id += 1;
        let (gain, pan) = project(&self.listener, &self.attenuation, position);
        self.sources.push(SpatialSource {
            id,
            handle,
            position,
            motion: None,
            gain,
            pan,
            dirty: true,
        });
        log::debug!(
            "Spatial source {} bound to {} at {:?}",
            id,
            handle,
            position
        );
        Ok(id)
    }

    /// Moves a source, snapping when `ramp_seconds` is zero and otherwise
    /// interpolating the position linearly over the duration.
    ///
    /// A new call retargets from wherever the source is at `now`; the
    /// superseded ramp leaves no pending writes. Unknown ids and non-finite
    /// targets are logged no-ops.
    pub fn move_source(
        &mut self,
        id: SpatialSourceId,
        position: Vec3,
        ramp_seconds: f64,
        now: f64,
    ) {
        if !vec3_is_finite(position) {
            log::warn!("Ignoring move of {} to non-finite position", id);
            return;
        }
        let Some(source) = self.sources.iter_mut().find(|source| source.id == id) else {
            log::warn!("Ignoring move for unknown spatial source {}", id);
            return;
        };

        let from = source
            .motion
            .map_or(source.position, |motion| motion.position_at(now));
        if ramp_seconds <= 0.0 {
            source.position = position;
            source.motion = None;
        } else {
            source.position = from;
            source.motion = Some(MotionRamp {
                from,
                target: position,
                start_time: now,
                end_time: now + ramp_seconds,
            });
        }
        source.dirty = true;
    }

    /// Moves the listener and recomputes every source's levels in one pass.
    pub fn update_listener(&mut self, pose: Pose, now: f64) {
        self.listener = pose;
        for source in &mut self.sources {
            let position = source
                .motion
                .map_or(source.position, |motion| motion.position_at(now));
            let (gain, pan) = project(&self.listener, &self.attenuation, position);
            if gain != source.gain || pan != source.pan {
                source.gain = gain;
                source.pan = pan;
                source.dirty = true;
            }
        }
    }

    pub fn listener(&self) -> Pose {
        self.listener
    }

    /// Switches the scene to a named environment, retargeting the shared
    /// reverb params for all sources over a short ramp. Direct-path gain is
    /// unaffected. Unknown names are logged no-ops; returns whether the
    /// switch happened.
    pub fn set_environment(&mut self, name: &str, graph: &mut SignalGraph) -> bool {
        match self
            .environments
            .iter()
            .find(|(preset_name, _)| preset_name == name)
        {
            Some((_, preset)) => {
                let preset = *preset;
                self.environment = name.to_string();
                graph.set_parameter(
                    ParamTarget::ReverbMix,
                    preset.reverb_mix,
                    ENVIRONMENT_FADE_SECONDS,
                );
                graph.set_parameter(
                    ParamTarget::ReverbAbsorption,
                    preset.absorption,
                    ENVIRONMENT_FADE_SECONDS,
                );
                log::debug!("Environment set to '{}'", name);
                true
            }
            None => {
                log::warn!("Ignoring unknown environment '{}'", name);
                false
            }
        }
    }

    /// Adds or replaces a named environment preset.
    pub fn register_environment(&mut self, name: &str, preset: EnvironmentPreset) {
        match self
            .environments
            .iter_mut()
            .find(|(preset_name, _)| preset_name == name)
        {
            Some((_, existing)) => *existing = preset,
            None => self.environments.push((name.to_string(), preset)),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Drops every scene entry bound to `handle` (playback ended).
    pub fn release(&mut self, handle: SourceHandle) {
        self.sources.retain(|source| source.handle != handle);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Position of a source at `now`, materializing any in-flight motion.
    pub fn source_position(&self, id: SpatialSourceId, now: f64) -> Option<Vec3> {
        self.sources.iter().find(|source| source.id == id).map(|source| {
            source
                .motion
                .map_or(source.position, |motion| motion.position_at(now))
        })
    }

    /// Last computed `(gain, pan)` for a source.
    pub fn source_levels(&self, id: SpatialSourceId) -> Option<(f32, f32)> {
        self.sources
            .iter()
            .find(|source| source.id == id)
            .map(|source| (source.gain, source.pan))
    }

    /// Materializes in-flight motion and pushes changed levels to the graph.
    pub fn tick(&mut self, now: f64, graph: &mut SignalGraph) {
        for source in &mut self.sources {
            let mut changed = std::mem::take(&mut source.dirty);

            if let Some(motion) = source.motion {
                let position = motion.position_at(now);
                let (gain, pan) = project(&self.listener, &self.attenuation, position);
                source.gain = gain;
                source.pan = pan;
                changed = true;
                if motion.is_complete(now) {
                    source.position = motion.target;
                    source.motion = None;
                }
            }

            if changed {
                graph.set_source_spatial(source.handle, source.gain, source.pan);
            }
        }
    }
}

/// Distance gain and signed lateral pan of `position` as heard from
/// `listener`. Orientation affects imaging only, never distance gain.
fn project(listener: &Pose, attenuation: &AttenuationModel, position: Vec3) -> (f32, f32) {
    let offset = position - listener.position;
    let distance = offset.length();
    let gain = attenuation.gain_at(distance);
    let pan = if distance > 1e-6 {
        (offset / distance).dot(listener.right()).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    (gain, pan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::MeadowSonicAudioData;
    use crate::config::MixOptions;
    use crate::graph::ChainSpec;
    use crate::playback::LoopMode;

    fn scene() -> SpatialScene {
        SpatialScene::new(AttenuationDesc::default())
    }

    fn handle(raw: u64) -> SourceHandle {
        SourceHandle::from_raw(raw)
    }

    #[test]
    fn test_create_rejects_non_finite_position() {
        let mut scene = scene();
        let result = scene.create_source(handle(1), Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(result.is_err());
        assert_eq!(scene.source_count(), 0);
    }

    #[test]
    fn test_pan_follows_listener_right() {
        let mut scene = scene();
        let right = scene.create_source(handle(1), Vec3::new(10.0, 0.0, 0.0)).unwrap();
        let left = scene.create_source(handle(2), Vec3::new(-10.0, 0.0, 0.0)).unwrap();
        let ahead = scene.create_source(handle(3), Vec3::new(0.0, 0.0, -10.0)).unwrap();

        assert_eq!(scene.source_levels(right).unwrap().1, 1.0);
        assert_eq!(scene.source_levels(left).unwrap().1, -1.0);
        assert!(scene.source_levels(ahead).unwrap().1.abs() < 1e-6);
    }

    #[test]
    fn test_distance_gain_uses_attenuation_model() {
        let mut scene = scene();
        let id = scene.create_source(handle(1), Vec3::new(0.0, 0.0, -20.0)).unwrap();
        let (gain, _) = scene.source_levels(id).unwrap();
        assert!((gain - 0.612).abs() < 1e-3);
    }

    #[test]
    fn test_move_ramp_interpolates_and_retargets() {
        let mut scene = scene();
        let id = scene.create_source(handle(1), Vec3::ZERO).unwrap();

        scene.move_source(id, Vec3::new(0.0, 0.0, -10.0), 2.0, 0.0);
        let mid = scene.source_position(id, 1.0).unwrap();
        assert!((mid.z - (-5.0)).abs() < 1e-4);

        // supersede mid-flight: the new ramp starts from the current position
        scene.move_source(id, Vec3::ZERO, 2.0, 1.0);
        let retargeted = scene.source_position(id, 2.0).unwrap();
        assert!((retargeted.z - (-2.5)).abs() < 1e-4);
        let landed = scene.source_position(id, 3.0).unwrap();
        assert!(landed.z.abs() < 1e-4);
    }

    #[test]
    fn test_snap_move_cancels_motion() {
        let mut scene = scene();
        let id = scene.create_source(handle(1), Vec3::ZERO).unwrap();
        scene.move_source(id, Vec3::new(0.0, 0.0, -10.0), 5.0, 0.0);
        scene.move_source(id, Vec3::new(3.0, 0.0, 0.0), 0.0, 1.0);
        assert_eq!(
            scene.source_position(id, 4.0).unwrap(),
            Vec3::new(3.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_listener_move_recomputes_every_source() {
        let mut scene = scene();
        let near = scene.create_source(handle(1), Vec3::new(0.0, 0.0, -5.0)).unwrap();
        let far = scene.create_source(handle(2), Vec3::new(0.0, 0.0, -60.0)).unwrap();
        assert_eq!(scene.source_levels(far).unwrap().0, 0.0);

        // step 40 units toward both sources in one update
        scene.update_listener(Pose::from_position(Vec3::new(0.0, 0.0, -40.0)), 0.0);

        let model = AttenuationModel::default();
        assert_eq!(scene.source_levels(near).unwrap().0, model.gain_at(35.0));
        assert_eq!(scene.source_levels(far).unwrap().0, model.gain_at(20.0));
    }

    #[test]
    fn test_tick_pushes_levels_into_graph() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let lane = graph.create_channel("ambient", ChainSpec::empty()).unwrap();
        let audio = MeadowSonicAudioData::from_mono(vec![1.0; 48_000], 48_000).unwrap();
        let position = Vec3::new(0.0, 0.0, -20.0);
        let source = graph
            .connect_source(
                audio,
                lane,
                MixOptions::spatial(position).with_loop(LoopMode::Infinite),
            )
            .unwrap();

        let mut scene = scene();
        scene.create_source(source, position).unwrap();
        scene.tick(graph.now(), &mut graph);

        let instance = graph.instances.get(&source).unwrap();
        assert!((instance.spatial_gain - 0.612).abs() < 1e-3);
        assert!(instance.spatial_pan.abs() < 1e-6);
    }

    #[test]
    fn test_environment_switch_ramps_shared_reverb() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let mut scene = scene();
        assert_eq!(scene.environment(), DEFAULT_ENVIRONMENT);

        assert!(scene.set_environment("hollow", &mut graph));
        assert_eq!(scene.environment(), "hollow");

        // ride the 50 ms ramp to its end
        let mut out = vec![0.0f32; 4800 * 2];
        graph.render_block(&mut out);
        let mix = graph.parameter_value(ParamTarget::ReverbMix).unwrap();
        assert!((mix - 0.55).abs() < 1e-4);

        assert!(!scene.set_environment("cathedral", &mut graph));
        assert_eq!(scene.environment(), "hollow");
    }

    #[test]
    fn test_release_drops_scene_entries() {
        let mut scene = scene();
        scene.create_source(handle(1), Vec3::ZERO).unwrap();
        scene.create_source(handle(1), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        scene.create_source(handle(2), Vec3::ZERO).unwrap();

        scene.release(handle(1));
        assert_eq!(scene.source_count(), 1);
    }
}
