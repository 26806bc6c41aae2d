//! # MeadowSonic
//!
//! An adaptive spatial audio engine for interactive community spaces.
//!
//! MeadowSonic mixes channel-based audio through a signal graph whose every
//! parameter change is a sample-accurate ramp on a shared audio clock. On
//! top of the graph sit three adaptive systems: a music director that reads
//! activity, emotion, social presence, weather and time-of-day signals and
//! cross-fades between layered music states; a spatial scene that positions
//! sources around a movable listener; and an encoding controller that picks
//! codecs and bitrates for the current network conditions on a parallel
//! worker.
//!
//! ## Quick Start
//!
//! ```no_run
//! use meadowsonic::*;
//!
//! // Describe and build the engine
//! let desc = MeadowSonicEngineDesc::default();
//! let mut engine = MeadowSonicEngine::new(desc)?;
//! engine.start()?;
//!
//! // Play a loop on the sfx lane
//! let audio = MeadowSonicAudioData::from_mono(vec![0.0; 48_000], 48_000)?;
//! let sfx = engine.standard_channels().sfx;
//! engine.play(
//!     audio.clone(),
//!     sfx,
//!     MixOptions::default().with_loop(LoopMode::Infinite),
//! );
//!
//! // A positioned source, attenuated and panned around the listener
//! let (_handle, chime) = engine.create_spatial_source(audio, Vec3::new(5.0, 0.0, -3.0))?;
//! engine.update_listener(Pose::from_position(Vec3::new(1.0, 0.0, 0.0)));
//! engine.move_spatial_source(chime, Vec3::new(0.0, 0.0, -8.0), 2.0);
//!
//! // Context signals drive the adaptive music
//! engine.adapt_to_context(ContextUpdate::activity("dancing").with_user_count(6));
//!
//! // Subscribe to events and poll once per frame
//! let playback = engine.subscribe(EventTopic::Playback);
//! engine.update();
//! while let Ok(event) = playback.try_recv() {
//!     match event {
//!         MeadowSonicEvent::SourceCompleted { handle } => {
//!             println!("finished: {}", handle);
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok::<(), MeadowSonicError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`MeadowSonicEngine`]**: Facade owning the graph, scene, director and
//!   encoder; forwards their surfaces and runs the poll loop
//! - **[`SignalGraph`]**: Channels, nodes and playing sources; the sole
//!   owner of every automatable parameter
//! - **[`MusicDirector`]**: Scores music states against the community
//!   context and schedules layered cross-fades
//! - **[`SpatialScene`]**: Listener-relative distance gain and pan for
//!   positioned sources, plus acoustic environment presets
//! - **[`EncodingController`]**: Content-aware codec and bitrate selection
//!   with a parallel compression worker
//! - **[`MeadowSonicEvent`]**: Typed events fanned out per
//!   [`EventTopic`]
//!
//! ## Architecture
//!
//! The main thread owns the engine and drives it through
//! [`update`](MeadowSonicEngine::update); the audio callback shares only the
//! signal graph, behind a mutex it try-locks (a missed lock renders one
//! silent block and emits [`MeadowSonicEvent::RenderContention`]). All
//! automation is scheduled in frames on the graph's clock, so fades keep
//! their exact shape whether the stream or a headless render advances time.
//! The encoding worker is a separate thread fed over channels; if it never
//! acknowledges startup the controller falls back to synchronous encoding
//! for the session.
//!
//! ## Features
//!
//! - Sample-accurate linear ramps for every parameter, with delayed
//!   scheduling for two-phase music transitions
//! - Channel mute, solo (gated siblings), and per-channel effect chains
//! - One-shot and looping playback with per-source fade-in and stop fades
//! - Community music states with tag-based scoring and FIFO transition queue
//! - Linear distance attenuation, equal-power panning, motion ramps
//! - Named acoustic environments ramping shared reverb parameters
//! - Bandwidth- and CPU-aware bitrate adaptation across four codecs
//! - Post-fade channel meters over a lock-free ring

pub mod audio_data;
pub mod clock;
pub mod config;
pub mod director;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod math;
pub mod mixer;
pub mod playback;
pub mod spatial;

pub use audio_data::MeadowSonicAudioData;
pub use config::{
    AdaptationDesc, AdaptationWeights, AttenuationDesc, EncodingDesc, MeadowSonicEngineDesc,
    MixOptions,
};
pub use director::{
    ContextEvent, ContextSnapshot, ContextUpdate, LayerSet, MusicDirector, MusicLayer, MusicState,
    MusicStateSnapshot, SocialContext, StateRegistry, StateTag, TimeOfDay, Weather,
};
pub use encoder::{
    Codec, CompressionLevel, EncodeOptions, EncodeOutcome, EncodeResult, EncodeTicket,
    EncodingController, EncodingStats, NetworkConditions, SourceType, TaskPriority,
};
pub use engine::{MeadowSonicEngine, StandardChannels};
pub use error::MeadowSonicError;
pub use events::{EventBus, EventTopic, MeadowSonicEvent};
pub use graph::{ChainSpec, ChannelId, NodeSpec, ParamTarget, SignalGraph, SourceHandle};
pub use math::{Pose, Quat, Vec3};
pub use playback::{LoopMode, PlayState};
pub use spatial::{EnvironmentPreset, SpatialScene, SpatialSourceId};
