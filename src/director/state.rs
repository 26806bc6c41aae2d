//! Music states and the ordered state registry.

use crate::director::context::{TimeOfDay, Weather};

/// One stem of the adaptive music bed. Each layer is mixed on its own
/// channel so the director can fade layers independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MusicLayer {
    Ambient,
    Melody,
    Rhythm,
    Harmony,
    Percussion,
    Traditional,
}

impl MusicLayer {
    pub const ALL: [MusicLayer; 6] = [
        MusicLayer::Ambient,
        MusicLayer::Melody,
        MusicLayer::Rhythm,
        MusicLayer::Harmony,
        MusicLayer::Percussion,
        MusicLayer::Traditional,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name of the graph channel carrying this layer.
    pub const fn channel_name(self) -> &'static str {
        match self {
            MusicLayer::Ambient => "music-ambient",
            MusicLayer::Melody => "music-melody",
            MusicLayer::Rhythm => "music-rhythm",
            MusicLayer::Harmony => "music-harmony",
            MusicLayer::Percussion => "music-percussion",
            MusicLayer::Traditional => "music-traditional",
        }
    }
}

/// Set of active layers, one bit per [`MusicLayer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerSet(u8);

impl LayerSet {
    pub const fn empty() -> Self {
        LayerSet(0)
    }

    pub const fn of(layers: &[MusicLayer]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < layers.len() {
            bits |= 1 << layers[i].index();
            i += 1;
        }
        LayerSet(bits)
    }

    pub const fn contains(self, layer: MusicLayer) -> bool {
        self.0 & (1 << layer.index()) != 0
    }

    pub fn insert(&mut self, layer: MusicLayer) {
        self.0 |= 1 << layer.index();
    }

    pub fn iter(self) -> impl Iterator<Item = MusicLayer> {
        MusicLayer::ALL
            .iter()
            .copied()
            .filter(move |layer| self.contains(*layer))
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Context conditions a state responds to during scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTag {
    Social,
    Movement,
    Joy,
    Peace,
    Celebration,
    Cultural,
    Contemplative,
    Mystery,
}

/// A named music configuration. Immutable once registered.
#[derive(Debug, Clone)]
pub struct MusicState {
    pub name: String,
    pub theme: String,
    pub tempo_multiplier: f32,
    /// Volume target for active layers while this state is current
    pub intensity: f32,
    pub layers: LayerSet,
    pub tags: Vec<StateTag>,
    pub time_affinity: Vec<TimeOfDay>,
    pub weather_affinity: Vec<Weather>,
}

impl MusicState {
    pub fn new(
        name: &str,
        theme: &str,
        tempo_multiplier: f32,
        intensity: f32,
        layers: LayerSet,
    ) -> Self {
        Self {
            name: name.to_string(),
            theme: theme.to_string(),
            tempo_multiplier,
            intensity,
            layers,
            tags: Vec::new(),
            time_affinity: Vec::new(),
            weather_affinity: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[StateTag]) -> Self {
        self.tags = tags.to_vec();
        self
    }

    pub fn with_time_affinity(mut self, times: &[TimeOfDay]) -> Self {
        self.time_affinity = times.to_vec();
        self
    }

    pub fn with_weather_affinity(mut self, weather: &[Weather]) -> Self {
        self.weather_affinity = weather.to_vec();
        self
    }

    pub fn has_tag(&self, tag: StateTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Ordered collection of music states.
///
/// Definition order is load-bearing: state selection breaks score ties in
/// favor of the earliest-registered state, so iteration follows insertion.
#[derive(Debug, Clone)]
pub struct StateRegistry {
    states: Vec<MusicState>,
}

impl StateRegistry {
    pub fn empty() -> Self {
        Self { states: Vec::new() }
    }

    /// The built-in community states, in tie-break order.
    pub fn community_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(
            MusicState::new(
                "exploration",
                "wandering-paths",
                1.0,
                0.55,
                LayerSet::of(&[MusicLayer::Ambient, MusicLayer::Melody]),
            )
            .with_tags(&[StateTag::Movement])
            .with_time_affinity(&[TimeOfDay::Morning, TimeOfDay::Midday])
            .with_weather_affinity(&[Weather::Clear]),
        );
        registry.register(
            MusicState::new(
                "social",
                "gathering-circle",
                1.05,
                0.65,
                LayerSet::of(&[MusicLayer::Ambient, MusicLayer::Melody, MusicLayer::Rhythm]),
            )
            .with_tags(&[StateTag::Social])
            .with_time_affinity(&[TimeOfDay::Evening]),
        );
        registry.register(
            MusicState::new(
                "contemplation",
                "still-waters",
                0.85,
                0.35,
                LayerSet::of(&[MusicLayer::Ambient, MusicLayer::Harmony]),
            )
            .with_tags(&[StateTag::Peace, StateTag::Contemplative])
            .with_time_affinity(&[TimeOfDay::Night])
            .with_weather_affinity(&[Weather::Rain, Weather::Fog]),
        );
        registry.register(
            MusicState::new(
                "celebration",
                "festival-lights",
                1.2,
                0.9,
                LayerSet::of(&[
                    MusicLayer::Melody,
                    MusicLayer::Rhythm,
                    MusicLayer::Percussion,
                    MusicLayer::Traditional,
                ]),
            )
            .with_tags(&[StateTag::Social, StateTag::Joy, StateTag::Celebration]),
        );
        registry.register(
            MusicState::new(
                "cultural",
                "heritage-songs",
                1.0,
                0.7,
                LayerSet::of(&[
                    MusicLayer::Melody,
                    MusicLayer::Harmony,
                    MusicLayer::Traditional,
                ]),
            )
            .with_tags(&[StateTag::Cultural]),
        );
        registry.register(
            MusicState::new(
                "mystery",
                "veiled-glade",
                0.9,
                0.5,
                LayerSet::of(&[MusicLayer::Ambient, MusicLayer::Harmony]),
            )
            .with_tags(&[StateTag::Mystery])
            .with_time_affinity(&[TimeOfDay::Night])
            .with_weather_affinity(&[Weather::Fog, Weather::Wind]),
        );
        registry
    }

    /// Appends a state. Re-registering an existing name is a logged no-op;
    /// states are immutable once defined.
    pub fn register(&mut self, state: MusicState) {
        if self.get(&state.name).is_some() {
            log::warn!("Ignoring re-registration of music state '{}'", state.name);
            return;
        }
        self.states.push(state);
    }

    pub fn get(&self, name: &str) -> Option<&MusicState> {
        self.states.iter().find(|state| state.name == name)
    }

    /// States in definition order.
    pub fn iter(&self) -> std::slice::Iter<'_, MusicState> {
        self.states.iter()
    }

    pub fn first(&self) -> Option<&MusicState> {
        self.states.first()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::community_defaults()
    }
}
