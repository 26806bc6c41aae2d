//! Deterministic state scoring.
//!
//! Scores are pure functions of the context snapshot, the configured weights
//! and the state's tags. Selection picks the maximum score and breaks ties by
//! definition order, so repeated evaluation of the same snapshot always lands
//! on the same state.

use crate::config::AdaptationWeights;
use crate::director::context::{ContextSnapshot, SocialContext};
use crate::director::state::{MusicState, StateRegistry, StateTag};

/// Activity level at or above which a state's Movement tag scores.
const HIGH_ACTIVITY: f32 = 0.7;
/// Emotional intensity at or above which a Joy tag scores.
const HIGH_INTENSITY: f32 = 0.7;
/// Emotional intensity at or below which a Peace tag scores.
const LOW_INTENSITY: f32 = 0.3;
/// Activity level at or below which the contemplation bonus can fire.
const CONTEMPLATIVE_ACTIVITY: f32 = 0.3;
/// Emotional intensity at or below which the contemplation bonus can fire.
const CONTEMPLATIVE_INTENSITY: f32 = 0.4;
/// Gathering size that counts as a celebration on its own.
const CELEBRATION_CROWD: u32 = 6;

/// A celebration is either explicit (the crowd is celebrating) or inferred
/// from a large enough gathering.
pub fn celebration_detected(snapshot: &ContextSnapshot) -> bool {
    snapshot.activity_label == "celebrating"
        || (snapshot.social == SocialContext::Gathering
            && snapshot.user_count >= CELEBRATION_CROWD)
}

/// A cultural moment is keyed off the environment label: ceremonies,
/// festivals and heritage spaces count, configurable per engine.
pub fn cultural_moment_detected(snapshot: &ContextSnapshot, cultural_environments: &[String]) -> bool {
    cultural_environments
        .iter()
        .any(|environment| environment == &snapshot.environment)
}

/// Scores one state against the snapshot: base 0.5 plus a weighted bonus per
/// matched condition, clamped to `[0, 1]`.
pub fn score_state(
    state: &MusicState,
    snapshot: &ContextSnapshot,
    weights: &AdaptationWeights,
    cultural_environments: &[String],
) -> f32 {
    let mut score = 0.5;

    if snapshot.social == SocialContext::Gathering && state.has_tag(StateTag::Social) {
        score += weights.social_gathering;
    }
    if snapshot.activity >= HIGH_ACTIVITY && state.has_tag(StateTag::Movement) {
        score += weights.movement_activity;
    }
    if snapshot.emotional_intensity >= HIGH_INTENSITY && state.has_tag(StateTag::Joy) {
        score += weights.emotion_match;
    }
    if snapshot.emotional_intensity <= LOW_INTENSITY && state.has_tag(StateTag::Peace) {
        score += weights.emotion_match;
    }
    if celebration_detected(snapshot) && state.has_tag(StateTag::Celebration) {
        score += weights.celebration;
    }
    if cultural_moment_detected(snapshot, cultural_environments)
        && state.has_tag(StateTag::Cultural)
    {
        score += weights.cultural;
    }
    if snapshot.activity <= CONTEMPLATIVE_ACTIVITY
        && snapshot.emotional_intensity <= CONTEMPLATIVE_INTENSITY
        && state.has_tag(StateTag::Contemplative)
    {
        score += weights.contemplation;
    }
    if state.time_affinity.contains(&snapshot.time_of_day) {
        score += weights.time_of_day;
    }
    if state.weather_affinity.contains(&snapshot.weather) {
        score += weights.weather;
    }

    score.clamp(0.0, 1.0)
}

/// Returns the max-scoring state, ties broken by definition order. `None`
/// only for an empty registry.
pub fn calculate_optimal_state<'a>(
    registry: &'a StateRegistry,
    snapshot: &ContextSnapshot,
    weights: &AdaptationWeights,
    cultural_environments: &[String],
) -> Option<&'a MusicState> {
    let mut best: Option<(&MusicState, f32)> = None;
    for state in registry.iter() {
        let score = score_state(state, snapshot, weights, cultural_environments);
        // strictly-greater keeps the earliest state on ties
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((state, score)),
        }
    }
    best.map(|(state, _)| state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdaptationDesc;
    use crate::director::context::{ContextUpdate, TimeOfDay, Weather};
    use crate::director::state::LayerSet;

    fn fixture() -> (StateRegistry, AdaptationDesc) {
        (StateRegistry::community_defaults(), AdaptationDesc::default())
    }

    fn select<'a>(
        registry: &'a StateRegistry,
        desc: &AdaptationDesc,
        snapshot: &ContextSnapshot,
    ) -> &'a str {
        calculate_optimal_state(registry, snapshot, &desc.weights, &desc.cultural_environments)
            .map(|state| state.name.as_str())
            .unwrap()
    }

    #[test]
    fn test_celebrating_gathering_selects_celebration() {
        let (registry, desc) = fixture();
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(ContextUpdate::activity("celebrating").with_user_count(8));

        let celebration = registry.get("celebration").unwrap();
        let score = score_state(
            celebration,
            &snapshot,
            &desc.weights,
            &desc.cultural_environments,
        );
        // social-gathering 0.25 + celebration 0.3 on the 0.5 base, clamped
        assert_eq!(score, 1.0);
        assert_eq!(select(&registry, &desc, &snapshot), "celebration");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let (registry, desc) = fixture();
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(ContextUpdate::activity("playing").with_user_count(3));

        let first = select(&registry, &desc, &snapshot);
        for _ in 0..10 {
            assert_eq!(select(&registry, &desc, &snapshot), first);
        }
    }

    #[test]
    fn test_ties_break_by_definition_order() {
        let mut registry = StateRegistry::empty();
        registry.register(MusicState::new("alpha", "a", 1.0, 0.5, LayerSet::empty()));
        registry.register(MusicState::new("beta", "b", 1.0, 0.5, LayerSet::empty()));
        let desc = AdaptationDesc::default();
        let snapshot = ContextSnapshot::default();

        // no tags anywhere: both sit on the 0.5 base
        assert_eq!(select(&registry, &desc, &snapshot), "alpha");
    }

    #[test]
    fn test_quiet_low_intensity_selects_contemplation() {
        let (registry, desc) = fixture();
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(
            ContextUpdate::activity("resting")
                .with_emotion("peace")
                .with_time_of_day(TimeOfDay::Night),
        );

        assert_eq!(select(&registry, &desc, &snapshot), "contemplation");
    }

    #[test]
    fn test_cultural_environment_selects_cultural() {
        let (registry, desc) = fixture();
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(ContextUpdate::default().with_environment("festival"));

        assert!(cultural_moment_detected(&snapshot, &desc.cultural_environments));
        assert_eq!(select(&registry, &desc, &snapshot), "cultural");

        snapshot.merge(ContextUpdate::default().with_environment("clearing"));
        assert!(!cultural_moment_detected(&snapshot, &desc.cultural_environments));
    }

    #[test]
    fn test_windy_night_selects_mystery() {
        let (registry, desc) = fixture();
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(
            ContextUpdate::default()
                .with_time_of_day(TimeOfDay::Night)
                .with_weather(Weather::Wind),
        );

        assert_eq!(select(&registry, &desc, &snapshot), "mystery");
    }

    #[test]
    fn test_large_crowd_alone_counts_as_celebration() {
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(ContextUpdate::default().with_user_count(6));
        assert!(celebration_detected(&snapshot));

        let mut small = ContextSnapshot::default();
        small.merge(ContextUpdate::default().with_user_count(5));
        assert!(!celebration_detected(&small));
    }

    #[test]
    fn test_scores_clamp_to_unit_range() {
        let (registry, desc) = fixture();
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(
            ContextUpdate::activity("celebrating")
                .with_emotion("joy")
                .with_user_count(12),
        );

        for state in registry.iter() {
            let score = score_state(state, &snapshot, &desc.weights, &desc.cultural_environments);
            assert!((0.0..=1.0).contains(&score), "{} scored {}", state.name, score);
        }
    }
}
