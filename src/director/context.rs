//! Context signals consumed by the music director.
//!
//! External systems report what the community is doing through fire-and-forget
//! [`ContextEvent`]s (or pre-assembled [`ContextUpdate`]s). The director keeps
//! only the latest value per dimension in a [`ContextSnapshot`], merged
//! last-write-wins per field.

/// Coarse social grouping derived from the number of nearby participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialContext {
    Alone,
    SmallGroup,
    Gathering,
}

impl SocialContext {
    /// Maps a participant count onto a grouping: 5 or more is a gathering,
    /// 2 or more a small group, anything else alone.
    pub fn from_user_count(count: u32) -> Self {
        if count >= 5 {
            SocialContext::Gathering
        } else if count >= 2 {
            SocialContext::SmallGroup
        } else {
            SocialContext::Alone
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Midday,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Lenient label parse; unrecognized labels yield `None` so the retained
    /// value stays unchanged.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "morning" | "dawn" | "sunrise" => Some(TimeOfDay::Morning),
            "midday" | "noon" | "day" | "afternoon" => Some(TimeOfDay::Midday),
            "evening" | "dusk" | "sunset" => Some(TimeOfDay::Evening),
            "night" | "midnight" => Some(TimeOfDay::Night),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weather {
    Clear,
    Rain,
    Snow,
    Fog,
    Wind,
}

impl Weather {
    /// Lenient label parse; unrecognized labels yield `None` so the retained
    /// value stays unchanged.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "clear" | "sunny" => Some(Weather::Clear),
            "rain" | "rainy" | "storm" => Some(Weather::Rain),
            "snow" | "snowy" => Some(Weather::Snow),
            "fog" | "foggy" | "mist" => Some(Weather::Fog),
            "wind" | "windy" => Some(Weather::Wind),
            _ => None,
        }
    }
}

/// Activity label to activity level. Unknown labels are neutral (0.5).
pub fn activity_level(label: &str) -> f32 {
    match label.trim().to_ascii_lowercase().as_str() {
        "resting" => 0.1,
        "strolling" => 0.35,
        "walking" => 0.5,
        "exploring" => 0.6,
        "playing" => 0.75,
        "dancing" => 0.85,
        "celebrating" => 0.9,
        _ => 0.5,
    }
}

/// Emotion label to emotional intensity. Unknown labels are neutral (0.5).
pub fn emotional_intensity(label: &str) -> f32 {
    match label.trim().to_ascii_lowercase().as_str() {
        "joy" => 0.9,
        "excitement" => 0.85,
        "wonder" => 0.65,
        "contentment" => 0.5,
        "melancholy" => 0.4,
        "calm" => 0.35,
        "peace" => 0.2,
        _ => 0.5,
    }
}

/// Partial context snapshot. Every field is optional; `None` leaves the
/// retained value untouched.
#[derive(Debug, Clone, Default)]
pub struct ContextUpdate {
    pub activity: Option<String>,
    pub emotion: Option<String>,
    pub social: Option<SocialContext>,
    pub user_count: Option<u32>,
    pub environment: Option<String>,
    pub weather: Option<Weather>,
    pub time_of_day: Option<TimeOfDay>,
}

impl ContextUpdate {
    pub fn activity(label: &str) -> Self {
        Self {
            activity: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn emotion(label: &str) -> Self {
        Self {
            emotion: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn with_activity(mut self, label: &str) -> Self {
        self.activity = Some(label.to_string());
        self
    }

    pub fn with_emotion(mut self, label: &str) -> Self {
        self.emotion = Some(label.to_string());
        self
    }

    pub fn with_user_count(mut self, count: u32) -> Self {
        self.social = Some(SocialContext::from_user_count(count));
        self.user_count = Some(count);
        self
    }

    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = Some(environment.to_string());
        self
    }

    pub fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_time_of_day(mut self, time_of_day: TimeOfDay) -> Self {
        self.time_of_day = Some(time_of_day);
        self
    }
}

/// The typed context inlet. Each variant mirrors one named signal from the
/// surrounding application and lowers into a [`ContextUpdate`].
#[derive(Debug, Clone)]
pub enum ContextEvent {
    Activity { label: String },
    Emotion { label: String },
    SocialPresence { count: u32 },
    EnvironmentChange { environment: String, weather: Option<String> },
    TimeChange { time_of_day: String },
}

impl From<ContextEvent> for ContextUpdate {
    fn from(event: ContextEvent) -> Self {
        match event {
            ContextEvent::Activity { label } => ContextUpdate {
                activity: Some(label),
                ..Default::default()
            },
            ContextEvent::Emotion { label } => ContextUpdate {
                emotion: Some(label),
                ..Default::default()
            },
            ContextEvent::SocialPresence { count } => ContextUpdate {
                social: Some(SocialContext::from_user_count(count)),
                user_count: Some(count),
                ..Default::default()
            },
            ContextEvent::EnvironmentChange {
                environment,
                weather,
            } => ContextUpdate {
                environment: Some(environment),
                weather: weather.and_then(|label| Weather::parse(&label)),
                ..Default::default()
            },
            ContextEvent::TimeChange { time_of_day } => ContextUpdate {
                time_of_day: TimeOfDay::parse(&time_of_day),
                ..Default::default()
            },
        }
    }
}

/// Latest known value for every context dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    pub activity_label: String,
    /// Derived from `activity_label` via the label table
    pub activity: f32,
    pub emotion_label: String,
    /// Derived from `emotion_label` via the label table
    pub emotional_intensity: f32,
    pub social: SocialContext,
    pub user_count: u32,
    pub environment: String,
    pub time_of_day: TimeOfDay,
    pub weather: Weather,
}

impl Default for ContextSnapshot {
    fn default() -> Self {
        Self {
            activity_label: "unknown".to_string(),
            activity: 0.5,
            emotion_label: "unknown".to_string(),
            emotional_intensity: 0.5,
            social: SocialContext::Alone,
            user_count: 1,
            environment: crate::spatial::DEFAULT_ENVIRONMENT.to_string(),
            time_of_day: TimeOfDay::Midday,
            weather: Weather::Clear,
        }
    }
}

impl ContextSnapshot {
    /// Merges an update, last-write-wins per field. Fields absent from the
    /// update keep their retained values.
    pub fn merge(&mut self, update: ContextUpdate) {
        if let Some(label) = update.activity {
            self.activity = activity_level(&label);
            self.activity_label = label.trim().to_ascii_lowercase();
        }
        if let Some(label) = update.emotion {
            self.emotional_intensity = emotional_intensity(&label);
            self.emotion_label = label.trim().to_ascii_lowercase();
        }
        if let Some(social) = update.social {
            self.social = social;
        }
        if let Some(count) = update.user_count {
            self.user_count = count;
        }
        if let Some(environment) = update.environment {
            self.environment = environment.trim().to_ascii_lowercase();
        }
        if let Some(weather) = update.weather {
            self.weather = weather;
        }
        if let Some(time_of_day) = update.time_of_day {
            self.time_of_day = time_of_day;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_labels_are_neutral() {
        assert_eq!(activity_level("somersaulting"), 0.5);
        assert_eq!(emotional_intensity("perplexed"), 0.5);
        assert_eq!(activity_level("dancing"), 0.85);
        assert_eq!(emotional_intensity("peace"), 0.2);
    }

    #[test]
    fn test_social_context_from_count() {
        assert_eq!(SocialContext::from_user_count(0), SocialContext::Alone);
        assert_eq!(SocialContext::from_user_count(1), SocialContext::Alone);
        assert_eq!(SocialContext::from_user_count(2), SocialContext::SmallGroup);
        assert_eq!(SocialContext::from_user_count(4), SocialContext::SmallGroup);
        assert_eq!(SocialContext::from_user_count(5), SocialContext::Gathering);
        assert_eq!(SocialContext::from_user_count(40), SocialContext::Gathering);
    }

    #[test]
    fn test_lenient_label_parsing() {
        assert_eq!(TimeOfDay::parse(" Noon "), Some(TimeOfDay::Midday));
        assert_eq!(TimeOfDay::parse("midnight"), Some(TimeOfDay::Night));
        assert_eq!(TimeOfDay::parse("teatime"), None);
        assert_eq!(Weather::parse("FOGGY"), Some(Weather::Fog));
        assert_eq!(Weather::parse("drizzle"), None);
    }

    #[test]
    fn test_merge_is_last_write_wins_per_field() {
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(ContextUpdate::activity("dancing"));
        snapshot.merge(ContextUpdate::emotion("joy"));

        assert_eq!(snapshot.activity_label, "dancing");
        assert_eq!(snapshot.activity, 0.85);
        assert_eq!(snapshot.emotion_label, "joy");
        assert_eq!(snapshot.emotional_intensity, 0.9);

        snapshot.merge(ContextUpdate::activity("resting"));
        assert_eq!(snapshot.activity, 0.1);
        // emotion untouched by the activity-only update
        assert_eq!(snapshot.emotional_intensity, 0.9);
    }

    #[test]
    fn test_event_lowering_keeps_unknown_weather_unchanged() {
        let mut snapshot = ContextSnapshot::default();
        snapshot.merge(ContextUpdate::default().with_weather(Weather::Rain));

        let event = ContextEvent::EnvironmentChange {
            environment: "festival".to_string(),
            weather: Some("plasma".to_string()),
        };
        snapshot.merge(event.into());

        assert_eq!(snapshot.environment, "festival");
        assert_eq!(snapshot.weather, Weather::Rain);
    }
}
