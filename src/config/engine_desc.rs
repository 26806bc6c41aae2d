use crate::encoder::{Codec, CompressionLevel};
use crate::error::{MeadowSonicError, Result};

/// Configuration descriptor for a MeadowSonic engine
#[derive(Debug, Clone)]
pub struct MeadowSonicEngineDesc {
    /// Sample rate for engine processing (may differ from device sample rate)
    pub sample_rate: u32,
    /// Number of frames rendered per processing block
    pub block_size: usize,
    /// Number of output channels (the render path is stereo)
    pub channels: u16,
    /// Maximum number of concurrent audio sources
    pub max_sources: usize,
    /// Initial master volume (0.0 = silent, 1.0 = unity)
    pub master_volume: f32,
    /// Distance attenuation model for spatial sources
    pub attenuation: AttenuationDesc,
    /// Music director adaptation settings
    pub adaptation: AdaptationDesc,
    /// Encoding controller settings
    pub encoding: EncodingDesc,
}

impl Default for MeadowSonicEngineDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
            channels: 2,
            max_sources: 64,
            master_volume: 1.0,
            attenuation: AttenuationDesc::default(),
            adaptation: AdaptationDesc::default(),
            encoding: EncodingDesc::default(),
        }
    }
}

impl MeadowSonicEngineDesc {
    /// Checks the descriptor before the engine is constructed from it.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(MeadowSonicError::Configuration(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(MeadowSonicError::Configuration(
                "Block size must be greater than 0".to_string(),
            ));
        }
        if self.channels != 2 {
            return Err(MeadowSonicError::Configuration(format!(
                "Only stereo output is supported (got {} channels)",
                self.channels
            )));
        }
        if self.max_sources == 0 {
            return Err(MeadowSonicError::Configuration(
                "Max sources must be greater than 0".to_string(),
            ));
        }
        if !self.master_volume.is_finite() || self.master_volume < 0.0 {
            return Err(MeadowSonicError::Configuration(format!(
                "Master volume must be finite and non-negative (got {})",
                self.master_volume
            )));
        }
        self.attenuation.validate()?;
        self.adaptation.validate()?;
        Ok(())
    }
}

/// Linear distance attenuation bounds for spatial sources.
///
/// Sources at or inside `near_distance` play at full gain; gain falls linearly
/// to zero at `far_distance` and stays there.
#[derive(Debug, Clone, Copy)]
pub struct AttenuationDesc {
    pub near_distance: f32,
    pub far_distance: f32,
}

impl Default for AttenuationDesc {
    fn default() -> Self {
        Self {
            near_distance: 1.0,
            far_distance: 50.0,
        }
    }
}

impl AttenuationDesc {
    pub fn validate(&self) -> Result<()> {
        if !self.near_distance.is_finite()
            || !self.far_distance.is_finite()
            || self.near_distance <= 0.0
            || self.far_distance <= 0.0
        {
            return Err(MeadowSonicError::Configuration(
                "Attenuation distances must be finite and positive".to_string(),
            ));
        }
        if self.near_distance >= self.far_distance {
            return Err(MeadowSonicError::Configuration(format!(
                "Near distance {} must be less than far distance {}",
                self.near_distance, self.far_distance
            )));
        }
        Ok(())
    }
}

/// Scoring weights for the music director's state selection.
///
/// Each weight is the bonus added to a state's base score of 0.5 when the
/// matching context condition holds and the state carries the matching tag.
#[derive(Debug, Clone, Copy)]
pub struct AdaptationWeights {
    pub social_gathering: f32,
    pub movement_activity: f32,
    pub emotion_match: f32,
    pub celebration: f32,
    pub cultural: f32,
    pub contemplation: f32,
    pub time_of_day: f32,
    pub weather: f32,
}

impl Default for AdaptationWeights {
    fn default() -> Self {
        Self {
            social_gathering: 0.25,
            movement_activity: 0.2,
            emotion_match: 0.2,
            celebration: 0.3,
            cultural: 0.3,
            contemplation: 0.2,
            time_of_day: 0.15,
            weather: 0.1,
        }
    }
}

/// Music director configuration.
#[derive(Debug, Clone)]
pub struct AdaptationDesc {
    pub weights: AdaptationWeights,
    /// Total duration of a state transition in seconds (fade-out then fade-in)
    pub transition_seconds: f64,
    /// Environment labels that count as cultural moments
    pub cultural_environments: Vec<String>,
}

impl Default for AdaptationDesc {
    fn default() -> Self {
        Self {
            weights: AdaptationWeights::default(),
            transition_seconds: 3.0,
            cultural_environments: vec![
                "ceremony".to_string(),
                "festival".to_string(),
                "heritage".to_string(),
            ],
        }
    }
}

impl AdaptationDesc {
    pub fn validate(&self) -> Result<()> {
        if !self.transition_seconds.is_finite() || self.transition_seconds <= 0.0 {
            return Err(MeadowSonicError::Configuration(format!(
                "Transition duration must be finite and positive (got {})",
                self.transition_seconds
            )));
        }
        Ok(())
    }
}

/// Encoding controller configuration.
#[derive(Debug, Clone)]
pub struct EncodingDesc {
    /// When false, `compress` calls run synchronously and no worker is spawned
    pub enabled: bool,
    /// Codec requested for new tasks (content analysis may override)
    pub preferred_codec: Codec,
    /// Bitrate multiplier profile
    pub level: CompressionLevel,
}

impl Default for EncodingDesc {
    fn default() -> Self {
        Self {
            enabled: true,
            preferred_codec: Codec::Opus,
            level: CompressionLevel::Adaptive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_desc_validates() {
        assert!(MeadowSonicEngineDesc::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let desc = MeadowSonicEngineDesc {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_attenuation_bounds() {
        let attenuation = AttenuationDesc {
            near_distance: 50.0,
            far_distance: 1.0,
        };
        assert!(attenuation.validate().is_err());

        let desc = MeadowSonicEngineDesc {
            attenuation,
            ..Default::default()
        };
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_transition() {
        let adaptation = AdaptationDesc {
            transition_seconds: 0.0,
            ..Default::default()
        };
        assert!(adaptation.validate().is_err());
    }
}
