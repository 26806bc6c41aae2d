//! Codec descriptors and the bitrate decision pipeline.

use crate::encoder::analysis::AudioAnalysis;

/// Speech-likelihood above which content is treated as voice.
pub const SPEECH_CONTENT: f32 = 0.7;
/// Music-likelihood above which content is treated as music.
pub const MUSIC_CONTENT: f32 = 0.7;
/// Silence ratio above which the bitrate is reduced.
const SPARSE_CONTENT: f32 = 0.4;
/// Dynamic range (dB) above which the bitrate is raised.
const WIDE_DYNAMIC_RANGE_DB: f32 = 18.0;
/// Bitrate floor applied when halving for speech, in kbps.
const SPEECH_FLOOR_KBPS: f32 = 32.0;
/// Fraction of the observed bandwidth the encoder may consume.
const BANDWIDTH_SHARE: f32 = 0.8;

/// Target codecs, ordered here from most to least efficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Opus,
    Aac,
    Vorbis,
    Mp3,
}

impl Codec {
    pub const ALL: [Codec; 4] = [Codec::Opus, Codec::Aac, Codec::Vorbis, Codec::Mp3];

    pub const fn name(self) -> &'static str {
        match self {
            Codec::Opus => "opus",
            Codec::Aac => "aac",
            Codec::Vorbis => "vorbis",
            Codec::Mp3 => "mp3",
        }
    }

    /// Valid bitrate range in kbps.
    pub const fn bitrate_range(self) -> (u32, u32) {
        match self {
            Codec::Opus => (16, 510),
            Codec::Aac => (48, 320),
            Codec::Vorbis => (45, 500),
            Codec::Mp3 => (32, 320),
        }
    }

    /// Relative coding efficiency; higher compresses better at equal quality.
    pub const fn efficiency(self) -> u8 {
        match self {
            Codec::Opus => 4,
            Codec::Aac => 3,
            Codec::Vorbis => 2,
            Codec::Mp3 => 1,
        }
    }

    /// Estimated compression ratio against raw f32 PCM at 128 kbps.
    pub const fn base_ratio(self) -> f32 {
        match self {
            Codec::Opus => 12.0,
            Codec::Aac => 10.0,
            Codec::Vorbis => 9.0,
            Codec::Mp3 => 8.0,
        }
    }

    /// Low-latency voice coding.
    pub const fn voice_optimized(self) -> bool {
        matches!(self, Codec::Opus)
    }

    /// Tuned for music quality at higher bitrates.
    pub const fn quality_oriented(self) -> bool {
        matches!(self, Codec::Aac | Codec::Vorbis)
    }

    pub fn clamp_bitrate(self, kbps: u32) -> u32 {
        let (min, max) = self.bitrate_range();
        kbps.clamp(min, max)
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitrate multiplier profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    Low,
    Medium,
    High,
    /// Derives a multiplier from bandwidth headroom and CPU load
    Adaptive,
}

impl CompressionLevel {
    pub fn multiplier(self, bitrate_kbps: u32, conditions: &NetworkConditions) -> f32 {
        match self {
            CompressionLevel::Low => 1.2,
            CompressionLevel::Medium => 1.0,
            CompressionLevel::High => 0.8,
            CompressionLevel::Adaptive => adaptive_multiplier(bitrate_kbps, conditions),
        }
    }
}

/// Telemetry pushed by the surrounding application. A zero bandwidth means
/// "unknown" and skips bandwidth-based decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConditions {
    pub bandwidth_kbps: u32,
    /// 0.0 idle to 1.0 saturated
    pub cpu_load: f32,
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self {
            bandwidth_kbps: 0,
            cpu_load: 0.0,
        }
    }
}

fn adaptive_multiplier(bitrate_kbps: u32, conditions: &NetworkConditions) -> f32 {
    let cpu = 1.0 - 0.4 * conditions.cpu_load.clamp(0.0, 1.0);
    if conditions.bandwidth_kbps == 0 || bitrate_kbps == 0 {
        return cpu;
    }
    let headroom = conditions.bandwidth_kbps as f32 / bitrate_kbps as f32;
    let bandwidth = if headroom >= 4.0 {
        1.2
    } else if headroom >= 2.0 {
        1.0
    } else {
        0.8
    };
    (bandwidth * cpu).clamp(0.5, 1.2)
}

/// Content category of a buffer, with a per-category baseline bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Music,
    Voice,
    Effects,
    Ambient,
}

impl SourceType {
    pub const fn default_bitrate(self) -> u32 {
        match self {
            SourceType::Music => 192,
            SourceType::Voice => 96,
            SourceType::Effects => 128,
            SourceType::Ambient => 160,
        }
    }
}

/// Picks the codec for a buffer. The requested codec wins when supported
/// (`fell_back` reports when it is not and the most efficient supported codec
/// replaced it); strongly speech-like content prefers the best voice codec
/// and strongly music-like content the best quality-oriented codec.
pub fn select_codec(
    requested: Codec,
    supported: &[Codec],
    analysis: &AudioAnalysis,
) -> (Codec, bool) {
    let fell_back = !supported.contains(&requested);
    let mut codec = if fell_back {
        highest_efficiency(supported).unwrap_or(requested)
    } else {
        requested
    };

    if analysis.speech_ratio > SPEECH_CONTENT {
        if let Some(voice) = supported
            .iter()
            .copied()
            .filter(|codec| codec.voice_optimized())
            .max_by_key(|codec| codec.efficiency())
        {
            codec = voice;
        }
    } else if analysis.music_likelihood > MUSIC_CONTENT {
        if let Some(quality) = supported
            .iter()
            .copied()
            .filter(|codec| codec.quality_oriented())
            .max_by_key(|codec| codec.efficiency())
        {
            codec = quality;
        }
    }

    (codec, fell_back)
}

fn highest_efficiency(supported: &[Codec]) -> Option<Codec> {
    supported.iter().copied().max_by_key(|codec| codec.efficiency())
}

/// The bitrate pipeline: per-source baseline, content adjustments, codec and
/// bandwidth clamps, level multiplier, final codec clamp. The result always
/// lies within the codec's bitrate range.
pub fn compute_bitrate(
    codec: Codec,
    source_type: SourceType,
    target_bitrate: Option<u32>,
    analysis: &AudioAnalysis,
    level: CompressionLevel,
    conditions: &NetworkConditions,
) -> u32 {
    let mut bitrate = target_bitrate.unwrap_or(source_type.default_bitrate()) as f32;

    if analysis.speech_ratio > SPEECH_CONTENT {
        bitrate = (bitrate * 0.5).max(SPEECH_FLOOR_KBPS);
    }
    if analysis.silence_ratio > SPARSE_CONTENT {
        bitrate *= 0.8;
    }
    if analysis.dynamic_range_db > WIDE_DYNAMIC_RANGE_DB {
        bitrate *= 1.2;
    }

    let (min, max) = codec.bitrate_range();
    bitrate = bitrate.clamp(min as f32, max as f32);
    if conditions.bandwidth_kbps > 0 {
        bitrate = bitrate.min(conditions.bandwidth_kbps as f32 * BANDWIDTH_SHARE);
    }
    bitrate *= level.multiplier(bitrate.round() as u32, conditions);

    codec.clamp_bitrate(bitrate.round() as u32)
}
