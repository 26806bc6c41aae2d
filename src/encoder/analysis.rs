//! Content analysis for encoding decisions.
//!
//! The analyzer runs over mono-folded samples and produces coarse,
//! deterministic features. Nothing here aims for perceptual accuracy; the
//! features only steer codec selection and bitrate adjustment.

/// Speech-likelihood frame length.
const SPEECH_FRAME_SECONDS: f32 = 0.02;
/// Minimum frame RMS for a frame to count toward speech at all.
const SPEECH_ENERGY_GATE: f32 = 0.01;
/// Zero-crossing rate band (crossings per sample) treated as speech-like.
const SPEECH_ZCR_LOW: f32 = 0.02;
const SPEECH_ZCR_HIGH: f32 = 0.18;
/// Absolute amplitude below which a sample counts as silence.
const SILENCE_AMPLITUDE: f32 = 1e-3;
/// Moving-average window for the low band split.
const BAND_WINDOW: usize = 32;

/// Features extracted from one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioAnalysis {
    /// Peak-to-RMS ratio in dB; 0 for degenerate input
    pub dynamic_range_db: f32,
    /// Normalized `[low, mid, high]` energy split; sums to 1 for non-silent input
    pub band_energy: [f32; 3],
    /// Fraction of 20 ms frames that look speech-like
    pub speech_ratio: f32,
    /// Fraction of samples below the silence threshold
    pub silence_ratio: f32,
    /// `(1 - speech_ratio) * (1 - silence_ratio)`
    pub music_likelihood: f32,
}

/// Analyzes mono samples. Empty input (or a zero sample rate) yields the
/// all-zero analysis rather than an error.
pub fn analyze(samples: &[f32], sample_rate: u32) -> AudioAnalysis {
    if samples.is_empty() || sample_rate == 0 {
        return AudioAnalysis::default();
    }

    let mut peak = 0.0f32;
    let mut square_sum = 0.0f64;
    let mut silent = 0usize;
    for &sample in samples {
        let magnitude = sample.abs();
        if magnitude > peak {
            peak = magnitude;
        }
        square_sum += f64::from(sample) * f64::from(sample);
        if magnitude < SILENCE_AMPLITUDE {
            silent += 1;
        }
    }
    let rms = (square_sum / samples.len() as f64).sqrt() as f32;

    let dynamic_range_db = if peak > 0.0 && rms > 0.0 {
        20.0 * (peak / rms).log10()
    } else {
        0.0
    };
    let silence_ratio = silent as f32 / samples.len() as f32;
    let speech_ratio = speech_ratio(samples, sample_rate);

    AudioAnalysis {
        dynamic_range_db,
        band_energy: band_energy(samples),
        speech_ratio,
        silence_ratio,
        music_likelihood: (1.0 - speech_ratio) * (1.0 - silence_ratio),
    }
}

fn speech_ratio(samples: &[f32], sample_rate: u32) -> f32 {
    let frame_len = ((sample_rate as f32 * SPEECH_FRAME_SECONDS) as usize).max(1);
    let mut frames = 0usize;
    let mut speech_like = 0usize;

    for frame in samples.chunks(frame_len) {
        frames += 1;

        let mut square_sum = 0.0f64;
        let mut crossings = 0usize;
        let mut prev = frame[0];
        for &sample in frame {
            square_sum += f64::from(sample) * f64::from(sample);
            if (prev < 0.0) != (sample < 0.0) {
                crossings += 1;
            }
            prev = sample;
        }

        let rms = (square_sum / frame.len() as f64).sqrt() as f32;
        let zcr = crossings as f32 / frame.len() as f32;
        if rms > SPEECH_ENERGY_GATE && (SPEECH_ZCR_LOW..=SPEECH_ZCR_HIGH).contains(&zcr) {
            speech_like += 1;
        }
    }

    if frames == 0 {
        0.0
    } else {
        speech_like as f32 / frames as f32
    }
}

/// Coarse three-way spectral split: a moving average approximates the low
/// band, the scaled first difference the high band, and the remainder of the
/// total energy is attributed to the mid band.
fn band_energy(samples: &[f32]) -> [f32; 3] {
    let mut running = 0.0f64;
    let mut low = 0.0f64;
    let mut high = 0.0f64;
    let mut total = 0.0f64;
    let mut prev = 0.0f32;

    for (i, &sample) in samples.iter().enumerate() {
        running += f64::from(sample);
        if i >= BAND_WINDOW {
            running -= f64::from(samples[i - BAND_WINDOW]);
        }
        let count = (i + 1).min(BAND_WINDOW) as f64;
        let average = running / count;
        low += average * average;

        let difference = f64::from(sample - prev) * 0.5;
        high += difference * difference;
        total += f64::from(sample) * f64::from(sample);
        prev = sample;
    }

    let mid = (total - low - high).max(0.0);
    let sum = low + mid + high;
    if sum <= 0.0 {
        return [0.0; 3];
    }
    [
        (low / sum) as f32,
        (mid / sum) as f32,
        (high / sum) as f32,
    ]
}
