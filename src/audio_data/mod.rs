//! Audio buffer handles.
//!
//! [`MeadowSonicAudioData`] is the opaque, reference-counted sample container
//! the rest of the engine works with. Samples are stored **interleaved**
//! (`[L0, R0, L1, R1, ...]` for stereo); one frame holds one sample per
//! channel. Decoding files into buffers is out of scope — callers hand the
//! engine raw samples via [`MeadowSonicAudioData::from_samples`].

mod resampler;

pub use resampler::AudioResampler;

use crate::error::{MeadowSonicError, Result};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MeadowSonicAudioData {
    inner: Arc<AudioDataInner>,
}

#[derive(Debug)]
struct AudioDataInner {
    /// Interleaved samples, `total_frames * channels` long.
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl MeadowSonicAudioData {
    /// Wraps raw interleaved samples in a shareable buffer handle.
    ///
    /// # Errors
    ///
    /// Returns an error if `sample_rate` or `channels` is zero, or if the
    /// sample count is not a whole number of frames.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Arc<Self>> {
        if sample_rate == 0 {
            return Err(MeadowSonicError::AudioFormat(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(MeadowSonicError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }
        if samples.len() % channels as usize != 0 {
            return Err(MeadowSonicError::AudioFormat(format!(
                "Sample count {} is not a multiple of channel count {}",
                samples.len(),
                channels
            )));
        }

        let total_frames = samples.len() / channels as usize;
        let duration = Duration::from_secs_f64(total_frames as f64 / sample_rate as f64);
        Ok(Arc::new(Self {
            inner: Arc::new(AudioDataInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        }))
    }

    /// Convenience constructor for single-channel buffers.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Result<Arc<Self>> {
        Self::from_samples(samples, sample_rate, 1)
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    /// Folds all channels down to a mono sample vector by frame averaging.
    ///
    /// Used by the encoding analysis pass, which works on mono signals.
    pub fn fold_mono(&self) -> Vec<f32> {
        if self.inner.channels == 1 {
            return self.inner.samples.clone();
        }
        let channels = self.inner.channels as f32;
        self.inner
            .samples
            .chunks(self.inner.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / channels)
            .collect()
    }

    /// Returns a copy of this buffer converted to `target_sample_rate`.
    ///
    /// A no-op clone when the rates already match.
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler = AudioResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
        )?;
        let resampled = resampler.resample_interleaved(&self.inner.samples)?;

        let total_frames = resampled.len() / self.inner.channels as usize;
        let duration = Duration::from_secs_f64(total_frames as f64 / target_sample_rate as f64);
        Ok(Self {
            inner: Arc::new(AudioDataInner {
                samples: resampled,
                sample_rate: target_sample_rate,
                channels: self.inner.channels,
                duration,
                total_frames,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_validates_arguments() {
        assert!(MeadowSonicAudioData::from_samples(vec![0.0; 4], 0, 2).is_err());
        assert!(MeadowSonicAudioData::from_samples(vec![0.0; 4], 48_000, 0).is_err());
        // 5 samples cannot be stereo frames
        assert!(MeadowSonicAudioData::from_samples(vec![0.0; 5], 48_000, 2).is_err());
        assert!(MeadowSonicAudioData::from_samples(vec![0.0; 4], 48_000, 2).is_ok());
    }

    #[test]
    fn test_frame_accounting() {
        let audio = MeadowSonicAudioData::from_samples(vec![0.0; 96_000], 48_000, 2).unwrap();
        assert_eq!(audio.total_frames(), 48_000);
        assert!((audio.duration().as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fold_mono_averages_frames() {
        let audio =
            MeadowSonicAudioData::from_samples(vec![1.0, 0.0, 0.5, 0.5], 48_000, 2).unwrap();
        let mono = audio.fold_mono();
        assert_eq!(mono, vec![0.5, 0.5]);
    }
}
