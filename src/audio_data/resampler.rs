use crate::error::{MeadowSonicError, Result};
use rubato::{FftFixedIn, Resampler};

const CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Offline sample-rate converter for whole buffers.
///
/// Buffers registered at a foreign sample rate pass through here exactly once,
/// at registration time; nothing in the render path resamples.
pub struct AudioResampler {
    source_rate: u32,
    target_rate: u32,
    channels: u16,
}

impl AudioResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: u16) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(MeadowSonicError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(MeadowSonicError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            source_rate,
            target_rate,
            channels,
        })
    }

    /// Ratio of target to source rate; `> 1.0` means upsampling.
    pub fn ratio(&self) -> f64 {
        self.target_rate as f64 / self.source_rate as f64
    }

    /// Resamples interleaved multi-channel audio.
    ///
    /// Channels are de-interleaved, converted independently, then re-interleaved.
    /// The output is trimmed to the exact expected frame count so chunk padding
    /// never leaks trailing silence into the buffer.
    pub fn resample_interleaved(&self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.source_rate == self.target_rate {
            return Ok(interleaved.to_vec());
        }

        let channels = self.channels as usize;
        let source_frames = interleaved.len() / channels;
        let expected_frames = (source_frames as f64 * self.ratio()).round() as usize;

        let mut planes: Vec<Vec<f32>> = Vec::with_capacity(channels);
        for ch in 0..channels {
            let plane: Vec<f32> = interleaved
                .chunks(channels)
                .map(|frame| frame.get(ch).copied().unwrap_or(0.0))
                .collect();
            planes.push(self.resample_plane(&plane, expected_frames)?);
        }

        let mut out = Vec::with_capacity(expected_frames * channels);
        for frame_idx in 0..expected_frames {
            for plane in &planes {
                out.push(plane.get(frame_idx).copied().unwrap_or(0.0));
            }
        }
        Ok(out)
    }

    /// Resamples one channel of planar samples to `expected_frames`.
    fn resample_plane(&self, plane: &[f32], expected_frames: usize) -> Result<Vec<f32>> {
        let mut resampler = FftFixedIn::<f32>::new(
            self.source_rate as usize,
            self.target_rate as usize,
            CHUNK_FRAMES,
            SUB_CHUNKS,
            1,
        )
        .map_err(|e| {
            MeadowSonicError::AudioFormat(format!("Failed to create resampler: {}", e))
        })?;

        let mut out = Vec::with_capacity(expected_frames);
        let mut chunk = vec![0.0f32; CHUNK_FRAMES];

        for input in plane.chunks(CHUNK_FRAMES) {
            // FftFixedIn wants full chunks; the tail is zero-padded and the
            // overshoot trimmed below.
            chunk[..input.len()].copy_from_slice(input);
            chunk[input.len()..].fill(0.0);

            let waves = resampler
                .process(&[&chunk], None)
                .map_err(|e| MeadowSonicError::AudioFormat(format!("Resampling error: {}", e)))?;
            if let Some(converted) = waves.first() {
                out.extend_from_slice(converted);
            }
        }

        out.truncate(expected_frames);
        out.resize(expected_frames, 0.0);
        Ok(out)
    }
}
