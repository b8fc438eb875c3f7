//! Shared audio types

use std::sync::Arc;

/// Canonical decoded audio: interleaved f32 samples in [-1.0, 1.0].
///
/// Cloning is cheap; clones share the same sample storage.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    /// Wrap interleaved samples
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of complete frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// True when both buffers share the same sample storage
    pub fn shares_storage(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Interleaved stereo view of this buffer.
    ///
    /// Stereo input is shared without copying. Mono is duplicated to both
    /// channels; wider layouts keep their first two channels.
    pub fn to_stereo(&self) -> Arc<[f32]> {
        match self.channels {
            2 => Arc::clone(&self.samples),
            0 => Arc::from(Vec::new()),
            1 => {
                let mut stereo = Vec::with_capacity(self.samples.len() * 2);
                for &sample in self.samples.iter() {
                    stereo.push(sample);
                    stereo.push(sample);
                }
                stereo.into()
            }
            n => {
                let n = n as usize;
                let mut stereo = Vec::with_capacity(self.frames() * 2);
                for frame in self.samples.chunks_exact(n) {
                    stereo.push(frame[0]);
                    stereo.push(frame[1]);
                }
                stereo.into()
            }
        }
    }
}

/// Convert 16-bit PCM to f32 in [-1.0, 1.0)
pub fn pcm16_to_f32(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Quantize an f32 sample to 16-bit PCM, clamping out-of-range input
pub fn f32_to_pcm16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
