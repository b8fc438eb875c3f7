//! WAV fixture generation
//!
//! Deterministic 16-bit WAV files for decode tests.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Write a 16-bit sine wave WAV file.
///
/// # Arguments
/// * `path` - Output file path
/// * `sample_rate` - File sample rate
/// * `channels` - Channel count, every channel carries the same signal
/// * `duration_ms` - Duration in milliseconds
/// * `amplitude` - Peak amplitude 0.0-1.0
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;

    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    let amplitude_i16 = amplitude * i16::MAX as f32;

    for frame_idx in 0..total_frames {
        let t = frame_idx as f32 / sample_rate as f32;
        let sample = ((2.0 * PI * 440.0 * t).sin() * amplitude_i16) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Write plain text that no audio format recognizes
pub fn write_garbage_file<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    std::fs::write(path, "padmix test fixture, not audio\n".repeat(128))
}
