//! Sample rate conversion using rubato
//!
//! Converts decoded audio to the cache's target sample rate, streaming the
//! file through a fixed-size chunk resampler. The mixer never resamples;
//! everything it plays already went through here.

use crate::error::DecodeError;
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use std::path::Path;
use tracing::debug;

/// Input frames fed to rubato per call
const CHUNK_FRAMES: usize = 1024;

/// Whole-buffer sample rate converter
pub struct Resampler;

impl Resampler {
    /// Resample interleaved audio from `input_rate` to `output_rate`.
    ///
    /// The result has `round(frames * output_rate / input_rate)` frames,
    /// aligned with the input (the filter delay is removed). Equal rates
    /// return a copy. `path` is only used to attribute errors.
    pub fn resample(
        path: &Path,
        input: &[f32],
        input_rate: u32,
        output_rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>, DecodeError> {
        let channels = channels as usize;
        if input_rate == output_rate || input.is_empty() || channels == 0 {
            return Ok(input.to_vec());
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let planar = deinterleave(input, channels);
        let frames = planar[0].len();
        let expected = (frames as f64 * ratio).round() as usize;

        let failed = |what: &str, e: &dyn std::fmt::Display| DecodeError::UnsupportedOrCorrupt {
            path: path.to_path_buf(),
            reason: format!("{}: {}", what, e),
        };

        let mut resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0,
            PolynomialDegree::Septic,
            CHUNK_FRAMES,
            channels,
        )
        .map_err(|e| failed("Failed to create resampler", &e))?;

        let delay = resampler.output_delay();
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

        let mut pos = 0;
        while pos < frames {
            let end = (pos + CHUNK_FRAMES).min(frames);
            let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..end]).collect();

            let processed = if end - pos == CHUNK_FRAMES {
                resampler.process(chunk.as_slice(), None)
            } else {
                resampler.process_partial(Some(chunk.as_slice()), None)
            }
            .map_err(|e| failed("Resampling failed", &e))?;

            append(&mut output, processed);
            pos = end;
        }

        // Drain the filter delay; a couple of flushes always suffice
        for _ in 0..4 {
            if output[0].len() >= expected + delay {
                break;
            }
            let processed = resampler
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| failed("Resampling flush failed", &e))?;
            append(&mut output, processed);
        }

        let aligned: Vec<Vec<f32>> = output
            .into_iter()
            .map(|c| c.into_iter().skip(delay).take(expected).collect())
            .collect();

        debug!(
            "Resampled {} frames {}Hz -> {} frames {}Hz ({} channels)",
            frames,
            input_rate,
            aligned[0].len(),
            output_rate,
            channels
        );

        Ok(interleave(&aligned))
    }
}

fn append(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (dst, src) in output.iter_mut().zip(processed) {
        dst.extend_from_slice(&src);
    }
}

/// `[L, R, L, R, ...]` to `[[L, L, ...], [R, R, ...]]`
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &sample) in planar.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };

    let mut interleaved = Vec::with_capacity(first.len() * planar.len());
    for frame_idx in 0..first.len() {
        interleaved.extend(planar.iter().map(|plane| plane[frame_idx]));
    }
    interleaved
}
