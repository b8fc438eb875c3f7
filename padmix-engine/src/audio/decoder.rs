//! Audio decoder using symphonia
//!
//! The Decoder/Normalizer boundary: turn an audio file into interleaved
//! 16-bit PCM at an exact sample rate and channel count. `SymphoniaDecoder`
//! decodes with symphonia, remixes channels, resamples with rubato and
//! quantizes. The cache only sees the `Decoder` trait.

use crate::audio::resampler::Resampler;
use crate::audio::types::f32_to_pcm16;
use crate::error::DecodeError;
use std::path::Path;
use symphonia::core::audio::SampleBuffer as SymphoniaSampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoder/Normalizer collaborator.
///
/// Returns interleaved 16-bit PCM at exactly `sample_rate` and `channels`,
/// or a classified failure. Implementations are synchronous and may be
/// called from several worker threads at once.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> Result<Vec<i16>, DecodeError>;
}

/// Decoder backed by symphonia's default codec registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode an entire file to interleaved f32 samples at its native format.
    ///
    /// # Returns
    /// - `samples`: Interleaved f32 samples
    /// - `sample_rate`: Source sample rate
    /// - `channels`: Source channel count
    pub fn decode_native(path: &Path) -> Result<(Vec<f32>, u32, u16), DecodeError> {
        debug!("Decoding entire file: {}", path.display());

        let file = std::fs::File::open(path).map_err(|e| DecodeError::UnsupportedOrCorrupt {
            path: path.to_path_buf(),
            reason: format!("Failed to open file: {}", e),
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedOrCorrupt {
                path: path.to_path_buf(),
                reason: format!("Failed to probe format: {}", e),
            })?;

        let mut format = probed.format;

        // Get the default audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::UnreadableMetadata {
                path: path.to_path_buf(),
                reason: "No audio track found".to_string(),
            })?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| DecodeError::UnreadableMetadata {
                path: path.to_path_buf(),
                reason: "Sample rate not found".to_string(),
            })?;

        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .filter(|&c| c > 0)
            .ok_or_else(|| DecodeError::UnreadableMetadata {
                path: path.to_path_buf(),
                reason: "Channel count not found".to_string(),
            })?;

        debug!("Audio format: sample_rate={}, channels={}", sample_rate, channels);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => DecodeError::MissingDecoder {
                    path: path.to_path_buf(),
                    reason: what.to_string(),
                },
                other => DecodeError::UnsupportedOrCorrupt {
                    path: path.to_path_buf(),
                    reason: format!("Failed to create decoder: {}", other),
                },
            })?;

        let mut samples = Vec::new();
        let mut conversion: Option<SymphoniaSampleBuffer<f32>> = None;
        let mut bad_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of file");
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("Stream reset required, stopping at {} samples", samples.len());
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet from {}: {}", path.display(), e);
                    break;
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let required = decoded.capacity() * spec.channels.count();
                    if conversion.as_ref().map_or(true, |b| b.capacity() < required) {
                        conversion = Some(SymphoniaSampleBuffer::new(decoded.capacity() as u64, spec));
                    }
                    if let Some(buf) = conversion.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet: skip it and keep going
                    warn!("Decode error in {}: {}", path.display(), e);
                    bad_packets += 1;
                }
                Err(e) => {
                    return Err(DecodeError::UnsupportedOrCorrupt {
                        path: path.to_path_buf(),
                        reason: format!("Decoder failed: {}", e),
                    });
                }
            }
        }

        if samples.is_empty() && bad_packets > 0 {
            return Err(DecodeError::UnsupportedOrCorrupt {
                path: path.to_path_buf(),
                reason: format!("No decodable audio ({} corrupt packets)", bad_packets),
            });
        }

        debug!(
            "Decoded {} samples ({} frames)",
            samples.len(),
            samples.len() / channels as usize
        );

        Ok((samples, sample_rate, channels))
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> Result<Vec<i16>, DecodeError> {
        if channels == 0 || sample_rate == 0 {
            return Err(DecodeError::UnreadableMetadata {
                path: path.to_path_buf(),
                reason: format!("Invalid target format {}Hz/{}ch", sample_rate, channels),
            });
        }

        let (native, native_rate, native_channels) = Self::decode_native(path)?;
        let remixed = remix_channels(&native, native_channels, channels);
        let resampled = Resampler::resample(path, &remixed, native_rate, sample_rate, channels)?;

        Ok(resampled.into_iter().map(f32_to_pcm16).collect())
    }
}

/// Convert an interleaved buffer between channel counts.
///
/// - Same count: copy
/// - To mono: average of all source channels
/// - From mono: duplicated into every target channel
/// - Otherwise: first channels kept, missing channels silent
pub fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from as usize, to as usize);
    if from == to || from == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut output = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else if from == 1 {
            output.extend(std::iter::repeat(frame[0]).take(to));
        } else {
            for ch in 0..to {
                output.push(frame.get(ch).copied().unwrap_or(0.0));
            }
        }
    }

    output
}
