//! Error types for padmix-engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use padmix_common::StreamRole;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of a decode failure
///
/// Callers act differently per kind: a missing decoder calls for a
/// different build or codec, unreadable content means skipping the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// No decoder is available for the file's codec
    MissingDecoder,
    /// The container parsed but its stream metadata is unusable
    UnreadableMetadata,
    /// The container is not recognized or the content is corrupt
    UnsupportedOrCorrupt,
}

/// Decoder/Normalizer failure
#[derive(Error, Debug)]
pub enum DecodeError {
    /// No decoder found for the codec in this file
    #[error("Decoder not found for {}: {reason}", path.display())]
    MissingDecoder { path: PathBuf, reason: String },

    /// Stream metadata (rate, channels, track) could not be read
    #[error("Unreadable audio metadata in {}: {reason}", path.display())]
    UnreadableMetadata { path: PathBuf, reason: String },

    /// Format not recognized, or content corrupt
    #[error("Unsupported or corrupt audio file {}: {reason}", path.display())]
    UnsupportedOrCorrupt { path: PathBuf, reason: String },
}

impl DecodeError {
    /// Kind of failure, without the details
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::MissingDecoder { .. } => DecodeErrorKind::MissingDecoder,
            DecodeError::UnreadableMetadata { .. } => DecodeErrorKind::UnreadableMetadata,
            DecodeError::UnsupportedOrCorrupt { .. } => DecodeErrorKind::UnsupportedOrCorrupt,
        }
    }

    /// Path of the file that failed
    pub fn path(&self) -> &PathBuf {
        match self {
            DecodeError::MissingDecoder { path, .. }
            | DecodeError::UnreadableMetadata { path, .. }
            | DecodeError::UnsupportedOrCorrupt { path, .. } => path,
        }
    }
}

/// Main error type for padmix-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Opening a hardware stream failed; only that role is affected
    #[error("Failed to open {role} stream on device {device}: {reason}")]
    DeviceOpen {
        role: StreamRole,
        device: usize,
        reason: String,
    },

    /// Device index does not exist
    #[error("Audio device not found: index {0}")]
    DeviceNotFound(usize),

    /// Clip sample rate differs from the mixer's operating rate
    #[error("Sample rate mismatch: clip is {clip_rate} Hz, mixer runs at {operating_rate} Hz")]
    FormatMismatch { clip_rate: u32, operating_rate: u32 },

    /// Playback requested with no primary output open
    #[error("No output device selected")]
    NoOutputDevice,

    /// Audio subsystem errors (enumeration, stream control)
    #[error("Audio host error: {0}")]
    AudioHost(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<padmix_common::Error> for Error {
    fn from(err: padmix_common::Error) -> Self {
        match err {
            padmix_common::Error::Config(msg) => Error::Config(msg),
        }
    }
}

/// Convenience Result type using padmix-engine Error
pub type Result<T> = std::result::Result<T, Error>;
