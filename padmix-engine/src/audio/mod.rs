//! Audio subsystem: decoding, resampling and hardware streams

pub mod decoder;
pub mod device;
pub mod output;
pub mod resampler;
pub mod types;

pub use decoder::{Decoder, SymphoniaDecoder};
pub use device::{AudioHost, DeviceInfo, InputCallback, OutputCallback, StreamHandle, StreamSpec};
pub use output::CpalHost;
pub use resampler::Resampler;
pub use types::SampleBuffer;
