//! Test helper modules for padmix-engine integration tests
//!
//! - FakeHost: an `AudioHost` whose callbacks the test drives by hand
//! - fake decoders with call counting, delays and failure injection
//! - WAV fixture generation with hound

#![allow(dead_code)]

pub mod audio_generator;
pub mod fake_decoder;
pub mod fake_host;

pub use audio_generator::{generate_sine_wav, write_garbage_file};
pub use fake_decoder::{FailingDecoder, FakeDecoder, FlakyDecoder};
pub use fake_host::{input_device, output_device, FakeHost};
