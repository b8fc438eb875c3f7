//! # Padmix Engine Library (padmix-engine)
//!
//! Real-time soundboard mixer.
//!
//! **Purpose:** Decode audio files once into a shared cache and mix them,
//! together with a live microphone, into a primary output (typically a
//! virtual cable) and an optional local monitor output.
//!
//! **Architecture:** symphonia + rubato decode into `AudioCache`; `Mixer`
//! owns three cpal streams rendering through one shared `MixBus`.

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod mixer;
pub mod soundboard;
pub mod warmup;

pub use cache::AudioCache;
pub use config::EngineConfig;
pub use error::{DecodeError, DecodeErrorKind, Error, Result};
pub use mixer::{ClipId, DeviceAssignment, MixBus, Mixer, RoleOutcome};
pub use soundboard::Soundboard;
pub use warmup::WarmupPool;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, taking over the data if a previous holder panicked
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
