//! padmix-engine configuration
//!
//! Loaded from TOML through `padmix_common::config`; every field has a
//! compiled default so an absent file or section is fine.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Lowest operating sample rate accepted from a device
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest operating sample rate accepted from a device
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Clamp a device-reported rate into the supported operating range
pub fn clamp_sample_rate(rate: u32) -> u32 {
    rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE)
}

/// Convert a UI-style percent value into a gain scalar (`max(0, pct/100)`)
pub fn gain_from_percent(percent: f32) -> f32 {
    (percent / 100.0).max(0.0)
}

/// Engine configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioSettings,
    pub gains: GainSettings,
    pub cache: CacheSettings,
    pub playback: PlaybackSettings,
}

/// `[audio]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    /// Frames per callback block
    pub block_size: u32,
    /// Capture queue bound, in blocks
    pub capture_queue_blocks: u32,
    /// Operating rate before any primary device is selected
    pub default_sample_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            block_size: 256,
            capture_queue_blocks: 5,
            default_sample_rate: 48_000,
        }
    }
}

/// `[gains]` section (linear scalars)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GainSettings {
    pub capture: f32,
    pub clips: f32,
    pub monitor: f32,
}

impl Default for GainSettings {
    fn default() -> Self {
        Self {
            capture: 1.0,
            clips: 1.0,
            monitor: 1.0,
        }
    }
}

/// `[cache]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    /// Worker threads used to pre-decode the pad list
    pub warmup_workers: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { warmup_workers: 2 }
    }
}

/// `[playback]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Starting a pad stops whatever else is playing
    pub exclusive: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self { exclusive: true }
    }
}

impl EngineConfig {
    /// Load from `path`, or compiled defaults when `None`, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: EngineConfig = padmix_common::config::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the mixer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.audio.block_size == 0 {
            return Err(Error::Config("audio.block_size must be > 0".to_string()));
        }
        if self.audio.capture_queue_blocks == 0 {
            return Err(Error::Config(
                "audio.capture_queue_blocks must be > 0".to_string(),
            ));
        }
        let rate = self.audio.default_sample_rate;
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
            return Err(Error::Config(format!(
                "audio.default_sample_rate {} outside {}..={}",
                rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        if self.cache.warmup_workers == 0 {
            return Err(Error::Config("cache.warmup_workers must be > 0".to_string()));
        }
        for (name, gain) in [
            ("capture", self.gains.capture),
            ("clips", self.gains.clips),
            ("monitor", self.gains.monitor),
        ] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(Error::Config(format!("gains.{} must be >= 0", name)));
            }
        }
        Ok(())
    }

    /// Capture queue bound in frames
    pub fn capture_queue_frames(&self) -> usize {
        self.audio.block_size as usize * self.audio.capture_queue_blocks as usize
    }
}
