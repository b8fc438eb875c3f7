//! Decoders standing in for symphonia

use padmix_engine::audio::Decoder;
use padmix_engine::DecodeError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Produces `frames` frames of a constant level at whatever format is
/// requested, optionally after a delay, and counts calls.
pub struct FakeDecoder {
    pub frames: usize,
    pub level: i16,
    pub delay: Duration,
    calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            level: 8192,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for FakeDecoder {
    fn decode(&self, _path: &Path, _sample_rate: u32, channels: u16) -> Result<Vec<i16>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(vec![self.level; self.frames * channels as usize])
    }
}

/// Fails every decode as missing a codec, counting calls
#[derive(Default)]
pub struct FailingDecoder {
    calls: AtomicUsize,
}

impl FailingDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for FailingDecoder {
    fn decode(&self, path: &Path, _sample_rate: u32, _channels: u16) -> Result<Vec<i16>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DecodeError::MissingDecoder {
            path: path.to_path_buf(),
            reason: "no codec registered".to_string(),
        })
    }
}

/// Fails its first decode, then succeeds; tracks how many decodes overlap
pub struct FlakyDecoder {
    inner: FakeDecoder,
    failed_once: AtomicBool,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FlakyDecoder {
    pub fn new(frames: usize, delay: Duration) -> Self {
        Self {
            inner: FakeDecoder::new(frames).with_delay(delay),
            failed_once: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }

    /// Highest number of decodes that ran at the same time
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Decoder for FlakyDecoder {
    fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> Result<Vec<i16>, DecodeError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let first = !self.failed_once.swap(true, Ordering::SeqCst);
        let result = self.inner.decode(path, sample_rate, channels);
        self.active.fetch_sub(1, Ordering::SeqCst);
        if first {
            return Err(DecodeError::UnsupportedOrCorrupt {
                path: path.to_path_buf(),
                reason: "truncated stream".to_string(),
            });
        }
        result
    }
}
