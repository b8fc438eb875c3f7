//! Decoded-audio cache
//!
//! Decode once, serve many. Entries are keyed by
//! (path, modification time, target rate, target channels); changing the
//! target format empties the whole cache so every live entry shares one
//! format.
//!
//! Decoding is serialized per key: concurrent loads of the same file wait
//! for one decode, loads of different files decode in parallel. No lock is
//! held while decoding, and nothing here is shared with the mixer's
//! real-time path.
//!
//! Keys use the mtime, not a content hash: a file replaced in place with an
//! identical mtime keeps serving the old decode.

use crate::audio::decoder::Decoder;
use crate::audio::types::{pcm16_to_f32, SampleBuffer};
use crate::error::Result;
use crate::lock_or_recover;
use chrono::Utc;
use padmix_common::{EventBus, PadmixEvent};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Sample rate and channel count every cached buffer is normalized to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    modified: SystemTime,
    format: TargetFormat,
}

struct CacheState {
    target: TargetFormat,
    entries: HashMap<CacheKey, SampleBuffer>,
}

/// Decoded-audio cache shared by the UI, warm-up workers and playback
pub struct AudioCache {
    decoder: Arc<dyn Decoder>,
    state: Mutex<CacheState>,
    /// One lock per key currently being decoded
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    events: Option<EventBus>,
}

impl AudioCache {
    pub fn new(decoder: Arc<dyn Decoder>, sample_rate: u32, channels: u16) -> Self {
        Self {
            decoder,
            state: Mutex::new(CacheState {
                target: TargetFormat {
                    sample_rate,
                    channels,
                },
                entries: HashMap::new(),
            }),
            in_flight: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    /// Report loads and invalidations on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Current target format
    pub fn target(&self) -> TargetFormat {
        lock_or_recover(&self.state).target
    }

    /// Change the target format.
    ///
    /// Any difference clears the entire cache. Returns true when it did.
    pub fn set_target(&self, sample_rate: u32, channels: u16) -> bool {
        let new_target = TargetFormat {
            sample_rate,
            channels,
        };

        let dropped = {
            let mut state = lock_or_recover(&self.state);
            if state.target == new_target {
                return false;
            }
            state.target = new_target;
            std::mem::take(&mut state.entries)
        };

        info!(
            "Cache target changed to {}Hz/{}ch, dropped {} entries",
            sample_rate,
            channels,
            dropped.len()
        );
        self.emit(PadmixEvent::CacheCleared {
            sample_rate,
            channels,
            timestamp: Utc::now(),
        });
        true
    }

    /// Resolve `path` to a canonical sample buffer at the current target.
    ///
    /// Repeated loads of an unchanged file return the same shared buffer.
    /// A failed decode stores nothing, so the next call decodes again.
    pub fn load(&self, path: &Path) -> Result<SampleBuffer> {
        let modified = std::fs::metadata(path)?.modified()?;

        let key = {
            let state = lock_or_recover(&self.state);
            let key = CacheKey {
                path: path.to_path_buf(),
                modified,
                format: state.target,
            };
            if let Some(hit) = state.entries.get(&key) {
                let hit = hit.clone();
                drop(state);
                self.report_loaded(path, &hit, true);
                return Ok(hit);
            }
            key
        };

        let key_lock = {
            let mut in_flight = lock_or_recover(&self.in_flight);
            Arc::clone(
                in_flight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let decoding = lock_or_recover(&key_lock);

        // Another loader may have finished this key while we waited
        let cached = lock_or_recover(&self.state).entries.get(&key).cloned();
        let result = match cached {
            Some(hit) => Ok((hit, true)),
            None => self.decode_and_store(&key).map(|buffer| (buffer, false)),
        };
        drop(decoding);
        self.release_key(&key, key_lock);

        match result {
            Ok((buffer, from_cache)) => {
                self.report_loaded(path, &buffer, from_cache);
                Ok(buffer)
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                self.emit(PadmixEvent::LoadFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Give back a per-key lock, removing its entry when no loader is left.
    ///
    /// Every clone is taken and dropped under `in_flight`, so the count is
    /// exact here: the map plus the caller means nobody else is waiting.
    fn release_key(&self, key: &CacheKey, key_lock: Arc<Mutex<()>>) {
        let mut in_flight = lock_or_recover(&self.in_flight);
        let last_holder = in_flight.get(key).is_some_and(|entry| {
            Arc::ptr_eq(entry, &key_lock) && Arc::strong_count(&key_lock) == 2
        });
        if last_holder {
            in_flight.remove(key);
        }
        drop(key_lock);
    }

    fn decode_and_store(&self, key: &CacheKey) -> Result<SampleBuffer> {
        let format = key.format;
        debug!(
            "Cache miss for {}, decoding at {}Hz/{}ch",
            key.path.display(),
            format.sample_rate,
            format.channels
        );

        let pcm = self
            .decoder
            .decode(&key.path, format.sample_rate, format.channels)?;
        let buffer = SampleBuffer::new(pcm16_to_f32(&pcm), format.sample_rate, format.channels);

        let mut state = lock_or_recover(&self.state);
        if state.target == format {
            // Entries for older versions of the same file are dead weight
            state
                .entries
                .retain(|k, _| k.path != key.path || k.modified == key.modified);
            state.entries.insert(key.clone(), buffer.clone());
        } else {
            debug!(
                "Target changed while decoding {}, result not cached",
                key.path.display()
            );
        }

        Ok(buffer)
    }

    /// True when `path` (at its current mtime) is cached for the current target
    pub fn contains(&self, path: &Path) -> bool {
        let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
            return false;
        };
        let state = lock_or_recover(&self.state);
        let key = CacheKey {
            path: path.to_path_buf(),
            modified,
            format: state.target,
        };
        state.entries.contains_key(&key)
    }

    /// Number of cached buffers
    pub fn len(&self) -> usize {
        lock_or_recover(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn report_loaded(&self, path: &Path, buffer: &SampleBuffer, from_cache: bool) {
        self.emit(PadmixEvent::LoadCompleted {
            path: path.display().to_string(),
            frames: buffer.frames(),
            from_cache,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: PadmixEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, Error};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Produces a ramp of `frames` frames and counts invocations
    struct RampDecoder {
        frames: usize,
        calls: AtomicUsize,
    }

    impl Decoder for RampDecoder {
        fn decode(
            &self,
            _path: &Path,
            _sample_rate: u32,
            channels: u16,
        ) -> std::result::Result<Vec<i16>, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.frames * channels as usize)
                .map(|i| (i as i16).wrapping_mul(7))
                .collect())
        }
    }

    fn temp_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"not really audio").unwrap();
        path
    }

    #[test]
    fn test_second_load_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "a.wav");
        let decoder = Arc::new(RampDecoder {
            frames: 10,
            calls: AtomicUsize::new(0),
        });
        let cache = AudioCache::new(decoder.clone(), 48000, 2);

        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();

        assert!(first.shares_storage(&second));
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.frames(), 10);
        assert!(cache.contains(&path));
    }

    #[test]
    fn test_same_target_does_not_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "a.wav");
        let decoder = Arc::new(RampDecoder {
            frames: 4,
            calls: AtomicUsize::new(0),
        });
        let cache = AudioCache::new(decoder, 48000, 2);

        cache.load(&path).unwrap();
        assert!(!cache.set_target(48000, 2));
        assert_eq!(cache.len(), 1);

        assert!(cache.set_target(48000, 1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let decoder = Arc::new(RampDecoder {
            frames: 4,
            calls: AtomicUsize::new(0),
        });
        let cache = AudioCache::new(decoder.clone(), 48000, 2);

        let result = cache.load(Path::new("/nonexistent/padmix/missing.wav"));
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    }
}
