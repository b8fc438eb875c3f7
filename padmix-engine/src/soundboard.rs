//! Soundboard: pads on top of the cache and mixer
//!
//! Ties the pieces together the way a UI or hotkey dispatcher uses them: a
//! list of pads, each a file, played by index through the cache into the
//! mixer.

use crate::audio::decoder::Decoder;
use crate::audio::device::AudioHost;
use crate::cache::AudioCache;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::mixer::{ClipId, DeviceAssignment, MixBus, Mixer, RoleOutcome, OUTPUT_CHANNELS};
use crate::warmup::{WarmupPool, WarmupStats};
use padmix_common::{EventBus, StreamRole};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One playable pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pad {
    pub name: String,
    pub path: PathBuf,
}

impl Pad {
    /// Pad named after the file stem
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

pub struct Soundboard {
    mixer: Mixer,
    cache: Arc<AudioCache>,
    warmup: WarmupPool,
    pads: Vec<Pad>,
    exclusive: bool,
    events: EventBus,
}

impl Soundboard {
    pub fn new(host: Box<dyn AudioHost>, decoder: Arc<dyn Decoder>, config: &EngineConfig) -> Self {
        let events = EventBus::default();

        let cache = Arc::new(
            AudioCache::new(decoder, config.audio.default_sample_rate, OUTPUT_CHANNELS)
                .with_events(events.clone()),
        );
        let mixer = Mixer::new(host, config)
            .with_events(events.clone())
            .with_cache(Arc::clone(&cache));
        let warmup = WarmupPool::new(
            Arc::clone(&cache),
            config.cache.warmup_workers,
            Some(events.clone()),
        );

        Self {
            mixer,
            cache,
            warmup,
            pads: Vec::new(),
            exclusive: config.playback.exclusive,
            events,
        }
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    pub fn cache(&self) -> &Arc<AudioCache> {
        &self.cache
    }

    pub fn bus(&self) -> MixBus {
        self.mixer.bus()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Assign capture, primary and monitor devices
    pub fn set_devices(
        &mut self,
        mic: Option<usize>,
        out: Option<usize>,
        monitor: Option<usize>,
    ) -> DeviceAssignment {
        self.mixer.set_devices(mic, out, monitor)
    }

    pub fn set_monitor_device(&mut self, monitor: Option<usize>) -> RoleOutcome {
        self.mixer.set_monitor_device(monitor)
    }

    /// Starting a pad stops everything else when set
    pub fn set_exclusive(&mut self, exclusive: bool) {
        self.exclusive = exclusive;
    }

    /// Append a pad for `path`, returning its index
    pub fn add_pad(&mut self, path: impl Into<PathBuf>) -> usize {
        let pad = Pad::from_path(path);
        debug!("Pad {} -> {}", self.pads.len(), pad.path.display());
        self.pads.push(pad);
        self.pads.len() - 1
    }

    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    pub fn clear_pads(&mut self) {
        self.pads.clear();
    }

    /// Pre-decode every pad into the cache in the background.
    /// Returns how many loads were queued.
    pub fn warm_up(&self) -> Result<usize> {
        let paths: Vec<PathBuf> = self.pads.iter().map(|p| p.path.clone()).collect();
        self.warmup.submit(paths)
    }

    /// Block until queued warm-up loads are done
    pub fn wait_warm(&self) -> WarmupStats {
        self.warmup.wait_idle()
    }

    /// Play the pad at `index`
    pub fn play_pad(&self, index: usize) -> Result<ClipId> {
        let pad = self.pads.get(index).ok_or_else(|| {
            Error::InvalidInput(format!(
                "No pad {} (have {})",
                index,
                self.pads.len()
            ))
        })?;
        self.play_path(&pad.path)
    }

    /// Load `path` through the cache and play it.
    ///
    /// Needs an open primary output. When the cache was targeted at a
    /// different rate than the mixer runs at, the cache is re-targeted
    /// and the file loaded again.
    pub fn play_path(&self, path: &Path) -> Result<ClipId> {
        if !self.mixer.is_open(StreamRole::Primary) {
            return Err(Error::NoOutputDevice);
        }

        let rate = self.mixer.sample_rate();
        let mut buffer = self.cache.load(path)?;
        if buffer.sample_rate() != rate {
            info!(
                "Cache at {}Hz, mixer at {}Hz; re-targeting",
                buffer.sample_rate(),
                rate
            );
            self.cache.set_target(rate, OUTPUT_CHANNELS);
            buffer = self.cache.load(path)?;
        }

        if self.exclusive {
            self.mixer.stop_all();
        }
        self.mixer.play_clip(&buffer)
    }

    pub fn stop_all(&self) -> usize {
        self.mixer.stop_all()
    }

    /// Stop warm-up workers and close every stream
    pub fn shutdown(&mut self) {
        self.warmup.shutdown();
        self.mixer.stop();
        info!("Soundboard shut down");
    }
}
