//! Multi-device mixer
//!
//! `Mixer` owns the device assignment and the three hardware streams:
//!
//! - **capture**: microphone, queued for the primary output only
//! - **primary**: capture + clips, usually routed to a loopback cable
//! - **monitor**: clips only, for local listening
//!
//! Each role opens and closes independently; a device that fails to open
//! leaves only its own role closed. The primary device dictates the
//! operating sample rate, which is pushed to the cache target.
//!
//! Stream handles are not `Send` on every platform, so `Mixer` stays on the
//! thread that created it. Other threads use the `MixBus` handle.

pub mod bus;
pub mod capture;
pub mod clip;

pub use bus::{Gains, MixBus};
pub use capture::CaptureQueue;
pub use clip::{Clip, ClipId, ClipStatus};

use crate::audio::device::{AudioHost, DeviceInfo, StreamHandle, StreamSpec};
use crate::audio::types::SampleBuffer;
use crate::cache::AudioCache;
use crate::config::{clamp_sample_rate, EngineConfig};
use crate::error::{Error, Result};
use chrono::Utc;
use padmix_common::{EventBus, PadmixEvent, StreamRole};
use std::sync::Arc;
use tracing::{info, warn};

/// Output streams are always opened as interleaved stereo
pub const OUTPUT_CHANNELS: u16 = 2;

/// Result of (re)assigning one role
#[derive(Debug)]
pub enum RoleOutcome {
    /// Requested device was already the open one
    Unchanged,
    /// Stream opened (or reopened) on this device
    Opened(usize),
    /// Role now has no stream
    Closed,
    /// Opening failed; the role is closed
    Failed(Error),
}

impl RoleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RoleOutcome::Failed(_))
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            RoleOutcome::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }
}

/// Per-role outcome of `Mixer::set_devices`
#[derive(Debug)]
pub struct DeviceAssignment {
    pub capture: RoleOutcome,
    pub primary: RoleOutcome,
    pub monitor: RoleOutcome,
}

impl DeviceAssignment {
    /// Roles that failed to open, with their errors
    pub fn failures(&self) -> Vec<(StreamRole, &Error)> {
        [
            (StreamRole::Capture, &self.capture),
            (StreamRole::Primary, &self.primary),
            (StreamRole::Monitor, &self.monitor),
        ]
        .into_iter()
        .filter_map(|(role, outcome)| match outcome {
            RoleOutcome::Failed(e) => Some((role, e)),
            _ => None,
        })
        .collect()
    }

    /// First failure, if any (primary, then capture, then monitor)
    pub fn into_result(self) -> Result<()> {
        self.primary.into_result()?;
        self.capture.into_result()?;
        self.monitor.into_result()
    }
}

struct OpenStream {
    device: DeviceInfo,
    sample_rate: u32,
    handle: Box<dyn StreamHandle>,
}

/// Device selection and stream lifecycles over a shared `MixBus`
pub struct Mixer {
    host: Box<dyn AudioHost>,
    bus: MixBus,
    cache: Option<Arc<AudioCache>>,
    events: EventBus,
    block_size: u32,
    /// Indexed by `StreamRole::index`
    streams: [Option<OpenStream>; 3],
}

impl Mixer {
    /// Mixer with every role closed, running at the configured default rate
    pub fn new(host: Box<dyn AudioHost>, config: &EngineConfig) -> Self {
        let events = EventBus::default();
        let bus = MixBus::new(
            config.audio.default_sample_rate,
            config.audio.block_size as usize,
            config.audio.capture_queue_blocks as usize,
        )
        .with_events(events.clone());
        bus.set_gains(Gains {
            capture: config.gains.capture,
            clips: config.gains.clips,
            monitor: config.gains.monitor,
        });

        Self {
            host,
            bus,
            cache: None,
            events,
            block_size: config.audio.block_size,
            streams: [None, None, None],
        }
    }

    /// Keep `cache` targeted at the operating rate
    pub fn with_cache(mut self, cache: Arc<AudioCache>) -> Self {
        cache.set_target(self.bus.sample_rate(), OUTPUT_CHANNELS);
        self.cache = Some(cache);
        self
    }

    /// Report on `events` instead of a private bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.bus = self.bus.clone().with_events(events.clone());
        self.events = events;
        self
    }

    /// Thread-safe handle for playing and stopping clips
    pub fn bus(&self) -> MixBus {
        self.bus.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Enumerate devices on the host
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.host.devices()
    }

    /// Device currently open for `role`
    pub fn device(&self, role: StreamRole) -> Option<&DeviceInfo> {
        self.streams[role.index()].as_ref().map(|s| &s.device)
    }

    pub fn is_open(&self, role: StreamRole) -> bool {
        self.streams[role.index()].is_some()
    }

    /// Operating sample rate
    pub fn sample_rate(&self) -> u32 {
        self.bus.sample_rate()
    }

    /// Assign all three roles. A role restarts only if its device changed
    /// (or the operating rate did); each role succeeds or fails on its own.
    pub fn set_devices(
        &mut self,
        mic: Option<usize>,
        out: Option<usize>,
        monitor: Option<usize>,
    ) -> DeviceAssignment {
        let rate_before = self.sample_rate();
        let primary = self.assign(StreamRole::Primary, out, false);
        let rate_changed = self.sample_rate() != rate_before;

        let capture = self.assign(StreamRole::Capture, mic, rate_changed);
        let monitor = self.assign(StreamRole::Monitor, monitor, rate_changed);

        let assignment = DeviceAssignment {
            capture,
            primary,
            monitor,
        };
        for (role, e) in assignment.failures() {
            warn!("{} device not assigned: {}", role, e);
        }
        assignment
    }

    /// Assign the monitor role only
    pub fn set_monitor_device(&mut self, monitor: Option<usize>) -> RoleOutcome {
        self.assign(StreamRole::Monitor, monitor, false)
    }

    /// Start playing `buffer`; see `MixBus::play_clip`
    pub fn play_clip(&self, buffer: &SampleBuffer) -> Result<ClipId> {
        self.bus.play_clip(buffer)
    }

    /// Clear every active clip
    pub fn stop_all(&self) -> usize {
        self.bus.stop_all()
    }

    pub fn set_capture_gain(&self, gain: f32) {
        self.bus.set_capture_gain(gain);
    }

    pub fn set_clip_gain(&self, gain: f32) {
        self.bus.set_clip_gain(gain);
    }

    pub fn set_monitor_gain(&self, gain: f32) {
        self.bus.set_monitor_gain(gain);
    }

    /// Stop and release every stream. Returns once all callbacks are done.
    pub fn stop(&mut self) {
        for role in [StreamRole::Capture, StreamRole::Monitor, StreamRole::Primary] {
            self.close(role);
        }
        self.bus.stop_all();
    }

    fn assign(&mut self, role: StreamRole, device: Option<usize>, force_reopen: bool) -> RoleOutcome {
        let current = self.device(role).map(|d| d.index);
        if current == device && !force_reopen {
            return RoleOutcome::Unchanged;
        }

        let was_open = self.close(role);
        let Some(index) = device else {
            return if was_open {
                RoleOutcome::Closed
            } else {
                RoleOutcome::Unchanged
            };
        };

        match self.open(role, index) {
            Ok(()) => RoleOutcome::Opened(index),
            Err(e) => {
                self.events.emit(PadmixEvent::StreamFailed {
                    role,
                    device_index: index,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                RoleOutcome::Failed(e)
            }
        }
    }

    fn open(&mut self, role: StreamRole, index: usize) -> Result<()> {
        let device = self.host.device(index).map_err(|e| Error::DeviceOpen {
            role,
            device: index,
            reason: e.to_string(),
        })?;

        let sample_rate = match role {
            StreamRole::Primary => clamp_sample_rate(device.default_sample_rate),
            _ => self.sample_rate(),
        };
        let channels = match role {
            StreamRole::Capture => device.capture_channels(),
            _ => OUTPUT_CHANNELS,
        };
        let supported = match role {
            StreamRole::Capture => device.can_capture(),
            _ => device.can_play(),
        };
        if !supported {
            return Err(Error::DeviceOpen {
                role,
                device: index,
                reason: format!("'{}' has no {} channels", device.name, direction(role)),
            });
        }

        let spec = StreamSpec {
            role,
            device_index: index,
            sample_rate,
            block_size: self.block_size,
            channels,
        };

        let bus = self.bus.clone();
        let handle = match role {
            StreamRole::Capture => self.host.open_input(
                &spec,
                Box::new(move |input: &[f32]| bus.render_capture(input, channels)),
            ),
            StreamRole::Primary => self
                .host
                .open_output(&spec, Box::new(move |out: &mut [f32]| bus.render_primary(out))),
            StreamRole::Monitor => self
                .host
                .open_output(&spec, Box::new(move |out: &mut [f32]| bus.render_monitor(out))),
        }?;

        // The stream renders silence until its role is marked active, so the
        // rate switch lands before any clip is heard on it
        if role == StreamRole::Primary {
            self.apply_sample_rate(sample_rate);
        }
        self.bus.set_role_active(role, true);

        info!(
            "{} stream open on device {} '{}' at {}Hz",
            role, index, device.name, sample_rate
        );
        self.events.emit(PadmixEvent::StreamOpened {
            role,
            device_index: index,
            device_name: device.name.clone(),
            sample_rate,
            timestamp: Utc::now(),
        });

        self.streams[role.index()] = Some(OpenStream {
            device,
            sample_rate,
            handle,
        });
        Ok(())
    }

    /// Stop `role`'s stream if open. Returns whether one was open.
    fn close(&mut self, role: StreamRole) -> bool {
        let Some(stream) = self.streams[role.index()].take() else {
            return false;
        };

        if let Err(e) = stream.handle.stop() {
            warn!("{} stream on device {} did not stop cleanly: {}", role, stream.device.index, e);
        }
        self.bus.set_role_active(role, false);

        info!(
            "{} stream closed (device {}, {}Hz)",
            role, stream.device.index, stream.sample_rate
        );
        self.events.emit(PadmixEvent::StreamClosed {
            role,
            timestamp: Utc::now(),
        });
        true
    }

    fn apply_sample_rate(&mut self, sample_rate: u32) {
        if self.bus.sample_rate() == sample_rate {
            return;
        }
        let old_rate = self.bus.set_sample_rate(sample_rate);

        info!("Operating sample rate {}Hz -> {}Hz", old_rate, sample_rate);
        if let Some(cache) = &self.cache {
            cache.set_target(sample_rate, OUTPUT_CHANNELS);
        }
        self.events.emit(PadmixEvent::SampleRateChanged {
            old_rate,
            new_rate: sample_rate,
            timestamp: Utc::now(),
        });
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn direction(role: StreamRole) -> &'static str {
    match role {
        StreamRole::Capture => "input",
        _ => "output",
    }
}
