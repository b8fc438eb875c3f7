//! Shared mix state and the real-time render paths
//!
//! `MixBus` is the thread-safe half of the mixer: the three stream
//! callbacks render through it and any thread may add or clear clips and
//! change gains. Everything lives under one mutex; critical sections are
//! O(active clips + queued capture frames).
//!
//! The render paths never allocate or free. Finished clips' sample storage
//! is parked in a pre-sized retirement list and released later by the
//! next control-thread call.
//!
//! Cursors move only inside the render paths. A role that is not marked
//! active renders silence, and a clip is finished once every active output
//! has reached its end.

use crate::audio::types::SampleBuffer;
use crate::error::{Error, Result};
use crate::lock_or_recover;
use crate::mixer::capture::CaptureQueue;
use crate::mixer::clip::{Clip, ClipId, ClipStatus};
use chrono::Utc;
use padmix_common::{EventBus, PadmixEvent, StreamRole};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Clip slots reserved up front; more are allocated on the control thread
pub const CLIP_CAPACITY: usize = 64;

/// Linear gain scalars
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    /// Capture audio on the primary output
    pub capture: f32,
    /// Clip audio on the primary output
    pub clips: f32,
    /// Clip audio on the monitor output
    pub monitor: f32,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            capture: 1.0,
            clips: 1.0,
            monitor: 1.0,
        }
    }
}

struct MixState {
    clips: Vec<Clip>,
    retired: Vec<Arc<[f32]>>,
    capture: CaptureQueue,
    gains: Gains,
    sample_rate: u32,
    /// Open roles, indexed by `StreamRole::index`
    active: [bool; 3],
    next_clip_id: u64,
}

impl MixState {
    fn outputs_open(&self) -> (bool, bool) {
        (
            self.active[StreamRole::Primary.index()],
            self.active[StreamRole::Monitor.index()],
        )
    }
}

/// Handle to the shared mix state. Cheap to clone, `Send + Sync`.
#[derive(Clone)]
pub struct MixBus {
    state: Arc<Mutex<MixState>>,
    events: Option<EventBus>,
}

impl MixBus {
    /// Mix state running at `sample_rate`, with a capture bound of
    /// `capture_queue_blocks` blocks of `block_size` frames
    pub fn new(sample_rate: u32, block_size: usize, capture_queue_blocks: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MixState {
                clips: Vec::with_capacity(CLIP_CAPACITY),
                retired: Vec::with_capacity(CLIP_CAPACITY),
                capture: CaptureQueue::new(block_size * capture_queue_blocks),
                gains: Gains::default(),
                sample_rate,
                active: [false; 3],
                next_clip_id: 1,
            })),
            events: None,
        }
    }

    /// Report clip starts and stops on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    // ========================================
    // Real-time paths
    // ========================================

    /// Capture callback: queue one interleaved block
    pub fn render_capture(&self, input: &[f32], channels: u16) {
        let mut state = lock_or_recover(&self.state);
        if state.active[StreamRole::Capture.index()] {
            state.capture.push(input, channels);
        }
    }

    /// Primary output callback: fill interleaved stereo `out` with capture
    /// audio plus every clip, then retire finished clips
    pub fn render_primary(&self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / 2;

        {
            let mut guard = lock_or_recover(&self.state);
            let state = &mut *guard;
            if !state.active[StreamRole::Primary.index()] {
                return;
            }
            let gains = state.gains;
            let monitor_open = state.active[StreamRole::Monitor.index()];

            state.capture.drain_into(out, frames, gains.capture);

            for clip in state.clips.iter_mut() {
                clip.mix_main(out, gains.clips);
            }

            // Removal only after every clip has advanced
            let mut i = 0;
            while i < state.clips.len() {
                if state.clips[i].is_finished(true, monitor_open)
                    && state.retired.len() < state.retired.capacity()
                {
                    let clip = state.clips.remove(i);
                    state.retired.push(clip.into_samples());
                } else {
                    i += 1;
                }
            }
        }

        clip_samples(out);
    }

    /// Monitor output callback: clips only, no capture audio, no removal
    pub fn render_monitor(&self, out: &mut [f32]) {
        out.fill(0.0);

        {
            let mut guard = lock_or_recover(&self.state);
            let state = &mut *guard;
            if !state.active[StreamRole::Monitor.index()] {
                return;
            }
            let gain = state.gains.monitor;

            for clip in state.clips.iter_mut() {
                clip.mix_monitor(out, gain);
            }
        }

        clip_samples(out);
    }

    // ========================================
    // Control paths
    // ========================================

    /// Start playing `buffer` on every open output.
    ///
    /// Fails with `FormatMismatch`, changing nothing, when the buffer's rate
    /// differs from the operating rate.
    pub fn play_clip(&self, buffer: &SampleBuffer) -> Result<ClipId> {
        let stereo = buffer.to_stereo();
        let fresh_retired = Vec::with_capacity(CLIP_CAPACITY);

        let (id, frames, released) = {
            let mut guard = lock_or_recover(&self.state);
            let state = &mut *guard;

            if buffer.sample_rate() != state.sample_rate {
                return Err(Error::FormatMismatch {
                    clip_rate: buffer.sample_rate(),
                    operating_rate: state.sample_rate,
                });
            }

            let released = Self::release_finished(state, fresh_retired);

            let id = ClipId(state.next_clip_id);
            state.next_clip_id += 1;

            let clip = Clip::new(id, stereo);
            let frames = clip.frames();
            state.clips.push(clip);

            (id, frames, released)
        };
        drop(released);

        debug!("Started {} ({} frames)", id, frames);
        self.emit(PadmixEvent::ClipStarted {
            clip_id: id.0,
            frames,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    /// Remove every active clip. From the next callback on none of them is
    /// heard. Returns how many were removed.
    pub fn stop_all(&self) -> usize {
        let fresh = Vec::with_capacity(CLIP_CAPACITY);
        let old = std::mem::replace(&mut lock_or_recover(&self.state).clips, fresh);
        let count = old.len();
        drop(old);

        debug!("Stopped {} clips", count);
        self.emit(PadmixEvent::ClipsStopped {
            count,
            timestamp: Utc::now(),
        });
        count
    }

    pub fn set_capture_gain(&self, gain: f32) {
        lock_or_recover(&self.state).gains.capture = sanitize_gain(gain);
    }

    pub fn set_clip_gain(&self, gain: f32) {
        lock_or_recover(&self.state).gains.clips = sanitize_gain(gain);
    }

    pub fn set_monitor_gain(&self, gain: f32) {
        lock_or_recover(&self.state).gains.monitor = sanitize_gain(gain);
    }

    pub fn set_gains(&self, gains: Gains) {
        lock_or_recover(&self.state).gains = Gains {
            capture: sanitize_gain(gains.capture),
            clips: sanitize_gain(gains.clips),
            monitor: sanitize_gain(gains.monitor),
        };
    }

    pub fn gains(&self) -> Gains {
        lock_or_recover(&self.state).gains
    }

    /// Operating sample rate
    pub fn sample_rate(&self) -> u32 {
        lock_or_recover(&self.state).sample_rate
    }

    /// Whether `role` currently has an open stream
    pub fn is_active(&self, role: StreamRole) -> bool {
        lock_or_recover(&self.state).active[role.index()]
    }

    /// Clips that still have audio left on some open output
    pub fn active_clips(&self) -> usize {
        let state = lock_or_recover(&self.state);
        let (primary_open, monitor_open) = state.outputs_open();
        state
            .clips
            .iter()
            .filter(|c| !c.is_finished(primary_open, monitor_open))
            .count()
    }

    /// Progress of every clip in the active set
    pub fn clip_status(&self) -> Vec<ClipStatus> {
        lock_or_recover(&self.state)
            .clips
            .iter()
            .map(Clip::status)
            .collect()
    }

    /// Frames waiting in the capture queue
    pub fn queued_capture_frames(&self) -> usize {
        lock_or_recover(&self.state).capture.len()
    }

    // ========================================
    // Stream lifecycle hooks (used by `Mixer`)
    // ========================================

    /// Record that `role` opened or closed.
    ///
    /// Until a role is marked active its callback renders silence. Closing
    /// capture drops queued capture audio; clip cursors are left alone, so
    /// an output reopened on another device resumes mid-clip. `Mixer` calls
    /// this as streams open and close.
    pub fn set_role_active(&self, role: StreamRole, active: bool) {
        let mut state = lock_or_recover(&self.state);
        state.active[role.index()] = active;
        if role == StreamRole::Capture && !active {
            state.capture.clear();
        }
    }

    /// Switch the operating rate, dropping all clips and queued capture
    /// audio recorded at the old rate. Returns the previous rate.
    pub(crate) fn set_sample_rate(&self, sample_rate: u32) -> u32 {
        let fresh = Vec::with_capacity(CLIP_CAPACITY);
        let (old_rate, old_clips) = {
            let mut guard = lock_or_recover(&self.state);
            let state = &mut *guard;
            let old_rate = std::mem::replace(&mut state.sample_rate, sample_rate);
            state.capture.clear();
            (old_rate, std::mem::replace(&mut state.clips, fresh))
        };
        drop(old_clips);
        old_rate
    }

    /// Purge finished clips and swap out the retirement list. Runs on the
    /// control thread; the caller drops the returned storage after unlock.
    fn release_finished(state: &mut MixState, fresh: Vec<Arc<[f32]>>) -> Vec<Arc<[f32]>> {
        let mut released = std::mem::replace(&mut state.retired, fresh);
        let (primary_open, monitor_open) = state.outputs_open();
        let mut i = 0;
        while i < state.clips.len() {
            if state.clips[i].is_finished(primary_open, monitor_open) {
                released.push(state.clips.remove(i).into_samples());
            } else {
                i += 1;
            }
        }
        released
    }

    fn emit(&self, event: PadmixEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

/// Hard-clip to [-1, 1]
fn clip_samples(out: &mut [f32]) {
    for sample in out.iter_mut() {
        *sample = sample.clamp(-1.0, 1.0);
    }
}

fn sanitize_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain.max(0.0)
    } else {
        0.0
    }
}
