//! Clip: one playback request with a cursor per output role

use std::fmt;
use std::sync::Arc;

/// Identifier handed out by `play_clip`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

/// An in-flight clip.
///
/// `samples` is interleaved stereo shared with the cache. `pos_main` is
/// advanced by the primary output, `pos_mon` by the monitor output; both
/// only move forward and never pass `frames`.
#[derive(Debug)]
pub struct Clip {
    id: ClipId,
    samples: Arc<[f32]>,
    frames: usize,
    pos_main: usize,
    pos_mon: usize,
}

/// Snapshot of a clip's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipStatus {
    pub id: ClipId,
    pub frames: usize,
    pub pos_main: usize,
    pub pos_mon: usize,
}

impl Clip {
    /// New clip over interleaved stereo `samples`, both cursors at zero
    pub fn new(id: ClipId, samples: Arc<[f32]>) -> Self {
        let frames = samples.len() / 2;
        Self {
            id,
            samples,
            frames,
            pos_main: 0,
            pos_mon: 0,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn status(&self) -> ClipStatus {
        ClipStatus {
            id: self.id,
            frames: self.frames,
            pos_main: self.pos_main,
            pos_mon: self.pos_mon,
        }
    }

    /// Every open output has played the clip to the end.
    ///
    /// A closed output does not hold the clip, but its cursor is kept so a
    /// reopened stream resumes where the old one stopped.
    pub fn is_finished(&self, primary_open: bool, monitor_open: bool) -> bool {
        (!primary_open || self.pos_main >= self.frames)
            && (!monitor_open || self.pos_mon >= self.frames)
    }

    /// Mix the next `out.len() / 2` frames into `out` for the primary output
    pub fn mix_main(&mut self, out: &mut [f32], gain: f32) -> usize {
        mix_from(&self.samples, self.frames, &mut self.pos_main, out, gain)
    }

    /// Mix the next `out.len() / 2` frames into `out` for the monitor output
    pub fn mix_monitor(&mut self, out: &mut [f32], gain: f32) -> usize {
        mix_from(&self.samples, self.frames, &mut self.pos_mon, out, gain)
    }

    /// Give up the sample storage
    pub fn into_samples(self) -> Arc<[f32]> {
        self.samples
    }
}

/// Add frames `[pos, pos + n)` times `gain` into `out` and advance `pos`
/// by the frames actually read. Past the end contributes nothing.
fn mix_from(samples: &[f32], frames: usize, pos: &mut usize, out: &mut [f32], gain: f32) -> usize {
    let wanted = out.len() / 2;
    let take = wanted.min(frames.saturating_sub(*pos));
    if take == 0 {
        return 0;
    }

    let src = &samples[*pos * 2..(*pos + take) * 2];
    for (dst, &s) in out[..take * 2].iter_mut().zip(src) {
        *dst += s * gain;
    }

    *pos += take;
    take
}
