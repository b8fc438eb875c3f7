//! Bounded capture queue
//!
//! Captured blocks wait here until the primary output drains them. The two
//! streams run on independent clocks, so the queue is capped: a ring of
//! `max_frames` stereo frames allocated up front, where a push into a full
//! ring overwrites the oldest frames.

use ringbuf::{traits::*, HeapRb};

/// One stereo frame
pub type Frame = [f32; 2];

/// FIFO of captured stereo frames with a frame bound
pub struct CaptureQueue {
    ring: HeapRb<Frame>,
}

impl CaptureQueue {
    /// Create a queue holding at most `max_frames`
    pub fn new(max_frames: usize) -> Self {
        Self {
            ring: HeapRb::new(max_frames.max(1)),
        }
    }

    /// Queue one interleaved block with `channels` channels.
    ///
    /// Mono is duplicated to both sides; channels past the second are
    /// ignored. Over the bound, the oldest frames are dropped.
    pub fn push(&mut self, samples: &[f32], channels: u16) {
        let channels = channels as usize;
        match channels {
            0 => {}
            1 => {
                for &s in samples {
                    self.ring.push_overwrite([s, s]);
                }
            }
            _ => {
                for f in samples.chunks_exact(channels) {
                    self.ring.push_overwrite([f[0], f[1]]);
                }
            }
        }
    }

    /// Add up to `frames` queued frames, times `gain`, into the interleaved
    /// stereo buffer `out`. Returns the number of frames drained; the rest
    /// of `out` is left untouched.
    pub fn drain_into(&mut self, out: &mut [f32], frames: usize, gain: f32) -> usize {
        let mut written = 0;
        for (pair, frame) in out
            .chunks_exact_mut(2)
            .take(frames)
            .zip(self.ring.pop_iter())
        {
            pair[0] += frame[0] * gain;
            pair[1] += frame[1] * gain;
            written += 1;
        }
        written
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        while self.ring.try_pop().is_some() {}
    }

    /// Frames currently queued
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl std::fmt::Debug for CaptureQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureQueue")
            .field("queued", &self.len())
            .field("capacity", &self.ring.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(frames: usize, value: f32) -> Vec<f32> {
        vec![value; frames * 2]
    }

    #[test]
    fn test_bound_keeps_newest_blocks() {
        let mut queue = CaptureQueue::new(1280);
        for i in 0..10 {
            queue.push(&block(256, i as f32), 2);
        }

        assert_eq!(queue.len(), 1280);

        // Oldest surviving block is the sixth one pushed, newest the tenth
        let mut out = vec![0.0; 1280 * 2];
        assert_eq!(queue.drain_into(&mut out, 1280, 1.0), 1280);
        assert_eq!(&out[..2], &[5.0, 5.0]);
        assert_eq!(&out[out.len() - 2..], &[9.0, 9.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_small_pushes_fill_to_the_bound() {
        let mut queue = CaptureQueue::new(1280);
        for i in 0..40 {
            queue.push(&block(64, i as f32), 2);
        }

        // 40 x 64 frames pushed, the newest 20 pushes survive
        assert_eq!(queue.len(), 1280);
        let mut out = vec![0.0; 2];
        queue.drain_into(&mut out, 1, 1.0);
        assert_eq!(out, vec![20.0, 20.0]);
    }

    #[test]
    fn test_partial_drain_splits_block() {
        let mut queue = CaptureQueue::new(1280);
        let samples: Vec<f32> = (0..8).map(|i| i as f32).collect(); // 4 frames
        queue.push(&samples, 2);

        let mut out = vec![0.0; 6];
        assert_eq!(queue.drain_into(&mut out, 3, 1.0), 3);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(queue.len(), 1);

        let mut out = vec![0.0; 6];
        assert_eq!(queue.drain_into(&mut out, 3, 1.0), 1);
        assert_eq!(out, vec![6.0, 7.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_mono_is_duplicated_and_gain_applied() {
        let mut queue = CaptureQueue::new(16);
        queue.push(&[0.5, -0.5], 1);

        let mut out = vec![0.0; 4];
        queue.drain_into(&mut out, 2, 0.5);
        assert_eq!(out, vec![0.25, 0.25, -0.25, -0.25]);
    }

    #[test]
    fn test_wide_input_keeps_first_two_channels() {
        let mut queue = CaptureQueue::new(16);
        queue.push(&[0.1, 0.2, 0.9, 0.9], 4);

        let mut out = vec![0.0; 2];
        queue.drain_into(&mut out, 1, 1.0);
        assert_eq!(out, vec![0.1, 0.2]);
    }

    #[test]
    fn test_oversized_block_keeps_its_newest_frames() {
        let mut queue = CaptureQueue::new(4);
        let samples: Vec<f32> = (0..6).flat_map(|i| [i as f32, i as f32]).collect();
        queue.push(&samples, 2);

        assert_eq!(queue.len(), 4);
        let mut out = vec![0.0; 2];
        queue.drain_into(&mut out, 1, 1.0);
        assert_eq!(out, vec![2.0, 2.0]);
    }

    #[test]
    fn test_clear_empties_queue() {
        let mut queue = CaptureQueue::new(1280);
        queue.push(&block(256, 1.0), 2);
        queue.push(&block(256, 1.0), 2);
        queue.clear();

        assert!(queue.is_empty());

        let mut out = vec![0.0; 4];
        assert_eq!(queue.drain_into(&mut out, 2, 1.0), 0);
        assert_eq!(out, vec![0.0; 4]);
    }
}
