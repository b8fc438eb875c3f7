//! Cache warm-up pool
//!
//! A fixed set of worker threads pre-decodes pad files into the
//! `AudioCache` so the first press of a pad does not wait on a decode.
//! Failures are logged and reported as events; they never stop the pool.

use crate::cache::AudioCache;
use crate::error::{Error, Result};
use crate::lock_or_recover;
use chrono::Utc;
use padmix_common::{EventBus, PadmixEvent};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Progress of the current warm-up batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Jobs {
    queue: VecDeque<PathBuf>,
    in_progress: usize,
    stats: WarmupStats,
}

impl Jobs {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_progress == 0
    }
}

/// Shared state for the pool
struct SharedPoolState {
    jobs: Mutex<Jobs>,
    /// Signals workers that jobs arrived or the pool is stopping
    work: Condvar,
    /// Signals waiters that the queue drained
    idle: Condvar,
    stop_flag: AtomicBool,
}

/// Worker pool loading paths into an `AudioCache`
pub struct WarmupPool {
    state: Arc<SharedPoolState>,
    threads: Vec<JoinHandle<()>>,
}

impl WarmupPool {
    /// Start `workers` threads (at least one) loading into `cache`
    pub fn new(cache: Arc<AudioCache>, workers: usize, events: Option<EventBus>) -> Self {
        let state = Arc::new(SharedPoolState {
            jobs: Mutex::new(Jobs::default()),
            work: Condvar::new(),
            idle: Condvar::new(),
            stop_flag: AtomicBool::new(false),
        });

        let workers = workers.max(1);
        let threads = (0..workers)
            .map(|worker_id| {
                let state = Arc::clone(&state);
                let cache = Arc::clone(&cache);
                let events = events.clone();
                thread::spawn(move || Self::worker_loop(worker_id, state, cache, events))
            })
            .collect();

        info!("Warm-up pool started with {} worker threads", workers);

        Self { state, threads }
    }

    /// Queue paths for loading. Returns how many were queued.
    pub fn submit<I>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        if self.state.stop_flag.load(Ordering::Relaxed) {
            return Err(Error::InvalidInput(
                "Warm-up pool is shutting down".to_string(),
            ));
        }

        let queued = {
            let mut jobs = lock_or_recover(&self.state.jobs);
            if jobs.is_idle() {
                jobs.stats = WarmupStats::default();
            }
            let before = jobs.queue.len();
            jobs.queue.extend(paths);
            let queued = jobs.queue.len() - before;
            jobs.stats.total += queued;
            queued
        };

        debug!("Queued {} files for warm-up", queued);
        self.state.work.notify_all();
        Ok(queued)
    }

    /// Block until every queued path has been processed (or the pool stops)
    pub fn wait_idle(&self) -> WarmupStats {
        let mut jobs = lock_or_recover(&self.state.jobs);
        while !jobs.is_idle() && !self.state.stop_flag.load(Ordering::Relaxed) {
            jobs = self
                .state
                .idle
                .wait(jobs)
                .unwrap_or_else(PoisonError::into_inner);
        }
        jobs.stats
    }

    /// Progress of the current batch
    pub fn stats(&self) -> WarmupStats {
        lock_or_recover(&self.state.jobs).stats
    }

    /// Paths queued or being loaded
    pub fn pending(&self) -> usize {
        let jobs = lock_or_recover(&self.state.jobs);
        jobs.queue.len() + jobs.in_progress
    }

    /// Stop the workers and join them. Queued paths are abandoned; loads
    /// already running finish first.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }

        {
            // Flag set under the lock so no worker misses the wakeup
            let mut jobs = lock_or_recover(&self.state.jobs);
            self.state.stop_flag.store(true, Ordering::Relaxed);
            let abandoned = jobs.queue.len();
            jobs.queue.clear();
            if abandoned > 0 {
                debug!("Abandoned {} queued warm-up loads", abandoned);
            }
        }
        self.state.work.notify_all();
        self.state.idle.notify_all();

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("Warm-up worker panicked");
            }
        }
        info!("Warm-up pool stopped");
    }

    fn worker_loop(
        worker_id: usize,
        state: Arc<SharedPoolState>,
        cache: Arc<AudioCache>,
        events: Option<EventBus>,
    ) {
        debug!("Warm-up worker {} started", worker_id);

        loop {
            let path = {
                let mut jobs = lock_or_recover(&state.jobs);
                loop {
                    if state.stop_flag.load(Ordering::Relaxed) {
                        debug!("Warm-up worker {} exiting", worker_id);
                        return;
                    }
                    if let Some(path) = jobs.queue.pop_front() {
                        jobs.in_progress += 1;
                        break path;
                    }
                    jobs = state.work.wait(jobs).unwrap_or_else(PoisonError::into_inner);
                }
            };

            let ok = match cache.load(&path) {
                Ok(buffer) => {
                    debug!(
                        "Worker {} warmed {} ({} frames)",
                        worker_id,
                        path.display(),
                        buffer.frames()
                    );
                    true
                }
                Err(e) => {
                    warn!("Warm-up of {} failed: {}", path.display(), e);
                    false
                }
            };

            let (stats, idle) = {
                let mut jobs = lock_or_recover(&state.jobs);
                jobs.in_progress -= 1;
                jobs.stats.completed += 1;
                if !ok {
                    jobs.stats.failed += 1;
                }
                (jobs.stats, jobs.is_idle())
            };

            if let Some(events) = &events {
                events.emit(PadmixEvent::WarmupProgress {
                    completed: stats.completed,
                    total: stats.total,
                    timestamp: Utc::now(),
                });
            }
            if idle {
                state.idle.notify_all();
            }
        }
    }
}

impl Drop for WarmupPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
