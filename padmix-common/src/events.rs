//! Event types for the padmix event system
//!
//! Status and progress of device changes, loads and playback are reported
//! asynchronously to whoever subscribes (UI shell, CLI, tests).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Hardware stream role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRole {
    /// Microphone capture, mixed into the primary output only
    Capture,
    /// Primary output (capture + clips), usually a loopback/virtual cable
    Primary,
    /// Local monitor output (clips only)
    Monitor,
}

impl StreamRole {
    /// All roles in the order they are assigned
    pub const ALL: [StreamRole; 3] = [StreamRole::Capture, StreamRole::Primary, StreamRole::Monitor];

    /// Stable index, usable for fixed-size per-role arrays
    pub fn index(self) -> usize {
        match self {
            StreamRole::Capture => 0,
            StreamRole::Primary => 1,
            StreamRole::Monitor => 2,
        }
    }
}

impl std::fmt::Display for StreamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamRole::Capture => write!(f, "capture"),
            StreamRole::Primary => write!(f, "primary"),
            StreamRole::Monitor => write!(f, "monitor"),
        }
    }
}

/// Padmix event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PadmixEvent {
    /// A role's stream was opened and started
    StreamOpened {
        role: StreamRole,
        device_index: usize,
        device_name: String,
        sample_rate: u32,
        timestamp: DateTime<Utc>,
    },

    /// A role's stream was stopped and closed
    StreamClosed {
        role: StreamRole,
        timestamp: DateTime<Utc>,
    },

    /// Opening a role's stream failed; the role stays closed
    StreamFailed {
        role: StreamRole,
        device_index: usize,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Operating sample rate changed (primary output device changed)
    SampleRateChanged {
        old_rate: u32,
        new_rate: u32,
        timestamp: DateTime<Utc>,
    },

    /// Decoded-audio cache was emptied because the target format changed
    CacheCleared {
        sample_rate: u32,
        channels: u16,
        timestamp: DateTime<Utc>,
    },

    /// A file was resolved to a sample buffer
    LoadCompleted {
        path: String,
        frames: usize,
        from_cache: bool,
        timestamp: DateTime<Utc>,
    },

    /// A file could not be decoded
    LoadFailed {
        path: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Cache warm-up progress
    WarmupProgress {
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A clip was added to the active set
    ClipStarted {
        clip_id: u64,
        frames: usize,
        timestamp: DateTime<Utc>,
    },

    /// All active clips were cleared
    ClipsStopped {
        count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PadmixEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            PadmixEvent::StreamOpened { .. } => "StreamOpened",
            PadmixEvent::StreamClosed { .. } => "StreamClosed",
            PadmixEvent::StreamFailed { .. } => "StreamFailed",
            PadmixEvent::SampleRateChanged { .. } => "SampleRateChanged",
            PadmixEvent::CacheCleared { .. } => "CacheCleared",
            PadmixEvent::LoadCompleted { .. } => "LoadCompleted",
            PadmixEvent::LoadFailed { .. } => "LoadFailed",
            PadmixEvent::WarmupProgress { .. } => "WarmupProgress",
            PadmixEvent::ClipStarted { .. } => "ClipStarted",
            PadmixEvent::ClipsStopped { .. } => "ClipsStopped",
        }
    }
}

/// Broadcast channel for `PadmixEvent`s
///
/// Cloning shares the same channel. Emitting with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PadmixEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Broadcast an event to all subscribers
    pub fn emit(&self, event: PadmixEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PadmixEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
