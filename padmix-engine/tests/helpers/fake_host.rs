//! In-memory audio host
//!
//! Streams never run on their own: tests call `drive_output` and
//! `push_input` to invoke the registered callbacks, one block at a time.

use padmix_common::StreamRole;
use padmix_engine::audio::{
    AudioHost, DeviceInfo, InputCallback, OutputCallback, StreamHandle, StreamSpec,
};
use padmix_engine::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

enum Callback {
    Input(Arc<Mutex<InputCallback>>),
    Output(Arc<Mutex<OutputCallback>>),
}

struct OpenStream {
    id: u64,
    spec: StreamSpec,
    callback: Callback,
}

#[derive(Default)]
struct FakeHostState {
    devices: Vec<DeviceInfo>,
    failing: HashSet<usize>,
    streams: HashMap<StreamRole, OpenStream>,
    opened: Vec<StreamSpec>,
    closed: Vec<StreamRole>,
    next_id: u64,
}

/// Cloneable handle; clones share state, so a test keeps one clone while
/// the mixer owns another.
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<FakeHostState>>,
}

/// Output-only device
pub fn output_device(index: usize, name: &str, sample_rate: u32) -> DeviceInfo {
    DeviceInfo {
        index,
        name: name.to_string(),
        max_input_channels: 0,
        max_output_channels: 2,
        default_sample_rate: sample_rate,
    }
}

/// Input-only device
pub fn input_device(index: usize, name: &str, channels: u16, sample_rate: u32) -> DeviceInfo {
    DeviceInfo {
        index,
        name: name.to_string(),
        max_input_channels: channels,
        max_output_channels: 0,
        default_sample_rate: sample_rate,
    }
}

impl FakeHost {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        let host = Self::default();
        host.state.lock().unwrap().devices = devices;
        host
    }

    /// Make every open on `index` fail
    pub fn fail_device(&self, index: usize) {
        self.state.lock().unwrap().failing.insert(index);
    }

    /// Let opens on `index` succeed again
    pub fn heal_device(&self, index: usize) {
        self.state.lock().unwrap().failing.remove(&index);
    }

    /// Run `role`'s output callback for `frames` stereo frames
    pub fn drive_output(&self, role: StreamRole, frames: usize) -> Option<Vec<f32>> {
        let (callback, channels) = {
            let state = self.state.lock().unwrap();
            let stream = state.streams.get(&role)?;
            match &stream.callback {
                Callback::Output(cb) => (Arc::clone(cb), stream.spec.channels as usize),
                Callback::Input(_) => return None,
            }
        };

        let mut out = vec![f32::NAN; frames * channels];
        let mut callback = callback.lock().unwrap();
        (*callback)(&mut out);
        Some(out)
    }

    /// Run the capture callback with one interleaved block
    pub fn push_input(&self, samples: &[f32]) -> bool {
        let callback = {
            let state = self.state.lock().unwrap();
            match state.streams.get(&StreamRole::Capture).map(|s| &s.callback) {
                Some(Callback::Input(cb)) => Arc::clone(cb),
                _ => return false,
            }
        };

        let mut callback = callback.lock().unwrap();
        (*callback)(samples);
        true
    }

    pub fn is_open(&self, role: StreamRole) -> bool {
        self.state.lock().unwrap().streams.contains_key(&role)
    }

    pub fn spec(&self, role: StreamRole) -> Option<StreamSpec> {
        self.state.lock().unwrap().streams.get(&role).map(|s| s.spec)
    }

    /// Every stream opened so far, in order
    pub fn opened(&self) -> Vec<StreamSpec> {
        self.state.lock().unwrap().opened.clone()
    }

    /// Every stream stopped so far, in order
    pub fn closed(&self) -> Vec<StreamRole> {
        self.state.lock().unwrap().closed.clone()
    }

    fn register(&self, spec: &StreamSpec, callback: Callback) -> Result<Box<dyn StreamHandle>> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(&spec.device_index) {
            return Err(Error::DeviceOpen {
                role: spec.role,
                device: spec.device_index,
                reason: "injected failure".to_string(),
            });
        }
        if state.streams.contains_key(&spec.role) {
            return Err(Error::AudioHost(format!("{} stream already open", spec.role)));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.streams.insert(
            spec.role,
            OpenStream {
                id,
                spec: *spec,
                callback,
            },
        );
        state.opened.push(*spec);

        Ok(Box::new(FakeStream {
            state: Arc::clone(&self.state),
            role: spec.role,
            id,
        }))
    }
}

impl AudioHost for FakeHost {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.state.lock().unwrap().devices.clone())
    }

    fn open_input(&self, spec: &StreamSpec, callback: InputCallback) -> Result<Box<dyn StreamHandle>> {
        self.register(spec, Callback::Input(Arc::new(Mutex::new(callback))))
    }

    fn open_output(&self, spec: &StreamSpec, callback: OutputCallback) -> Result<Box<dyn StreamHandle>> {
        self.register(spec, Callback::Output(Arc::new(Mutex::new(callback))))
    }
}

struct FakeStream {
    state: Arc<Mutex<FakeHostState>>,
    role: StreamRole,
    id: u64,
}

impl StreamHandle for FakeStream {
    fn stop(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.streams.get(&self.role).map(|s| s.id) == Some(self.id) {
            state.streams.remove(&self.role);
        }
        state.closed.push(self.role);
        Ok(())
    }
}
