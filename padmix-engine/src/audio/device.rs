//! Audio subsystem boundary
//!
//! The mixer talks to hardware only through `AudioHost`: enumerate devices,
//! open a stream for a role with a callback, stop it synchronously.
//! `CpalHost` (see `output.rs`) is the real implementation.

use crate::error::Result;
use padmix_common::StreamRole;

/// One enumerated audio device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Stable index within one enumeration
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: u32,
}

/// Name fragments of common virtual cable / loopback drivers
const LOOPBACK_HINTS: &[&str] = &["cable", "loopback", "blackhole", "voicemeeter", "virtual"];

impl DeviceInfo {
    /// Usable for the capture role
    pub fn can_capture(&self) -> bool {
        self.max_input_channels > 0
    }

    /// Usable for the primary or monitor role
    pub fn can_play(&self) -> bool {
        self.max_output_channels > 0
    }

    /// Name suggests a virtual cable suitable for the primary output
    pub fn looks_like_loopback(&self) -> bool {
        let name = self.name.to_lowercase();
        LOOPBACK_HINTS.iter().any(|hint| name.contains(hint))
    }

    /// Channel count to open a capture stream with: stereo when offered
    pub fn capture_channels(&self) -> u16 {
        if self.max_input_channels >= 2 {
            2
        } else {
            1
        }
    }
}

/// Parameters for opening one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub role: StreamRole,
    pub device_index: usize,
    pub sample_rate: u32,
    /// Frames per callback block
    pub block_size: u32,
    pub channels: u16,
}

/// Capture callback: receives interleaved frames with `StreamSpec::channels`
pub type InputCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Output callback: fills interleaved frames with `StreamSpec::channels`
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// An open, started hardware stream
pub trait StreamHandle {
    /// Stop and close the stream. Returns once the callback will no
    /// longer be invoked and the device is released.
    fn stop(self: Box<Self>) -> Result<()>;
}

/// Audio subsystem
pub trait AudioHost {
    /// Enumerate all devices
    fn devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Look up one device by index
    fn device(&self, index: usize) -> Result<DeviceInfo> {
        self.devices()?
            .into_iter()
            .find(|d| d.index == index)
            .ok_or(crate::error::Error::DeviceNotFound(index))
    }

    /// Open and start a capture stream
    fn open_input(&self, spec: &StreamSpec, callback: InputCallback) -> Result<Box<dyn StreamHandle>>;

    /// Open and start an output stream
    fn open_output(&self, spec: &StreamSpec, callback: OutputCallback)
        -> Result<Box<dyn StreamHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, inputs: u16, outputs: u16) -> DeviceInfo {
        DeviceInfo {
            index: 0,
            name: name.to_string(),
            max_input_channels: inputs,
            max_output_channels: outputs,
            default_sample_rate: 48000,
        }
    }

    #[test]
    fn test_role_filters() {
        let mic = device("USB Microphone", 1, 0);
        assert!(mic.can_capture());
        assert!(!mic.can_play());
        assert_eq!(mic.capture_channels(), 1);

        let interface = device("Audio Interface", 8, 8);
        assert_eq!(interface.capture_channels(), 2);
    }

    #[test]
    fn test_loopback_detection() {
        assert!(device("CABLE Input (VB-Audio Virtual Cable)", 0, 2).looks_like_loopback());
        assert!(device("BlackHole 2ch", 2, 2).looks_like_loopback());
        assert!(!device("Built-in Speakers", 0, 2).looks_like_loopback());
    }
}
