//! Audio streams using cpal
//!
//! `CpalHost` implements the `AudioHost` boundary on top of the platform
//! default cpal host: device enumeration plus input/output streams that
//! forward fixed-size f32 blocks to the mixer's callbacks.

use crate::audio::device::{
    AudioHost, DeviceInfo, InputCallback, OutputCallback, StreamHandle, StreamSpec,
};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig, SupportedBufferSize,
};
use padmix_common::StreamRole;
use tracing::{debug, error, info, warn};

/// Sample rate reported for devices that expose no default config
const FALLBACK_SAMPLE_RATE: u32 = 48_000;

/// `AudioHost` backed by cpal's default host.
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    pub fn new() -> Self {
        let host = cpal::default_host();
        info!("Using audio host: {:?}", host.id());
        Self { host }
    }

    fn all_devices(&self) -> Result<Vec<Device>> {
        let devices = self
            .host
            .devices()
            .map_err(|e| Error::AudioHost(format!("Failed to enumerate devices: {}", e)))?;
        Ok(devices.collect())
    }

    fn device_by_index(&self, index: usize) -> Result<Device> {
        self.all_devices()?
            .into_iter()
            .nth(index)
            .ok_or(Error::DeviceNotFound(index))
    }

    fn describe(index: usize, device: &Device) -> DeviceInfo {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let max_input_channels = device
            .supported_input_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);

        let max_output_channels = device
            .supported_output_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);

        let default_sample_rate = device
            .default_output_config()
            .or_else(|_| device.default_input_config())
            .map(|c| c.sample_rate().0)
            .unwrap_or(FALLBACK_SAMPLE_RATE);

        DeviceInfo {
            index,
            name,
            max_input_channels,
            max_output_channels,
            default_sample_rate,
        }
    }

    fn open_error(spec: &StreamSpec, reason: impl std::fmt::Display) -> Error {
        Error::DeviceOpen {
            role: spec.role,
            device: spec.device_index,
            reason: reason.to_string(),
        }
    }

    fn stream_config(spec: &StreamSpec, buffer_size: BufferSize) -> StreamConfig {
        StreamConfig {
            channels: spec.channels,
            sample_rate: SampleRate(spec.sample_rate),
            buffer_size,
        }
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for CpalHost {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let devices: Vec<DeviceInfo> = self
            .all_devices()?
            .iter()
            .enumerate()
            .map(|(index, device)| Self::describe(index, device))
            .collect();

        debug!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    fn device(&self, index: usize) -> Result<DeviceInfo> {
        let device = self.device_by_index(index)?;
        Ok(Self::describe(index, &device))
    }

    fn open_input(&self, spec: &StreamSpec, callback: InputCallback) -> Result<Box<dyn StreamHandle>> {
        let device = self
            .device_by_index(spec.device_index)
            .map_err(|e| Self::open_error(spec, e))?;

        let supported = device
            .default_input_config()
            .map_err(|e| Self::open_error(spec, format!("No input config: {}", e)))?;
        let buffer_size = choose_buffer_size(spec, supported.buffer_size());

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_input::<f32>(&device, spec, buffer_size, callback),
            SampleFormat::I16 => build_input::<i16>(&device, spec, buffer_size, callback),
            SampleFormat::U16 => build_input::<u16>(&device, spec, buffer_size, callback),
            other => Err(Self::open_error(
                spec,
                format!("Unsupported sample format: {:?}", other),
            )),
        }?;

        start(stream, spec)
    }

    fn open_output(
        &self,
        spec: &StreamSpec,
        callback: OutputCallback,
    ) -> Result<Box<dyn StreamHandle>> {
        let device = self
            .device_by_index(spec.device_index)
            .map_err(|e| Self::open_error(spec, e))?;

        let supported = device
            .default_output_config()
            .map_err(|e| Self::open_error(spec, format!("No output config: {}", e)))?;
        let buffer_size = choose_buffer_size(spec, supported.buffer_size());

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_output::<f32>(&device, spec, buffer_size, callback),
            SampleFormat::I16 => build_output::<i16>(&device, spec, buffer_size, callback),
            SampleFormat::U16 => build_output::<u16>(&device, spec, buffer_size, callback),
            other => Err(Self::open_error(
                spec,
                format!("Unsupported sample format: {:?}", other),
            )),
        }?;

        start(stream, spec)
    }
}

/// Start a built stream and wrap it as a handle
fn start(stream: Stream, spec: &StreamSpec) -> Result<Box<dyn StreamHandle>> {
    stream
        .play()
        .map_err(|e| CpalHost::open_error(spec, format!("Failed to start stream: {}", e)))?;

    info!(
        "{} stream started: device={}, {}Hz, {} channels, block={}",
        spec.role, spec.device_index, spec.sample_rate, spec.channels, spec.block_size
    );

    Ok(Box::new(CpalStream {
        stream,
        role: spec.role,
    }))
}

/// Fixed block size when the device accepts it, device default otherwise
fn choose_buffer_size(spec: &StreamSpec, supported: &SupportedBufferSize) -> BufferSize {
    match supported {
        SupportedBufferSize::Range { min, max } if !(*min..=*max).contains(&spec.block_size) => {
            warn!(
                "{} stream: block of {} frames outside device range {}..={}, using device default",
                spec.role, spec.block_size, min, max
            );
            BufferSize::Default
        }
        _ => BufferSize::Fixed(spec.block_size),
    }
}

/// Build an input stream converting device samples to f32 blocks.
///
/// The conversion buffer is allocated here, once; the callback only
/// copies into it.
fn build_input<T>(
    device: &Device,
    spec: &StreamSpec,
    buffer_size: BufferSize,
    mut callback: InputCallback,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let config = CpalHost::stream_config(spec, buffer_size);
    let block_samples = spec.block_size as usize * spec.channels.max(1) as usize;
    let role = spec.role;

    let mut scratch = vec![0.0f32; block_samples];

    let result = device.build_input_stream(
        &config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for chunk in data.chunks(scratch.len()) {
                let block = &mut scratch[..chunk.len()];
                for (dst, &src) in block.iter_mut().zip(chunk.iter()) {
                    *dst = f32::from_sample(src);
                }
                callback(block);
            }
        },
        move |err| {
            error!("{} stream error: {}", role, err);
        },
        None,
    );

    result.map_err(|e| CpalHost::open_error(spec, format!("Failed to build stream: {}", e)))
}

/// Build an output stream filling device samples from f32 blocks.
fn build_output<T>(
    device: &Device,
    spec: &StreamSpec,
    buffer_size: BufferSize,
    mut callback: OutputCallback,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let config = CpalHost::stream_config(spec, buffer_size);
    let block_samples = spec.block_size as usize * spec.channels.max(1) as usize;
    let role = spec.role;

    let mut scratch = vec![0.0f32; block_samples];

    let result = device.build_output_stream(
        &config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for chunk in data.chunks_mut(scratch.len()) {
                let block = &mut scratch[..chunk.len()];
                callback(block);
                for (dst, &src) in chunk.iter_mut().zip(block.iter()) {
                    *dst = T::from_sample(src);
                }
            }
        },
        move |err| {
            error!("{} stream error: {}", role, err);
        },
        None,
    );

    result.map_err(|e| CpalHost::open_error(spec, format!("Failed to build stream: {}", e)))
}

/// A started cpal stream bound to one role
struct CpalStream {
    stream: Stream,
    role: StreamRole,
}

impl StreamHandle for CpalStream {
    fn stop(self: Box<Self>) -> Result<()> {
        if let Err(e) = self.stream.pause() {
            warn!("{} stream: pause before close failed: {}", self.role, e);
        }
        // Dropping the stream closes it and joins the backend's audio thread
        drop(self.stream);
        info!("{} stream stopped", self.role);
        Ok(())
    }
}
