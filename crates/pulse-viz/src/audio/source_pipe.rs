//! Audio device capture and stream management.
//!
//! Handles audio input from system devices using cpal, managing device
//! enumeration, stream creation, and a ring buffer for sample storage.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

use crate::utils::Config;

pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

type SampleRing = Arc<Mutex<VecDeque<f32>>>;

pub struct DeviceInfo {
    pub device: cpal::Device,
    pub name: String,
}

pub struct SourcePipe {
    buffer: SampleRing,
    capacity: usize,
    devices: Vec<DeviceInfo>,
    current_device: Option<usize>,
    sample_rate: f32,
    _stream: Option<Stream>,
    // Auto-gain normalization state
    smoothed_peak: f32,
    target_level: f32,
}

fn lock(buffer: &SampleRing) -> MutexGuard<'_, VecDeque<f32>> {
    // A panicked audio callback leaves plain samples behind, still usable
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SourcePipe {
    /// Open the configured (or default) input device, keeping the newest
    /// `capacity` mono samples. No device means silence, not failure.
    pub fn new(config: &Config, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let devices = Self::collect_devices();
        let buffer = Arc::new(Mutex::new(VecDeque::from(vec![0.0; capacity])));

        let start_index = config
            .device
            .as_ref()
            .and_then(|name| devices.iter().position(|d| d.name == *name))
            .or_else(|| {
                let host = cpal::default_host();
                let default_name = host.default_input_device().and_then(|d| d.name().ok());
                default_name.and_then(|name| devices.iter().position(|d| d.name == name))
            })
            .or(if devices.is_empty() { None } else { Some(0) });

        let timeout = Duration::from_secs(config.device_timeout_secs());
        let mut sample_rate = DEFAULT_SAMPLE_RATE;
        let stream = match start_index {
            Some(index) => {
                let opened = Self::build_stream(&devices[index], Arc::clone(&buffer), capacity, timeout);
                if let Some((_, rate)) = &opened {
                    sample_rate = *rate;
                    info!("[{}] Capturing: {} @ {}Hz", index, devices[index].name, rate);
                }
                opened.map(|(stream, _)| stream)
            }
            None => {
                warn!("No audio input devices found, running silent");
                None
            }
        };

        Self {
            buffer,
            capacity,
            devices,
            current_device: start_index,
            sample_rate,
            _stream: stream,
            smoothed_peak: 0.1, // Start with a reasonable default
            target_level: 0.5,  // Target peak level for normalization
        }
    }

    /// Print every input device (for `--list-devices`)
    pub fn list_devices() {
        let host = cpal::default_host();
        println!("\n=== Audio Input Devices ===");
        if let Ok(inputs) = host.input_devices() {
            for (idx, device) in inputs.enumerate() {
                if let Ok(name) = device.name() {
                    println!("  [{}] {}", idx, name);
                }
            }
        }
        println!("Set `device = \"<name>\"` in ~/.pulse-viz.toml to pick one\n");
    }

    fn collect_devices() -> Vec<DeviceInfo> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        if let Ok(input_devices) = host.input_devices() {
            for device in input_devices {
                if let Ok(name) = device.name() {
                    devices.push(DeviceInfo { device, name });
                }
            }
        }

        devices
    }

    /// Get device config with timeout (the config call often hangs on bad devices)
    fn get_config_with_timeout(device: &Device, timeout: Duration) -> Option<StreamConfig> {
        let device_clone = device.clone();

        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let _ = tx.send(device_clone.default_input_config());
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(config)) => Some(config.into()),
            Ok(Err(e)) => {
                warn!("Failed to get device config: {}", e);
                None
            }
            Err(_) => {
                warn!("Device config timed out after {:?}", timeout);
                None
            }
        }
    }

    fn build_stream(
        device_info: &DeviceInfo,
        audio_buffer: SampleRing,
        capacity: usize,
        timeout: Duration,
    ) -> Option<(Stream, f32)> {
        let stream_config = Self::get_config_with_timeout(&device_info.device, timeout)?;
        let channels = (stream_config.channels as usize).max(1);
        let sample_rate = stream_config.sample_rate.0 as f32;

        let err_fn = |err| warn!("Audio stream error: {}", err);

        let stream = device_info.device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut buffer = lock(&audio_buffer);
                for chunk in data.chunks(channels) {
                    let sample: f32 = chunk.iter().sum::<f32>() / chunk.len() as f32;
                    if buffer.len() >= capacity {
                        buffer.pop_front();
                    }
                    buffer.push_back(sample);
                }
            },
            err_fn,
            None,
        );

        match stream {
            Ok(s) => {
                if let Err(e) = s.play() {
                    warn!("Failed to play stream: {}", e);
                    return None;
                }
                Some((s, sample_rate))
            }
            Err(e) => {
                warn!("Failed to build stream: {}", e);
                None
            }
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> Option<&str> {
        self.current_device
            .and_then(|i| self.devices.get(i))
            .map(|d| d.name.as_str())
    }

    /// Grow or shrink the ring, e.g. after the transform size changed
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        let mut buffer = lock(&self.buffer);
        while buffer.len() > capacity {
            buffer.pop_front();
        }
        while buffer.len() < capacity {
            buffer.push_front(0.0);
        }
        self.capacity = capacity;
    }

    /// Current samples, oldest first, with auto-gain normalization
    pub fn stream(&mut self) -> Vec<f32> {
        let samples: Vec<f32> = lock(&self.buffer).iter().copied().collect();
        normalize(&samples, &mut self.smoothed_peak, self.target_level)
    }
}

fn normalize(samples: &[f32], smoothed_peak: &mut f32, target_level: f32) -> Vec<f32> {
    // Calculate current peak level (absolute max)
    let current_peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

    if current_peak > *smoothed_peak {
        // Fast attack when signal gets louder
        *smoothed_peak = *smoothed_peak * 0.8 + current_peak * 0.2;
    } else {
        // Slow release when signal gets quieter
        *smoothed_peak = *smoothed_peak * 0.995 + current_peak * 0.005;
    }

    // Prevent division by zero and limit gain range
    let safe_peak = smoothed_peak.max(0.001);
    let gain = (target_level / safe_peak).clamp(0.5, 10.0);

    samples.iter().map(|s| (s * gain).clamp(-1.0, 1.0)).collect()
}
