//! Microphone capture using CPAL
//!
//! The CPAL callback runs on the platform's real-time audio thread. It only slices
//! samples into fixed-size frames and pushes them into a handoff channel; every
//! decision is made later on the controller's event loop.

use crate::config::AudioConfig;
use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A fixed-size block of mono PCM samples in [-1, 1].
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Monotonic per-stream sequence number (arrival order).
    pub seq: u64,
    pub samples: Vec<f32>,
    /// Timestamp when captured
    pub captured_at: Instant,
}

impl AudioFrame {
    pub fn new(seq: u64, samples: Vec<f32>) -> Self {
        Self {
            seq,
            samples,
            captured_at: Instant::now(),
        }
    }
}

/// Owner of one microphone stream. At most one stream is open per instance.
///
/// Not `Send`: CPAL streams are pinned to the thread that built them on some hosts.
pub trait CaptureDevice {
    /// Open the stream and push frames into `frames`. Idempotent while open.
    ///
    /// Stream failures after a successful start are reported on `faults`.
    fn start(
        &mut self,
        frames: mpsc::UnboundedSender<AudioFrame>,
        faults: mpsc::UnboundedSender<String>,
    ) -> VoiceResult<()>;

    /// Release the stream. Safe to call when already stopped.
    fn stop(&mut self);

    fn is_open(&self) -> bool;
}

/// Audio capture system using CPAL
pub struct CpalCapture {
    config: AudioConfig,
    stream: Option<Stream>,
}

impl CpalCapture {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// List available input devices
    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices()?;

        let mut device_names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                device_names.push(name);
            }
        }

        Ok(device_names)
    }

    fn build_stream(
        &self,
        frames: mpsc::UnboundedSender<AudioFrame>,
        faults: mpsc::UnboundedSender<String>,
    ) -> VoiceResult<Stream> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::DeviceUnavailable("No input device available".to_string()))?;

        info!(
            "📱 Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        // Fails when the device is gone or permission was denied
        let default_config = device.default_input_config()?;
        debug!("🔧 Default config: {:?}", default_config);

        if self.config.echo_cancellation || self.config.noise_suppression || self.config.auto_gain {
            // CPAL exposes raw device streams; these flags are honoured by hosts that
            // apply voice processing on the default communications device.
            debug!(
                echo_cancellation = self.config.echo_cancellation,
                noise_suppression = self.config.noise_suppression,
                auto_gain = self.config.auto_gain,
                "capture processing requested"
            );
        }

        let stream_config = StreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let frame_size = self.config.frame_size;
        let mut pending = Vec::with_capacity(frame_size);
        let mut seq: u64 = 0;

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Append-only: slice into frames and hand off, never touch session state here
                for &sample in data {
                    pending.push(sample);
                    if pending.len() >= frame_size {
                        let samples =
                            std::mem::replace(&mut pending, Vec::with_capacity(frame_size));
                        let frame = AudioFrame::new(seq, samples);
                        seq += 1;
                        if frames.send(frame).is_err() {
                            // Receiver gone: the controller is shutting down
                            return;
                        }
                    }
                }
            },
            move |err| {
                warn!("Audio stream error: {}", err);
                let _ = faults.send(err.to_string());
            },
            None, // No timeout
        )?;

        stream.play()?;
        Ok(stream)
    }
}

impl CaptureDevice for CpalCapture {
    fn start(
        &mut self,
        frames: mpsc::UnboundedSender<AudioFrame>,
        faults: mpsc::UnboundedSender<String>,
    ) -> VoiceResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        info!(
            "🎤 Starting audio capture ({}Hz, {} channel, {} samples/frame)",
            self.config.sample_rate, self.config.channels, self.config.frame_size
        );
        let stream = self.build_stream(frames, faults)?;
        self.stream = Some(stream);
        info!("✅ Audio capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("⏹️ Audio capture stopped");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stream = None;
    }
}

/// Root-mean-square energy of a frame.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5; 480]) - 0.5).abs() < 1e-6);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn capture_starts_closed() {
        let capture = CpalCapture::new(AudioConfig::default());
        assert!(!capture.is_open());
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_list_devices() {
        let result = CpalCapture::list_input_devices();
        if let Ok(devices) = result {
            println!("Available input devices: {:?}", devices);
        }
    }
}
