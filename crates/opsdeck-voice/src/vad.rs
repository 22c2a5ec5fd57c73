//! Energy-based Voice Activity Detection with hysteresis
//!
//! Asserts "active" on the first frame whose RMS reaches the threshold and only
//! deasserts after a full silence timeout without another active frame. Time is
//! measured in audio (frame durations), so the detector is deterministic for a
//! given signal regardless of wall-clock jitter.

use crate::audio::rms;
use crate::config::VadConfig;
use std::time::Duration;
use tracing::debug;

/// Edge emitted when the activity decision flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadTransition {
    Activated,
    Deactivated,
}

/// Per-frame output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadDecision {
    pub is_active: bool,
    /// Meter level in [0, 1], independent of the activity decision.
    pub volume: f32,
    pub transition: Option<VadTransition>,
}

/// Voice activity detector: RMS gate + silence timer.
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    active: bool,
    silence: Duration,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            active: false,
            silence: Duration::ZERO,
        }
    }

    /// Feed one frame covering `frame_duration` of audio.
    pub fn process(&mut self, samples: &[f32], frame_duration: Duration) -> VadDecision {
        let energy = rms(samples);
        let volume = (energy * self.config.meter_gain).clamp(0.0, 1.0);
        let mut transition = None;

        if energy >= self.config.threshold {
            self.silence = Duration::ZERO;
            if !self.active {
                self.active = true;
                transition = Some(VadTransition::Activated);
                debug!(rms = energy, "🎤 VAD active");
            }
        } else if self.active {
            self.silence += frame_duration;
            if self.silence >= self.silence_timeout() {
                self.active = false;
                self.silence = Duration::ZERO;
                transition = Some(VadTransition::Deactivated);
                debug!("🤫 VAD inactive after silence timeout");
            }
        }

        VadDecision {
            is_active: self.active,
            volume,
            transition,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.config.silence_timeout_ms)
    }

    /// Forget any in-progress activity (new turn, mode switch).
    pub fn reset(&mut self) {
        self.active = false;
        self.silence = Duration::ZERO;
    }
}
