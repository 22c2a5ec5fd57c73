//! Voice configuration loaded from file and environment.
//!
//! Precedence: env `OPSDECK_VOICE_CONFIG` path > `config/voice.toml` > defaults, then
//! `OPSDECK_*` environment overrides (`__` separates sections, e.g. `OPSDECK_REALTIME__MODEL`).
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | OPSDECK_SESSION__MODE | push_to_talk | `push_to_talk` or `always_on` |
//! | OPSDECK_SESSION__FULL_DUPLEX | false | Keep listening while the assistant speaks (echo-cancelled setups only) |
//! | OPSDECK_SESSION__INTENT_SOURCE | remote | `remote` (model function calls) or `local` (keyword router) |
//! | OPSDECK_REALTIME__API_KEY / OPENAI_API_KEY | - | Realtime endpoint credentials |
//! | OPSDECK_SYNTHESIS__ELEVENLABS_API_KEY / ELEVENLABS_API_KEY | - | Primary synthesis provider |

use crate::error::{VoiceError, VoiceResult};
use crate::session::{IntentSource, ListeningMode};
use serde::Deserialize;
use std::path::Path;

/// Microphone capture settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 24000, the wire convention)
    pub sample_rate: u32,
    /// Number of channels (default: 1 for mono)
    pub channels: u16,
    /// Frame size in samples (default: 480 = 20ms at 24kHz)
    pub frame_size: usize,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
            frame_size: 480,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain: true,
        }
    }
}

impl AudioConfig {
    pub fn frame_duration(&self) -> std::time::Duration {
        let micros = self.frame_size as u64 * 1_000_000 / u64::from(self.sample_rate.max(1));
        std::time::Duration::from_micros(micros)
    }
}

/// Energy VAD settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// RMS level at or above which a frame counts as speech.
    pub threshold: f32,
    /// Silence that must elapse before the detector deasserts.
    pub silence_timeout_ms: u64,
    /// Multiplier applied to RMS for the UI volume meter.
    pub meter_gain: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.015,
            silence_timeout_ms: 1000,
            meter_gain: 5.0,
        }
    }
}

/// Remote realtime service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
    pub voice: String,
    pub instructions: String,
    pub transcription_model: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime".to_string(),
            model: "gpt-4o-realtime-preview".to_string(),
            api_key: String::new(),
            voice: "alloy".to_string(),
            instructions: "You are the OpsDeck operations assistant. Keep answers short. \
                           Use the provided functions to change tasks; never invent task ids."
                .to_string(),
            transcription_model: "whisper-1".to_string(),
        }
    }
}

impl RealtimeConfig {
    /// Full endpoint including the model query parameter.
    pub fn endpoint(&self) -> String {
        if self.url.contains('?') {
            self.url.clone()
        } else {
            format!("{}?model={}", self.url.trim_end_matches('/'), self.model)
        }
    }
}

/// Session behaviour (explicit constructor configuration for the controller).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: ListeningMode,
    /// Allow listening while the assistant is speaking. Off unless echo cancellation is trusted.
    pub full_duplex: bool,
    /// Finalized messages kept in the conversation log.
    pub conversation_window: usize,
    /// Recorded as `createdBy` on tasks created by voice.
    pub operator_id: String,
    pub intent_source: IntentSource,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: ListeningMode::PushToTalk,
            full_duplex: false,
            conversation_window: 20,
            operator_id: "voice-operator".to_string(),
            intent_source: IntentSource::Remote,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub toggle: String,
    pub push_to_talk: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle: "F9".to_string(),
            push_to_talk: "F8".to_string(),
        }
    }
}

/// Synthesis providers, tried in order ElevenLabs -> OpenAI -> platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub elevenlabs_api_key: String,
    pub elevenlabs_voice_id: String,
    pub elevenlabs_model: String,
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_voice: String,
    pub platform_command: String,
    pub platform_args: Vec<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            elevenlabs_api_key: String::new(),
            elevenlabs_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            elevenlabs_model: "eleven_multilingual_v2".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: String::new(),
            openai_model: "tts-1".to_string(),
            openai_voice: "nova".to_string(),
            platform_command: default_platform_command().to_string(),
            platform_args: default_platform_args(),
        }
    }
}

fn default_platform_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak-ng"
    }
}

fn default_platform_args() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec![
            "--data-format=LEI16@24000".to_string(),
            "-o".to_string(),
            "/dev/stdout".to_string(),
        ]
    } else {
        vec!["--stdout".to_string()]
    }
}

/// Dashboard REST backend used by command handlers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_token: String::new(),
            timeout_secs: 15,
        }
    }
}

/// Top-level configuration for the voice pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub realtime: RealtimeConfig,
    pub session: SessionConfig,
    pub hotkeys: HotkeyConfig,
    pub synthesis: SynthesisConfig,
    pub backend: BackendConfig,
}

impl VoiceConfig {
    /// Load config from file and environment. Precedence: env `OPSDECK_VOICE_CONFIG` path > `config/voice.toml` > defaults.
    pub fn load() -> VoiceResult<Self> {
        let config_path =
            std::env::var("OPSDECK_VOICE_CONFIG").unwrap_or_else(|_| "config/voice.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load with an explicit file path; a missing file falls back to defaults.
    pub fn load_from(path: &Path) -> VoiceResult<Self> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("OPSDECK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;

        let mut cfg: VoiceConfig = built
            .try_deserialize()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        cfg.apply_key_fallbacks();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_key_fallbacks(&mut self) {
        if self.realtime.api_key.trim().is_empty() {
            self.realtime.api_key = env_string("OPENAI_API_KEY");
        }
        if self.synthesis.openai_api_key.trim().is_empty() {
            self.synthesis.openai_api_key = self.realtime.api_key.clone();
        }
        if self.synthesis.elevenlabs_api_key.trim().is_empty() {
            self.synthesis.elevenlabs_api_key = env_string("ELEVENLABS_API_KEY");
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> VoiceResult<()> {
        if self.audio.sample_rate == 0 {
            return Err(VoiceError::Config("audio.sample_rate must be > 0".to_string()));
        }
        if self.audio.channels != 1 {
            return Err(VoiceError::Config(format!(
                "audio.channels must be 1 (mono), got {}",
                self.audio.channels
            )));
        }
        if self.audio.frame_size == 0 {
            return Err(VoiceError::Config("audio.frame_size must be > 0".to_string()));
        }
        if !(self.vad.threshold > 0.0 && self.vad.threshold < 1.0) {
            return Err(VoiceError::Config(format!(
                "vad.threshold must be in (0, 1), got {}",
                self.vad.threshold
            )));
        }
        if self.session.conversation_window == 0 {
            return Err(VoiceError::Config(
                "session.conversation_window must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> String {
    std::env::var(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_wire_conventions() {
        let cfg = VoiceConfig::default();
        assert_eq!(cfg.audio.sample_rate, 24000);
        assert_eq!(cfg.audio.channels, 1);
        assert!(cfg.audio.echo_cancellation && cfg.audio.noise_suppression && cfg.audio.auto_gain);
        assert_eq!(cfg.vad.silence_timeout_ms, 1000);
        assert_eq!(cfg.session.conversation_window, 20);
        assert!(!cfg.session.full_duplex);
        assert_eq!(cfg.audio.frame_duration(), std::time::Duration::from_millis(20));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn endpoint_appends_model() {
        let cfg = RealtimeConfig::default();
        assert_eq!(
            cfg.endpoint(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn loads_toml_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[session]\nmode = \"always_on\"\nconversation_window = 5\n\n[vad]\nthreshold = 0.05\n"
        )
        .unwrap();

        let cfg = VoiceConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.session.mode, ListeningMode::AlwaysOn);
        assert_eq!(cfg.session.conversation_window, 5);
        assert!((cfg.vad.threshold - 0.05).abs() < 1e-6);
        // untouched sections keep defaults
        assert_eq!(cfg.audio.sample_rate, 24000);
    }

    #[test]
    fn rejects_stereo_capture() {
        let mut cfg = VoiceConfig::default();
        cfg.audio.channels = 2;
        assert!(matches!(cfg.validate(), Err(VoiceError::Config(_))));
    }
}
