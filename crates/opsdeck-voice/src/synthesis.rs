//! Text-to-speech providers and the ordered fallback chain.
//!
//! Used for locally spoken notifications (connection loss, device errors). The
//! assistant's own replies arrive as audio from the realtime channel.

use crate::codec::{wrap_wav, PcmDecoder};
use crate::config::SynthesisConfig;
use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One synthesis provider. Returns playable bytes (WAV or MP3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

fn http_client(timeout: Duration) -> VoiceResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| VoiceError::Synthesis(e.to_string()))
}

async fn audio_bytes(provider: &str, res: reqwest::Response) -> VoiceResult<Vec<u8>> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(VoiceError::Synthesis(format!(
            "{} API error {}: {}",
            provider, status, body
        )));
    }
    let bytes = res
        .bytes()
        .await
        .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// ElevenLabs text-to-speech (MP3).
pub struct ElevenLabsTts {
    api_key: String,
    voice_id: String,
    model: String,
    client: Client,
}

impl ElevenLabsTts {
    pub fn new(
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        Ok(Self {
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model: model.into(),
            client: http_client(Duration::from_secs(30))?,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id
        );
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model,
        });
        let res = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        audio_bytes("ElevenLabs", res).await
    }
}

/// OpenAI-compatible `/audio/speech` endpoint.
pub struct OpenAiTts {
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    client: Client,
}

impl OpenAiTts {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            client: http_client(Duration::from_secs(60))?,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiTts {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": "wav",
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        audio_bytes("OpenAI TTS", res).await
    }
}

/// Last resort: a local command (`espeak-ng --stdout`, `say`) writing audio to stdout.
/// Raw PCM16 output is wrapped in a WAV header.
pub struct PlatformTts {
    command: String,
    args: Vec<String>,
    sample_rate: u32,
}

impl PlatformTts {
    pub fn new(command: impl Into<String>, args: Vec<String>, sample_rate: u32) -> Self {
        Self {
            command: command.into(),
            args,
            sample_rate,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for PlatformTts {
    fn name(&self) -> &str {
        "platform"
    }

    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let output = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VoiceError::Synthesis(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(VoiceError::Synthesis(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.starts_with(b"RIFF") {
            return Ok(output.stdout);
        }
        let samples = PcmDecoder::new().push_bytes(&output.stdout);
        Ok(wrap_wav(&samples, self.sample_rate))
    }
}

/// Tries providers in order and stops at the first non-empty success.
pub struct FallbackSynthesizer {
    providers: Vec<Arc<dyn SpeechSynthesizer>>,
}

impl FallbackSynthesizer {
    pub fn new(providers: Vec<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { providers }
    }

    /// ElevenLabs (when keyed), then OpenAI (when keyed), then the platform command.
    pub fn from_config(config: &SynthesisConfig, sample_rate: u32) -> VoiceResult<Self> {
        let mut providers: Vec<Arc<dyn SpeechSynthesizer>> = Vec::new();
        if !config.elevenlabs_api_key.trim().is_empty() {
            providers.push(Arc::new(ElevenLabsTts::new(
                config.elevenlabs_api_key.trim(),
                &config.elevenlabs_voice_id,
                &config.elevenlabs_model,
            )?));
        }
        if !config.openai_api_key.trim().is_empty() {
            providers.push(Arc::new(OpenAiTts::new(
                &config.openai_base_url,
                config.openai_api_key.trim(),
                &config.openai_model,
                &config.openai_voice,
            )?));
        }
        if !config.platform_command.trim().is_empty() {
            providers.push(Arc::new(PlatformTts::new(
                config.platform_command.trim(),
                config.platform_args.clone(),
                sample_rate,
            )));
        }
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        info!("🗣️ Synthesis chain: {}", names.join(" -> "));
        Ok(Self::new(providers))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl SpeechSynthesizer for FallbackSynthesizer {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.synthesize(text).await {
                Ok(bytes) if !bytes.is_empty() => {
                    debug!(provider = provider.name(), bytes = bytes.len(), "synthesized");
                    return Ok(bytes);
                }
                Ok(_) => {
                    warn!("Synthesis provider {} returned no audio", provider.name());
                    failures.push(format!("{}: empty audio", provider.name()));
                }
                Err(e) => {
                    warn!("Synthesis provider {} failed: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(VoiceError::Synthesis("no providers configured".to_string()));
        }
        Err(VoiceError::Synthesis(failures.join("; ")))
    }
}
