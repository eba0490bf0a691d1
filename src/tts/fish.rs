use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{Synthesizer, require_voice_sample};
use crate::config::TtsConfig;
use crate::error::{FukikaeError, Result};

const FISH_BASE_URL: &str = "https://api.fish.audio";

#[derive(Debug, Serialize)]
struct TtsRequest {
    text: String,
    reference_id: String,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct VoiceModel {
    #[serde(rename = "_id")]
    id: String,
}

/// Voice cloning via the fish.audio cloud API. Writes mp3.
///
/// The configured voice sample is uploaded once per pipeline to create a
/// voice model; every segment then references that model by id. When
/// `tts.voice` already names a fish.audio model id, the upload is skipped.
pub struct FishAudioSynthesizer {
    config: TtsConfig,
    client: Client,
    base_url: String,
    voice_id: OnceCell<String>,
}

impl FishAudioSynthesizer {
    pub fn new(config: TtsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout
            .build()
            .expect("HTTP client creation should not fail");

        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| FISH_BASE_URL.to_string());

        Self {
            config,
            client,
            base_url,
            voice_id: OnceCell::new(),
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(FukikaeError::Synthesis(
                "fish-audio synthesis requires an API key; set tts.api_key".to_string(),
            )),
        }
    }

    /// Create a voice model from the configured sample, once.
    async fn upload_voice_model(&self) -> Result<String> {
        let api_key = self.api_key()?.to_string();
        let sample_path = require_voice_sample(&self.config)?.to_path_buf();

        info!("Uploading voice sample {} to fish.audio", sample_path.display());

        let sample_bytes = tokio::fs::read(&sample_path).await?;
        let sample_name = sample_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "sample.wav".to_string());

        let part = multipart::Part::bytes(sample_bytes)
            .file_name(sample_name)
            .mime_str("audio/wav")
            .map_err(|e| {
                FukikaeError::Synthesis(format!("Failed to build voice sample part: {}", e))
            })?;

        let mut form = multipart::Form::new()
            .text("title", format!("fukikae {}", self.config.voice))
            .text("train_mode", "fast")
            .part("voices", part);

        if let Some(transcript) = self.config.sample_text.clone() {
            form = form.text("texts", transcript);
        }

        let url = format!("{}/model", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FukikaeError::Synthesis(format!(
                "fish.audio model upload error {}: {}",
                status, error_text
            )));
        }

        let model: VoiceModel = response
            .json()
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("Failed to parse model response: {}", e)))?;

        info!("fish.audio voice model ready: {}", model.id);
        Ok(model.id)
    }

    async fn resolve_voice_id(&self) -> Result<String> {
        // An explicitly configured model id wins over sample upload
        let configured = self.config.voice.trim();
        if !configured.is_empty() && !configured.contains(' ') && configured.len() >= 16 {
            return Ok(configured.to_string());
        }

        let id = self
            .voice_id
            .get_or_try_init(|| self.upload_voice_model())
            .await?;
        Ok(id.clone())
    }
}

#[async_trait]
impl Synthesizer for FishAudioSynthesizer {
    fn check_installed(&self) -> Result<()> {
        self.api_key()?;
        require_voice_sample(&self.config).map(|_| ())
    }

    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let api_key = self.api_key()?.to_string();
        let reference_id = self.resolve_voice_id().await?;

        debug!(
            "Synthesizing {} chars with fish.audio model {}",
            text.len(),
            reference_id
        );

        let request = TtsRequest {
            text: text.to_string(),
            reference_id,
            format: "mp3",
        };

        let url = format!("{}/v1/tts", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FukikaeError::Synthesis(format!(
                "fish.audio TTS error {}: {}",
                status, error_text
            )));
        }

        let audio_bytes = response
            .bytes()
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("Failed to read audio body: {}", e)))?;

        tokio::fs::write(output_path, &audio_bytes).await?;
        Ok(())
    }

    fn file_extension(&self) -> &'static str {
        "mp3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TtsProvider};

    fn fish_config() -> TtsConfig {
        let mut config = Config::default().tts;
        config.provider = TtsProvider::FishAudio;
        config.api_key = Some("fa-test".to_string());
        config
    }

    #[test]
    fn test_check_installed_requires_key_and_sample() {
        let mut config = fish_config();
        config.api_key = None;
        let err = FishAudioSynthesizer::new(config).check_installed().unwrap_err();
        assert!(err.to_string().contains("tts.api_key"));

        let config = fish_config();
        let err = FishAudioSynthesizer::new(config).check_installed().unwrap_err();
        assert!(err.to_string().contains("voice sample"));
    }

    #[tokio::test]
    async fn test_configured_model_id_skips_upload() {
        let mut config = fish_config();
        config.voice = "802e3bc2b27e49c2995d23ef70e6ac89".to_string();

        let synthesizer = FishAudioSynthesizer::new(config);
        let id = synthesizer.resolve_voice_id().await.unwrap();
        assert_eq!(id, "802e3bc2b27e49c2995d23ef70e6ac89");
    }
}
