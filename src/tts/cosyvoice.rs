use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{Synthesizer, require_voice_sample};
use crate::config::TtsConfig;
use crate::error::{FukikaeError, Result};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:50000";

/// Zero-shot voice cloning against a locally served CosyVoice instance.
///
/// Talks to the server's `/inference_zero_shot` endpoint: a multipart form
/// with the text to speak, the transcript of the reference recording, and
/// the recording itself; the response body is the synthesized WAV.
pub struct CosyVoiceSynthesizer {
    config: TtsConfig,
    client: Client,
    endpoint: String,
}

impl CosyVoiceSynthesizer {
    pub fn new(config: TtsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout
            .build()
            .expect("HTTP client creation should not fail");

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Self {
            config,
            client,
            endpoint,
        }
    }

    fn sample_text(&self) -> Result<&str> {
        match self.config.sample_text.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(FukikaeError::Synthesis(
                "cosyvoice requires the transcript of the voice sample; set tts.sample_text"
                    .to_string(),
            )),
        }
    }
}

#[async_trait]
impl Synthesizer for CosyVoiceSynthesizer {
    fn check_installed(&self) -> Result<()> {
        require_voice_sample(&self.config)?;
        self.sample_text().map(|_| ())
    }

    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let sample_path = require_voice_sample(&self.config)?.to_path_buf();
        let sample_text = self.sample_text()?.to_string();

        debug!(
            "Synthesizing {} chars with cosyvoice at {}",
            text.len(),
            self.endpoint
        );

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

        let form = multipart::Form::new()
            .text("tts_text", text.to_string())
            .text("prompt_text", sample_text)
            .part("prompt_wav", part);

        let url = format!("{}/inference_zero_shot", self.endpoint);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                FukikaeError::Synthesis(format!(
                    "Failed to reach CosyVoice at {}: {}",
                    self.endpoint, e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FukikaeError::Synthesis(format!(
                "CosyVoice error {}: {}",
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
}
