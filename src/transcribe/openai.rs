use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{Transcriber, common};
use crate::config::TranscriptionConfig;
use crate::error::{FukikaeError, Result};
use crate::subtitle::SubtitleSegment;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible transcription API implementation. Hosts both the
/// OpenAI and Groq providers; the wire format is identical, only the base
/// URL and models differ.
pub struct OpenAiTranscriber {
    config: TranscriptionConfig,
    client: Client,
    base_url: String,
}

impl OpenAiTranscriber {
    pub fn new(config: TranscriptionConfig, default_base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout
            .build()
            .expect("HTTP client creation should not fail");

        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());

        Self {
            config,
            client,
            base_url,
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(FukikaeError::Transcription(format!(
                "{} transcription requires an API key; set transcription.api_key",
                self.config.provider
            ))),
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    fn check_installed(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<SubtitleSegment>> {
        info!(
            "Transcribing {} via {} API",
            audio_path.display(),
            self.config.provider
        );

        let api_key = self.api_key()?.to_string();
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        let audio_bytes = tokio::fs::read(audio_path).await?;
        let part = multipart::Part::bytes(audio_bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| {
                FukikaeError::Transcription(format!("Failed to build upload part: {}", e))
            })?;

        let mut form = multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .part("file", part);

        if !common::is_auto_language(language) {
            form = form.text("language", language.to_string());
        }

        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!("Sending transcription request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FukikaeError::Transcription(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FukikaeError::Transcription(format!(
                "Transcription API error {}: {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FukikaeError::Transcription(format!("Failed to read response: {}", e)))?;

        common::segments_from_whisper_json(&body)
    }
}
