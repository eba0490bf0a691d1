use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::Synthesizer;
use crate::config::TtsConfig;
use crate::error::{FukikaeError, Result};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "tts-1";

#[derive(Debug, Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
    voice: String,
    speed: f32,
    response_format: &'static str,
}

/// OpenAI speech API implementation. Writes mp3.
pub struct OpenAiSynthesizer {
    config: TtsConfig,
    client: Client,
    base_url: String,
}

impl OpenAiSynthesizer {
    pub fn new(config: TtsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout
            .build()
            .expect("HTTP client creation should not fail");

        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        Self {
            config,
            client,
            base_url,
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(FukikaeError::Synthesis(
                "openai synthesis requires an API key; set tts.api_key".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    fn check_installed(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let api_key = self.api_key()?.to_string();

        let request = SpeechRequest {
            model: self
                .config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            input: text.to_string(),
            voice: self.config.voice.clone(),
            speed: self.config.speed,
            response_format: "mp3",
        };

        let url = format!("{}/audio/speech", self.base_url);
        debug!("Sending speech request to: {}", url);

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
                "Speech API error {}: {}",
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
    use crate::config::Config;

    #[test]
    fn test_missing_api_key_is_reported() {
        let mut config = Config::default().tts;
        config.provider = crate::config::TtsProvider::OpenAi;
        config.api_key = None;

        let synthesizer = OpenAiSynthesizer::new(config);
        let err = synthesizer.check_installed().unwrap_err();
        assert!(err.to_string().contains("tts.api_key"));
    }
}
