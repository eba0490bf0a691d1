use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::{Synthesizer, check_tts_binary};
use crate::config::TtsConfig;
use crate::error::{FukikaeError, Result};

/// Microsoft Edge neural voices via the edge-tts CLI. Writes mp3.
pub struct EdgeTtsSynthesizer {
    config: TtsConfig,
}

impl EdgeTtsSynthesizer {
    pub fn new(config: TtsConfig) -> Self {
        Self { config }
    }

    /// edge-tts expects rate as a signed percent offset, e.g. 1.25 -> "+25%"
    fn rate_argument(speed: f32) -> String {
        let percent = ((speed - 1.0) * 100.0).round() as i32;
        format!("--rate={:+}%", percent)
    }
}

#[async_trait]
impl Synthesizer for EdgeTtsSynthesizer {
    fn check_installed(&self) -> Result<()> {
        check_tts_binary(
            &self.config.binary_path,
            "Install with: pip install edge-tts",
        )
    }

    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        debug!(
            "Synthesizing {} chars with edge-tts voice {}",
            text.len(),
            self.config.voice
        );

        let output = tokio::process::Command::new(&self.config.binary_path)
            .arg("--voice")
            .arg(&self.config.voice)
            .arg(Self::rate_argument(self.config.speed))
            .arg("--text")
            .arg(text)
            .arg("--write-media")
            .arg(output_path)
            .output()
            .await
            .map_err(|e| FukikaeError::Synthesis(format!("Failed to execute edge-tts: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Synthesis(format!(
                "edge-tts failed: {}",
                stderr
            )));
        }

        Ok(())
    }

    fn file_extension(&self) -> &'static str {
        "mp3"
    }
}
