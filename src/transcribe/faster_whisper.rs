use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::{Transcriber, common};
use crate::config::TranscriptionConfig;
use crate::error::{FukikaeError, Result};
use crate::subtitle::SubtitleSegment;

/// Faster-whisper implementation, wrapping a whisper-compatible CLI
/// (whisper-ctranslate2 and friends): writes `<stem>.json` into an output
/// directory in the openai-whisper JSON shape.
pub struct FasterWhisperTranscriber {
    config: TranscriptionConfig,
}

impl FasterWhisperTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transcriber for FasterWhisperTranscriber {
    fn check_installed(&self) -> Result<()> {
        common::check_binary(
            &self.config.binary_path,
            "--help",
            "Install with: pip install whisper-ctranslate2",
        )
    }

    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<SubtitleSegment>> {
        info!("Transcribing {} with faster-whisper", audio_path.display());

        let temp_dir = tempfile::tempdir().map_err(|e| {
            FukikaeError::Transcription(format!("Failed to create temp directory: {}", e))
        })?;
        let output_dir = temp_dir.path();

        let mut cmd = tokio::process::Command::new(&self.config.binary_path);
        cmd.arg(audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json");

        if !common::is_auto_language(language) {
            cmd.arg("--language").arg(language);
        }

        let output = cmd.output().await.map_err(|e| {
            FukikaeError::Transcription(format!("Failed to execute faster-whisper: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Transcription(format!(
                "faster-whisper failed: {}",
                stderr
            )));
        }

        let audio_stem = audio_path.file_stem().ok_or_else(|| {
            FukikaeError::Transcription("Invalid audio filename".to_string())
        })?;
        let json_file = output_dir.join(format!("{}.json", audio_stem.to_string_lossy()));

        let json_content = tokio::fs::read_to_string(&json_file).await.map_err(|e| {
            FukikaeError::Transcription(format!(
                "Failed to read faster-whisper output {}: {}",
                json_file.display(),
                e
            ))
        })?;

        common::segments_from_whisper_json(&json_content)
    }
}
