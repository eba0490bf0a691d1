use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::{Transcriber, common};
use crate::config::TranscriptionConfig;
use crate::error::{FukikaeError, Result};
use crate::subtitle::SubtitleSegment;

/// WhisperKit implementation, wrapping whisperkit-cli (CoreML backend on
/// Apple Silicon). The `--report` JSON carries whisper-style segments.
pub struct WhisperKitTranscriber {
    config: TranscriptionConfig,
}

impl WhisperKitTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transcriber for WhisperKitTranscriber {
    fn check_installed(&self) -> Result<()> {
        common::check_binary(
            &self.config.binary_path,
            "--help",
            "Install with: brew install whisperkit-cli (macOS only)",
        )
    }

    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<SubtitleSegment>> {
        info!("Transcribing {} with whisperkit", audio_path.display());

        let temp_dir = tempfile::tempdir().map_err(|e| {
            FukikaeError::Transcription(format!("Failed to create temp directory: {}", e))
        })?;
        let report_dir = temp_dir.path();

        let mut cmd = tokio::process::Command::new(&self.config.binary_path);
        cmd.arg("transcribe")
            .arg("--audio-path")
            .arg(audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--report")
            .arg("--report-path")
            .arg(report_dir);

        if !common::is_auto_language(language) {
            cmd.arg("--language").arg(language);
        }

        let output = cmd.output().await.map_err(|e| {
            FukikaeError::Transcription(format!("Failed to execute whisperkit-cli: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Transcription(format!(
                "whisperkit-cli failed: {}",
                stderr
            )));
        }

        let audio_stem = audio_path.file_stem().ok_or_else(|| {
            FukikaeError::Transcription("Invalid audio filename".to_string())
        })?;
        let report_file = report_dir.join(format!("{}.json", audio_stem.to_string_lossy()));

        let json_content = tokio::fs::read_to_string(&report_file).await.map_err(|e| {
            FukikaeError::Transcription(format!(
                "Failed to read whisperkit report {}: {}",
                report_file.display(),
                e
            ))
        })?;

        common::segments_from_whisper_json(&json_content)
    }
}
