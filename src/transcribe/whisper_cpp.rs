use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::{TranscribeProgressFn, Transcriber, common};
use crate::config::TranscriptionConfig;
use crate::error::{FukikaeError, Result};
use crate::subtitle::SubtitleSegment;

/// Whisper.cpp JSON output format (`-oj`)
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperCppOutput {
    pub transcription: Vec<WhisperCppUtterance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhisperCppUtterance {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Whisper.cpp reports offsets in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: u64,
    pub to: u64,
}

impl WhisperCppOutput {
    fn into_segments(self) -> Vec<SubtitleSegment> {
        self.transcription
            .into_iter()
            .map(|utt| {
                SubtitleSegment::new(
                    utt.offsets.from as f64 / 1000.0,
                    utt.offsets.to as f64 / 1000.0,
                    utt.text.trim(),
                )
            })
            .collect()
    }
}

/// Whisper.cpp implementation, wrapping the whisper-cli binary
pub struct WhisperCppTranscriber {
    config: TranscriptionConfig,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, audio_path: &Path, language: &str, output_base: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.config.binary_path);
        cmd.arg("-m")
            .arg(&self.config.model)
            .arg("-f")
            .arg(audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(output_base);

        // whisper.cpp defaults to English; detection must be asked for
        let lang = if common::is_auto_language(language) {
            "auto"
        } else {
            language
        };
        cmd.arg("-l").arg(lang);
        cmd
    }

    async fn read_output_json(&self, output_base: &Path) -> Result<Vec<SubtitleSegment>> {
        let json_file = output_base.with_extension("json");
        let json_content = tokio::fs::read_to_string(&json_file).await.map_err(|e| {
            FukikaeError::Transcription(format!(
                "Failed to read whisper output {}: {}",
                json_file.display(),
                e
            ))
        })?;

        let output: WhisperCppOutput = serde_json::from_str(&json_content).map_err(|e| {
            FukikaeError::Transcription(format!("Failed to parse whisper.cpp JSON: {}", e))
        })?;

        Ok(output.into_segments())
    }
}

/// Extract the percent from whisper.cpp progress lines on stderr,
/// e.g. `whisper_print_progress_callback: progress =  15%`.
fn parse_progress_line(line: &str) -> Option<u8> {
    let idx = line.find("progress")?;
    let rest = &line[idx..];
    let pct_end = rest.find('%')?;
    let digits: String = rest[..pct_end]
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u8>().ok().map(|p| p.min(100))
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    fn check_installed(&self) -> Result<()> {
        common::check_binary(
            &self.config.binary_path,
            "-h",
            "Build whisper.cpp and set transcription.binary_path",
        )?;

        if !Path::new(&self.config.model).exists() {
            return Err(FukikaeError::Transcription(format!(
                "Whisper model file not found: {}. Download a ggml model and set transcription.model",
                self.config.model
            )));
        }
        Ok(())
    }

    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<SubtitleSegment>> {
        info!("Transcribing {} with whisper.cpp", audio_path.display());

        let temp_dir = tempfile::tempdir().map_err(|e| {
            FukikaeError::Transcription(format!("Failed to create temp directory: {}", e))
        })?;
        let output_base = temp_dir.path().join("transcript");

        let output = self
            .build_command(audio_path, language, &output_base)
            .output()
            .await
            .map_err(|e| {
                FukikaeError::Transcription(format!("Failed to execute whisper-cli: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Transcription(format!(
                "whisper-cli failed: {}",
                stderr
            )));
        }

        self.read_output_json(&output_base).await
    }

    async fn transcribe_with_progress(
        &self,
        audio_path: &Path,
        language: &str,
        duration_secs: f64,
        on_progress: &TranscribeProgressFn<'_>,
    ) -> Result<Vec<SubtitleSegment>> {
        info!(
            "Transcribing {} with whisper.cpp (progress on)",
            audio_path.display()
        );

        let temp_dir = tempfile::tempdir().map_err(|e| {
            FukikaeError::Transcription(format!("Failed to create temp directory: {}", e))
        })?;
        let output_base = temp_dir.path().join("transcript");

        let mut cmd = self.build_command(audio_path, language, &output_base);
        cmd.arg("--print-progress");

        let mut child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FukikaeError::Transcription(format!("Failed to spawn whisper-cli: {}", e))
            })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            FukikaeError::Transcription("Failed to capture whisper-cli stderr".to_string())
        })?;

        // Drain stderr before waiting so the child never blocks on a full pipe
        let mut stderr_log = Vec::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = lines.next_line().await.map_err(|e| {
            FukikaeError::Transcription(format!("Failed to read whisper-cli stderr: {}", e))
        })? {
            if let Some(percent) = parse_progress_line(&line) {
                debug!("whisper.cpp progress: {}%", percent);
                on_progress(duration_secs * percent as f64 / 100.0, percent);
            } else {
                stderr_log.push(line);
            }
        }

        let status = child.wait().await.map_err(|e| {
            FukikaeError::Transcription(format!("Failed to wait for whisper-cli: {}", e))
        })?;

        if !status.success() {
            return Err(FukikaeError::Transcription(format!(
                "whisper-cli failed: {}",
                stderr_log.join("\n")
            )));
        }

        self.read_output_json(&output_base).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line_parsing() {
        assert_eq!(
            parse_progress_line("whisper_print_progress_callback: progress =  15%"),
            Some(15)
        );
        assert_eq!(
            parse_progress_line("whisper_print_progress_callback: progress = 100%"),
            Some(100)
        );
        assert_eq!(parse_progress_line("whisper_init_state: compute buffer"), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[test]
    fn test_output_offsets_are_milliseconds() {
        let json = r#"{
            "transcription": [
                {"offsets": {"from": 0, "to": 2400}, "text": " Hello"},
                {"offsets": {"from": 2400, "to": 5000}, "text": " world"}
            ]
        }"#;

        let output: WhisperCppOutput = serde_json::from_str(json).unwrap();
        let segments = output.into_segments();
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.4);
        assert_eq!(segments[1].end, 5.0);
        assert_eq!(segments[1].source_text, "world");
    }

    #[test]
    fn test_command_requests_json_and_language() {
        let transcriber = WhisperCppTranscriber::new(TranscriptionConfig {
            provider: crate::config::TranscriptionProvider::WhisperCpp,
            binary_path: "whisper-cli".to_string(),
            model: "ggml-base.bin".to_string(),
            api_key: None,
            endpoint: None,
        });

        let cmd = transcriber.build_command(
            Path::new("audio.wav"),
            "auto",
            Path::new("/tmp/transcript"),
        );
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert!(args.windows(2).any(|w| w == ["-m", "ggml-base.bin"]));
        assert!(args.contains(&"-oj".to_string()));
        assert!(args.windows(2).any(|w| w == ["-l", "auto"]));
    }
}
