use serde::{Deserialize, Serialize};

use crate::error::{FukikaeError, Result};
use crate::subtitle::SubtitleSegment;

/// JSON shape shared by openai-whisper style tools: the python CLI,
/// whisper-compatible CLIs, whisperkit reports, and the `verbose_json`
/// transcription API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperJsonOutput {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<WhisperJsonSegment>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperJsonSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Parse whisper-style JSON into pipeline segments, preserving order.
pub fn segments_from_whisper_json(json: &str) -> Result<Vec<SubtitleSegment>> {
    let output: WhisperJsonOutput = serde_json::from_str(json)
        .map_err(|e| FukikaeError::Transcription(format!("Failed to parse whisper JSON: {}", e)))?;

    Ok(output
        .segments
        .into_iter()
        .map(|seg| SubtitleSegment::new(seg.start, seg.end, seg.text.trim()))
        .collect())
}

/// Whether the configured source language requests provider-side detection.
pub fn is_auto_language(language: &str) -> bool {
    language.trim().is_empty() || language.eq_ignore_ascii_case("auto")
}

/// Probe a local CLI by running it with a help flag.
pub fn check_binary(binary_path: &str, help_flag: &str, install_hint: &str) -> Result<()> {
    let output = std::process::Command::new(binary_path)
        .arg(help_flag)
        .output()
        .map_err(|e| {
            FukikaeError::Transcription(format!(
                "{} not found: {}. {}",
                binary_path, e, install_hint
            ))
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(FukikaeError::Transcription(format!(
            "{} is not usable: {}",
            binary_path, stderr
        )))
    }
}
