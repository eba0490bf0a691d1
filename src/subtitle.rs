use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::Result;

/// One transcribed utterance, carried through the whole pipeline.
///
/// Transcription fills `start`, `end` and `source_text`; translation fills
/// `translated_text`; synthesis fills `audio_path`. Timing always refers to
/// the source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleSegment {
    /// Start offset in seconds from the beginning of the video.
    pub start: f64,
    /// End offset in seconds, strictly greater than `start`.
    pub end: f64,
    pub source_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

impl SubtitleSegment {
    pub fn new(start: f64, end: f64, source_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            source_text: source_text.into(),
            translated_text: None,
            audio_path: None,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Translated text when present, source text otherwise.
    pub fn display_text(&self) -> &str {
        match self.translated_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.source_text,
        }
    }

    /// Segments with inverted timing or no speech are dropped before
    /// translation, so downstream stages never see them.
    pub fn is_usable(&self) -> bool {
        self.start >= 0.0 && self.end > self.start && !self.source_text.trim().is_empty()
    }
}

/// Generate an SRT subtitle file alongside the dubbed output.
pub async fn generate_srt<P: AsRef<Path>>(
    segments: &[SubtitleSegment],
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        let start_time = format_srt_time(segment.start);
        let end_time = format_srt_time(segment.end);

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            start_time,
            end_time,
            segment.display_text().trim()
        ));
    }

    fs::write(output_path, srt_content).await?;

    info!("SRT file generated successfully");
    Ok(())
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.500), "01:01:01,500");
    }

    #[test]
    fn test_display_text_prefers_translation() {
        let mut segment = SubtitleSegment::new(0.0, 2.0, "Hello");
        assert_eq!(segment.display_text(), "Hello");

        segment.translated_text = Some("こんにちは".to_string());
        assert_eq!(segment.display_text(), "こんにちは");

        segment.translated_text = Some("   ".to_string());
        assert_eq!(segment.display_text(), "Hello");
    }

    #[test]
    fn test_usability_filter() {
        assert!(SubtitleSegment::new(0.0, 1.5, "speech").is_usable());
        assert!(!SubtitleSegment::new(2.0, 2.0, "zero length").is_usable());
        assert!(!SubtitleSegment::new(3.0, 1.0, "inverted").is_usable());
        assert!(!SubtitleSegment::new(0.0, 1.0, "   ").is_usable());
    }

    #[test]
    fn test_generate_srt_writes_numbered_cues() {
        let mut first = SubtitleSegment::new(0.0, 1.5, "Hello");
        first.translated_text = Some("こんにちは".to_string());
        let second = SubtitleSegment::new(1.5, 3.0, "world");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let content = tokio_test::block_on(async {
            generate_srt(&[first, second], &path).await.unwrap();
            tokio::fs::read_to_string(&path).await.unwrap()
        });

        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:01,500\nこんにちは\n"));
        assert!(content.contains("2\n00:00:01,500 --> 00:00:03,000\nworld\n"));
    }
}
