use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::{MediaCommandBuilder, MediaProcessorTrait, TimedClip};
use crate::config::MediaConfig;
use crate::error::{FukikaeError, Result};

/// Concrete implementation of media processor (ffmpeg-based)
pub struct FfmpegProcessor {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegProcessor {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path);

        Self {
            config,
            command_builder,
        }
    }

    fn check_binary(&self, binary_path: &str) -> Result<()> {
        let output = std::process::Command::new(binary_path)
            .arg("-version")
            .output()
            .map_err(|e| FukikaeError::Media(format!("{} not found: {}", binary_path, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(FukikaeError::Media(format!(
                "{} version check failed",
                binary_path
            )))
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for FfmpegProcessor {
    /// Extract audio from video
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!(
            "Extracting audio from {} to {}",
            video_path.display(),
            audio_path.display()
        );

        let command = self.command_builder.extract_audio(video_path, audio_path);
        command.execute().await?;

        info!("Audio extraction completed");
        Ok(())
    }

    /// Duration of a media file in seconds, via ffprobe
    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        debug!("Probing duration of {}", media_path.display());

        let output = tokio::process::Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media_path)
            .output()
            .await
            .map_err(|e| FukikaeError::Media(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Media(format!(
                "ffprobe failed for {}: {}",
                media_path.display(),
                stderr
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let duration = text.trim().parse::<f64>().map_err(|e| {
            FukikaeError::Media(format!("Unreadable duration '{}': {}", text.trim(), e))
        })?;

        Ok(duration)
    }

    /// Assemble the dubbed output file
    async fn mux_dub(
        &self,
        video_path: &Path,
        clips: &[TimedClip],
        output_path: &Path,
    ) -> Result<()> {
        if clips.is_empty() {
            return Err(FukikaeError::Media(
                "No synthesized clips to mix".to_string(),
            ));
        }

        info!(
            "Muxing {} dubbed clips into {}",
            clips.len(),
            output_path.display()
        );

        let command = self.command_builder.mux_dub(
            video_path,
            clips,
            output_path,
            self.config.keep_background_audio,
            self.config.background_volume,
        );
        command.execute().await?;

        info!("Dub muxing completed");
        Ok(())
    }

    /// Check that ffmpeg and ffprobe are available
    fn check_availability(&self) -> Result<()> {
        self.check_binary(&self.config.ffmpeg_path)?;
        self.check_binary(&self.config.ffprobe_path)?;
        info!("Media processor is available");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> FfmpegProcessor {
        FfmpegProcessor::new(MediaConfig {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            keep_background_audio: true,
            background_volume: 0.3,
        })
    }

    #[tokio::test]
    async fn test_mux_rejects_empty_clip_list() {
        let err = processor()
            .mux_dub(Path::new("in.mp4"), &[], Path::new("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FukikaeError::Media(_)));
    }
}
