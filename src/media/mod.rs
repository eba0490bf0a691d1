// Media processing layer
//
// Wraps ffmpeg/ffprobe behind a trait so the pipeline never builds process
// invocations itself:
// - Commands: abstract command construction for extraction and muxing
// - Processor: ffmpeg-based implementation

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// A synthesized speech clip placed on the source video timeline.
#[derive(Debug, Clone)]
pub struct TimedClip {
    pub path: PathBuf,
    /// Where the clip starts, in seconds from the beginning of the video.
    pub start_secs: f64,
    /// Window the clip must fit into; longer audio is trimmed to this.
    pub max_duration_secs: f64,
}

/// Main trait for media processing operations
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Extract the audio track as 16 kHz mono PCM for transcription
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Assemble the dubbed output: source video stream plus synthesized
    /// clips placed at their segment positions
    async fn mux_dub(
        &self,
        video_path: &Path,
        clips: &[TimedClip],
        output_path: &Path,
    ) -> Result<()>;

    /// Check that the underlying binaries are available
    fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (ffmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::FfmpegProcessor::new(config))
    }
}
