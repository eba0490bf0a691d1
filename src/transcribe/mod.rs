// Modular transcription architecture
//
// This module provides different transcription implementations through a
// factory pattern:
// - WhisperCpp: whisper.cpp binary with JSON output
// - FasterWhisper: whisper-compatible CTranslate2 CLI
// - WhisperKit: whisperkit-cli (CoreML, Apple Silicon)
// - OpenAi / Groq: OpenAI-compatible transcription API
//
// To add a new transcription service:
// 1. Create service-specific data structures for parsing its output
// 2. Implement the Transcriber trait for your service
// 3. Add the service to the TranscriptionProvider config enum
// 4. Update the factory to create your implementation

pub mod common;
pub mod faster_whisper;
pub mod openai;
pub mod whisper_cpp;
pub mod whisperkit;

use async_trait::async_trait;
use std::path::Path;

pub use common::*;

use crate::config::{TranscriptionConfig, TranscriptionProvider};
use crate::error::Result;
use crate::subtitle::SubtitleSegment;

/// Observer for transcription progress: (current second, percent).
pub type TranscribeProgressFn<'a> = dyn Fn(f64, u8) + Send + Sync + 'a;

/// Main trait for transcription operations
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Verify the backend is usable: binary present, model present, or
    /// credentials configured. Errors name the missing piece.
    fn check_installed(&self) -> Result<()>;

    /// Transcribe an audio file into ordered, timed segments
    async fn transcribe(&self, audio_path: &Path, language: &str)
        -> Result<Vec<SubtitleSegment>>;

    /// Transcribe while reporting progress. Backends without a usable
    /// progress signal fall back to a plain transcription.
    async fn transcribe_with_progress(
        &self,
        audio_path: &Path,
        language: &str,
        _duration_secs: f64,
        _on_progress: &TranscribeProgressFn<'_>,
    ) -> Result<Vec<SubtitleSegment>> {
        self.transcribe(audio_path, language).await
    }
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create a transcriber for the configured provider
    pub fn create_transcriber(config: TranscriptionConfig) -> Box<dyn Transcriber> {
        match config.provider {
            TranscriptionProvider::WhisperCpp => {
                Box::new(whisper_cpp::WhisperCppTranscriber::new(config))
            }
            TranscriptionProvider::FasterWhisper => {
                Box::new(faster_whisper::FasterWhisperTranscriber::new(config))
            }
            TranscriptionProvider::WhisperKit => {
                Box::new(whisperkit::WhisperKitTranscriber::new(config))
            }
            TranscriptionProvider::OpenAi => {
                Box::new(openai::OpenAiTranscriber::new(config, openai::OPENAI_BASE_URL))
            }
            TranscriptionProvider::Groq => {
                Box::new(openai::OpenAiTranscriber::new(config, openai::GROQ_BASE_URL))
            }
        }
    }
}
