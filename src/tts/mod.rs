// Modular speech synthesis architecture
//
// This module provides different synthesis implementations through a
// factory pattern:
// - EdgeTts: Microsoft Edge neural voices via the edge-tts CLI
// - Piper: local piper engine, text on stdin
// - OpenAi: OpenAI speech API
// - CosyVoice: locally served CosyVoice with zero-shot voice cloning
// - FishAudio: fish.audio cloud API with voice cloning
//
// The voice-cloning backends (CosyVoice, FishAudio) refuse to run without a
// configured reference recording; that check lives in check_installed so
// preflight validation and the dependency checker both surface it.

pub mod cosyvoice;
pub mod edge;
pub mod fish;
pub mod openai;
pub mod piper;

use async_trait::async_trait;
use std::path::Path;

use crate::config::{TtsConfig, TtsProvider};
use crate::error::{FukikaeError, Result};

/// Main trait for speech synthesis operations
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Verify the backend is usable: binary present, credentials configured,
    /// and for cloning backends a voice sample on disk.
    fn check_installed(&self) -> Result<()>;

    /// Synthesize one segment's text into an audio file at `output_path`
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()>;

    /// File extension matching the audio container this backend emits
    fn file_extension(&self) -> &'static str {
        "wav"
    }
}

/// Factory for creating synthesizer instances
pub struct SynthesizerFactory;

impl SynthesizerFactory {
    /// Create a synthesizer for the configured provider
    pub fn create_synthesizer(config: TtsConfig) -> Box<dyn Synthesizer> {
        match config.provider {
            TtsProvider::EdgeTts => Box::new(edge::EdgeTtsSynthesizer::new(config)),
            TtsProvider::Piper => Box::new(piper::PiperSynthesizer::new(config)),
            TtsProvider::OpenAi => Box::new(openai::OpenAiSynthesizer::new(config)),
            TtsProvider::CosyVoice => Box::new(cosyvoice::CosyVoiceSynthesizer::new(config)),
            TtsProvider::FishAudio => Box::new(fish::FishAudioSynthesizer::new(config)),
        }
    }
}

/// Resolve the reference recording a voice-cloning backend needs.
pub(crate) fn require_voice_sample(config: &TtsConfig) -> Result<&Path> {
    let sample = config.voice_sample.as_deref().ok_or_else(|| {
        FukikaeError::Synthesis(format!(
            "{} requires a voice sample; set tts.voice_sample to a short reference recording",
            config.provider
        ))
    })?;

    if !sample.exists() {
        return Err(FukikaeError::Synthesis(format!(
            "Voice sample not found: {}",
            sample.display()
        )));
    }
    Ok(sample)
}

/// Probe a local synthesis CLI by running it with `--help`.
pub(crate) fn check_tts_binary(binary_path: &str, install_hint: &str) -> Result<()> {
    let output = std::process::Command::new(binary_path)
        .arg("--help")
        .output()
        .map_err(|e| {
            FukikaeError::Synthesis(format!(
                "{} not found: {}. {}",
                binary_path, e, install_hint
            ))
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(FukikaeError::Synthesis(format!(
            "{} is not usable: {}",
            binary_path, stderr
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_missing_voice_sample_names_the_provider_and_fix() {
        let mut config = Config::default().tts;
        config.provider = TtsProvider::CosyVoice;
        config.voice_sample = None;

        let err = require_voice_sample(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cosyvoice"));
        assert!(message.contains("voice sample"));
        assert!(message.contains("tts.voice_sample"));
    }

    #[test]
    fn test_nonexistent_voice_sample_is_rejected() {
        let mut config = Config::default().tts;
        config.provider = TtsProvider::FishAudio;
        config.voice_sample = Some("/does/not/exist.wav".into());

        let err = require_voice_sample(&config).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_present_voice_sample_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("ref.wav");
        std::fs::write(&sample, b"RIFF").unwrap();

        let mut config = Config::default().tts;
        config.provider = TtsProvider::CosyVoice;
        config.voice_sample = Some(sample.clone());

        assert_eq!(require_voice_sample(&config).unwrap(), sample);
    }
}
