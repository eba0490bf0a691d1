use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{FukikaeError, Result};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "fukikae.toml";

fn default_speed() -> f32 {
    1.0
}

fn default_synthesis_concurrency() -> usize {
    4
}

fn default_background_volume() -> f32 {
    0.3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory receiving dubbed videos and subtitle sidecars
    pub output_dir: PathBuf,
    /// Source language code, or "auto" for provider-side detection
    pub source_lang: String,
    /// Target language code for translation and synthesis
    pub target_lang: String,
    pub transcription: TranscriptionConfig,
    pub translation: TranslationConfig,
    pub tts: TtsConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Which speech-to-text backend to use
    pub provider: TranscriptionProvider,
    /// Path to the transcriber binary (e.g., whisper-cli)
    pub binary_path: String,
    /// Model name or model file path, depending on the provider
    pub model: String,
    /// API key for cloud providers
    pub api_key: Option<String>,
    /// Base URL override for OpenAI-compatible endpoints
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Which translation backend to use
    pub provider: TranslationProvider,
    /// Path to the translator binary (e.g., argos-translate)
    pub binary_path: String,
    /// Chat model for LLM-backed translation
    pub model: String,
    /// API key for cloud providers
    pub api_key: Option<String>,
    /// Base URL override for OpenAI-compatible endpoints
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Which speech synthesis backend to use
    pub provider: TtsProvider,
    /// Path to the synthesizer binary (e.g., edge-tts, piper)
    pub binary_path: String,
    /// Voice identifier, provider dependent
    pub voice: String,
    /// Model name or model file path for providers that need one
    pub model: Option<String>,
    /// API key for cloud providers
    pub api_key: Option<String>,
    /// Endpoint for HTTP-served local engines and base URL overrides
    pub endpoint: Option<String>,
    /// Reference recording for voice-cloning providers
    pub voice_sample: Option<PathBuf>,
    /// Transcript of the reference recording, required by some cloning engines
    pub sample_text: Option<String>,
    /// Playback speed multiplier applied to synthesized speech
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// How many segments to synthesize concurrently
    #[serde(default = "default_synthesis_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Mix the original audio track under the dubbed speech
    pub keep_background_audio: bool,
    /// Volume of the original track in the mix, 0.0 to 1.0
    #[serde(default = "default_background_volume")]
    pub background_volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptionProvider {
    /// Local whisper.cpp binary
    WhisperCpp,
    /// Local faster-whisper CLI
    FasterWhisper,
    /// Local whisperkit-cli (Apple Silicon)
    #[serde(rename = "whisperkit")]
    WhisperKit,
    /// OpenAI audio transcription API
    #[serde(rename = "openai")]
    OpenAi,
    /// Groq-hosted whisper via the OpenAI-compatible API
    Groq,
}

impl TranscriptionProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhisperCpp => "whisper-cpp",
            Self::FasterWhisper => "faster-whisper",
            Self::WhisperKit => "whisperkit",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
        }
    }

    /// Cloud providers need an API key instead of a local binary.
    pub fn is_cloud(self) -> bool {
        matches!(self, Self::OpenAi | Self::Groq)
    }
}

impl fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whisper-cpp" => Ok(Self::WhisperCpp),
            "faster-whisper" => Ok(Self::FasterWhisper),
            "whisperkit" => Ok(Self::WhisperKit),
            "openai" => Ok(Self::OpenAi),
            "groq" => Ok(Self::Groq),
            other => Err(format!("unknown transcription provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationProvider {
    /// Local argos-translate CLI
    Argos,
    /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAi,
    /// DeepSeek via the OpenAI-compatible API
    #[serde(rename = "deepseek")]
    DeepSeek,
}

impl TranslationProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Argos => "argos",
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
        }
    }

    pub fn is_cloud(self) -> bool {
        matches!(self, Self::OpenAi | Self::DeepSeek)
    }
}

impl fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "argos" => Ok(Self::Argos),
            "openai" => Ok(Self::OpenAi),
            "deepseek" => Ok(Self::DeepSeek),
            other => Err(format!("unknown translation provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TtsProvider {
    /// Microsoft Edge neural voices via the edge-tts CLI
    EdgeTts,
    /// Local piper engine reading text on stdin
    Piper,
    /// OpenAI speech API
    #[serde(rename = "openai")]
    OpenAi,
    /// Locally served CosyVoice with zero-shot voice cloning
    #[serde(rename = "cosyvoice")]
    CosyVoice,
    /// Fish Audio cloud API with voice cloning
    FishAudio,
}

impl TtsProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EdgeTts => "edge-tts",
            Self::Piper => "piper",
            Self::OpenAi => "openai",
            Self::CosyVoice => "cosyvoice",
            Self::FishAudio => "fish-audio",
        }
    }

    pub fn is_cloud(self) -> bool {
        matches!(self, Self::OpenAi | Self::FishAudio)
    }

    /// Voice-cloning engines cannot speak without a reference recording.
    pub fn requires_voice_sample(self) -> bool {
        matches!(self, Self::CosyVoice | Self::FishAudio)
    }
}

impl fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtsProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "edge-tts" => Ok(Self::EdgeTts),
            "piper" => Ok(Self::Piper),
            "openai" => Ok(Self::OpenAi),
            "cosyvoice" => Ok(Self::CosyVoice),
            "fish-audio" => Ok(Self::FishAudio),
            other => Err(format!("unknown tts provider: {}", other)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            source_lang: "auto".to_string(),
            target_lang: "en".to_string(),
            transcription: TranscriptionConfig {
                provider: TranscriptionProvider::WhisperCpp,
                binary_path: "whisper-cli".to_string(),
                model: "base".to_string(),
                api_key: None,
                endpoint: None,
            },
            translation: TranslationConfig {
                provider: TranslationProvider::Argos,
                binary_path: "argos-translate".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                endpoint: None,
            },
            tts: TtsConfig {
                provider: TtsProvider::EdgeTts,
                binary_path: "edge-tts".to_string(),
                voice: "en-US-AriaNeural".to_string(),
                model: None,
                api_key: None,
                endpoint: None,
                voice_sample: None,
                sample_text: None,
                speed: 1.0,
                concurrency: 4,
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                keep_background_audio: true,
                background_volume: 0.3,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FukikaeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FukikaeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FukikaeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Load an explicit config file, or `fukikae.toml` from the working
    /// directory, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reject values no provider could work with. Provider availability is
    /// checked separately, at preflight.
    pub fn validate(&self) -> Result<()> {
        if self.target_lang.trim().is_empty() {
            return Err(FukikaeError::Config(
                "target_lang must not be empty".to_string(),
            ));
        }
        if self.source_lang.trim().is_empty() {
            return Err(FukikaeError::Config(
                "source_lang must not be empty; use \"auto\" for detection".to_string(),
            ));
        }
        if !(0.25..=4.0).contains(&self.tts.speed) {
            return Err(FukikaeError::Config(format!(
                "tts.speed must be between 0.25 and 4.0, got {}",
                self.tts.speed
            )));
        }
        if self.tts.concurrency == 0 {
            return Err(FukikaeError::Config(
                "tts.concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.media.background_volume) {
            return Err(FukikaeError::Config(format!(
                "media.background_volume must be between 0.0 and 1.0, got {}",
                self.media.background_volume
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_provider_names_round_trip() {
        for provider in [
            TranscriptionProvider::WhisperCpp,
            TranscriptionProvider::FasterWhisper,
            TranscriptionProvider::WhisperKit,
            TranscriptionProvider::OpenAi,
            TranscriptionProvider::Groq,
        ] {
            assert_eq!(provider.as_str().parse::<TranscriptionProvider>(), Ok(provider));
        }
        for provider in [
            TranslationProvider::Argos,
            TranslationProvider::OpenAi,
            TranslationProvider::DeepSeek,
        ] {
            assert_eq!(provider.as_str().parse::<TranslationProvider>(), Ok(provider));
        }
        for provider in [
            TtsProvider::EdgeTts,
            TtsProvider::Piper,
            TtsProvider::OpenAi,
            TtsProvider::CosyVoice,
            TtsProvider::FishAudio,
        ] {
            assert_eq!(provider.as_str().parse::<TtsProvider>(), Ok(provider));
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!("eleven-labs".parse::<TtsProvider>().is_err());
        assert!("".parse::<TranscriptionProvider>().is_err());
    }

    #[test]
    fn test_provider_enums_use_kebab_case_in_toml() {
        let toml_src = r#"
            output_dir = "out"
            source_lang = "ja"
            target_lang = "en"

            [transcription]
            provider = "faster-whisper"
            binary_path = "faster-whisper"
            model = "medium"

            [translation]
            provider = "deepseek"
            binary_path = "argos-translate"
            model = "deepseek-chat"
            api_key = "sk-test"

            [tts]
            provider = "fish-audio"
            binary_path = "edge-tts"
            voice = "my-clone"
            api_key = "fa-test"
            voice_sample = "ref.wav"

            [media]
            ffmpeg_path = "ffmpeg"
            ffprobe_path = "ffprobe"
            keep_background_audio = false
        "#;

        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.transcription.provider, TranscriptionProvider::FasterWhisper);
        assert_eq!(config.translation.provider, TranslationProvider::DeepSeek);
        assert_eq!(config.tts.provider, TtsProvider::FishAudio);
        assert_eq!(config.tts.speed, 1.0);
        assert_eq!(config.tts.concurrency, 4);
        assert_eq!(config.media.background_volume, 0.3);
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.tts.speed = 9.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tts.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.media.background_volume = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.target_lang = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fukikae.toml");

        let mut config = Config::default();
        config.target_lang = "ja".to_string();
        config.tts.provider = TtsProvider::Piper;
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.target_lang, "ja");
        assert_eq!(reloaded.tts.provider, TtsProvider::Piper);
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.transcription.provider, TranscriptionProvider::WhisperCpp);
    }

    #[test]
    fn test_voice_sample_rule_is_scoped_to_cloning_providers() {
        assert!(TtsProvider::CosyVoice.requires_voice_sample());
        assert!(TtsProvider::FishAudio.requires_voice_sample());
        assert!(!TtsProvider::EdgeTts.requires_voice_sample());
        assert!(!TtsProvider::Piper.requires_voice_sample());
        assert!(!TtsProvider::OpenAi.requires_voice_sample());
    }
}
