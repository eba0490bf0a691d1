// Modular translation architecture
//
// This module provides different translation implementations through a
// factory pattern:
// - Argos: offline argos-translate CLI
// - OpenAi / DeepSeek: OpenAI-compatible chat completions

pub mod argos;
pub mod openai;

use async_trait::async_trait;

use crate::config::{TranslationConfig, TranslationProvider};
use crate::error::Result;

/// Main trait for translation operations
#[async_trait]
pub trait Translator: Send + Sync {
    /// Verify the backend is usable: binary present or credentials
    /// configured. Errors name the missing piece.
    fn check_installed(&self) -> Result<()>;

    /// Translate one segment's text. The executor calls this per segment,
    /// in order; implementations must not reorder or batch across calls.
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str)
        -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create a translator for the configured provider
    pub fn create_translator(config: TranslationConfig) -> Box<dyn Translator> {
        match config.provider {
            TranslationProvider::Argos => Box::new(argos::ArgosTranslator::new(config)),
            TranslationProvider::OpenAi => {
                Box::new(openai::OpenAiTranslator::new(config, openai::OPENAI_BASE_URL))
            }
            TranslationProvider::DeepSeek => {
                Box::new(openai::OpenAiTranslator::new(config, openai::DEEPSEEK_BASE_URL))
            }
        }
    }
}
