use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::Translator;
use crate::config::TranslationConfig;
use crate::error::{FukikaeError, Result};
use crate::transcribe::is_auto_language;

/// Offline translation via the argos-translate CLI. Language pairs must be
/// installed beforehand (`argospm install translate-<src>_<dst>`).
pub struct ArgosTranslator {
    config: TranslationConfig,
}

impl ArgosTranslator {
    pub fn new(config: TranslationConfig) -> Self {
        Self { config }
    }

    fn build_args(text: &str, source_lang: &str, target_lang: &str) -> Vec<String> {
        vec![
            "--from-lang".to_string(),
            source_lang.to_string(),
            "--to-lang".to_string(),
            target_lang.to_string(),
            text.to_string(),
        ]
    }
}

#[async_trait]
impl Translator for ArgosTranslator {
    fn check_installed(&self) -> Result<()> {
        let binary = Path::new(&self.config.binary_path);
        let output = std::process::Command::new(binary)
            .arg("--help")
            .output()
            .map_err(|e| {
                FukikaeError::Translation(format!(
                    "{} not found: {}. Install with: pip install argostranslate",
                    self.config.binary_path, e
                ))
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(FukikaeError::Translation(format!(
                "{} is not usable: {}",
                self.config.binary_path, stderr
            )))
        }
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        // Argos has no language detection; the source must be explicit
        if is_auto_language(source_lang) {
            return Err(FukikaeError::Translation(
                "argos requires an explicit source language; set source_lang in the config"
                    .to_string(),
            ));
        }

        debug!("Translating {} -> {} via argos", source_lang, target_lang);

        let output = tokio::process::Command::new(&self.config.binary_path)
            .args(Self::build_args(text, source_lang, target_lang))
            .output()
            .await
            .map_err(|e| {
                FukikaeError::Translation(format!("Failed to execute argos-translate: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FukikaeError::Translation(format!(
                "argos-translate failed: {}",
                stderr
            )));
        }

        let translation = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if translation.is_empty() {
            return Err(FukikaeError::Translation(
                "Empty translation received".to_string(),
            ));
        }

        info!("Translated segment via argos ({} chars)", translation.len());
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslationProvider;

    #[test]
    fn test_arg_order_puts_text_last() {
        let args = ArgosTranslator::build_args("Hello world", "en", "ja");
        assert_eq!(args, vec!["--from-lang", "en", "--to-lang", "ja", "Hello world"]);
    }

    #[tokio::test]
    async fn test_auto_source_language_is_rejected() {
        let translator = ArgosTranslator::new(TranslationConfig {
            provider: TranslationProvider::Argos,
            binary_path: "argos-translate".to_string(),
            model: String::new(),
            api_key: None,
            endpoint: None,
        });

        let err = translator.translate("Hello", "auto", "ja").await.unwrap_err();
        assert!(err.to_string().contains("source language"));
    }
}
