use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Translator;
use crate::config::TranslationConfig;
use crate::error::{FukikaeError, Result};
use crate::transcribe::is_auto_language;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TranslationResult {
    text: String,
}

/// LLM translation over OpenAI-compatible chat completions. Hosts both the
/// OpenAI and DeepSeek providers; only the base URL and models differ.
pub struct OpenAiTranslator {
    config: TranslationConfig,
    client: Client,
    base_url: String,
}

impl OpenAiTranslator {
    pub fn new(config: TranslationConfig, default_base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout
            .build()
            .expect("HTTP client creation should not fail");

        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());

        Self {
            config,
            client,
            base_url,
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(FukikaeError::Translation(format!(
                "{} translation requires an API key; set translation.api_key",
                self.config.provider
            ))),
        }
    }

    fn build_prompt(text: &str, source_lang: &str, target_lang: &str) -> String {
        let target_name = language_name(target_lang);
        if is_auto_language(source_lang) {
            format!(
                "Translate the following text to {} (language code: {}). \
                 Preserve the tone of spoken dialogue.\n\n{}",
                target_name, target_lang, text
            )
        } else {
            format!(
                "Translate the following text from {} to {} (language code: {}). \
                 Preserve the tone of spoken dialogue.\n\n{}",
                language_name(source_lang),
                target_name,
                target_lang,
                text
            )
        }
    }
}

/// Pull the translation out of the model response: JSON result first, raw
/// content as a fallback when the model ignored the format instruction.
fn extract_translation(content: &str) -> String {
    let trimmed = content.trim();
    if let Ok(result) = serde_json::from_str::<TranslationResult>(trimmed) {
        return result.text.trim().to_string();
    }

    let stripped = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(result) = serde_json::from_str::<TranslationResult>(stripped) {
        return result.text.trim().to_string();
    }

    trimmed.to_string()
}

/// Convert language code to full language name for clearer prompts
fn language_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "uk" => "Ukrainian",
        "sv" => "Swedish",
        "fi" => "Finnish",
        _ => return code.to_string(),
    }
    .to_string()
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn check_installed(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let api_key = self.api_key()?.to_string();

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a professional translator. Return ONLY the translation \
                              in JSON format as {\"text\":\"your translation here\"}. Do not \
                              include explanations or alternatives."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(text, source_lang, target_lang),
                },
            ],
            temperature: 0.3,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FukikaeError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FukikaeError::Translation(format!(
                "Translation API error {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| FukikaeError::Translation(format!("Failed to parse response: {}", e)))?;

        let content = chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| {
                FukikaeError::Translation("Translation response had no choices".to_string())
            })?;

        let translation = extract_translation(content);
        if translation.is_empty() {
            return Err(FukikaeError::Translation(
                "Empty translation received".to_string(),
            ));
        }

        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslationProvider;

    #[test]
    fn test_extract_translation_from_json_result() {
        assert_eq!(
            extract_translation(r#"{"text": "こんにちは"}"#),
            "こんにちは"
        );
    }

    #[test]
    fn test_extract_translation_from_fenced_json() {
        assert_eq!(
            extract_translation("```json\n{\"text\": \"Bonjour\"}\n```"),
            "Bonjour"
        );
    }

    #[test]
    fn test_extract_translation_falls_back_to_raw_content() {
        assert_eq!(extract_translation("  Hallo Welt  "), "Hallo Welt");
    }

    #[test]
    fn test_missing_api_key_is_reported_with_provider_name() {
        let translator = OpenAiTranslator::new(
            TranslationConfig {
                provider: TranslationProvider::DeepSeek,
                binary_path: String::new(),
                model: "deepseek-chat".to_string(),
                api_key: None,
                endpoint: None,
            },
            DEEPSEEK_BASE_URL,
        );
        let err = translator.check_installed().unwrap_err();
        assert!(err.to_string().contains("deepseek"));
    }

    #[test]
    fn test_prompt_names_both_languages_when_source_known() {
        let prompt = OpenAiTranslator::build_prompt("Hello", "en", "ja");
        assert!(prompt.contains("English"));
        assert!(prompt.contains("Japanese"));

        let auto_prompt = OpenAiTranslator::build_prompt("Hello", "auto", "ja");
        assert!(!auto_prompt.contains("from"));
    }
}
