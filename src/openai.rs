use crate::config::Config;
use crate::language::LanguageCode;
use crate::translation::{Translated, Translator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// OpenAI Chat Completion request for translation
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// JSON object the model is instructed to return
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationPayload {
    translated_text: String,
    detected_source_language: String,
}

fn build_system_prompt(target_language: &str) -> String {
    format!(
        r#"You are a professional translator. Detect the language of the text you are given and translate it to the language with code "{}".

Respond with a single JSON object and nothing else:
{{"translatedText": "<the translation>", "detectedSourceLanguage": "<ISO 639-1 code of the source text>"}}

- Preserve proper names, numbers and formatting
- Do not add explanations or notes
- If the text is already in the target language, return it unchanged"#,
        target_language
    )
}

/// Translator backed by an OpenAI-compatible chat-completions endpoint
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl OpenAiTranslator {
    pub fn new(client: reqwest::Client, api_key: String, model: String, api_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            api_url,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY not set")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.translation_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::new(
            client,
            api_key,
            config.openai_model.clone(),
            config.openai_api_url.clone(),
        ))
    }

    fn build_request(&self, text: &str, target: &LanguageCode) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_system_prompt(target.as_str()),
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            // Reasoning models don't support temperature
            temperature: if is_reasoning_model(&self.model) {
                None
            } else {
                Some(0.0)
            },
        }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, target: &LanguageCode) -> Result<Translated> {
        let request = self.build_request(text, target);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send translation request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            warn!("OpenAI translation to {} returned {}", target, status);
            anyhow::bail!("OpenAI API error during translation ({}): {}", status, body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI translation response")?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .context("OpenAI translation response contained no choices")?;

        let payload: TranslationPayload = serde_json::from_str(content.trim())
            .context("OpenAI translation content was not the expected JSON object")?;

        Ok(Translated {
            text: payload.translated_text,
            detected_source_language: payload.detected_source_language.trim().to_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Helper Functions ====================

    fn create_translator(api_url: &str, model: &str) -> OpenAiTranslator {
        OpenAiTranslator::new(
            reqwest::Client::new(),
            "test-openai-key".to_string(),
            model.to_string(),
            api_url.to_string(),
        )
    }

    fn create_openai_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": content
                    },
                    "finish_reason": "stop"
                }
            ]
        })
    }

    fn french() -> LanguageCode {
        LanguageCode::parse("fr").unwrap()
    }

    // ==================== Prompt & Request Tests ====================

    #[test]
    fn test_system_prompt_mentions_target_and_format() {
        let prompt = build_system_prompt("fr");
        assert!(prompt.contains("\"fr\""));
        assert!(prompt.contains("translatedText"));
        assert!(prompt.contains("detectedSourceLanguage"));
    }

    #[test]
    fn test_request_serialization() {
        let translator = create_translator("http://unused", "gpt-4o-mini");
        let request = translator.build_request("Hello world", &french());

        let json = serde_json::to_value(&request).expect("Should serialize");
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello world");
    }

    #[test]
    fn test_request_serialization_reasoning_model() {
        let translator = create_translator("http://unused", "gpt-5-mini");
        let request = translator.build_request("Hello world", &french());

        let json = serde_json::to_string(&request).expect("Should serialize");
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_is_reasoning_model() {
        assert!(is_reasoning_model("gpt-5-mini"));
        assert!(is_reasoning_model("o1-preview"));
        assert!(is_reasoning_model("o3"));
        assert!(is_reasoning_model("o4-mini"));
        assert!(!is_reasoning_model("gpt-4o-mini"));
        assert!(!is_reasoning_model("gpt-4-turbo"));
    }

    // ==================== Integration Tests with Wiremock ====================

    #[tokio::test]
    async fn test_translate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-openai-key"))
            .and(body_partial_json(serde_json::json!({
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_openai_response(
                r#"{"translatedText": "Bonjour le monde", "detectedSourceLanguage": "EN"}"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let translator = create_translator(
            &format!("{}/v1/chat/completions", mock_server.uri()),
            "gpt-4o-mini",
        );

        let translated = translator
            .translate("Hello world", &french())
            .await
            .expect("Should succeed");

        assert_eq!(translated.text, "Bonjour le monde");
        assert_eq!(translated.detected_source_language, "en");
    }

    #[tokio::test]
    async fn test_translate_api_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let translator = create_translator(
            &format!("{}/v1/chat/completions", mock_server.uri()),
            "gpt-4o-mini",
        );

        let result = translator.translate("Hello world", &french()).await;

        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("500"), "Error should mention 500: {}", err);
    }

    #[tokio::test]
    async fn test_translate_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&mock_server)
            .await;

        let translator = create_translator(
            &format!("{}/v1/chat/completions", mock_server.uri()),
            "gpt-4o-mini",
        );

        let result = translator.translate("Hello world", &french()).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn test_translate_non_json_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_openai_response("Bonjour le monde")),
            )
            .mount(&mock_server)
            .await;

        let translator = create_translator(
            &format!("{}/v1/chat/completions", mock_server.uri()),
            "gpt-4o-mini",
        );

        let result = translator.translate("Hello world", &french()).await;

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not the expected JSON object"));
    }

    #[tokio::test]
    async fn test_translate_connection_error() {
        let translator = create_translator("http://127.0.0.1:1/v1/chat/completions", "gpt-4o-mini");

        let result = translator.translate("Hello world", &french()).await;

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to send translation request"));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = Config {
            environment: "test".to_string(),
            port: 8080,
            database_url: None,
            database_max_connections: 5,
            text_attribute: "description".to_string(),
            translation_backend: crate::config::TranslationBackend::OpenAi,
            translation_timeout_secs: 5,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_url: "http://localhost/v1/chat/completions".to_string(),
            libretranslate_url: "http://localhost:5000".to_string(),
            libretranslate_api_key: None,
        };

        assert!(OpenAiTranslator::from_config(&config).is_err());
    }
}
