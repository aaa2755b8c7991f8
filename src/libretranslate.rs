use crate::config::Config;
use crate::language::LanguageCode;
use crate::translation::{Translated, Translator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'static str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
    detected_language: Option<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: String,
}

/// Translator backed by a LibreTranslate-compatible `/translate` endpoint
pub struct LibreTranslateTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LibreTranslateTranslator {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.translation_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::new(
            client,
            config.libretranslate_url.clone(),
            config.libretranslate_api_key.clone(),
        ))
    }
}

#[async_trait]
impl Translator for LibreTranslateTranslator {
    async fn translate(&self, text: &str, target: &LanguageCode) -> Result<Translated> {
        let request = TranslateRequest {
            q: text,
            source: "auto",
            target: target.as_str(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Failed to send translation request to LibreTranslate")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("LibreTranslate translation to {} returned {}", target, status);
            anyhow::bail!("LibreTranslate API error ({}): {}", status, body);
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .context("Failed to parse LibreTranslate response")?;

        let detected = parsed
            .detected_language
            .map(|d| d.language)
            .context("LibreTranslate response did not include a detected source language")?;

        Ok(Translated {
            text: parsed.translated_text,
            detected_source_language: detected,
        })
    }
}
