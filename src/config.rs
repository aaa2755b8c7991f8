use anyhow::{bail, Context, Result};
use std::str::FromStr;

/// Which external service performs machine translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationBackend {
    OpenAi,
    LibreTranslate,
}

impl FromStr for TranslationBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "libretranslate" => Ok(Self::LibreTranslate),
            other => bail!(
                "Unknown TRANSLATION_BACKEND '{}'. Expected 'openai' or 'libretranslate'",
                other
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub port: u16,

    // Storage
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Translation
    pub text_attribute: String,
    pub translation_backend: TranslationBackend,
    pub translation_timeout_secs: u64,

    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    // LibreTranslate
    pub libretranslate_url: String,
    pub libretranslate_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            port: match std::env::var("PORT") {
                Ok(v) => v.parse().context(format!("PORT must be a number, got '{}'", v))?,
                Err(_) => 8080,
            },

            // Storage - falls back to the in-memory store when unset
            database_url: non_empty_var("DATABASE_URL"),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            // Translation
            text_attribute: std::env::var("TEXT_ATTRIBUTE")
                .unwrap_or_else(|_| "description".to_string()),
            translation_backend: std::env::var("TRANSLATION_BACKEND")
                .unwrap_or_else(|_| "openai".to_string())
                .parse()?,
            translation_timeout_secs: std::env::var("TRANSLATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            // OpenAI
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),

            // LibreTranslate
            libretranslate_url: std::env::var("LIBRETRANSLATE_URL")
                .unwrap_or_else(|_| "https://libretranslate.com".to_string()),
            libretranslate_api_key: non_empty_var("LIBRETRANSLATE_API_KEY"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would only fail later, on the first request
    pub fn validate(&self) -> Result<()> {
        if self.text_attribute.trim().is_empty() {
            bail!("TEXT_ATTRIBUTE must not be empty");
        }

        if self.translation_backend == TranslationBackend::OpenAi && self.openai_api_key.is_none()
        {
            bail!("OPENAI_API_KEY not set (required when TRANSLATION_BACKEND=openai)");
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
