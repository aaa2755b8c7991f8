//! Cached translation of case-study text.
//!
//! Each record carries its own cache: `translations[language][attribute]`.
//! A cached entry is authoritative and never recomputed. On a miss the
//! external translator is called once and the result is written back with
//! two independent, idempotent store operations:
//!
//! 1. [`CaseStudyStore::ensure_translations`] creates the map only if absent
//! 2. [`CaseStudyStore::set_translation`] sets the single coordinate by path
//!
//! so concurrent requests translating other languages of the same record
//! cannot erase each other's entries.

use crate::config::{Config, TranslationBackend};
use crate::db::CaseStudyStore;
use crate::error::ApiError;
use crate::language::LanguageCode;
use crate::libretranslate::LibreTranslateTranslator;
use crate::model::{CaseStudy, TranslationEntry};
use crate::openai::OpenAiTranslator;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Text produced by a translation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub text: String,
    /// Source language the service detected (source is always auto-detected)
    pub detected_source_language: String,
}

/// External machine-translation service
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &LanguageCode) -> Result<Translated>;
}

/// A validated translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub case_study_id: i64,
    pub language: LanguageCode,
}

impl TranslationRequest {
    /// Parse the raw path id and `language` query parameter
    pub fn parse(raw_id: Option<&str>, language: Option<&str>) -> Result<Self, ApiError> {
        let raw_id = raw_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing path parameter: caseStudyId"))?;
        let case_study_id = raw_id
            .parse()
            .map_err(|_| ApiError::bad_request("caseStudyId must be a number"))?;

        let language = language
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing query parameter: language"))?;
        let language = LanguageCode::parse(language)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        Ok(Self {
            case_study_id,
            language,
        })
    }
}

/// Result of a translation lookup
#[derive(Debug)]
pub struct TranslationOutcome {
    /// The record as read before any write
    pub case_study: CaseStudy,
    pub attribute: String,
    pub language: LanguageCode,
    pub translated_text: String,
    pub detected_source_language: String,
    /// True when served from the record's cache without calling the translator
    pub cached: bool,
    /// Set when a fresh translation could not be written back
    pub persist_error: Option<anyhow::Error>,
}

impl TranslationOutcome {
    /// Response payload: the record plus `<attribute>Translated` and a
    /// `translation` metadata object
    pub fn to_payload(&self) -> Result<Value, ApiError> {
        let mut payload = serde_json::to_value(&self.case_study).map_err(|e| {
            ApiError::dependency("Failed to serialize case study", anyhow::Error::new(e))
        })?;

        if let Value::Object(map) = &mut payload {
            map.insert(
                format!("{}Translated", self.attribute),
                Value::String(self.translated_text.clone()),
            );
            map.insert(
                "translation".to_string(),
                json!({
                    "targetLanguage": self.language,
                    "detectedSourceLanguage": self.detected_source_language,
                    "cached": self.cached,
                }),
            );
        }

        Ok(payload)
    }
}

/// Return the translation of `attribute` for one record, computing and
/// caching it on a miss
///
/// Store-read and translator failures abort with [`ApiError::Dependency`].
/// A failed write-back does not discard the translation: it is returned in
/// the outcome with `persist_error` set, and the next request repeats the
/// external call.
pub async fn translate_case_study(
    store: &dyn CaseStudyStore,
    translator: &dyn Translator,
    attribute: &str,
    request: &TranslationRequest,
) -> Result<TranslationOutcome, ApiError> {
    let id = request.case_study_id;
    let language = &request.language;

    let case_study = store
        .get_case_study(id)
        .await
        .map_err(|e| ApiError::dependency(format!("Failed to read case study {}", id), e))?
        .ok_or_else(|| ApiError::not_found(format!("CaseStudy {} not found", id)))?;

    let text = match case_study.text_attribute(attribute) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            return Err(ApiError::InvalidState(format!(
                "Item does not contain a non-empty string '{}' to translate",
                attribute
            )))
        }
    };

    // Cache hit: metadata comes from the cached entry itself
    if let Some(entry) = case_study.cached_translation(language.as_str(), attribute) {
        info!(
            "Translation cache hit for case study {} ({} -> {})",
            id, attribute, language
        );
        return Ok(TranslationOutcome {
            translated_text: entry.value.clone(),
            detected_source_language: entry.detected_source_language.clone(),
            case_study,
            attribute: attribute.to_string(),
            language: language.clone(),
            cached: true,
            persist_error: None,
        });
    }

    info!(
        "Translation cache miss for case study {} ({} -> {}), calling translator",
        id, attribute, language
    );
    let translated = translator
        .translate(&text, language)
        .await
        .map_err(|e| ApiError::dependency("Translation service call failed", e))?;

    let entry = TranslationEntry {
        value: translated.text,
        detected_source_language: translated.detected_source_language,
    };

    let persist_error = match persist(store, id, language, attribute, &entry).await {
        Ok(()) => {
            info!("✓ Cached {} translation for case study {}", language, id);
            None
        }
        Err(e) => {
            error!(
                "Failed to cache {} translation for case study {}: {:#}",
                language, id, e
            );
            Some(e)
        }
    };

    Ok(TranslationOutcome {
        case_study,
        attribute: attribute.to_string(),
        language: language.clone(),
        translated_text: entry.value,
        detected_source_language: entry.detected_source_language,
        cached: false,
        persist_error,
    })
}

async fn persist(
    store: &dyn CaseStudyStore,
    id: i64,
    language: &LanguageCode,
    attribute: &str,
    entry: &TranslationEntry,
) -> Result<()> {
    store.ensure_translations(id).await?;
    store.set_translation(id, language, attribute, entry).await
}

/// Build the configured translation backend
pub fn translator_from_config(config: &Config) -> Result<Arc<dyn Translator>> {
    let translator: Arc<dyn Translator> = match config.translation_backend {
        TranslationBackend::OpenAi => Arc::new(OpenAiTranslator::from_config(config)?),
        TranslationBackend::LibreTranslate => {
            Arc::new(LibreTranslateTranslator::from_config(config)?)
        }
    };
    Ok(translator)
}
