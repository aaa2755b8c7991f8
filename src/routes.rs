//! HTTP surface: router, shared state and handlers.
//!
//! Every handler returns `Result<_, ApiError>` and extractor rejections are
//! mapped to `ApiError::BadRequest`, so all responses use the JSON envelope.

use crate::config::Config;
use crate::db::{CaseStudyStore, Database, InsertOutcome, InstitutionStore};
use crate::error::ApiError;
use crate::memory::MemoryStore;
use crate::model::CaseStudy;
use crate::query::{build_institution_query, InstitutionParams};
use crate::translation::{
    translate_case_study, translator_from_config, TranslationRequest, Translator,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// State shared by all handlers
pub struct AppState {
    pub case_studies: Arc<dyn CaseStudyStore>,
    pub institutions: Arc<dyn InstitutionStore>,
    pub translator: Arc<dyn Translator>,
    /// Record attribute served by the translation endpoint
    pub text_attribute: String,
}

impl AppState {
    /// Wire the configured store and translation backend
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let translator = translator_from_config(config)?;

        let state = match &config.database_url {
            Some(url) => {
                let db = Arc::new(Database::new(url, config.database_max_connections).await?);
                info!("✓ Connected to PostgreSQL");
                Self {
                    case_studies: db.clone(),
                    institutions: db,
                    translator,
                    text_attribute: config.text_attribute.clone(),
                }
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
                let store = Arc::new(MemoryStore::new());
                Self {
                    case_studies: store.clone(),
                    institutions: store,
                    translator,
                    text_attribute: config.text_attribute.clone(),
                }
            }
        };

        Ok(state)
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-amz-date")]);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/case-studies",
            get(list_case_studies).post(create_case_study),
        )
        .route("/case-studies/institutions", get(get_institutions))
        .route(
            "/case-studies/item/:case_study_id",
            get(get_case_study).put(update_case_study),
        )
        .route(
            "/case-studies/item/:case_study_id/translation",
            get(get_translation),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn data(value: impl Serialize) -> Json<Value> {
    Json(json!({ "data": value }))
}

fn parse_case_study_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request("caseStudyId must be a number"))
}

/// Body of a create or update; any client-supplied translations are dropped,
/// only the translation pipeline writes that map
fn validated_body(payload: Result<Json<CaseStudy>, JsonRejection>) -> Result<CaseStudy, ApiError> {
    let Json(mut case_study) = payload.map_err(|e| {
        ApiError::bad_request(format!(
            "Incorrect type. Must match the CaseStudy schema: {}",
            e.body_text()
        ))
    })?;

    case_study.validate().map_err(|reason| {
        ApiError::bad_request(format!(
            "Incorrect type. Must match the CaseStudy schema: {}",
            reason
        ))
    })?;

    case_study.translations = None;
    Ok(case_study)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn list_case_studies(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let case_studies = state
        .case_studies
        .list_case_studies()
        .await
        .map_err(|e| ApiError::dependency("Failed to list case studies", e))?;

    debug!("Listed {} case studies", case_studies.len());
    Ok(data(case_studies))
}

async fn get_case_study(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_case_study_id(&raw_id)?;

    let case_study = state
        .case_studies
        .get_case_study(id)
        .await
        .map_err(|e| ApiError::dependency(format!("Failed to read case study {}", id), e))?
        .ok_or_else(|| ApiError::not_found(format!("CaseStudy {} not found", id)))?;

    Ok(data(case_study))
}

async fn create_case_study(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CaseStudy>, JsonRejection>,
) -> Result<Response, ApiError> {
    let case_study = validated_body(payload)?;
    let id = case_study.id;

    let outcome = state
        .case_studies
        .insert_case_study(&case_study)
        .await
        .map_err(|e| ApiError::dependency(format!("Failed to add case study {}", id), e))?;

    match outcome {
        InsertOutcome::Inserted => {
            info!("Added case study {}", id);
            Ok((
                StatusCode::CREATED,
                Json(json!({ "message": "Case study added", "data": case_study })),
            )
                .into_response())
        }
        InsertOutcome::AlreadyExists => Err(ApiError::Conflict(format!(
            "CaseStudy {} already exists",
            id
        ))),
    }
}

async fn update_case_study(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<CaseStudy>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_case_study_id(&raw_id)?;
    let case_study = validated_body(payload)?;

    if case_study.id != id {
        return Err(ApiError::bad_request(format!(
            "Path caseStudyId {} does not match body.id {}",
            id, case_study.id
        )));
    }

    let updated = state
        .case_studies
        .update_case_study(&case_study)
        .await
        .map_err(|e| ApiError::dependency(format!("Failed to update case study {}", id), e))?;

    if !updated {
        return Err(ApiError::not_found(format!("CaseStudy {} not found", id)));
    }

    info!("Updated case study {}", id);
    Ok(Json(json!({ "message": "Case study updated" })))
}

async fn get_institutions(
    State(state): State<Arc<AppState>>,
    params: Result<Query<InstitutionParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) =
        params.map_err(|e| ApiError::bad_request(format!("Invalid query parameters: {}", e)))?;
    let query = build_institution_query(&params)?;

    debug!(
        "Institution query on {:?} index: {}",
        query.index(),
        query.key_condition()
    );

    let institutions = state
        .institutions
        .query_institutions(&query)
        .await
        .map_err(|e| ApiError::dependency("Failed to query institutions", e))?;

    Ok(data(institutions))
}

#[derive(Debug, Deserialize)]
pub struct TranslationParams {
    pub language: Option<String>,
}

async fn get_translation(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    params: Result<Query<TranslationParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) =
        params.map_err(|e| ApiError::bad_request(format!("Invalid query parameters: {}", e)))?;
    let request = TranslationRequest::parse(Some(&raw_id), params.language.as_deref())?;

    let outcome = translate_case_study(
        state.case_studies.as_ref(),
        state.translator.as_ref(),
        &state.text_attribute,
        &request,
    )
    .await?;

    let payload = outcome.to_payload()?;

    // The translation is still returned when caching it failed
    if let Some(e) = &outcome.persist_error {
        let body = json!({
            "message": format!(
                "Translation succeeded but could not be cached for case study {}",
                request.case_study_id
            ),
            "error": format!("{:#}", e),
            "data": payload,
        });
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response());
    }

    Ok(data(payload).into_response())
}
