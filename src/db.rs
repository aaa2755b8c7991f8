use crate::language::LanguageCode;
use crate::model::{CaseStudy, CaseStudyInstitution, TranslationEntry};
use crate::query::InstitutionQuery;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use tracing::info;

/// Outcome of inserting a case study
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Case-study records, keyed by id
#[async_trait]
pub trait CaseStudyStore: Send + Sync {
    async fn list_case_studies(&self) -> Result<Vec<CaseStudy>>;

    async fn get_case_study(&self, id: i64) -> Result<Option<CaseStudy>>;

    async fn insert_case_study(&self, case_study: &CaseStudy) -> Result<InsertOutcome>;

    /// Replace the schema attributes of an existing record, keeping its
    /// translations map. Returns false when no record has that id.
    async fn update_case_study(&self, case_study: &CaseStudy) -> Result<bool>;

    /// Create an empty translations map if the record has none.
    /// Never touches an existing map.
    async fn ensure_translations(&self, id: i64) -> Result<()>;

    /// Set the single `(language, attribute)` entry of the translations map.
    /// Fails when the record or its translations map does not exist.
    async fn set_translation(
        &self,
        id: i64,
        language: &LanguageCode,
        attribute: &str,
        entry: &TranslationEntry,
    ) -> Result<()>;
}

/// Read-only access to case-study institutions
#[async_trait]
pub trait InstitutionStore: Send + Sync {
    async fn query_institutions(&self, query: &InstitutionQuery) -> Result<Vec<CaseStudyInstitution>>;
}

/// PostgreSQL-backed store
///
/// Case studies are kept as JSONB documents so translation entries can be
/// written by path with `jsonb_set`, without rewriting the whole record.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and create tables if they don't exist
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS case_studies (
                id BIGINT PRIMARY KEY,
                item JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create case_studies table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS case_study_institutions (
                case_study_id BIGINT NOT NULL,
                institution_name TEXT NOT NULL,
                location TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (case_study_id, institution_name)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create case_study_institutions table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS location_ix
             ON case_study_institutions (case_study_id, location)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create location_ix index")?;

        info!("✓ Database schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// SQL for an institution query; `$1` is the case study id, `$2` the prefix
fn institution_sql(query: &InstitutionQuery) -> &'static str {
    match query {
        InstitutionQuery::ByCaseStudy { .. } => {
            "SELECT case_study_id, institution_name, location, description
             FROM case_study_institutions
             WHERE case_study_id = $1
             ORDER BY institution_name"
        }
        InstitutionQuery::NamePrefix { .. } => {
            "SELECT case_study_id, institution_name, location, description
             FROM case_study_institutions
             WHERE case_study_id = $1 AND starts_with(institution_name, $2)
             ORDER BY institution_name"
        }
        InstitutionQuery::LocationPrefix { .. } => {
            "SELECT case_study_id, institution_name, location, description
             FROM case_study_institutions
             WHERE case_study_id = $1 AND starts_with(location, $2)
             ORDER BY location, institution_name"
        }
    }
}

fn institution_prefix(query: &InstitutionQuery) -> Option<&str> {
    match query {
        InstitutionQuery::ByCaseStudy { .. } => None,
        InstitutionQuery::NamePrefix { prefix, .. }
        | InstitutionQuery::LocationPrefix { prefix, .. } => Some(prefix),
    }
}

#[async_trait]
impl CaseStudyStore for Database {
    async fn list_case_studies(&self) -> Result<Vec<CaseStudy>> {
        let rows: Vec<(Json<CaseStudy>,)> =
            sqlx::query_as("SELECT item FROM case_studies ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .context("Failed to list case studies")?;

        Ok(rows.into_iter().map(|(item,)| item.0).collect())
    }

    async fn get_case_study(&self, id: i64) -> Result<Option<CaseStudy>> {
        let row: Option<(Json<CaseStudy>,)> =
            sqlx::query_as("SELECT item FROM case_studies WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context(format!("Failed to load case study {}", id))?;

        Ok(row.map(|(item,)| item.0))
    }

    async fn insert_case_study(&self, case_study: &CaseStudy) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO case_studies (id, item) VALUES ($1, $2)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(case_study.id)
        .bind(Json(case_study))
        .execute(&self.pool)
        .await
        .context(format!("Failed to insert case study {}", case_study.id))?;

        Ok(if result.rows_affected() > 0 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn update_case_study(&self, case_study: &CaseStudy) -> Result<bool> {
        let mut item = case_study.clone();
        item.translations = None;

        let result = sqlx::query(
            "UPDATE case_studies
             SET item = CASE
                 WHEN jsonb_typeof(item -> 'translations') = 'object'
                     THEN $2::jsonb || jsonb_build_object('translations', item -> 'translations')
                 ELSE $2::jsonb
             END
             WHERE id = $1",
        )
        .bind(case_study.id)
        .bind(Json(&item))
        .execute(&self.pool)
        .await
        .context(format!("Failed to update case study {}", case_study.id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn ensure_translations(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE case_studies
             SET item = jsonb_set(item, '{translations}', '{}'::jsonb)
             WHERE id = $1
               AND jsonb_typeof(item -> 'translations') IS DISTINCT FROM 'object'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context(format!("Failed to initialize translations for case study {}", id))?;

        Ok(())
    }

    async fn set_translation(
        &self,
        id: i64,
        language: &LanguageCode,
        attribute: &str,
        entry: &TranslationEntry,
    ) -> Result<()> {
        // The language map is merged, not replaced, so other attributes
        // cached for the same language are kept. A JSON null is not a map:
        // jsonb_set cannot descend into it and would silently write nothing.
        let result = sqlx::query(
            "UPDATE case_studies
             SET item = jsonb_set(
                 item,
                 ARRAY['translations', $2::text],
                 CASE
                     WHEN jsonb_typeof(item #> ARRAY['translations', $2::text]) = 'object'
                         THEN item #> ARRAY['translations', $2::text]
                     ELSE '{}'::jsonb
                 END || jsonb_build_object($3::text, $4::jsonb)
             )
             WHERE id = $1 AND jsonb_typeof(item -> 'translations') = 'object'",
        )
        .bind(id)
        .bind(language.as_str())
        .bind(attribute)
        .bind(Json(entry))
        .execute(&self.pool)
        .await
        .context(format!(
            "Failed to store {} translation of '{}' for case study {}",
            language, attribute, id
        ))?;

        if result.rows_affected() == 0 {
            bail!(
                "Case study {} not found or has no translations map; {} translation not stored",
                id,
                language
            );
        }

        Ok(())
    }
}

#[async_trait]
impl InstitutionStore for Database {
    async fn query_institutions(&self, query: &InstitutionQuery) -> Result<Vec<CaseStudyInstitution>> {
        let mut statement = sqlx::query(institution_sql(query)).bind(query.case_study_id());
        if let Some(prefix) = institution_prefix(query) {
            statement = statement.bind(prefix.to_string());
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .context(format!(
                "Failed to query institutions for case study {}",
                query.case_study_id()
            ))?;

        rows.iter()
            .map(|row| -> Result<CaseStudyInstitution> {
                Ok(CaseStudyInstitution {
                    case_study_id: row.try_get("case_study_id")?,
                    institution_name: row.try_get("institution_name")?,
                    location: row.try_get("location")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }
}
