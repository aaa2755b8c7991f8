use crate::db::{CaseStudyStore, InsertOutcome, InstitutionStore};
use crate::language::LanguageCode;
use crate::model::{CaseStudy, CaseStudyInstitution, Translations, TranslationEntry};
use crate::query::InstitutionQuery;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-process store with the same write semantics as [`crate::db::Database`]
///
/// Clones share the same underlying maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    case_studies: Arc<Mutex<BTreeMap<i64, CaseStudy>>>,
    institutions: Arc<Mutex<Vec<CaseStudyInstitution>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("In-memory store lock poisoned"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an institution, keyed by `(case_study_id, institution_name)`
    pub fn put_institution(&self, institution: CaseStudyInstitution) -> Result<()> {
        let mut institutions = lock(&self.institutions)?;
        institutions.retain(|i| {
            i.case_study_id != institution.case_study_id
                || i.institution_name != institution.institution_name
        });
        institutions.push(institution);
        Ok(())
    }

    /// Insert a record as-is, translations included
    pub fn put_case_study(&self, case_study: CaseStudy) -> Result<()> {
        lock(&self.case_studies)?.insert(case_study.id, case_study);
        Ok(())
    }
}

#[async_trait]
impl CaseStudyStore for MemoryStore {
    async fn list_case_studies(&self) -> Result<Vec<CaseStudy>> {
        Ok(lock(&self.case_studies)?.values().cloned().collect())
    }

    async fn get_case_study(&self, id: i64) -> Result<Option<CaseStudy>> {
        Ok(lock(&self.case_studies)?.get(&id).cloned())
    }

    async fn insert_case_study(&self, case_study: &CaseStudy) -> Result<InsertOutcome> {
        let mut case_studies = lock(&self.case_studies)?;
        if case_studies.contains_key(&case_study.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        case_studies.insert(case_study.id, case_study.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn update_case_study(&self, case_study: &CaseStudy) -> Result<bool> {
        let mut case_studies = lock(&self.case_studies)?;
        let Some(existing) = case_studies.get_mut(&case_study.id) else {
            return Ok(false);
        };
        let translations = existing.translations.take();
        *existing = CaseStudy {
            translations,
            ..case_study.clone()
        };
        Ok(true)
    }

    async fn ensure_translations(&self, id: i64) -> Result<()> {
        if let Some(case_study) = lock(&self.case_studies)?.get_mut(&id) {
            case_study.translations.get_or_insert_with(Translations::new);
        }
        Ok(())
    }

    async fn set_translation(
        &self,
        id: i64,
        language: &LanguageCode,
        attribute: &str,
        entry: &TranslationEntry,
    ) -> Result<()> {
        let mut case_studies = lock(&self.case_studies)?;
        let Some(translations) = case_studies
            .get_mut(&id)
            .and_then(|c| c.translations.as_mut())
        else {
            bail!(
                "Case study {} not found or has no translations map; {} translation not stored",
                id,
                language
            );
        };

        translations
            .entry(language.as_str().to_string())
            .or_default()
            .insert(attribute.to_string(), entry.clone());
        Ok(())
    }
}

#[async_trait]
impl InstitutionStore for MemoryStore {
    async fn query_institutions(&self, query: &InstitutionQuery) -> Result<Vec<CaseStudyInstitution>> {
        let mut matched: Vec<CaseStudyInstitution> = lock(&self.institutions)?
            .iter()
            .filter(|i| query.matches(i))
            .cloned()
            .collect();
        matched.sort_by(|a, b| query.compare(a, b));
        Ok(matched)
    }
}
