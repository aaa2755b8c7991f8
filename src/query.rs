//! Institution lookup query construction.
//!
//! Turns the optional, mutually exclusive filters of an institution lookup
//! into exactly one [`InstitutionQuery`]. Construction is pure: the
//! descriptor names the index to read, the key condition and its bound
//! values, and the stores decide how to execute it.
//!
//! Filter priority: a non-empty `location` wins, then a non-empty
//! `institutionName`, otherwise every institution of the case study.

use crate::error::ApiError;
use crate::model::CaseStudyInstitution;
use serde::Deserialize;
use std::cmp::Ordering;

/// Raw query-string parameters of an institution lookup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionParams {
    pub case_study_id: Option<String>,
    pub location: Option<String>,
    pub institution_name: Option<String>,
}

/// Ordering of the institution collection a query reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstitutionIndex {
    /// Partitioned by case study, sorted by institution name
    Primary,
    /// Partitioned by case study, sorted by location
    Location,
}

impl InstitutionIndex {
    /// Index name as known to the store, `None` for the primary ordering
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::Primary => None,
            Self::Location => Some("location_ix"),
        }
    }
}

/// A value bound to a key-condition placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstitutionQuery {
    /// Every institution of one case study
    ByCaseStudy { case_study_id: i64 },
    /// Institutions whose name starts with `prefix`
    NamePrefix { case_study_id: i64, prefix: String },
    /// Institutions whose location starts with `prefix`, read via the location index
    LocationPrefix { case_study_id: i64, prefix: String },
}

impl InstitutionQuery {
    pub fn case_study_id(&self) -> i64 {
        match self {
            Self::ByCaseStudy { case_study_id }
            | Self::NamePrefix { case_study_id, .. }
            | Self::LocationPrefix { case_study_id, .. } => *case_study_id,
        }
    }

    pub fn index(&self) -> InstitutionIndex {
        match self {
            Self::LocationPrefix { .. } => InstitutionIndex::Location,
            Self::ByCaseStudy { .. } | Self::NamePrefix { .. } => InstitutionIndex::Primary,
        }
    }

    /// Key condition over the wire attribute names
    pub fn key_condition(&self) -> &'static str {
        match self {
            Self::ByCaseStudy { .. } => "caseStudyId = :c",
            Self::NamePrefix { .. } => "caseStudyId = :c and begins_with(institutionName, :n)",
            Self::LocationPrefix { .. } => "caseStudyId = :c and begins_with(location, :l)",
        }
    }

    /// Values for the placeholders in [`key_condition`](Self::key_condition)
    pub fn bound_values(&self) -> Vec<(&'static str, QueryValue)> {
        let partition = (":c", QueryValue::Int(self.case_study_id()));
        match self {
            Self::ByCaseStudy { .. } => vec![partition],
            Self::NamePrefix { prefix, .. } => {
                vec![partition, (":n", QueryValue::Text(prefix.clone()))]
            }
            Self::LocationPrefix { prefix, .. } => {
                vec![partition, (":l", QueryValue::Text(prefix.clone()))]
            }
        }
    }

    /// Whether an institution satisfies the key condition
    pub fn matches(&self, institution: &CaseStudyInstitution) -> bool {
        if institution.case_study_id != self.case_study_id() {
            return false;
        }
        match self {
            Self::ByCaseStudy { .. } => true,
            Self::NamePrefix { prefix, .. } => institution.institution_name.starts_with(prefix),
            Self::LocationPrefix { prefix, .. } => institution.location.starts_with(prefix),
        }
    }

    /// Result ordering implied by the selected index
    pub fn compare(&self, a: &CaseStudyInstitution, b: &CaseStudyInstitution) -> Ordering {
        match self.index() {
            InstitutionIndex::Primary => a.institution_name.cmp(&b.institution_name),
            InstitutionIndex::Location => a
                .location
                .cmp(&b.location)
                .then_with(|| a.institution_name.cmp(&b.institution_name)),
        }
    }
}

/// Build the single query for an institution lookup
///
/// A missing or non-integer `caseStudyId` is a caller error.
pub fn build_institution_query(params: &InstitutionParams) -> Result<InstitutionQuery, ApiError> {
    let raw_id = params
        .case_study_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing query parameter: caseStudyId"))?;

    let case_study_id: i64 = raw_id.parse().map_err(|_| {
        ApiError::bad_request(format!("caseStudyId must be an integer, got '{}'", raw_id))
    })?;

    let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(String::from);

    let query = if let Some(prefix) = non_empty(&params.location) {
        InstitutionQuery::LocationPrefix {
            case_study_id,
            prefix,
        }
    } else if let Some(prefix) = non_empty(&params.institution_name) {
        InstitutionQuery::NamePrefix {
            case_study_id,
            prefix,
        }
    } else {
        InstitutionQuery::ByCaseStudy { case_study_id }
    };

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(id: &str, location: Option<&str>, name: Option<&str>) -> InstitutionParams {
        InstitutionParams {
            case_study_id: Some(id.to_string()),
            location: location.map(String::from),
            institution_name: name.map(String::from),
        }
    }

    fn institution(id: i64, name: &str, location: &str) -> CaseStudyInstitution {
        CaseStudyInstitution {
            case_study_id: id,
            institution_name: name.to_string(),
            location: location.to_string(),
            description: String::new(),
        }
    }

    // ==================== Selection Tests ====================

    #[test]
    fn test_no_filters_selects_primary_partition_only() {
        let query = build_institution_query(&params("1", None, None)).unwrap();

        assert_eq!(query, InstitutionQuery::ByCaseStudy { case_study_id: 1 });
        assert_eq!(query.index(), InstitutionIndex::Primary);
        assert_eq!(query.key_condition(), "caseStudyId = :c");
        assert_eq!(query.bound_values(), vec![(":c", QueryValue::Int(1))]);
    }

    #[test]
    fn test_location_filter_selects_location_index() {
        let query = build_institution_query(&params("3", Some("Lon"), None)).unwrap();

        assert_eq!(query.index(), InstitutionIndex::Location);
        assert_eq!(query.index().name(), Some("location_ix"));
        assert_eq!(
            query.key_condition(),
            "caseStudyId = :c and begins_with(location, :l)"
        );
        assert_eq!(
            query.bound_values(),
            vec![
                (":c", QueryValue::Int(3)),
                (":l", QueryValue::Text("Lon".to_string()))
            ]
        );
    }

    #[test]
    fn test_location_takes_priority_over_institution_name() {
        let query = build_institution_query(&params("1", Some("Dub"), Some("St."))).unwrap();

        assert_eq!(
            query,
            InstitutionQuery::LocationPrefix {
                case_study_id: 1,
                prefix: "Dub".to_string()
            }
        );
    }

    #[test]
    fn test_institution_name_filter_selects_primary_with_prefix() {
        let query = build_institution_query(&params("1", None, Some("North"))).unwrap();

        assert_eq!(query.index(), InstitutionIndex::Primary);
        assert_eq!(query.index().name(), None);
        assert_eq!(
            query.key_condition(),
            "caseStudyId = :c and begins_with(institutionName, :n)"
        );
        assert_eq!(
            query.bound_values()[1],
            (":n", QueryValue::Text("North".to_string()))
        );
    }

    #[test]
    fn test_empty_location_falls_through_to_name() {
        let query = build_institution_query(&params("1", Some(""), Some("North"))).unwrap();
        assert!(matches!(query, InstitutionQuery::NamePrefix { .. }));

        let query = build_institution_query(&params("1", Some(""), Some(""))).unwrap();
        assert!(matches!(query, InstitutionQuery::ByCaseStudy { .. }));
    }

    // ==================== Caller Error Tests ====================

    #[test]
    fn test_missing_case_study_id() {
        let err = build_institution_query(&InstitutionParams::default()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(err.to_string().contains("caseStudyId"));
    }

    #[test]
    fn test_non_numeric_case_study_id() {
        for raw in ["abc", "1.5", "12abc", "0x10"] {
            let err = build_institution_query(&params(raw, None, None)).unwrap_err();
            assert!(
                matches!(err, ApiError::BadRequest(_)),
                "'{}' should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_case_study_id_is_trimmed() {
        let query = build_institution_query(&params(" 42 ", None, None)).unwrap();
        assert_eq!(query.case_study_id(), 42);
    }

    // ==================== Evaluation Tests ====================

    #[test]
    fn test_matches_scopes_to_case_study() {
        let query = InstitutionQuery::ByCaseStudy { case_study_id: 1 };
        assert!(query.matches(&institution(1, "TechLabs", "Leeds")));
        assert!(!query.matches(&institution(2, "TechLabs", "Leeds")));
    }

    #[test]
    fn test_matches_prefixes() {
        let by_location = InstitutionQuery::LocationPrefix {
            case_study_id: 3,
            prefix: "Le".to_string(),
        };
        assert!(by_location.matches(&institution(3, "TechLabs", "Leeds")));
        assert!(!by_location.matches(&institution(3, "SupplyChain Academy", "London")));

        let by_name = InstitutionQuery::NamePrefix {
            case_study_id: 3,
            prefix: "Supply".to_string(),
        };
        assert!(by_name.matches(&institution(3, "SupplyChain Academy", "London")));
        // Prefix match is case-sensitive, like the store's begins_with
        assert!(!by_name.matches(&institution(3, "supplychain", "London")));
    }

    #[test]
    fn test_compare_follows_index() {
        let a = institution(1, "Alpha", "Zagreb");
        let b = institution(1, "Beta", "Athens");

        let primary = InstitutionQuery::ByCaseStudy { case_study_id: 1 };
        assert_eq!(primary.compare(&a, &b), Ordering::Less);

        let location = InstitutionQuery::LocationPrefix {
            case_study_id: 1,
            prefix: String::new(),
        };
        assert_eq!(location.compare(&a, &b), Ordering::Greater);
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_unfiltered_uses_partition_only(id in any::<i64>()) {
            let query = build_institution_query(&params(&id.to_string(), None, None)).unwrap();
            prop_assert_eq!(query.index(), InstitutionIndex::Primary);
            prop_assert_eq!(query.bound_values(), vec![(":c", QueryValue::Int(id))]);
        }

        #[test]
        fn prop_location_always_wins(
            id in any::<i64>(),
            location in "[A-Za-z ]{1,12}",
            name in proptest::option::of("[A-Za-z ]{0,12}"),
        ) {
            let query = build_institution_query(
                &params(&id.to_string(), Some(&location), name.as_deref()),
            ).unwrap();
            prop_assert_eq!(query.index(), InstitutionIndex::Location);
            prop_assert_eq!(
                query,
                InstitutionQuery::LocationPrefix { case_study_id: id, prefix: location }
            );
        }

        #[test]
        fn prop_name_only_uses_primary_prefix(id in any::<i64>(), name in "[A-Za-z ]{1,12}") {
            let query = build_institution_query(&params(&id.to_string(), None, Some(&name))).unwrap();
            prop_assert_eq!(query.index(), InstitutionIndex::Primary);
            prop_assert_eq!(
                query,
                InstitutionQuery::NamePrefix { case_study_id: id, prefix: name }
            );
        }

        #[test]
        fn prop_non_numeric_id_is_caller_error(raw in "[A-Za-z]{1,8}") {
            let result = build_institution_query(&params(&raw, None, None));
            prop_assert!(matches!(result, Err(ApiError::BadRequest(_))));
        }
    }
}
