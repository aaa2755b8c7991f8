use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single cached translation of one attribute into one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationEntry {
    pub value: String,
    pub detected_source_language: String,
}

/// Cached translations of a record: language code -> attribute name -> entry
pub type Translations = BTreeMap<String, BTreeMap<String, TranslationEntry>>;

/// A stored case-study record
///
/// Records may be written by other tools, so only `id` is required when
/// reading one back. Schema attributes that are absent, null or of the wrong
/// type decode as `None` and the raw value is kept in `extra`, so listing a
/// record never fails and serializing it reproduces what was stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Map<String, Value>")]
pub struct CaseStudy {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<Translations>,
    /// Attributes outside the fixed schema, kept as stored
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Move `key` out of `item` if it decodes as `T`, otherwise leave it in place
fn take_typed<T: DeserializeOwned>(item: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = item.get(key)?;
    let typed = T::deserialize(value).ok()?;
    item.remove(key);
    Some(typed)
}

impl TryFrom<Map<String, Value>> for CaseStudy {
    type Error = String;

    fn try_from(mut item: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = match item.remove("id") {
            Some(value) => value
                .as_i64()
                .ok_or_else(|| format!("'id' must be an integer, got {}", value))?,
            None => return Err("missing field `id`".to_string()),
        };

        let translations = match item.remove("translations") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| format!("malformed translations map: {}", e))?,
            ),
        };

        Ok(Self {
            id,
            version: take_typed(&mut item, "version"),
            title: take_typed(&mut item, "title"),
            author: take_typed(&mut item, "author"),
            year: take_typed(&mut item, "year"),
            description: take_typed(&mut item, "description"),
            is_published: take_typed(&mut item, "isPublished"),
            translations,
            extra: item,
        })
    }
}

impl CaseStudy {
    /// Look up a string attribute by its wire name
    ///
    /// Returns `None` when the attribute is absent or not a string.
    pub fn text_attribute(&self, name: &str) -> Option<&str> {
        let typed = match name {
            "version" => &self.version,
            "title" => &self.title,
            "author" => &self.author,
            "description" => &self.description,
            other => return self.extra.get(other).and_then(Value::as_str),
        };
        typed.as_deref()
    }

    /// The cached entry at `(language, attribute)`, if one exists
    pub fn cached_translation(&self, language: &str, attribute: &str) -> Option<&TranslationEntry> {
        self.translations
            .as_ref()?
            .get(language)?
            .get(attribute)
    }

    /// Check the fields a record submitted over the API must carry
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("version", &self.version),
            ("title", &self.title),
            ("author", &self.author),
            ("description", &self.description),
        ];
        for (name, value) in required {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(format!("'{}' must be a non-empty string", name));
            }
        }
        match self.year {
            Some(year) if (1000..=9999).contains(&year) => {}
            Some(year) => return Err(format!("'year' must be a four-digit year, got {}", year)),
            None => return Err("'year' must be a number".to_string()),
        }
        if self.is_published.is_none() {
            return Err("'isPublished' must be a boolean".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyInstitution {
    pub case_study_id: i64,
    pub institution_name: String,
    pub location: String,
    pub description: String,
}
