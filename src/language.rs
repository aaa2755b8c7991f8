//! Target-language codes.
//!
//! The set of languages is open-ended (whatever the translation service
//! supports), so a code is only checked for shape: a 2-3 letter primary
//! subtag with an optional region or script subtag (`fr`, `pt-BR`, `zh-TW`).

use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

static LANGUAGE_CODE_REGEX: OnceLock<Regex> = OnceLock::new();

fn language_code_regex() -> &'static Regex {
    LANGUAGE_CODE_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2,4})?$").expect("language code regex is valid")
    })
}

/// A validated target-language code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.eq_ignore_ascii_case("auto") {
            bail!("'auto' is only valid as a source language");
        }
        if !language_code_regex().is_match(code) {
            bail!("Invalid language code: '{}'", code);
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
