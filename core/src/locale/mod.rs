//! Localized UI strings.
//!
//! Tables are loaded once (embedded defaults, optionally overridden from a
//! directory of `<code>.json` files) and are read-only afterwards. Lookups use
//! dotted keys into nested JSON objects; a missing key yields `[key]` so the
//! caller always has something to show.

use crate::types::LanguageCode;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, warn};

const EMBEDDED_EN: &str = include_str!("en.json");
const EMBEDDED_FA: &str = include_str!("fa.json");

#[derive(Debug, Clone, Default)]
pub struct Translations {
    tables: HashMap<LanguageCode, Value>,
}

impl Translations {
    /// Tables compiled into the binary
    pub fn embedded() -> Result<Self> {
        let mut tables = HashMap::new();
        tables.insert(LanguageCode::English, serde_json::from_str(EMBEDDED_EN)?);
        tables.insert(LanguageCode::Persian, serde_json::from_str(EMBEDDED_FA)?);
        Ok(Self { tables })
    }

    /// Embedded tables, replaced per language by `<dir>/<code>.json` where present
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut translations = Self::embedded()?;
        for lang in LanguageCode::ALL {
            let path = dir.join(format!("{}.json", lang.code()));
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(target = "locale", path = %path.display(), error = %e, "Language file not loaded; keeping embedded table");
                    continue;
                }
            };
            match serde_json::from_str::<Value>(&raw) {
                Ok(table) => {
                    translations.tables.insert(lang, table);
                }
                Err(e) => {
                    error!(target = "locale", path = %path.display(), error = %e, "Error parsing language file; keeping embedded table");
                }
            }
        }
        Ok(translations)
    }

    /// Build from explicit tables (tests, custom deployments)
    pub fn from_tables(tables: impl IntoIterator<Item = (LanguageCode, Value)>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
        }
    }

    pub fn lookup(&self, language: LanguageCode, key: &str) -> String {
        self.format(language, key, &[])
    }

    /// Look up `key` and substitute `{name}` placeholders from `params`.
    /// Placeholders without a matching param are left as written.
    pub fn format(&self, language: LanguageCode, key: &str, params: &[(&str, String)]) -> String {
        let Some(text) = self.raw(language, key) else {
            return format!("[{key}]");
        };

        let mut text = text.replace("\\n", "\n");
        for (name, value) in params {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }

    pub fn has_key(&self, language: LanguageCode, key: &str) -> bool {
        self.raw(language, key).is_some()
    }

    fn raw(&self, language: LanguageCode, key: &str) -> Option<&str> {
        let mut node = self.tables.get(&language)?;
        for part in key.split('.') {
            node = node.as_object()?.get(part)?;
        }
        node.as_str()
    }
}
