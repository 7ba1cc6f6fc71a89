//! Package exclusion and dictionary rules
//!
//! The rules file is a JSON object keyed by variant (`linux`, `windows`,
//! `macos`, ...). Each variant carries rule sets for the `packages` and
//! `hotfixes` tables:
//!
//! ```json
//! {
//!   "linux": {
//!     "packages": {
//!       "exclude": [{"field": "name", "pattern": "linux-image-", "match": "prefix"}],
//!       "dictionary": [
//!         {"field": "vendor", "pattern": "Ubuntu", "match": "contains",
//!          "set": {"vendor": "Canonical Ltd."}}
//!       ]
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use invsync_api::Domain;
use invsync_probe::RawDocument;
use invsync_probe::types::field_text;

use crate::error::CoreError;

/// How a rule pattern is compared with a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    #[default]
    Exact,
    Prefix,
    Suffix,
    Contains,
}

impl MatchKind {
    fn matches(self, value: &str, pattern: &str) -> bool {
        match self {
            MatchKind::Exact => value == pattern,
            MatchKind::Prefix => value.starts_with(pattern),
            MatchKind::Suffix => value.ends_with(pattern),
            MatchKind::Contains => value.contains(pattern),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Matcher {
    field: String,
    pattern: String,
    #[serde(default, rename = "match")]
    kind: MatchKind,
}

impl Matcher {
    fn matches(&self, row: &RawDocument) -> bool {
        field_text(row, &self.field).is_some_and(|value| self.kind.matches(&value, &self.pattern))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DictionaryRule {
    #[serde(flatten)]
    matcher: Matcher,
    /// Fields written on a match
    set: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TableRules {
    #[serde(default)]
    exclude: Vec<Matcher>,
    #[serde(default)]
    dictionary: Vec<DictionaryRule>,
}

impl TableRules {
    fn is_empty(&self) -> bool {
        self.exclude.is_empty() && self.dictionary.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct VariantRules {
    #[serde(default)]
    packages: TableRules,
    #[serde(default)]
    hotfixes: TableRules,
}

/// Rules of one variant, applied to package and hotfix rows before diffing
#[derive(Debug, Clone, Default)]
pub struct PackageRules {
    packages: TableRules,
    hotfixes: TableRules,
}

impl PackageRules {
    /// Rules that keep every row untouched
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the `variant` section of the rules file at `path`
    ///
    /// A file without the requested variant yields empty rules.
    ///
    /// # Errors
    /// Returns [`CoreError::Rules`] if the file cannot be read or parsed.
    pub fn load(path: &Path, variant: &str) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Rules(format!("{}: {e}", path.display())))?;
        let rules = Self::from_json(&content, variant)?;

        info!(
            path = %path.display(),
            variant = %variant,
            excludes = rules.packages.exclude.len() + rules.hotfixes.exclude.len(),
            dictionary = rules.packages.dictionary.len() + rules.hotfixes.dictionary.len(),
            "normalizer rules loaded"
        );

        Ok(rules)
    }

    /// Parse the `variant` section of a rules document
    ///
    /// # Errors
    /// Returns [`CoreError::Rules`] if the document is malformed.
    pub fn from_json(content: &str, variant: &str) -> Result<Self, CoreError> {
        let mut variants: HashMap<String, VariantRules> =
            serde_json::from_str(content).map_err(|e| CoreError::Rules(e.to_string()))?;

        let Some(selected) = variants.remove(variant) else {
            warn!(variant = %variant, "no normalizer rules for variant");
            return Ok(Self::empty());
        };

        Ok(Self {
            packages: selected.packages,
            hotfixes: selected.hotfixes,
        })
    }

    fn for_domain(&self, domain: Domain) -> Option<&TableRules> {
        let rules = match domain {
            Domain::Packages => &self.packages,
            Domain::Hotfixes => &self.hotfixes,
            _ => return None,
        };
        (!rules.is_empty()).then_some(rules)
    }

    /// Drop excluded rows, then rewrite fields of rows matching a dictionary
    /// rule
    #[must_use]
    pub fn apply(&self, domain: Domain, rows: Vec<RawDocument>) -> Vec<RawDocument> {
        let Some(rules) = self.for_domain(domain) else {
            return rows;
        };

        let before = rows.len();
        let rows: Vec<RawDocument> = rows
            .into_iter()
            .filter(|row| !rules.exclude.iter().any(|m| m.matches(row)))
            .map(|mut row| {
                for rule in &rules.dictionary {
                    if rule.matcher.matches(&row) {
                        for (key, value) in &rule.set {
                            row.insert(key.clone(), value.clone());
                        }
                    }
                }
                row
            })
            .collect();

        if rows.len() != before {
            debug!(%domain, excluded = before - rows.len(), "rows excluded by rules");
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RULES: &str = r#"{
        "linux": {
            "packages": {
                "exclude": [
                    {"field": "name", "pattern": "linux-image-", "match": "prefix"},
                    {"field": "name", "pattern": "gpg-pubkey"}
                ],
                "dictionary": [
                    {"field": "vendor", "pattern": "Ubuntu", "match": "contains",
                     "set": {"vendor": "Canonical Ltd."}}
                ]
            }
        },
        "windows": {
            "hotfixes": {
                "exclude": [{"field": "hotfix", "pattern": "KB0", "match": "prefix"}]
            }
        }
    }"#;

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_match_kinds() {
        assert!(MatchKind::Exact.matches("vim", "vim"));
        assert!(!MatchKind::Exact.matches("vim-tiny", "vim"));
        assert!(MatchKind::Prefix.matches("vim-tiny", "vim"));
        assert!(MatchKind::Suffix.matches("libfoo-dev", "-dev"));
        assert!(MatchKind::Contains.matches("python3-venv", "thon"));
    }

    #[test]
    fn test_apply_excludes_then_rewrites() {
        let rules = PackageRules::from_json(RULES, "linux").unwrap();
        let rows = vec![
            doc(json!({"name": "linux-image-6.1", "vendor": "Debian"})),
            doc(json!({"name": "gpg-pubkey"})),
            doc(json!({"name": "bash", "vendor": "Ubuntu Developers"})),
            doc(json!({"name": "curl"})),
        ];

        let kept = rules.apply(Domain::Packages, rows);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0]["vendor"], "Canonical Ltd.");
        assert!(kept[1].get("vendor").is_none());
    }

    #[test]
    fn test_rules_only_touch_their_table() {
        let rules = PackageRules::from_json(RULES, "windows").unwrap();
        let hotfixes = rules.apply(
            Domain::Hotfixes,
            vec![doc(json!({"hotfix": "KB0001"})), doc(json!({"hotfix": "KB5001"}))],
        );
        assert_eq!(hotfixes.len(), 1);

        let processes = rules.apply(Domain::Processes, vec![doc(json!({"hotfix": "KB0001"}))]);
        assert_eq!(processes.len(), 1);
    }

    #[test]
    fn test_unknown_variant_is_empty() {
        let rules = PackageRules::from_json(RULES, "macos").unwrap();
        let rows = vec![doc(json!({"name": "linux-image-6.1"}))];
        assert_eq!(rules.apply(Domain::Packages, rows).len(), 1);
    }

    #[test]
    fn test_malformed_rules_are_rejected() {
        assert!(matches!(
            PackageRules::from_json("[1, 2]", "linux"),
            Err(CoreError::Rules(_))
        ));
        assert!(matches!(
            PackageRules::load(Path::new("/nonexistent/rules.json"), "linux"),
            Err(CoreError::Rules(_))
        ));
    }
}
