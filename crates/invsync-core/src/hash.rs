//! Stable entity identifiers

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use invsync_api::Domain;
use invsync_probe::RawDocument;

use crate::schema::primary_key;

/// SHA-256 (hex) of a row's primary-key values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashId(String);

impl HashId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for HashId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Key component in canonical form: scalars as text, absent or structured
/// values as `None`
fn key_component(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Identify `doc` within `domain` by its primary-key values only
///
/// The key tuple is framed as a JSON array, so `("1", "23")` and `("12", "3")`
/// hash differently.
#[must_use]
pub fn hash_id(domain: Domain, doc: &RawDocument) -> HashId {
    let components: Vec<Option<String>> = primary_key(domain)
        .iter()
        .map(|field| key_component(doc.get(*field)))
        .collect();
    let framed = serde_json::to_string(&components).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(domain.table().as_bytes());
    hasher.update([0u8]);
    hasher.update(framed.as_bytes());

    HashId(format!("{:x}", hasher.finalize()))
}
