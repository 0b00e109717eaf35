//! Location id to normalized display name lookup.

use std::collections::HashMap;
use std::path::Path;

use ordersync_core::FieldValue;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::ConnectorResult;

#[derive(Debug, Deserialize)]
struct Region {
    #[serde(default)]
    city: Vec<CityEntry>,
}

#[derive(Debug, Deserialize)]
struct CityEntry {
    id: Value,
    #[serde(rename = "displayName")]
    display_name: String,
}

/// Read-only mapping from location id to display name.
#[derive(Debug, Clone, Default)]
pub struct LocationLookup {
    names: HashMap<String, String>,
}

impl LocationLookup {
    /// Creates an empty lookup.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the lookup from a metadata file.
    ///
    /// A missing or malformed file yields an empty lookup and a warning.
    pub async fn load(path: &Path) -> Self {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Location metadata not readable, using empty lookup");
                return Self::empty();
            }
        };

        match Self::from_json_str(&contents) {
            Ok(lookup) => {
                info!(path = %path.display(), entries = lookup.len(), "Loaded location lookup");
                lookup
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Location metadata malformed, using empty lookup");
                Self::empty()
            }
        }
    }

    /// Parses the `[{"city": [{"id", "displayName"}]}]` metadata format.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the format.
    pub fn from_json_str(contents: &str) -> ConnectorResult<Self> {
        let regions: Vec<Region> = serde_json::from_str(contents)?;
        let names = regions
            .into_iter()
            .flat_map(|region| region.city)
            .filter_map(|entry| {
                let id = match entry.id {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((id, entry.display_name))
            })
            .collect();
        Ok(Self { names })
    }

    /// Resolves a location id.
    #[must_use]
    pub fn resolve(&self, id: &FieldValue) -> Option<&str> {
        let key = id.as_text()?;
        self.names.get(&key).map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if the lookup has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocationLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let lookup = LocationLookup::from_json_str(
            r#"[
                {"city": [{"id": "C-1", "displayName": "Springfield"}, {"id": 7, "displayName": "Shelbyville"}]},
                {"name": "no cities here"}
            ]"#,
        )
        .unwrap();

        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.resolve(&FieldValue::from("C-1")), Some("Springfield"));
        assert_eq!(lookup.resolve(&FieldValue::Integer(7)), Some("Shelbyville"));
        assert_eq!(lookup.resolve(&FieldValue::from("7")), Some("Shelbyville"));
        assert_eq!(lookup.resolve(&FieldValue::Null), None);
    }

    #[test]
    fn test_malformed_metadata() {
        assert!(LocationLookup::from_json_str(r#"{"city": []}"#).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = LocationLookup::load(&dir.path().join("absent.json")).await;
        assert!(lookup.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("address_metadata.json");
        std::fs::write(&path, r#"[{"city": [{"id": "X", "displayName": "Xville"}]}]"#).unwrap();

        let lookup = LocationLookup::load(&path).await;
        assert_eq!(lookup.resolve(&FieldValue::from("X")), Some("Xville"));
    }
}
