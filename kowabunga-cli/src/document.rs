//! Configuration documents
//!
//! A document declares the provider connection and the desired objects:
//!
//! ```json
//! {
//!   "provider": { "uri": "https://kowabunga.acme.com" },
//!   "resources": [
//!     { "type": "region", "name": "eu-west", "attributes": { "name": "eu-west", "domain": "acme.internal" } }
//!   ],
//!   "data": [
//!     { "type": "regions", "name": "all" }
//!   ]
//! }
//! ```
//!
//! `id` optionally pins an entry to an existing object; otherwise the object
//! is looked up by the entry name.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use kowabunga_core::resource::{Resource, attributes_from_json};
use kowabunga_provider::ProviderConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub resources: Vec<Entry>,
    #[serde(default)]
    pub data: Vec<Entry>,
}

/// One declared resource or data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "empty_object")]
    pub attributes: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Entry {
    pub fn to_resource(&self, read_only: bool) -> Resource {
        let mut resource = Resource::new(&self.resource_type, &self.name).with_read_only(read_only);
        resource.attributes = attributes_from_json(&self.attributes);
        resource
    }

    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        let document: Document = serde_json::from_str(text).context("Invalid document")?;
        document.check_unique()?;
        Ok(document)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to load {}", path.display()))
    }

    fn check_unique(&self) -> Result<()> {
        for (kind, entries) in [("resource", &self.resources), ("data source", &self.data)] {
            let mut seen = HashSet::new();
            for entry in entries {
                if !entry.attributes.is_object() {
                    bail!("{} {}: attributes must be an object", kind, entry.address());
                }
                if !seen.insert(entry.address()) {
                    bail!("Duplicate {} {}", kind, entry.address());
                }
            }
        }
        Ok(())
    }

    pub fn resources(&self) -> Vec<(Resource, Option<String>)> {
        self.resources
            .iter()
            .map(|entry| (entry.to_resource(false), entry.id.clone()))
            .collect()
    }

    pub fn data_sources(&self) -> Vec<Resource> {
        self.data.iter().map(|entry| entry.to_resource(true)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kowabunga_core::resource::Value;

    #[test]
    fn parses_entries() {
        let doc = Document::parse(
            r#"{
                "provider": {"uri": "https://kowabunga.acme.com", "token": "t"},
                "resources": [
                    {"type": "zone", "name": "a", "id": "z1", "attributes": {"name": "a", "region": "eu-west"}}
                ],
                "data": [{"type": "regions", "name": "all"}]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.provider.as_ref().unwrap().uri, "https://kowabunga.acme.com");
        let resources = doc.resources();
        let (zone, id) = &resources[0];
        assert_eq!(id.as_deref(), Some("z1"));
        assert_eq!(zone.attributes["region"], Value::from("eu-west"));
        assert!(doc.data_sources()[0].is_data_source());
    }

    #[test]
    fn rejects_duplicate_entries() {
        let err = Document::parse(
            r#"{"resources": [
                {"type": "team", "name": "ops", "attributes": {"name": "ops"}},
                {"type": "team", "name": "ops", "attributes": {"name": "ops"}}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate resource team.ops"));
    }

    #[test]
    fn rejects_unknown_sections() {
        assert!(Document::parse(r#"{"outputs": []}"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.json");
        fs::write(&path, r#"{"resources": []}"#).unwrap();
        assert!(Document::load(&path).unwrap().resources.is_empty());
        assert!(Document::load(&dir.path().join("missing.json")).is_err());
    }
}
