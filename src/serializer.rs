//! Serialization of schema documents to YAML or JSON, and loading of override documents.

use crate::operation::ResolvedOperation;
use crate::schema::SchemaNode;
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Output document: requested values, resolved operations and the named-schema table
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaDocument {
    /// Values requested by name, in request order
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub requested: IndexMap<String, SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<ResolvedOperation>,
    pub components: Components,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Components {
    pub schemas: BTreeMap<String, SchemaNode>,
}

/// Serializes a value to YAML.
///
/// # Errors
///
/// Returns an error if serialization fails.
///
/// # Example
///
/// ```
/// use schema_from_source::schema::SchemaNode;
/// use schema_from_source::serializer::serialize_yaml;
///
/// let yaml = serialize_yaml(&SchemaNode::string()).unwrap();
/// assert_eq!(yaml.trim(), "type: string");
/// ```
pub fn serialize_yaml<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(value).context("Failed to serialize document to YAML")
}

/// Serializes a value to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(value).context("Failed to serialize document to JSON")
}

/// Writes string content to a file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if a directory or the file cannot be written.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Loads an override document: a YAML or JSON mapping of schema names to schema values.
///
/// A full API document is accepted too, in which case its `components.schemas` mapping
/// is used.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or is not a mapping.
pub fn load_override_document(path: &Path) -> Result<IndexMap<String, Value>> {
    debug!("Loading override document {}", path.display());
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read override file: {}", path.display()))?;

    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let document: Value = if is_json {
        serde_json::from_str(&content).map_err(crate::error::Error::from)
    } else {
        serde_yaml::from_str(&content).map_err(crate::error::Error::from)
    }
    .with_context(|| format!("Invalid override file: {}", path.display()))?;

    let schemas = document.pointer("/components/schemas").unwrap_or(&document);
    let Value::Object(map) = schemas else {
        bail!("Override file {} is not a mapping of schema names", path.display());
    };
    Ok(map.iter().map(|(name, value)| (name.clone(), value.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_document() -> SchemaDocument {
        let mut document = SchemaDocument::default();
        document.requested.insert("Name".to_string(), SchemaNode::string());
        document
            .components
            .schemas
            .insert("User".to_string(), SchemaNode::array(SchemaNode::reference("Item")));
        document
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_document()).unwrap();
        assert!(yaml.contains("requested:"));
        assert!(yaml.contains("components:"));
        assert!(yaml.contains("schemas:"));
        assert!(yaml.contains("#/components/schemas/Item"));
        assert!(!yaml.contains("operations:"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&create_test_document()).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["components"]["schemas"]["User"]["items"], json!({ "$ref": "#/components/schemas/Item" }));
        assert_eq!(parsed["requested"]["Name"], json!({ "type": "string" }));
        assert!(json.lines().count() > 5);
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("nested").join("schemas.yaml");

        write_to_file("test content", &file_path).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "test content");

        write_to_file("new content", &file_path).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_load_override_document_yaml_and_components() {
        let temp_dir = TempDir::new().unwrap();
        let flat = temp_dir.path().join("overrides.yaml");
        fs::write(&flat, "Money:\n  type: string\n  pattern: '^[0-9]+$'\nUser:\n  type: object\n").unwrap();
        let document = load_override_document(&flat).unwrap();
        assert_eq!(document.keys().cloned().collect::<Vec<_>>(), vec!["Money", "User"]);
        assert_eq!(document["Money"], json!({ "type": "string", "pattern": "^[0-9]+$" }));

        let nested = temp_dir.path().join("api.json");
        fs::write(&nested, r#"{ "openapi": "3.0.0", "components": { "schemas": { "Id": { "type": "integer" } } } }"#).unwrap();
        let document = load_override_document(&nested).unwrap();
        assert_eq!(document["Id"], json!({ "type": "integer" }));
    }

    #[test]
    fn test_load_override_document_rejects_non_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("list.yaml");
        fs::write(&path, "- a\n- b\n").unwrap();
        assert!(load_override_document(&path).is_err());
    }
}
