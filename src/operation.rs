//! Operation records: which schema names an API operation uses in each position.

use crate::merger::SchemaEngine;
use crate::resolver::ValueRole;
use crate::schema::SchemaNode;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Schema names used by one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationRecord {
    #[serde(alias = "operationId")]
    pub operation_id: String,
    pub body: Option<String>,
    pub query: Option<String>,
    pub path: Option<String>,
    /// Status code to schema name
    #[serde(deserialize_with = "deserialize_responses")]
    pub responses: BTreeMap<String, String>,
}

/// An operation with every named schema resolved for its role
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOperation {
    #[serde(rename = "operationId")]
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<SchemaNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<SchemaNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<SchemaNode>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, SchemaNode>,
}

/// Status codes may be written as numbers (`200:` in YAML) or strings
fn deserialize_responses<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize, PartialEq, Eq, PartialOrd, Ord)]
    #[serde(untagged)]
    enum StatusKey {
        Code(u16),
        Text(String),
    }

    let raw: BTreeMap<StatusKey, String> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, name)| {
            let key = match key {
                StatusKey::Code(code) => code.to_string(),
                StatusKey::Text(text) => text,
            };
            (key, name)
        })
        .collect())
}

/// Loads operation records from a YAML or JSON file holding a list of records.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a list of operation records.
pub fn load_operations(path: &Path) -> Result<Vec<OperationRecord>> {
    debug!("Loading operations from {}", path.display());
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read operations file: {}", path.display()))?;

    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let records = if is_json {
        serde_json::from_str(&content).map_err(crate::error::Error::from)
    } else {
        serde_yaml::from_str(&content).map_err(crate::error::Error::from)
    }
    .with_context(|| format!("Invalid operations file: {}", path.display()))?;

    Ok(records)
}

impl SchemaEngine {
    /// Resolves every schema name of an operation in its role.
    pub fn resolve_operation(&mut self, operation: &OperationRecord) -> ResolvedOperation {
        debug!("Resolving operation {}", operation.operation_id);
        let mut resolve = |name: &Option<String>, role: ValueRole| name.as_deref().map(|n| self.resolve_by_name(n, role));

        let body = resolve(&operation.body, ValueRole::Body);
        let query = resolve(&operation.query, ValueRole::Query);
        let path = resolve(&operation.path, ValueRole::Path);
        let responses = operation
            .responses
            .iter()
            .map(|(status, name)| (status.clone(), self.resolve_by_name(name, ValueRole::Response)))
            .collect();

        ResolvedOperation {
            operation_id: operation.operation_id.clone(),
            body,
            query,
            path,
            responses,
        }
    }
}
