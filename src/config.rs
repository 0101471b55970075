//! Engine configuration.
//!
//! Settings control where sources are found and which import modules count as
//! validator or ORM libraries. A configuration file may be YAML or JSON; every
//! field is optional and falls back to [`EngineConfig::default`].

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Source roots, relative to the project directory. Empty means the project directory itself.
    pub roots: Vec<PathBuf>,
    /// File extensions (without the dot) treated as sources
    pub extensions: Vec<String>,
    /// Directory names never descended into
    pub ignored_dirs: Vec<String>,
    /// Identifiers that always act as a validator-builder namespace (`z.string()`)
    pub builder_namespaces: Vec<String>,
    /// Import specifiers whose bindings become builder namespaces
    pub validator_modules: Vec<String>,
    /// Helper names that derive a validator schema from a table definition
    pub orm_helpers: Vec<String>,
    /// Import specifiers whose bindings become ORM helpers
    pub orm_modules: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: ["ts", "tsx", "mts", "cts"].iter().map(|s| s.to_string()).collect(),
            ignored_dirs: ["node_modules", "dist", "build", "target", "coverage", "out"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            builder_namespaces: vec!["z".to_string(), "zod".to_string()],
            validator_modules: vec!["zod".to_string(), "zod/v4".to_string(), "zod/v3".to_string()],
            orm_helpers: vec![
                "createInsertSchema".to_string(),
                "createSelectSchema".to_string(),
                "createUpdateSchema".to_string(),
            ],
            orm_modules: vec!["drizzle-zod".to_string()],
        }
    }
}

impl EngineConfig {
    /// Loads a configuration file, choosing the format by extension (`.json` or YAML otherwise).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match the configuration shape.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading engine configuration from {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config = if is_json {
            serde_json::from_str(&content).map_err(crate::error::Error::from)
        } else {
            serde_yaml::from_str(&content).map_err(crate::error::Error::from)
        }
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Source roots resolved against the project directory
    pub fn resolved_roots(&self, project: &Path) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            return vec![project.to_path_buf()];
        }
        self.roots
            .iter()
            .map(|root| if root.is_absolute() { root.clone() } else { project.join(root) })
            .collect()
    }

    pub fn is_source_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.is_source_extension("ts"));
        assert!(!config.is_source_extension("rs"));
        assert_eq!(config.builder_namespaces, vec!["z", "zod"]);
        assert!(config.orm_helpers.contains(&"createInsertSchema".to_string()));
    }

    #[test]
    fn test_load_yaml_keeps_defaults_for_missing_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.yaml");
        fs::write(&path, "roots: [src]\nbuilder_namespaces: [v]\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.roots, vec![PathBuf::from("src")]);
        assert_eq!(config.builder_namespaces, vec!["v"]);
        assert_eq!(config.extensions, EngineConfig::default().extensions);
    }

    #[test]
    fn test_load_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.json");
        fs::write(&path, r#"{ "orm_helpers": ["toSchema"] }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.orm_helpers, vec!["toSchema"]);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.yaml");
        fs::write(&path, "roots: 42").unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_resolved_roots() {
        let mut config = EngineConfig::default();
        assert_eq!(config.resolved_roots(Path::new("/p")), vec![PathBuf::from("/p")]);
        config.roots = vec![PathBuf::from("src"), PathBuf::from("/abs")];
        assert_eq!(
            config.resolved_roots(Path::new("/p")),
            vec![PathBuf::from("/p/src"), PathBuf::from("/abs")]
        );
    }
}
