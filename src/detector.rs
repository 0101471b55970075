use crate::ast::{ImportedName, Module};
use crate::config::EngineConfig;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Validator-library detector for one source module.
///
/// The `ValidatorDetector` examines a module's `import` statements to find out which local
/// names refer to the validator-builder library and which refer to ORM schema helpers.
///
/// Currently recognizes:
/// - Builder namespaces: `import { z } from "zod"`, `import * as v from "zod"`, `import z from "zod"`
/// - Standalone builders: `import { object, string } from "zod"`
/// - ORM helpers: `import { createInsertSchema } from "drizzle-zod"` (aliases included)
///
/// The configured builder namespaces and ORM helper names always apply, even without an import.
pub struct ValidatorDetector;

/// The validator-related bindings visible in one module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorBindings {
    /// Local names acting as builder namespaces
    pub builder_namespaces: HashSet<String>,
    /// Local name to builder name for individually imported builders
    pub builder_functions: HashMap<String, String>,
    /// Local names of ORM schema helpers
    pub orm_helpers: HashSet<String>,
    /// Local names bound by `import * as ns` from any module
    pub namespace_imports: HashSet<String>,
}

impl ValidatorBindings {
    /// Bindings that apply to every module regardless of its imports.
    pub fn defaults(config: &EngineConfig) -> Self {
        Self {
            builder_namespaces: config.builder_namespaces.iter().cloned().collect(),
            builder_functions: HashMap::new(),
            orm_helpers: config.orm_helpers.iter().cloned().collect(),
            namespace_imports: HashSet::new(),
        }
    }

    pub fn is_builder_namespace(&self, name: &str) -> bool {
        self.builder_namespaces.contains(name)
    }

    pub fn is_orm_helper(&self, name: &str) -> bool {
        self.orm_helpers.contains(name)
    }
}

impl ValidatorDetector {
    /// Detects validator bindings in a parsed module.
    ///
    /// # Arguments
    ///
    /// * `module` - The parsed module whose imports are examined
    /// * `config` - Supplies the validator and ORM module specifiers plus the default names
    ///
    /// # Returns
    ///
    /// Returns the [`ValidatorBindings`] for the module, defaults included.
    ///
    /// # Example
    ///
    /// ```
    /// use schema_from_source::config::EngineConfig;
    /// use schema_from_source::detector::ValidatorDetector;
    /// use schema_from_source::parser::AstParser;
    ///
    /// let module = AstParser::parse_source("import * as v from 'zod';").unwrap();
    /// let bindings = ValidatorDetector::detect(&module, &EngineConfig::default());
    /// assert!(bindings.is_builder_namespace("v"));
    /// ```
    pub fn detect(module: &Module, config: &EngineConfig) -> ValidatorBindings {
        let mut bindings = ValidatorBindings::defaults(config);

        for import in &module.imports {
            if matches!(import.imported, ImportedName::Namespace) {
                bindings.namespace_imports.insert(import.local.clone());
            }

            if Self::matches_module(&import.source, &config.validator_modules) {
                match &import.imported {
                    ImportedName::Namespace | ImportedName::Default => {
                        bindings.builder_namespaces.insert(import.local.clone());
                    }
                    ImportedName::Named(name) if name == "z" || config.builder_namespaces.contains(name) => {
                        bindings.builder_namespaces.insert(import.local.clone());
                    }
                    ImportedName::Named(name) => {
                        bindings.builder_functions.insert(import.local.clone(), name.clone());
                    }
                }
                // a validator import is never a factory namespace
                bindings.namespace_imports.remove(&import.local);
            } else if Self::matches_module(&import.source, &config.orm_modules) {
                if let ImportedName::Named(name) = &import.imported {
                    if config.orm_helpers.contains(name) {
                        bindings.orm_helpers.insert(import.local.clone());
                    }
                }
            }
        }

        debug!(
            "Detected builder namespaces {:?}, ORM helpers {:?}",
            bindings.builder_namespaces, bindings.orm_helpers
        );
        bindings
    }

    fn matches_module(source: &str, modules: &[String]) -> bool {
        modules
            .iter()
            .any(|m| source == m || source.strip_prefix(m.as_str()).is_some_and(|rest| rest.starts_with('/')))
    }
}
