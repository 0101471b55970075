//! The schema engine and its layered named-schema table.
//!
//! Three layers feed the table, lowest priority first: schemas of native type declarations,
//! schemas of validator declarations, and override documents. A higher layer replaces a
//! lower layer's value for the same name wholesale.

use crate::ast::{DeclarationKind, Expr};
use crate::config::EngineConfig;
use crate::declaration_index::{DeclarationIndex, Located, Namespace};
use crate::naming::{is_generic_placeholder, is_valid_schema_name, parse_type_name, GenericName};
use crate::parser::AstParser;
use crate::resolver::classify::FactoryCallee;
use crate::resolver::{ResolutionContext, Resolver, ValueRole};
use crate::schema::{SchemaKind, SchemaNode};
use indexmap::IndexMap;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resolves schema names against one project.
///
/// The engine owns the declaration index and every cache of the run; it is single-threaded
/// and all state grows monotonically until the engine is dropped.
pub struct SchemaEngine {
    index: DeclarationIndex,
    ctx: ResolutionContext,
    config: EngineConfig,
    overrides: IndexMap<String, Value>,
}

impl SchemaEngine {
    /// Creates an engine over a project directory.
    ///
    /// # Arguments
    ///
    /// * `project` - The project directory; configured roots are resolved against it
    /// * `config` - Engine configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use schema_from_source::config::EngineConfig;
    /// use schema_from_source::merger::SchemaEngine;
    /// use schema_from_source::resolver::ValueRole;
    /// use std::path::Path;
    ///
    /// let mut engine = SchemaEngine::new(Path::new("./my-app"), EngineConfig::default());
    /// let user = engine.resolve_by_name("User", ValueRole::Body);
    /// let table = engine.named_schemas();
    /// println!("{} -> {}", user.to_value(), table.len());
    /// ```
    pub fn new(project: &Path, config: EngineConfig) -> Self {
        let roots = config.resolved_roots(project);
        Self::with_roots(roots, config)
    }

    /// Creates an engine over explicit source roots.
    pub fn with_roots(roots: Vec<PathBuf>, config: EngineConfig) -> Self {
        Self {
            index: DeclarationIndex::new(roots, &config),
            ctx: ResolutionContext::new(),
            config,
            overrides: IndexMap::new(),
        }
    }

    /// Adds an override document. Documents added later win over earlier ones.
    pub fn add_overrides(&mut self, document: IndexMap<String, Value>) {
        debug!("Adding {} override schemas", document.len());
        self.overrides.extend(document);
    }

    fn resolver(&mut self) -> Resolver<'_> {
        Resolver::new(&mut self.index, &mut self.ctx, &self.config)
    }

    /// Resolves a schema name for a value in the given role.
    ///
    /// Accepts plain names and generic instantiations written as strings
    /// (`Paginated<User>`). An override for the exact name wins; a name defined nowhere
    /// resolves to an opaque object.
    pub fn resolve_by_name(&mut self, name: &str, role: ValueRole) -> SchemaNode {
        let name = name.trim();
        debug!("Resolving {} as {:?}", name, role);

        if let Some(value) = self.overrides.get(name) {
            return SchemaNode::verbatim(value.clone());
        }

        let node = match parse_type_name(name) {
            Some(generic) => self.resolve_generic(name, &generic),
            None => self.resolver().resolve_declared_name(name),
        };
        apply_role(node, role)
    }

    /// `Base<Args>`: a generic type declaration is instantiated, a factory function is
    /// expanded with the arguments as schema names.
    fn resolve_generic(&mut self, name: &str, generic: &GenericName) -> SchemaNode {
        if self.index.find_declaration(&generic.base, Namespace::Type).is_some() {
            return match AstParser::parse_type(name) {
                Ok(ty) => self.resolver().resolve_type(&ty),
                Err(e) => {
                    debug!("Cannot read {} as a type: {}", name, e);
                    SchemaNode::opaque()
                }
            };
        }

        let is_function = self
            .index
            .find_declaration(&generic.base, Namespace::Value)
            .is_some_and(|located| located.decl.as_function().is_some());
        if is_function {
            let aliases = self.index.alias_targets();
            let args: Vec<Expr> = generic
                .args
                .iter()
                .map(|arg| match aliases.get(arg) {
                    Some(target) => Expr::Ident(target.clone()),
                    None if is_valid_schema_name(arg) => Expr::Ident(arg.clone()),
                    None => Expr::Opaque,
                })
                .collect();
            let callee = FactoryCallee::Local(generic.base.clone());
            if let Some(node) = self.resolver().expand_factory(&callee, &args) {
                return node;
            }
        }

        debug!("{} names neither a generic type nor a factory", generic.base);
        SchemaNode::opaque()
    }

    /// Resolves every exported, non-generic type declaration and every exported validator
    /// declaration under the roots, filling the table.
    ///
    /// # Returns
    ///
    /// The number of declarations resolved.
    pub fn resolve_exported(&mut self) -> usize {
        let files = self.index.files();
        let mut count = 0;
        for file in files.iter() {
            let Some(parsed) = self.index.parsed_file(file) else { continue };
            for decl in &parsed.module.declarations {
                if !decl.exported {
                    continue;
                }
                let located = Located {
                    decl: decl.clone(),
                    file: file.clone(),
                };
                let mut resolver = self.resolver();
                let generic = match &decl.kind {
                    DeclarationKind::TypeAlias { params, .. } | DeclarationKind::Interface { params, .. } => {
                        !params.is_empty()
                    }
                    _ => false,
                };
                if decl.is_type() && !generic {
                    resolver.resolve_located_type(&located, &[]);
                    count += 1;
                } else if resolver.is_validator_declaration(&located) {
                    resolver.resolve_validator_declaration(&located);
                    count += 1;
                }
            }
        }
        info!("Resolved {} exported declarations", count);
        count
    }

    /// The named-schema table: every schema registered so far plus the overrides.
    ///
    /// Names referenced from resolved schemas are resolved first so every `$ref` has an
    /// entry. Generic placeholders and names that are not valid schema names are left out.
    pub fn named_schemas(&mut self) -> BTreeMap<String, SchemaNode> {
        self.resolver().drain_pending();

        let mut table = BTreeMap::new();
        for (name, node) in self.ctx.type_schemas() {
            table.insert(name.clone(), node.clone());
        }
        for (name, node) in self.ctx.validator_schemas() {
            table.insert(name.clone(), node.clone());
        }
        for (name, value) in &self.overrides {
            table.insert(name.clone(), SchemaNode::verbatim(value.clone()));
        }
        table.retain(|name, _| is_valid_schema_name(name) && !is_generic_placeholder(name));
        table
    }
}

/// Shapes a resolved value for the position it occupies.
///
/// Query values cannot carry `null`, so nullable properties become optional instead; path
/// values are always present. Body and response values keep their shape.
pub fn apply_role(mut node: SchemaNode, role: ValueRole) -> SchemaNode {
    if let SchemaKind::Object { properties, required, .. } = &mut node.kind {
        match role {
            ValueRole::Query => {
                for (name, property) in properties.iter_mut() {
                    if property.nullable {
                        property.nullable = false;
                        required.retain(|r| r != name);
                    }
                }
            }
            ValueRole::Path => {
                *required = properties.keys().cloned().collect();
            }
            ValueRole::Body | ValueRole::Response => {}
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PrimitiveKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params_object() -> SchemaNode {
        let mut props = IndexMap::new();
        let mut cursor = SchemaNode::string();
        cursor.nullable = true;
        props.insert("cursor".to_string(), cursor);
        props.insert("limit".to_string(), SchemaNode::primitive(PrimitiveKind::Integer));
        SchemaNode::object(props, vec!["cursor".into()])
    }

    #[test]
    fn test_query_role_turns_nullable_into_optional() {
        let node = apply_role(params_object(), ValueRole::Query);
        assert_eq!(
            node.to_value(),
            json!({
                "type": "object",
                "properties": { "cursor": { "type": "string" }, "limit": { "type": "integer" } }
            })
        );
    }

    #[test]
    fn test_path_role_requires_everything() {
        let node = apply_role(params_object(), ValueRole::Path);
        assert_eq!(node.to_value()["required"], json!(["cursor", "limit"]));
    }

    #[test]
    fn test_body_role_keeps_shape() {
        assert_eq!(apply_role(params_object(), ValueRole::Body), params_object());
    }

    #[test]
    fn test_empty_engine_resolves_to_opaque() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut engine = SchemaEngine::new(dir.path(), EngineConfig::default());
        assert!(engine.resolve_by_name("Missing", ValueRole::Body).is_opaque());
        assert!(engine.resolve_by_name("Missing<Thing>", ValueRole::Body).is_opaque());
        assert!(engine.named_schemas().is_empty());
    }

    #[test]
    fn test_override_wins_verbatim() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut engine = SchemaEngine::new(dir.path(), EngineConfig::default());
        let mut doc = IndexMap::new();
        doc.insert("Money".to_string(), json!({ "type": "string", "pattern": "^\\d+$" }));
        doc.insert("T".to_string(), json!({ "type": "string" }));
        engine.add_overrides(doc);

        assert_eq!(
            engine.resolve_by_name("Money", ValueRole::Body).to_value(),
            json!({ "type": "string", "pattern": "^\\d+$" })
        );
        let table = engine.named_schemas();
        assert_eq!(table.keys().cloned().collect::<Vec<_>>(), vec!["Money"]);
    }
}
