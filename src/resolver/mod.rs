//! Static schema resolution.
//!
//! A [`Resolver`] borrows the shared [`DeclarationIndex`] and the per-run
//! [`ResolutionContext`] and turns type expressions, validator chains, ORM helper calls and
//! factory calls into [`SchemaNode`]s. Resolution is total: anything it cannot interpret
//! becomes an opaque object node.
//!
//! The submodules split the work by input shape:
//! - [`type_expr`]: native type expressions and named type declarations
//! - [`validator_chain`]: builder calls and modifier chains
//! - [`orm`]: "derive schema from table" helpers
//! - [`factory`]: user-defined functions returning validator chains
//! - [`classify`]: the single classification of call shapes the others dispatch on

pub mod classify;
pub mod factory;
pub mod orm;
pub mod type_expr;
pub mod validator_chain;

use crate::ast::Expr;
use crate::config::EngineConfig;
use crate::declaration_index::{DeclarationIndex, Located, Namespace};
use crate::detector::ValidatorBindings;
use crate::schema::SchemaNode;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

pub use factory::FactoryOutcome;

/// The position a requested value occupies in an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValueRole {
    #[default]
    Body,
    Query,
    Path,
    Response,
}

/// Per-run resolution state shared by every resolver.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    /// Declarations currently being resolved
    pub(crate) resolving: HashSet<(Namespace, String)>,
    /// Factory functions currently being expanded, keyed like `factory_cache`
    pub(crate) expanding: HashSet<String>,
    /// Native layer: schemas of type declarations
    pub(crate) type_schemas: IndexMap<String, SchemaNode>,
    /// Validator layer: schemas of validator declarations
    pub(crate) validator_schemas: IndexMap<String, SchemaNode>,
    /// Names referenced by a `reference` node that must get a top-level entry
    pub(crate) pending: IndexSet<(Namespace, String)>,
    pub(crate) factory_cache: HashMap<String, FactoryOutcome>,
    /// While positive, resolved declarations are not registered
    pub(crate) suppress_registration: usize,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_schemas(&self) -> &IndexMap<String, SchemaNode> {
        &self.type_schemas
    }

    pub fn validator_schemas(&self) -> &IndexMap<String, SchemaNode> {
        &self.validator_schemas
    }

    /// Takes the set of referenced names awaiting an entry
    pub(crate) fn take_pending(&mut self) -> Vec<(Namespace, String)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Whether a top-level entry exists for `name` in the layer of `namespace`
    pub(crate) fn is_registered(&self, namespace: Namespace, name: &str) -> bool {
        match namespace {
            Namespace::Type => self.type_schemas.contains_key(name),
            Namespace::Value => self.validator_schemas.contains_key(name),
        }
    }

    /// Registered schema for `name`, validator layer first
    pub(crate) fn registered(&self, name: &str) -> Option<&SchemaNode> {
        self.validator_schemas.get(name).or_else(|| self.type_schemas.get(name))
    }
}

/// Resolver over one index and one context.
pub struct Resolver<'a> {
    pub(crate) index: &'a mut DeclarationIndex,
    pub(crate) ctx: &'a mut ResolutionContext,
    pub(crate) config: &'a EngineConfig,
    /// Files whose scope the current expression is read in, innermost last
    file_stack: Vec<PathBuf>,
    /// Generic parameter bindings; only the innermost frame is visible
    type_env: Vec<HashMap<String, SchemaNode>>,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a mut DeclarationIndex, ctx: &'a mut ResolutionContext, config: &'a EngineConfig) -> Self {
        Self {
            index,
            ctx,
            config,
            file_stack: Vec::new(),
            type_env: Vec::new(),
        }
    }

    pub(crate) fn current_file(&self) -> Option<&PathBuf> {
        self.file_stack.last()
    }

    /// Validator bindings in effect for the current file
    pub(crate) fn bindings(&mut self) -> Rc<ValidatorBindings> {
        match self.file_stack.last().cloned() {
            Some(file) => self.index.bindings(&file),
            None => Rc::new(ValidatorBindings::defaults(self.config)),
        }
    }

    /// Runs `f` with `file` as the current scope
    pub(crate) fn in_file<T>(&mut self, file: PathBuf, f: impl FnOnce(&mut Self) -> T) -> T {
        self.file_stack.push(file);
        let result = f(self);
        self.file_stack.pop();
        result
    }

    /// Runs `f` with a fresh generic environment frame
    pub(crate) fn with_type_env<T>(&mut self, frame: HashMap<String, SchemaNode>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.type_env.push(frame);
        let result = f(self);
        self.type_env.pop();
        result
    }

    pub(crate) fn type_binding(&self, name: &str) -> Option<&SchemaNode> {
        self.type_env.last().and_then(|frame| frame.get(name))
    }

    /// Runs `f` without registering any resolved declaration
    pub(crate) fn unregistered<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.ctx.suppress_registration += 1;
        let result = f(self);
        self.ctx.suppress_registration -= 1;
        result
    }

    pub(crate) fn register(&mut self, namespace: Namespace, name: &str, node: &SchemaNode) {
        if self.ctx.suppress_registration > 0 {
            return;
        }
        let layer = match namespace {
            Namespace::Type => &mut self.ctx.type_schemas,
            Namespace::Value => &mut self.ctx.validator_schemas,
        };
        layer.insert(name.to_string(), node.clone());
    }

    /// Looks a name up from the current file, falling back to the whole index
    pub(crate) fn lookup(&mut self, name: &str, namespace: Namespace) -> Option<Located> {
        match self.file_stack.last().cloned() {
            Some(file) => self.index.resolve_binding(&file, name, namespace),
            None => self.index.find_declaration(name, namespace),
        }
    }

    /// A `reference` node for a name that is guaranteed a top-level entry
    pub(crate) fn reference_to(&mut self, namespace: Namespace, name: &str) -> SchemaNode {
        if !self.ctx.is_registered(namespace, name) {
            self.ctx.pending.insert((namespace, name.to_string()));
        }
        SchemaNode::reference(name)
    }

    /// Registered schema behind a reference node, or the node itself
    pub(crate) fn follow_reference(&self, node: &SchemaNode) -> SchemaNode {
        match node.reference_name().and_then(|name| self.ctx.registered(name)) {
            Some(target) => {
                let mut target = target.clone();
                if node.has_metadata() {
                    let mut outer = node.clone();
                    outer.kind = target.kind.clone();
                    outer.inherit_metadata(&target);
                    target = outer;
                }
                target
            }
            None => node.clone(),
        }
    }

    /// Resolves a declared name to its full schema: a validator declaration first, then a
    /// type declaration. Unknown names resolve to an opaque object.
    pub fn resolve_declared_name(&mut self, name: &str) -> SchemaNode {
        if let Some(located) = self.lookup(name, Namespace::Value) {
            if self.is_validator_declaration(&located) {
                return self.resolve_validator_declaration(&located);
            }
        }
        if self.lookup(name, Namespace::Type).is_some() {
            return self.resolve_named_type(name, &[]);
        }
        debug!("Name {} not found in any layer; using an opaque object", name);
        SchemaNode::opaque()
    }

    /// Whether a value declaration's initializer is something the validator interpreter reads
    pub(crate) fn is_validator_declaration(&mut self, located: &Located) -> bool {
        let Some(init) = crate::declaration_index::initializer(&located.decl) else { return false };
        let bindings = self.index.bindings(&located.file);
        classify::is_validator_expr(init, &bindings, 0)
    }

    /// Resolves the pending references, registering each name once.
    pub fn drain_pending(&mut self) {
        let mut seen = HashSet::new();
        loop {
            let pending = self.ctx.take_pending();
            if pending.is_empty() {
                break;
            }
            for (namespace, name) in pending {
                if self.ctx.is_registered(namespace, &name) || !seen.insert((namespace, name.clone())) {
                    continue;
                }
                debug!("Resolving referenced {:?} {}", namespace, name);
                match namespace {
                    Namespace::Type => {
                        self.resolve_named_type(&name, &[]);
                    }
                    Namespace::Value => {
                        if let Some(located) = self.index.find_declaration(&name, Namespace::Value) {
                            self.resolve_validator_declaration(&located);
                        }
                    }
                }
            }
        }
    }
}

/// Splits a doc comment into its description and `@deprecated` flag.
pub(crate) fn parse_doc(doc: &str) -> (Option<String>, bool) {
    let mut description = Vec::new();
    let mut deprecated = false;
    let mut in_tag = false;
    for line in doc.lines() {
        let trimmed = line.trim();
        if let Some(tag) = trimmed.strip_prefix('@') {
            in_tag = true;
            if tag.starts_with("deprecated") {
                deprecated = true;
            }
            continue;
        }
        if !in_tag {
            description.push(trimmed);
        }
    }
    let text = description.join("\n").trim().to_string();
    ((!text.is_empty()).then_some(text), deprecated)
}

/// Applies a doc comment's description and deprecation to a node
pub(crate) fn apply_doc(node: &mut SchemaNode, doc: Option<&str>) {
    let Some(doc) = doc else { return };
    let (description, deprecated) = parse_doc(doc);
    if node.description.is_none() {
        node.description = description;
    }
    node.deprecated |= deprecated;
}

/// Clears the required list of an object node
pub(crate) fn clear_required(node: &mut SchemaNode) {
    if let crate::schema::SchemaKind::Object { required, .. } = &mut node.kind {
        required.clear();
    }
}

/// The literal JSON value of a literal expression
pub(crate) fn literal_value(expr: &Expr) -> Option<serde_json::Value> {
    use crate::ast::Literal;
    match expr.strip_const() {
        Expr::Literal(Literal::String(s)) => Some(serde_json::Value::from(s.clone())),
        Expr::Literal(Literal::Number(n)) => Some(crate::schema::json_num_pref_i64(*n)),
        Expr::Literal(Literal::Boolean(b)) => Some(serde_json::Value::Bool(*b)),
        Expr::Literal(Literal::Null) => Some(serde_json::Value::Null),
        Expr::Array(items) => items.iter().map(literal_value).collect::<Option<Vec<_>>>().map(serde_json::Value::Array),
        Expr::Object(props) => {
            let mut map = serde_json::Map::new();
            for prop in props {
                match prop {
                    crate::ast::ObjectProperty::KeyValue {
                        key: crate::ast::PropertyKey::Name(key),
                        value,
                    } => {
                        map.insert(key.clone(), literal_value(value)?);
                    }
                    _ => return None,
                }
            }
            Some(serde_json::Value::Object(map))
        }
        _ => None,
    }
}
