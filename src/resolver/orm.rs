//! "Derive schema from table" helper calls such as `createInsertSchema(users, { ... })`.
//!
//! The table definition itself is not read. Only columns named in the refinement map
//! appear in the result; a refinement rooted at the column builder gets its base schema
//! from the column name.

use super::classify::{chain_is_optional, classify, CallShape};
use super::Resolver;
use crate::ast::{Expr, FunctionBody, ObjectProperty, PropertyKey, Stmt};
use crate::schema::{PrimitiveKind, SchemaKind, SchemaNode};
use indexmap::IndexMap;
use log::debug;

/// Column-name heuristics, tried in order
const ID_SUFFIXES: &[&str] = &["_id", "Id", "ID"];
const URL_WORDS: &[&str] = &["url", "uri", "link", "website", "avatar", "image"];
const TEXT_WORDS: &[&str] = &[
    "name", "title", "slug", "text", "description", "content", "body", "label", "summary", "bio", "code", "password",
    "token", "phone", "address",
];
const BOOLEAN_PREFIXES: &[&str] = &["is", "has", "can", "should", "allow", "enable"];
const DATE_SUFFIXES: &[&str] = &["_at", "At", "_on", "On", "date", "Date", "time", "Time"];
const NUMBER_WORDS: &[&str] = &["price", "amount", "rate", "cost", "total", "balance", "score"];

/// Guesses the base schema of a table column from its name.
///
/// # Example
///
/// ```
/// use schema_from_source::resolver::orm::guess_column_kind;
///
/// assert_eq!(guess_column_kind("userId").to_value()["type"], "integer");
/// assert_eq!(guess_column_kind("createdAt").to_value()["format"], "date-time");
/// ```
pub fn guess_column_kind(column: &str) -> SchemaNode {
    let lower = column.to_ascii_lowercase();

    if lower == "id" || ID_SUFFIXES.iter().any(|s| column.ends_with(s)) {
        return SchemaNode::primitive(PrimitiveKind::Integer);
    }
    if lower.contains("email") {
        return SchemaNode::string_with_format("email");
    }
    if URL_WORDS.iter().any(|w| lower.contains(w)) {
        return SchemaNode::string_with_format("uri");
    }
    if TEXT_WORDS.iter().any(|w| lower.contains(w)) {
        return SchemaNode::string();
    }
    if BOOLEAN_PREFIXES.iter().any(|p| has_word_prefix(column, p)) {
        return SchemaNode::primitive(PrimitiveKind::Boolean);
    }
    if DATE_SUFFIXES.iter().any(|s| column.ends_with(s)) {
        return SchemaNode::string_with_format("date-time");
    }
    if NUMBER_WORDS.iter().any(|w| lower.contains(w)) {
        return SchemaNode::primitive(PrimitiveKind::Number);
    }
    SchemaNode::string()
}

/// `isActive`, `is_active`: the prefix followed by a word boundary
fn has_word_prefix(column: &str, prefix: &str) -> bool {
    match column.strip_prefix(prefix) {
        Some(rest) => rest.starts_with('_') || rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()),
        None => false,
    }
}

impl Resolver<'_> {
    /// Resolves `helper(table, refinements)` to an object of the refined columns.
    pub(crate) fn resolve_orm_helper(&mut self, args: &[Expr]) -> SchemaNode {
        let mut node = SchemaNode::object(IndexMap::new(), Vec::new());
        let Some(Expr::Object(refinements)) = args.get(1).map(Expr::strip_const) else {
            debug!("ORM helper call without a refinement map; no columns to describe");
            return node;
        };
        let bindings = self.bindings();

        for refinement in refinements {
            let ObjectProperty::KeyValue {
                key: PropertyKey::Name(column),
                value,
            } = refinement
            else {
                continue;
            };

            let (schema, optional) = match value {
                Expr::Function(function) => {
                    let param = function.params.first().and_then(|p| p.name()).map(str::to_string);
                    let body = match &function.body {
                        FunctionBody::Expr(body) => Some((**body).clone()),
                        FunctionBody::Block(stmts) => stmts.iter().find_map(|stmt| match stmt {
                            Stmt::Return(Some(expr)) => Some(expr.clone()),
                            _ => None,
                        }),
                        FunctionBody::None => None,
                    };
                    match body {
                        Some(body) => (
                            self.resolve_refinement(&body, param.as_deref(), column),
                            chain_is_optional(&body, &bindings),
                        ),
                        None => (guess_column_kind(column), false),
                    }
                }
                other => (self.resolve_validator(other), chain_is_optional(other, &bindings)),
            };

            if let SchemaKind::Object { properties, required, .. } = &mut node.kind {
                properties.insert(column.clone(), schema);
                if !optional && !required.contains(column) {
                    required.push(column.clone());
                }
            }
        }
        node
    }

    /// A refinement chain rooted at the column parameter (`col.email()`) or at one of the
    /// parameter's members (`schema.email.email()`)
    fn resolve_refinement(&mut self, expr: &Expr, param: Option<&str>, column: &str) -> SchemaNode {
        if is_column_root(expr, param) {
            return guess_column_kind(column);
        }
        let bindings = self.bindings();
        match classify(expr, &bindings) {
            CallShape::Modifier { receiver, method, args } => {
                let base = self.resolve_refinement(receiver, param, column);
                self.apply_modifier(base, method, args)
            }
            _ => self.resolve_validator(expr),
        }
    }
}

fn is_column_root(expr: &Expr, param: Option<&str>) -> bool {
    let Some(param) = param else { return false };
    match expr {
        Expr::Ident(name) => name == param,
        Expr::Member { object, .. } => matches!(object.as_ref(), Expr::Ident(name) if name == param),
        _ => false,
    }
}
