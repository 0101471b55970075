//! Native type expressions to schema nodes.

use super::{apply_doc, clear_required, Resolver};
use crate::ast::{DeclarationKind, EnumMember, Expr, Keyword, Literal, TupleElement, TypeExpr, TypeMember};
use crate::declaration_index::{inferred_schema_name, Located, Namespace};
use crate::schema::{json_num_pref_i64, PrimitiveKind, SchemaKind, SchemaNode};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Names handled structurally rather than through the declaration index
const BUILTIN_TYPES: &[&str] = &[
    "Partial", "Required", "Readonly", "NoInfer", "Awaited", "Promise", "PromiseLike", "Pick", "Omit", "Record",
    "ReturnType", "Parameters", "NonNullable", "Exclude", "Extract", "Array", "ReadonlyArray", "Set", "ReadonlySet",
    "Iterable", "Map", "ReadonlyMap", "Date", "File", "Blob", "Buffer", "Uint8Array", "ArrayBuffer", "String",
    "Number", "Boolean", "BigInt", "Object", "Function",
];

pub(crate) fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

impl Resolver<'_> {
    /// Resolves a type expression in the current file and generic environment.
    pub fn resolve_type(&mut self, ty: &TypeExpr) -> SchemaNode {
        match ty {
            TypeExpr::Keyword(keyword) => keyword_schema(*keyword),
            TypeExpr::Literal(literal) => literal_schema(literal),
            TypeExpr::TemplateLiteral => SchemaNode::string(),
            TypeExpr::Reference { name, args } => {
                if let Some(target) = inferred_schema_name(ty) {
                    return self.resolve_type_query(target);
                }
                self.resolve_type_reference(name, args)
            }
            TypeExpr::Object(members) => self.resolve_members(members),
            TypeExpr::Array(inner) => SchemaNode::array(self.resolve_type(inner)),
            TypeExpr::Tuple(elements) => self.resolve_tuple(elements),
            TypeExpr::Union(members) => self.resolve_union(members),
            TypeExpr::Intersection(members) => {
                let nodes: Vec<SchemaNode> = members.iter().map(|m| self.resolve_type(m)).collect();
                self.intersection_of(nodes)
            }
            TypeExpr::Query(name) => self.resolve_type_query(name),
            TypeExpr::KeyOf(inner) => {
                let base = self.resolve_type(inner);
                keyof_schema(&self.follow_reference(&base))
            }
            TypeExpr::IndexedAccess { object, index } => self.resolve_indexed_access(object, index),
            TypeExpr::Function { .. } | TypeExpr::Unsupported => SchemaNode::opaque(),
        }
    }

    fn resolve_union(&mut self, members: &[TypeExpr]) -> SchemaNode {
        let mut nullable = false;
        let mut nodes = Vec::new();
        for member in members {
            if member.is_nullish() {
                nullable = true;
            } else {
                nodes.push(self.resolve_type(member));
            }
        }
        if nodes.is_empty() {
            return SchemaNode::primitive(PrimitiveKind::Null);
        }
        let mut node = union_of(nodes);
        node.nullable |= nullable;
        node
    }

    /// Merges object members of an intersection; opaque members are dropped and any
    /// remaining non-object members are kept beside the merged object in an `allOf`.
    pub(crate) fn intersection_of(&mut self, nodes: Vec<SchemaNode>) -> SchemaNode {
        let mut merged: Option<SchemaNode> = None;
        let mut others = Vec::new();
        for node in nodes {
            let target = self.follow_reference(&node);
            if target.is_object() {
                match merged.as_mut() {
                    Some(base) => merge_objects(base, &target, false),
                    None => merged = Some(target),
                }
            } else if !target.is_opaque() {
                others.push(node);
            }
        }
        match (merged, others.len()) {
            (None, 0) => SchemaNode::opaque(),
            (Some(object), 0) => object,
            (None, 1) => others.remove(0),
            (None, _) => SchemaNode::all_of(others),
            (Some(object), _) => {
                let mut parts = vec![object];
                parts.extend(others);
                SchemaNode::all_of(parts)
            }
        }
    }

    /// Object type literal or interface body
    pub(crate) fn resolve_members(&mut self, members: &[TypeMember]) -> SchemaNode {
        let mut properties = IndexMap::new();
        let mut required: Vec<String> = Vec::new();
        let mut additional = None;

        for member in members {
            match member {
                TypeMember::Property(property) => {
                    let optional = property.optional || property.ty.admits_undefined();
                    let mut node = self.resolve_type(&strip_undefined(&property.ty));
                    apply_doc(&mut node, property.doc.as_deref());
                    properties.insert(property.name.clone(), node);
                    if optional {
                        required.retain(|r| r != &property.name);
                    } else if !required.contains(&property.name) {
                        required.push(property.name.clone());
                    }
                }
                TypeMember::Index { value } => additional = Some(Box::new(self.resolve_type(value))),
                TypeMember::Method { .. } => {}
            }
        }

        let mut node = SchemaNode::object(properties, required);
        if let SchemaKind::Object { additional_properties, .. } = &mut node.kind {
            *additional_properties = additional;
        }
        node
    }

    fn resolve_interface(&mut self, extends: &[TypeExpr], members: &[TypeMember]) -> SchemaNode {
        let mut node = SchemaNode::object(IndexMap::new(), Vec::new());
        for parent in extends {
            let resolved = self.resolve_type(parent);
            let parent_node = self.follow_reference(&resolved);
            if parent_node.is_object() {
                merge_objects(&mut node, &parent_node, true);
            } else {
                debug!("Ignoring non-object interface parent {:?}", parent);
            }
        }
        let own = self.resolve_members(members);
        merge_objects(&mut node, &own, true);
        node.description = None;
        node
    }

    fn resolve_tuple(&mut self, elements: &[TupleElement]) -> SchemaNode {
        let mut prefix = Vec::new();
        let mut rest = None;
        let mut min_items = 0;
        for element in elements {
            let node = self.resolve_type(&element.ty);
            if element.rest {
                rest = Some(match node.kind {
                    SchemaKind::Array { items: Some(items), .. } => *items,
                    _ => node,
                });
                continue;
            }
            if !element.optional {
                min_items = prefix.len() as u64 + 1;
            }
            prefix.push(node);
        }
        SchemaNode::tuple(prefix, rest, min_items)
    }

    fn resolve_type_reference(&mut self, name: &str, args: &[TypeExpr]) -> SchemaNode {
        if args.is_empty() {
            if let Some(bound) = self.type_binding(name) {
                return bound.clone();
            }
        }
        if let Some(node) = self.resolve_builtin(name, args) {
            return node;
        }
        if name.contains('.') {
            return self.resolve_qualified(name, args);
        }
        self.resolve_named_type(name, args)
    }

    fn resolve_builtin(&mut self, name: &str, args: &[TypeExpr]) -> Option<SchemaNode> {
        if !is_builtin_type(name) {
            return None;
        }
        let arg = |i: usize| args.get(i);
        let node = match name {
            "Partial" => {
                let mut base = self.resolve_followed(arg(0));
                clear_required(&mut base);
                base
            }
            "Required" => {
                let mut base = self.resolve_followed(arg(0));
                let names = base.property_names();
                if let SchemaKind::Object { required, .. } = &mut base.kind {
                    *required = names;
                }
                base
            }
            "Readonly" | "NoInfer" | "Awaited" | "Promise" | "PromiseLike" => self.resolve_optional_arg(arg(0)),
            "Pick" | "Omit" => {
                let base = self.unregistered(|r| r.resolve_followed(arg(0)));
                let keys = match arg(1) {
                    Some(keys) => {
                        let node = self.resolve_type(keys);
                        literal_keys(&node)
                    }
                    None => Vec::new(),
                };
                filter_properties(base, |key| keys.iter().any(|k| k == key) == (name == "Pick"))
            }
            "Record" => {
                let key = self.resolve_optional_arg(arg(0));
                let value = self.resolve_optional_arg(arg(1));
                let keys = literal_keys(&key);
                if keys.is_empty() {
                    let mut node = SchemaNode::object(IndexMap::new(), Vec::new());
                    if let SchemaKind::Object { additional_properties, .. } = &mut node.kind {
                        *additional_properties = Some(Box::new(value));
                    }
                    node
                } else {
                    let properties = keys.iter().map(|k| (k.clone(), value.clone())).collect();
                    SchemaNode::object(properties, keys)
                }
            }
            "ReturnType" => self.resolve_return_type(arg(0)),
            "Parameters" => self.resolve_parameters(arg(0)),
            "NonNullable" => {
                let mut node = self.resolve_optional_arg(arg(0));
                node.nullable = false;
                if let SchemaKind::Enum { values, .. } = &mut node.kind {
                    values.retain(|v| !v.is_null());
                }
                node
            }
            "Exclude" | "Extract" => {
                let base = self.resolve_optional_arg(arg(0));
                let filter = self.resolve_optional_arg(arg(1));
                filter_enum(base, &filter, name == "Extract")
            }
            "Array" | "ReadonlyArray" | "Set" | "ReadonlySet" | "Iterable" => SchemaNode::array(self.resolve_optional_arg(arg(0))),
            "Map" | "ReadonlyMap" => {
                let value = self.resolve_optional_arg(arg(1));
                let mut node = SchemaNode::object(IndexMap::new(), Vec::new());
                if let SchemaKind::Object { additional_properties, .. } = &mut node.kind {
                    *additional_properties = Some(Box::new(value));
                }
                node
            }
            "Date" => SchemaNode::string_with_format("date-time"),
            "File" | "Blob" | "Buffer" | "Uint8Array" | "ArrayBuffer" => SchemaNode::string_with_format("binary"),
            "String" => SchemaNode::string(),
            "Number" => SchemaNode::primitive(PrimitiveKind::Number),
            "Boolean" => SchemaNode::primitive(PrimitiveKind::Boolean),
            "BigInt" => keyword_schema(Keyword::BigInt),
            _ => SchemaNode::opaque(),
        };
        Some(node)
    }

    fn resolve_optional_arg(&mut self, arg: Option<&TypeExpr>) -> SchemaNode {
        match arg {
            Some(ty) => self.resolve_type(ty),
            None => SchemaNode::opaque(),
        }
    }

    /// Resolves and follows a top-level reference so the shape can be edited
    fn resolve_followed(&mut self, arg: Option<&TypeExpr>) -> SchemaNode {
        let node = self.resolve_optional_arg(arg);
        self.follow_reference(&node)
    }

    /// `ReturnType<typeof f>`: the declared return annotation with one promise unwrapped
    fn resolve_return_type(&mut self, arg: Option<&TypeExpr>) -> SchemaNode {
        let Some(TypeExpr::Query(name)) = arg else { return SchemaNode::opaque() };
        let Some(located) = self.lookup(name, Namespace::Value) else { return SchemaNode::opaque() };
        let Some(function) = located.decl.as_function().cloned() else { return SchemaNode::opaque() };
        let Some(return_type) = function.return_type.as_ref() else {
            debug!("{} has no return annotation", name);
            return SchemaNode::opaque();
        };
        let unwrapped = match return_type {
            TypeExpr::Reference { name, args } if name == "Promise" && args.len() == 1 => &args[0],
            other => other,
        };
        let frame = opaque_frame(function.type_params.iter().map(|p| p.name.clone()));
        self.in_file(located.file.clone(), |r| r.with_type_env(frame, |r| r.resolve_type(unwrapped)))
    }

    /// `Parameters<typeof f>`: a fixed-position array of the parameter types
    fn resolve_parameters(&mut self, arg: Option<&TypeExpr>) -> SchemaNode {
        let Some(TypeExpr::Query(name)) = arg else { return SchemaNode::opaque() };
        let Some(located) = self.lookup(name, Namespace::Value) else { return SchemaNode::opaque() };
        let Some(function) = located.decl.as_function().cloned() else { return SchemaNode::opaque() };
        let frame = opaque_frame(function.type_params.iter().map(|p| p.name.clone()));
        let elements: Vec<TupleElement> = function
            .params
            .iter()
            .map(|p| TupleElement {
                ty: p.ty.clone().unwrap_or(TypeExpr::Keyword(Keyword::Unknown)),
                optional: p.optional || p.default.is_some(),
                rest: p.rest,
            })
            .collect();
        self.in_file(located.file.clone(), |r| r.with_type_env(frame, |r| r.resolve_tuple(&elements)))
    }

    /// `Status.Active` enum members and `ns.Type` through namespace imports
    fn resolve_qualified(&mut self, name: &str, args: &[TypeExpr]) -> SchemaNode {
        let Some((head, member)) = name.rsplit_once('.') else { return SchemaNode::opaque() };

        if let Some(located) = self.lookup(head, Namespace::Type) {
            if let DeclarationKind::Enum { members } = &located.decl.kind {
                let values = enum_values(members);
                return match members.iter().position(|m| m.name == member) {
                    Some(i) => SchemaNode::enumeration(vec![values[i].clone()]),
                    None => SchemaNode::opaque(),
                };
            }
        }

        let Some(file) = self.current_file().cloned() else { return SchemaNode::opaque() };
        match self.index.resolve_namespace_member(&file, head, member, Namespace::Type) {
            Some(located) => self.resolve_located_type(&located, args),
            None => {
                debug!("Unresolved qualified type {}", name);
                SchemaNode::opaque()
            }
        }
    }

    /// Resolves a named type declaration, instantiating generics with `args`.
    pub fn resolve_named_type(&mut self, name: &str, args: &[TypeExpr]) -> SchemaNode {
        match self.lookup(name, Namespace::Type) {
            Some(located) => self.resolve_located_type(&located, args),
            None => {
                debug!("Type {} not found; using an opaque object", name);
                SchemaNode::opaque()
            }
        }
    }

    pub(crate) fn resolve_located_type(&mut self, located: &Located, args: &[TypeExpr]) -> SchemaNode {
        let decl = Rc::clone(&located.decl);
        let key = (Namespace::Type, decl.name.clone());
        let bare = args.is_empty();

        if bare {
            if let Some(cached) = self.ctx.type_schemas.get(&decl.name) {
                return cached.clone();
            }
        }
        if self.ctx.resolving.contains(&key) {
            debug!("Cycle through {}; emitting a reference", decl.name);
            return self.reference_to(Namespace::Type, &decl.name);
        }

        let params = match &decl.kind {
            DeclarationKind::TypeAlias { params, .. } | DeclarationKind::Interface { params, .. } => params.as_slice(),
            _ => &[],
        };
        let mut frame = HashMap::new();
        for (i, param) in params.iter().enumerate() {
            let node = match (args.get(i), &param.default) {
                (Some(arg), _) => self.resolve_type_argument(arg),
                (None, Some(default)) => self.in_file(located.file.clone(), |r| r.resolve_type_argument(default)),
                (None, None) => SchemaNode::opaque(),
            };
            frame.insert(param.name.clone(), node);
        }

        debug!("Resolving type {} in {}", decl.name, located.file.display());
        self.ctx.resolving.insert(key.clone());
        let mut node = self.in_file(located.file.clone(), |r| {
            r.with_type_env(frame, |r| match &decl.kind {
                DeclarationKind::TypeAlias { body, .. } => r.resolve_type(body),
                DeclarationKind::Interface { extends, members, .. } => r.resolve_interface(extends, members),
                DeclarationKind::Enum { members } => SchemaNode::enumeration(enum_values(members)),
                _ => SchemaNode::opaque(),
            })
        });
        self.ctx.resolving.remove(&key);

        apply_doc(&mut node, decl.doc.as_deref());
        if bare {
            self.register(Namespace::Type, &decl.name, &node);
        }
        node
    }

    /// A generic argument: a plain name of a declared type becomes a reference, anything
    /// else is resolved in place.
    fn resolve_type_argument(&mut self, arg: &TypeExpr) -> SchemaNode {
        if let TypeExpr::Reference { name, args } = arg {
            let plain = args.is_empty() && !name.contains('.') && !is_builtin_type(name) && self.type_binding(name).is_none();
            if plain {
                if let Some(located) = self.lookup(name, Namespace::Type) {
                    let decl_name = located.decl.name.clone();
                    let in_flight = self.ctx.resolving.contains(&(Namespace::Type, decl_name.clone()));
                    if !in_flight && !self.ctx.is_registered(Namespace::Type, &decl_name) {
                        self.resolve_located_type(&located, &[]);
                    }
                    return self.reference_to(Namespace::Type, &decl_name);
                }
            }
        }
        self.resolve_type(arg)
    }

    /// `typeof X` in type position
    pub(crate) fn resolve_type_query(&mut self, name: &str) -> SchemaNode {
        let Some(located) = self.lookup(name, Namespace::Value) else {
            debug!("typeof {}: no value declaration", name);
            return SchemaNode::opaque();
        };
        if self.is_validator_declaration(&located) {
            return self.resolve_validator_declaration(&located);
        }
        let decl = Rc::clone(&located.decl);
        match &decl.kind {
            DeclarationKind::Variable {
                annotation: Some(annotation),
                ..
            } => self.in_file(located.file.clone(), |r| r.resolve_type(annotation)),
            DeclarationKind::Variable {
                init: Some(init), is_const, ..
            } => {
                let literal = matches!(init, Expr::AsConst(_)) || (*is_const && matches!(init, Expr::Literal(_)));
                self.in_file(located.file.clone(), |r| r.resolve_literal_expr(init, literal))
            }
            DeclarationKind::Enum { members } => SchemaNode::enumeration(enum_values(members)),
            _ => SchemaNode::opaque(),
        }
    }

    /// Structural schema of a literal value expression
    pub(crate) fn resolve_literal_expr(&mut self, expr: &Expr, literal: bool) -> SchemaNode {
        let literal = literal || matches!(expr, Expr::AsConst(_));
        match expr.strip_const() {
            Expr::Literal(Literal::String(s)) if literal => SchemaNode::enumeration(vec![Value::from(s.clone())]),
            Expr::Literal(Literal::Number(n)) if literal => SchemaNode::enumeration(vec![json_num_pref_i64(*n)]),
            Expr::Literal(Literal::Boolean(b)) if literal => SchemaNode::enumeration(vec![Value::Bool(*b)]),
            Expr::Literal(Literal::String(_)) => SchemaNode::string(),
            Expr::Literal(Literal::Number(_)) => SchemaNode::primitive(PrimitiveKind::Number),
            Expr::Literal(Literal::Boolean(_)) => SchemaNode::primitive(PrimitiveKind::Boolean),
            Expr::Literal(Literal::Null) => SchemaNode::primitive(PrimitiveKind::Null),
            Expr::Array(items) => {
                let nodes: Vec<SchemaNode> = items.iter().map(|item| self.resolve_literal_expr(item, literal)).collect();
                SchemaNode::array(union_of(nodes))
            }
            Expr::Object(props) => {
                let mut properties = IndexMap::new();
                for prop in props {
                    if let crate::ast::ObjectProperty::KeyValue {
                        key: crate::ast::PropertyKey::Name(key),
                        value,
                    } = prop
                    {
                        properties.insert(key.clone(), self.resolve_literal_expr(value, literal));
                    }
                }
                let required = properties.keys().cloned().collect();
                SchemaNode::object(properties, required)
            }
            Expr::New { callee, .. } if matches!(callee.as_ref(), Expr::Ident(name) if name == "Date") => {
                SchemaNode::string_with_format("date-time")
            }
            _ => SchemaNode::opaque(),
        }
    }

    fn resolve_indexed_access(&mut self, object: &TypeExpr, index: &TypeExpr) -> SchemaNode {
        let resolved = self.resolve_type(object);
        let base = self.follow_reference(&resolved);

        if matches!(index, TypeExpr::Keyword(Keyword::Number)) {
            return match base.kind {
                SchemaKind::Array { items: Some(items), .. } => *items,
                SchemaKind::Array { prefix_items, .. } if !prefix_items.is_empty() => union_of(prefix_items),
                _ => SchemaNode::opaque(),
            };
        }

        let keys = literal_keys(&self.resolve_type(index));
        let selected: Vec<SchemaNode> = keys
            .iter()
            .filter_map(|key| match &base.kind {
                SchemaKind::Object { properties, .. } => properties.get(key).cloned(),
                SchemaKind::Array { prefix_items, .. } => key.parse::<usize>().ok().and_then(|i| prefix_items.get(i).cloned()),
                _ => None,
            })
            .collect();
        if selected.is_empty() {
            return SchemaNode::opaque();
        }
        union_of(selected)
    }
}

fn keyword_schema(keyword: Keyword) -> SchemaNode {
    match keyword {
        Keyword::String => SchemaNode::string(),
        Keyword::Number => SchemaNode::primitive(PrimitiveKind::Number),
        Keyword::Boolean => SchemaNode::primitive(PrimitiveKind::Boolean),
        Keyword::BigInt => {
            let mut node = SchemaNode::primitive(PrimitiveKind::Integer);
            node.format = Some("int64".to_string());
            node
        }
        Keyword::Null => SchemaNode::primitive(PrimitiveKind::Null),
        Keyword::Any
        | Keyword::Unknown
        | Keyword::Undefined
        | Keyword::Void
        | Keyword::Never
        | Keyword::Object
        | Keyword::Symbol => SchemaNode::opaque(),
    }
}

fn literal_schema(literal: &Literal) -> SchemaNode {
    match literal {
        Literal::String(s) => SchemaNode::enumeration(vec![Value::from(s.clone())]),
        Literal::Number(n) => SchemaNode::enumeration(vec![json_num_pref_i64(*n)]),
        Literal::Boolean(b) => SchemaNode::enumeration(vec![Value::Bool(*b)]),
        Literal::Null => SchemaNode::primitive(PrimitiveKind::Null),
        Literal::Undefined => SchemaNode::opaque(),
    }
}

fn opaque_frame(names: impl Iterator<Item = String>) -> HashMap<String, SchemaNode> {
    names.map(|name| (name, SchemaNode::opaque())).collect()
}

/// Removes `undefined` members from a union
fn strip_undefined(ty: &TypeExpr) -> TypeExpr {
    match ty {
        TypeExpr::Union(members) => {
            let mut kept: Vec<TypeExpr> = members
                .iter()
                .filter(|m| !matches!(m, TypeExpr::Keyword(Keyword::Undefined) | TypeExpr::Literal(Literal::Undefined)))
                .cloned()
                .collect();
            match kept.len() {
                0 => TypeExpr::Keyword(Keyword::Undefined),
                1 => kept.remove(0),
                _ => TypeExpr::Union(kept),
            }
        }
        other => other.clone(),
    }
}

/// Values of an enum declaration, numbering members without an initializer
pub(crate) fn enum_values(members: &[EnumMember]) -> Vec<Value> {
    let mut next = 0.0;
    members
        .iter()
        .map(|member| match member.value.as_ref().map(Expr::strip_const) {
            Some(Expr::Literal(Literal::String(s))) => Value::from(s.clone()),
            Some(Expr::Literal(Literal::Number(n))) => {
                next = n + 1.0;
                json_num_pref_i64(*n)
            }
            Some(_) => Value::from(member.name.clone()),
            None => {
                let value = json_num_pref_i64(next);
                next += 1.0;
                value
            }
        })
        .collect()
}

/// String keys named by a literal or literal-union schema
pub(crate) fn literal_keys(node: &SchemaNode) -> Vec<String> {
    match &node.kind {
        SchemaKind::Enum { values, .. } => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        SchemaKind::OneOf { alternatives, .. } => alternatives.iter().flat_map(literal_keys).collect(),
        _ => Vec::new(),
    }
}

/// `keyof` of a resolved object: a string enum of its property names
pub(crate) fn keyof_schema(node: &SchemaNode) -> SchemaNode {
    match &node.kind {
        SchemaKind::Object { properties, .. } if !properties.is_empty() => {
            SchemaNode::enumeration(properties.keys().map(|k| Value::from(k.clone())).collect())
        }
        _ => SchemaNode::string(),
    }
}

/// Keeps the object properties whose names satisfy `keep`
pub(crate) fn filter_properties(mut node: SchemaNode, keep: impl Fn(&str) -> bool) -> SchemaNode {
    if let SchemaKind::Object { properties, required, .. } = &mut node.kind {
        properties.retain(|k, _| keep(k));
        required.retain(|k| keep(k));
    }
    node
}

fn filter_enum(base: SchemaNode, filter: &SchemaNode, keep_matching: bool) -> SchemaNode {
    let (SchemaKind::Enum { values, .. }, SchemaKind::Enum { values: removed, .. }) = (&base.kind, &filter.kind) else {
        return base;
    };
    let kept: Vec<Value> = values.iter().filter(|v| removed.contains(v) == keep_matching).cloned().collect();
    if kept.is_empty() {
        return SchemaNode::opaque();
    }
    let mut node = SchemaNode::enumeration(kept);
    node.inherit_metadata(&base);
    node
}

/// Shallow-merges `ext` into `base`: properties of `ext` win and keep their position when
/// already present. With `override_required`, a property redeclared by `ext` takes the
/// required-ness `ext` gives it; otherwise required names are unioned.
pub(crate) fn merge_objects(base: &mut SchemaNode, ext: &SchemaNode, override_required: bool) {
    let SchemaKind::Object {
        properties: ext_properties,
        required: ext_required,
        additional_properties: ext_additional,
    } = &ext.kind
    else {
        return;
    };
    if let SchemaKind::Object {
        properties,
        required,
        additional_properties,
    } = &mut base.kind
    {
        for (name, node) in ext_properties {
            properties.insert(name.clone(), node.clone());
            if override_required && !ext_required.contains(name) {
                required.retain(|r| r != name);
            }
        }
        for name in ext_required {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }
        if ext_additional.is_some() {
            *additional_properties = ext_additional.clone();
        }
    }
    if base.description.is_none() {
        base.description = ext.description.clone();
    }
}

/// Combines alternatives: same-kind literal enums merge into one enum in source order,
/// a single alternative is returned as-is, anything else becomes a flattened `oneOf`.
pub(crate) fn union_of(nodes: Vec<SchemaNode>) -> SchemaNode {
    match nodes.len() {
        0 => return SchemaNode::opaque(),
        1 => return nodes.into_iter().next().unwrap_or_default(),
        _ => {}
    }
    if let Some(merged) = merge_enums(&nodes) {
        return merged;
    }

    let mut alternatives: Vec<SchemaNode> = Vec::new();
    for node in nodes {
        let flattened = match &node.kind {
            SchemaKind::OneOf {
                alternatives: inner,
                discriminator: None,
            } if !node.has_metadata() => inner.clone(),
            _ => vec![node],
        };
        for alternative in flattened {
            if !alternatives.contains(&alternative) {
                alternatives.push(alternative);
            }
        }
    }
    if alternatives.len() == 1 {
        return alternatives.remove(0);
    }
    let discriminator = find_discriminator(&alternatives);
    SchemaNode::one_of(alternatives, discriminator)
}

fn merge_enums(nodes: &[SchemaNode]) -> Option<SchemaNode> {
    let mut values: Vec<Value> = Vec::new();
    let mut merged_kind: Option<PrimitiveKind> = None;
    for node in nodes {
        let SchemaKind::Enum { values: node_values, kind } = &node.kind else { return None };
        if node.has_metadata() {
            return None;
        }
        merged_kind = match (merged_kind, *kind) {
            (None, k) => Some(k),
            (Some(a), b) if a == b => Some(a),
            (Some(PrimitiveKind::Integer | PrimitiveKind::Number), PrimitiveKind::Integer | PrimitiveKind::Number) => {
                Some(PrimitiveKind::Number)
            }
            _ => return None,
        };
        for value in node_values {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
    }
    let kind = merged_kind?;
    if kind == PrimitiveKind::Boolean && values.len() == 2 {
        return Some(SchemaNode::primitive(PrimitiveKind::Boolean));
    }
    Some(SchemaNode::new(SchemaKind::Enum { values, kind }))
}

/// A required property every object alternative pins to a distinct single literal
fn find_discriminator(alternatives: &[SchemaNode]) -> Option<String> {
    let SchemaKind::Object { properties: first, .. } = &alternatives.first()?.kind else { return None };
    'candidates: for name in first.keys() {
        let mut seen: Vec<&Value> = Vec::new();
        for alternative in alternatives {
            let SchemaKind::Object { properties, required, .. } = &alternative.kind else { return None };
            if !required.contains(name) {
                continue 'candidates;
            }
            match properties.get(name).map(|p| &p.kind) {
                Some(SchemaKind::Enum { values, .. }) if values.len() == 1 && !seen.contains(&&values[0]) => {
                    seen.push(&values[0]);
                }
                _ => continue 'candidates,
            }
        }
        return Some(name.clone());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::merger::SchemaEngine;
    use crate::parser::AstParser;
    use crate::resolver::ValueRole;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const OPERATORS: &str = r#"
        export interface User {
            id: string;
            name?: string;
        }

        export async function loadUser(id: string): Promise<User> {
            return fetchUser(id);
        }

        export function search(query: string, limit?: number): User[] {
            return [];
        }

        export type Loaded = ReturnType<typeof loadUser>;
        export type SearchArgs = Parameters<typeof search>;
        export type Eventually = Awaited<Promise<User>>;
        export type Draft = Partial<User>;
        export type Complete = Required<User>;
        export type Named = { name: string } & { age?: number };
        export type Tagged = User & string;
    "#;

    fn resolve_source(source: &str, name: &str) -> Value {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("types.ts"), source).unwrap();
        let mut engine = SchemaEngine::new(temp_dir.path(), EngineConfig::default());
        engine.resolve_by_name(name, ValueRole::Body).to_value()
    }

    fn user_object(required: &[&str]) -> Value {
        let mut user = json!({
            "type": "object",
            "properties": { "id": { "type": "string" }, "name": { "type": "string" } }
        });
        if !required.is_empty() {
            user["required"] = json!(required);
        }
        user
    }

    #[test]
    fn test_union_of_literals_keeps_source_order() {
        let node = union_of(vec![
            SchemaNode::enumeration(vec![json!("b")]),
            SchemaNode::enumeration(vec![json!("a")]),
            SchemaNode::enumeration(vec![json!("b")]),
        ]);
        assert_eq!(node.to_value(), json!({ "type": "string", "enum": ["b", "a"] }));
    }

    #[test]
    fn test_union_of_true_false_is_boolean() {
        let node = union_of(vec![
            SchemaNode::enumeration(vec![json!(true)]),
            SchemaNode::enumeration(vec![json!(false)]),
        ]);
        assert_eq!(node, SchemaNode::primitive(PrimitiveKind::Boolean));
    }

    #[test]
    fn test_union_flattens_and_discriminates() {
        let variant = |kind: &str| {
            let mut props = IndexMap::new();
            props.insert("kind".to_string(), SchemaNode::enumeration(vec![json!(kind)]));
            SchemaNode::object(props, vec!["kind".into()])
        };
        let inner = SchemaNode::one_of(vec![variant("a"), variant("b")], None);
        let node = union_of(vec![inner, variant("c")]);
        match node.kind {
            SchemaKind::OneOf {
                alternatives,
                discriminator,
            } => {
                assert_eq!(alternatives.len(), 3);
                assert_eq!(discriminator.as_deref(), Some("kind"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_merge_objects_required_policies() {
        let object = |names: &[&str], required: &[&str]| {
            let props = names.iter().map(|n| (n.to_string(), SchemaNode::string())).collect();
            SchemaNode::object(props, required.iter().map(|r| r.to_string()).collect())
        };

        let mut base = object(&["a", "b"], &["a", "b"]);
        merge_objects(&mut base, &object(&["b", "c"], &["c"]), true);
        assert_eq!(base.property_names(), vec!["a", "b", "c"]);
        assert_eq!(base.to_value()["required"], json!(["a", "c"]));

        let mut base = object(&["a", "b"], &["a", "b"]);
        merge_objects(&mut base, &object(&["b", "c"], &["c"]), false);
        assert_eq!(base.to_value()["required"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_enum_values_auto_increment() {
        let module = AstParser::parse_source("enum E { A, B = 10, C, D = 'd' }").unwrap();
        let DeclarationKind::Enum { members } = &module.declarations[0].kind else { panic!("not an enum") };
        assert_eq!(enum_values(members), vec![json!(0), json!(10), json!(11), json!("d")]);
    }

    #[test]
    fn test_strip_undefined() {
        let ty = AstParser::parse_type("string | undefined").unwrap();
        assert_eq!(strip_undefined(&ty), TypeExpr::Keyword(Keyword::String));
    }

    #[test]
    fn test_keyof_and_literal_keys() {
        let mut props = IndexMap::new();
        props.insert("id".to_string(), SchemaNode::string());
        props.insert("name".to_string(), SchemaNode::string());
        let keys = keyof_schema(&SchemaNode::object(props, vec![]));
        assert_eq!(literal_keys(&keys), vec!["id", "name"]);
    }

    #[test]
    fn test_return_type_unwraps_one_promise() {
        assert_eq!(resolve_source(OPERATORS, "Loaded"), user_object(&["id"]));
    }

    #[test]
    fn test_awaited_promise_unwraps() {
        assert_eq!(resolve_source(OPERATORS, "Eventually"), user_object(&["id"]));
    }

    #[test]
    fn test_parameters_become_fixed_position_array() {
        assert_eq!(
            resolve_source(OPERATORS, "SearchArgs"),
            json!({
                "type": "array",
                "prefixItems": [{ "type": "string" }, { "type": "number" }],
                "minItems": 1,
                "maxItems": 2
            })
        );
    }

    #[test]
    fn test_partial_and_required_operators() {
        assert_eq!(resolve_source(OPERATORS, "Draft"), user_object(&[]));
        assert_eq!(resolve_source(OPERATORS, "Complete"), user_object(&["id", "name"]));
    }

    #[test]
    fn test_native_intersection_merges_objects() {
        assert_eq!(
            resolve_source(OPERATORS, "Named"),
            json!({
                "type": "object",
                "properties": { "name": { "type": "string" }, "age": { "type": "number" } },
                "required": ["name"]
            })
        );
        assert_eq!(
            resolve_source(OPERATORS, "Tagged"),
            json!({ "allOf": [user_object(&["id"]), { "type": "string" }] })
        );
    }

    #[test]
    fn test_tuple_type_with_optional_element() {
        assert_eq!(
            resolve_source("export type Point = [number, number, string?];", "Point"),
            json!({
                "type": "array",
                "prefixItems": [{ "type": "number" }, { "type": "number" }, { "type": "string" }],
                "minItems": 2,
                "maxItems": 3
            })
        );
    }
}
