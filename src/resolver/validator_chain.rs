//! Builder calls and fluent modifier chains.

use super::classify::{chain_is_optional, classify, CallShape};
use super::type_expr::{filter_properties, keyof_schema, literal_keys, merge_objects, union_of};
use super::{apply_doc, clear_required, literal_value, Resolver};
use crate::ast::{DeclarationKind, Expr, FunctionBody, Literal, ObjectProperty, PropertyKey, Stmt};
use crate::declaration_index::{initializer, Located, Namespace};
use crate::schema::{json_num_pref_i64, PrimitiveKind, SchemaKind, SchemaNode};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::rc::Rc;

/// What a size modifier constrains on the node it is applied to
#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundTarget {
    Length,
    Items,
    Numeric,
    Other,
}

impl BoundTarget {
    fn of(node: &SchemaNode) -> Self {
        match &node.kind {
            SchemaKind::Array { .. } => BoundTarget::Items,
            _ => match node.primitive_kind() {
                Some(PrimitiveKind::String) if node.format.as_deref() != Some("date-time") => BoundTarget::Length,
                Some(PrimitiveKind::Number | PrimitiveKind::Integer) => BoundTarget::Numeric,
                _ => BoundTarget::Other,
            },
        }
    }
}

impl Resolver<'_> {
    /// Resolves a validator expression in the current file.
    ///
    /// Builders produce fresh nodes, modifiers transform the node of their receiver, bare
    /// names become references, and calls of unknown functions go through factory expansion.
    /// Anything else is an opaque object.
    pub fn resolve_validator(&mut self, expr: &Expr) -> SchemaNode {
        let bindings = self.bindings();
        match classify(expr, &bindings) {
            CallShape::Builder { name, args } => self.resolve_builder(&name, args),
            CallShape::Modifier { receiver, method, args } => self.resolve_modifier(receiver, method, args),
            CallShape::OrmHelper { args } => self.resolve_orm_helper(args),
            CallShape::Factory { callee, args } => match self.expand_factory(&callee, args) {
                Some(node) => node,
                None => {
                    debug!("{}(...) is not a schema factory; using an opaque object", callee.display_name());
                    SchemaNode::opaque()
                }
            },
            CallShape::SchemaRef(name) => self.resolve_schema_ref(name),
            CallShape::NamespacedRef { namespace, member } => {
                let Some(file) = self.current_file().cloned() else { return SchemaNode::opaque() };
                match self.index.resolve_namespace_member(&file, namespace, member, Namespace::Value) {
                    Some(located) => self.reference_located(&located),
                    None => SchemaNode::opaque(),
                }
            }
            CallShape::Opaque => SchemaNode::opaque(),
        }
    }

    /// Resolves a validator declaration to its full schema and registers it.
    pub fn resolve_validator_declaration(&mut self, located: &Located) -> SchemaNode {
        let decl = Rc::clone(&located.decl);
        if let Some(cached) = self.ctx.validator_schemas.get(&decl.name) {
            return cached.clone();
        }
        let key = (Namespace::Value, decl.name.clone());
        if self.ctx.resolving.contains(&key) {
            debug!("Cycle through {}; emitting a reference", decl.name);
            return self.reference_to(Namespace::Value, &decl.name);
        }
        let Some(init) = initializer(&decl) else { return SchemaNode::opaque() };

        debug!("Resolving validator {} in {}", decl.name, located.file.display());
        self.ctx.resolving.insert(key.clone());
        let mut node = self.in_file(located.file.clone(), |r| r.resolve_validator(init));
        self.ctx.resolving.remove(&key);

        apply_doc(&mut node, decl.doc.as_deref());
        self.register(Namespace::Value, &decl.name, &node);
        node
    }

    /// A bare identifier in validator position
    fn resolve_schema_ref(&mut self, name: &str) -> SchemaNode {
        match self.lookup(name, Namespace::Value) {
            Some(located) => self.reference_located(&located),
            None => {
                debug!("Schema {} not found; using an opaque object", name);
                SchemaNode::opaque()
            }
        }
    }

    /// A reference to a validator declaration, resolving it first so its entry exists.
    /// A value alias `const A = B` is read through to its target.
    fn reference_located(&mut self, located: &Located) -> SchemaNode {
        let name = located.decl.name.clone();
        if self.is_validator_declaration(located) {
            let in_flight = self.ctx.resolving.contains(&(Namespace::Value, name.clone()));
            if !in_flight && !self.ctx.is_registered(Namespace::Value, &name) {
                self.resolve_validator_declaration(located);
            }
            return self.reference_to(Namespace::Value, &name);
        }

        let key = (Namespace::Value, name);
        let decl = Rc::clone(&located.decl);
        match initializer(&decl) {
            Some(init @ Expr::Ident(_)) if !self.ctx.resolving.contains(&key) => {
                self.ctx.resolving.insert(key.clone());
                let node = self.in_file(located.file.clone(), |r| r.resolve_validator(init));
                self.ctx.resolving.remove(&key);
                node
            }
            _ => SchemaNode::opaque(),
        }
    }

    /// Resolves an expression to an inline schema whose shape can be edited: references to
    /// validator declarations are replaced by the declaration's schema.
    pub(crate) fn resolve_inline(&mut self, expr: &Expr) -> SchemaNode {
        let bindings = self.bindings();
        if let CallShape::SchemaRef(name) = classify(expr, &bindings) {
            if let Some(located) = self.lookup(name, Namespace::Value) {
                if self.is_validator_declaration(&located) {
                    let node = self.resolve_validator_declaration(&located);
                    return self.follow_reference(&node);
                }
            }
        }
        let node = self.resolve_validator(expr);
        self.follow_reference(&node)
    }

    fn resolve_builder(&mut self, name: &str, args: &[Expr]) -> SchemaNode {
        let name = name.strip_prefix("coerce.").unwrap_or(name);
        let arg = |i: usize| args.get(i);

        match name {
            "string" => SchemaNode::string(),
            "number" => SchemaNode::primitive(PrimitiveKind::Number),
            "int" | "int32" => SchemaNode::primitive(PrimitiveKind::Integer),
            "bigint" | "int64" => {
                let mut node = SchemaNode::primitive(PrimitiveKind::Integer);
                node.format = Some("int64".to_string());
                node
            }
            "boolean" => SchemaNode::primitive(PrimitiveKind::Boolean),
            "date" | "iso.datetime" | "datetime" => SchemaNode::string_with_format("date-time"),
            "iso.date" => SchemaNode::string_with_format("date"),
            "iso.time" => SchemaNode::string_with_format("time"),
            "null" => SchemaNode::primitive(PrimitiveKind::Null),
            "undefined" | "any" | "unknown" | "never" | "void" | "custom" => SchemaNode::opaque(),
            "email" | "uuid" | "url" | "cuid" | "cuid2" | "ulid" | "ipv4" | "ipv6" | "nanoid" | "base64" => {
                SchemaNode::string_with_format(string_format(name).unwrap_or(name))
            }
            "object" | "strictObject" | "looseObject" => self.resolve_shape(arg(0)),
            "array" | "set" => match arg(0) {
                Some(items) => SchemaNode::array(self.resolve_validator(items)),
                None => SchemaNode::array(SchemaNode::opaque()),
            },
            "tuple" => {
                let prefix: Vec<SchemaNode> = match arg(0).map(Expr::strip_const) {
                    Some(Expr::Array(items)) => items.iter().map(|item| self.resolve_validator(item)).collect(),
                    _ => Vec::new(),
                };
                let rest = arg(1).map(|rest| self.resolve_validator(rest));
                let min_items = prefix.len() as u64;
                SchemaNode::tuple(prefix, rest, min_items)
            }
            "union" => {
                let nodes = match arg(0).map(Expr::strip_const) {
                    Some(Expr::Array(items)) => items.iter().map(|item| self.resolve_validator(item)).collect(),
                    _ => Vec::new(),
                };
                union_with_null(nodes)
            }
            "discriminatedUnion" => {
                let discriminator = arg(0).and_then(Expr::as_str).map(str::to_string);
                let alternatives = match arg(1).map(Expr::strip_const) {
                    Some(Expr::Array(items)) => items.iter().map(|item| self.resolve_validator(item)).collect(),
                    _ => Vec::new(),
                };
                SchemaNode::one_of(alternatives, discriminator)
            }
            "intersection" => match args {
                [left, right, ..] => {
                    let left = self.resolve_validator(left);
                    let right = self.resolve_validator(right);
                    all_of_pair(left, right)
                }
                [single] => self.resolve_validator(single),
                [] => SchemaNode::opaque(),
            },
            "literal" => match arg(0).and_then(literal_value) {
                Some(Value::Null) => SchemaNode::primitive(PrimitiveKind::Null),
                Some(Value::Array(values)) => SchemaNode::enumeration(values),
                Some(value) => SchemaNode::enumeration(vec![value]),
                None => SchemaNode::opaque(),
            },
            "enum" | "nativeEnum" => match arg(0) {
                Some(values) => self.resolve_enum_argument(values),
                None => SchemaNode::opaque(),
            },
            "record" => {
                let (key, value) = match args {
                    [key, value, ..] => (Some(self.resolve_validator(key)), self.resolve_validator(value)),
                    [value] => (None, self.resolve_validator(value)),
                    [] => (None, SchemaNode::opaque()),
                };
                record_schema(key.as_ref(), value)
            }
            "map" => {
                let value = match arg(1) {
                    Some(value) => self.resolve_validator(value),
                    None => SchemaNode::opaque(),
                };
                record_schema(None, value)
            }
            "optional" => self.resolve_arg(arg(0)),
            "nullable" | "nullish" => {
                let mut node = self.resolve_arg(arg(0));
                node.nullable = true;
                node
            }
            "lazy" => match arg(0).and_then(returned_expr) {
                Some(body) => self.resolve_validator(&body),
                None => SchemaNode::opaque(),
            },
            "preprocess" => self.resolve_arg(arg(1)),
            "instanceof" => match arg(0) {
                Some(Expr::Ident(class)) if matches!(class.as_str(), "File" | "Blob" | "Buffer") => {
                    SchemaNode::string_with_format("binary")
                }
                Some(Expr::Ident(class)) if class == "Date" => SchemaNode::string_with_format("date-time"),
                _ => SchemaNode::opaque(),
            },
            other => {
                debug!("Unknown builder {}; using an opaque object", other);
                SchemaNode::opaque()
            }
        }
    }

    fn resolve_arg(&mut self, arg: Option<&Expr>) -> SchemaNode {
        match arg {
            Some(expr) => self.resolve_validator(expr),
            None => SchemaNode::opaque(),
        }
    }

    /// `z.enum([...])`, `z.enum(CONST)`, `z.nativeEnum(Enum)`
    fn resolve_enum_argument(&mut self, values: &Expr) -> SchemaNode {
        if let Some(literals) = literal_value(values) {
            return enum_from_literals(literals);
        }
        let Expr::Ident(name) = values.strip_const() else { return SchemaNode::opaque() };
        if let Some(located) = self.lookup(name, Namespace::Type) {
            if matches!(located.decl.kind, DeclarationKind::Enum { .. }) {
                return self.resolve_located_type(&located, &[]);
            }
        }
        match self.lookup(name, Namespace::Value) {
            Some(located) => match initializer(&located.decl).and_then(literal_value) {
                Some(literals) => enum_from_literals(literals),
                None => SchemaNode::opaque(),
            },
            None => SchemaNode::opaque(),
        }
    }

    /// Resolves the shape argument of an object builder
    pub(crate) fn resolve_shape(&mut self, shape: Option<&Expr>) -> SchemaNode {
        let empty = || SchemaNode::object(IndexMap::new(), Vec::new());
        match shape.map(Expr::strip_const) {
            Some(Expr::Object(props)) => self.resolve_shape_properties(props),
            Some(Expr::Member { object, property }) if property == "shape" => {
                let base = self.resolve_inline(object);
                if base.is_object() {
                    base
                } else {
                    empty()
                }
            }
            Some(Expr::Ident(name)) => {
                let Some(located) = self.lookup(name, Namespace::Value) else { return empty() };
                let decl = Rc::clone(&located.decl);
                match initializer(&decl).map(Expr::strip_const) {
                    Some(init @ Expr::Object(_)) => self.in_file(located.file.clone(), |r| r.resolve_shape(Some(init))),
                    _ => empty(),
                }
            }
            _ => empty(),
        }
    }

    fn resolve_shape_properties(&mut self, props: &[ObjectProperty]) -> SchemaNode {
        let bindings = self.bindings();
        let mut node = SchemaNode::object(IndexMap::new(), Vec::new());

        for prop in props {
            match prop {
                ObjectProperty::KeyValue {
                    key: PropertyKey::Name(key),
                    value,
                } => {
                    let optional = chain_is_optional(value, &bindings);
                    let value_node = self.resolve_validator(value);
                    add_property(&mut node, key, value_node, !optional);
                }
                ObjectProperty::Shorthand(name) => {
                    let value_node = self.resolve_validator(&Expr::Ident(name.clone()));
                    add_property(&mut node, name, value_node, true);
                }
                ObjectProperty::Spread(inner) => {
                    let spread = self.resolve_shape(Some(inner));
                    merge_objects(&mut node, &spread, true);
                }
                ObjectProperty::KeyValue {
                    key: PropertyKey::Computed,
                    ..
                } => debug!("Skipping computed key in object shape"),
            }
        }
        node
    }

    fn resolve_modifier(&mut self, receiver: &Expr, method: &str, args: &[Expr]) -> SchemaNode {
        let base = if edits_shape(method) {
            self.resolve_inline(receiver)
        } else {
            self.resolve_validator(receiver)
        };
        self.apply_modifier(base, method, args)
    }

    /// Applies one modifier to the node of its receiver.
    ///
    /// Metadata and optionality modifiers keep a reference receiver as a reference; shape
    /// and kind modifiers work on the referenced schema itself.
    pub(crate) fn apply_modifier(&mut self, base: SchemaNode, method: &str, args: &[Expr]) -> SchemaNode {
        let arg = args.first();
        let mut node = if edits_shape(method) { self.follow_reference(&base) } else { base };

        match method {
            "nullable" | "nullish" => node.nullable = true,
            "default" | "prefault" => {
                if let Some(value) = arg.and_then(literal_or_number) {
                    node.default = Some(value);
                }
            }
            "describe" => {
                if let Some(text) = arg.and_then(Expr::as_str) {
                    apply_description(&mut node, text);
                }
            }
            "openapi" | "meta" => {
                let metadata = args.iter().rev().map(Expr::strip_const).find(|a| matches!(a, Expr::Object(_)));
                if let Some(Expr::Object(props)) = metadata {
                    apply_metadata_object(&mut node, props);
                }
            }
            "array" => return SchemaNode::array(node),
            "or" => {
                let right = self.resolve_arg(arg);
                return union_with_null(vec![node, right]);
            }
            "and" => {
                let right = self.resolve_arg(arg);
                return all_of_pair(node, right);
            }
            "extend" | "merge" | "safeExtend" => {
                let extension = match (method, arg) {
                    ("merge", Some(other)) => self.resolve_inline(other),
                    (_, shape) => self.resolve_shape(shape),
                };
                if !node.is_object() {
                    debug!("{} on a non-object schema; using the extension alone", method);
                    return extension;
                }
                merge_objects(&mut node, &extension, false);
            }
            "partial" | "deepPartial" => match arg.and_then(mask_keys) {
                Some(keys) => {
                    if let SchemaKind::Object { required, .. } = &mut node.kind {
                        required.retain(|r| !keys.contains(r));
                    }
                }
                None => clear_required(&mut node),
            },
            "required" => {
                let names = arg.and_then(mask_keys).unwrap_or_else(|| node.property_names());
                if let SchemaKind::Object { required, .. } = &mut node.kind {
                    for name in names {
                        if !required.contains(&name) {
                            required.push(name);
                        }
                    }
                }
            }
            "pick" | "omit" => {
                let keys = arg.and_then(mask_keys).unwrap_or_default();
                return filter_properties(node, |key| keys.iter().any(|k| k == key) == (method == "pick"));
            }
            "keyof" => return keyof_schema(&node),
            "element" => {
                return match node.kind {
                    SchemaKind::Array { items: Some(items), .. } => *items,
                    _ => SchemaNode::opaque(),
                }
            }
            "catchall" => {
                let extra = self.resolve_arg(arg);
                if let SchemaKind::Object { additional_properties, .. } = &mut node.kind {
                    *additional_properties = Some(Box::new(extra));
                }
            }
            "regex" => {
                node.pattern = match arg.map(Expr::strip_const) {
                    Some(Expr::Regex(body)) => Some(body.clone()),
                    Some(Expr::New { args, .. }) => args.first().and_then(Expr::as_str).map(str::to_string),
                    Some(other) => other.as_str().map(str::to_string),
                    None => None,
                };
            }
            "int" => {
                if node.kind == SchemaKind::Primitive(PrimitiveKind::Number) {
                    node.kind = SchemaKind::Primitive(PrimitiveKind::Integer);
                }
            }
            _ if string_format(method).is_some() => {
                if node.primitive_kind() == Some(PrimitiveKind::String) {
                    node.format = string_format(method).map(str::to_string);
                }
            }
            _ if is_bound_modifier(method) => apply_bound(&mut node, method, arg.and_then(number_value)),
            "optional" | "unwrap" | "removeDefault" | "transform" | "refine" | "superRefine" | "check" | "catch"
            | "brand" | "pipe" | "readonly" | "strict" | "passthrough" | "strip" | "nonstrict" | "overwrite"
            | "trim" | "toLowerCase" | "toUpperCase" | "startsWith" | "endsWith" | "includes" | "finite" | "safe" => {}
            other => debug!("Ignoring unknown modifier .{}()", other),
        }
        node
    }
}

/// Modifiers that read or edit the shape of their receiver rather than annotate it
fn edits_shape(method: &str) -> bool {
    matches!(
        method,
        "extend"
            | "merge"
            | "safeExtend"
            | "partial"
            | "deepPartial"
            | "required"
            | "pick"
            | "omit"
            | "keyof"
            | "element"
            | "catchall"
            | "regex"
            | "int"
    ) || string_format(method).is_some()
        || is_bound_modifier(method)
}

fn add_property(node: &mut SchemaNode, name: &str, value: SchemaNode, required: bool) {
    if let SchemaKind::Object {
        properties,
        required: required_names,
        ..
    } = &mut node.kind
    {
        properties.insert(name.to_string(), value);
        if required {
            if !required_names.iter().any(|r| r == name) {
                required_names.push(name.to_string());
            }
        } else {
            required_names.retain(|r| r != name);
        }
    }
}

/// `allOf` of two operands; a bare `allOf` on the left is extended so `a.and(b).and(c)`
/// stays flat
fn all_of_pair(left: SchemaNode, right: SchemaNode) -> SchemaNode {
    match left.kind {
        SchemaKind::AllOf(ref parts) if !left.has_metadata() => {
            let mut parts = parts.clone();
            parts.push(right);
            SchemaNode::all_of(parts)
        }
        _ => SchemaNode::all_of(vec![left, right]),
    }
}

/// Union that lifts `null` alternatives into the nullable flag
fn union_with_null(nodes: Vec<SchemaNode>) -> SchemaNode {
    let null = SchemaNode::primitive(PrimitiveKind::Null);
    let nullable = nodes.iter().any(|n| *n == null);
    let rest: Vec<SchemaNode> = nodes.into_iter().filter(|n| *n != null).collect();
    if rest.is_empty() {
        return null;
    }
    let mut node = union_of(rest);
    node.nullable |= nullable;
    node
}

fn record_schema(key: Option<&SchemaNode>, value: SchemaNode) -> SchemaNode {
    let keys = key.map(literal_keys).unwrap_or_default();
    if keys.is_empty() {
        let mut node = SchemaNode::object(IndexMap::new(), Vec::new());
        if let SchemaKind::Object { additional_properties, .. } = &mut node.kind {
            *additional_properties = Some(Box::new(value));
        }
        return node;
    }
    let properties = keys.iter().map(|k| (k.clone(), value.clone())).collect();
    SchemaNode::object(properties, keys)
}

/// An array of literals, or the values of a literal object
fn enum_from_literals(literals: Value) -> SchemaNode {
    match literals {
        Value::Array(values) => SchemaNode::enumeration(values),
        Value::Object(map) => SchemaNode::enumeration(map.into_iter().map(|(_, v)| v).collect()),
        _ => SchemaNode::opaque(),
    }
}

/// The schema expression a `lazy` thunk returns
fn returned_expr(thunk: &Expr) -> Option<Expr> {
    let Expr::Function(function) = thunk else { return None };
    match &function.body {
        FunctionBody::Expr(body) => Some((**body).clone()),
        FunctionBody::Block(stmts) => stmts.iter().find_map(|stmt| match stmt {
            Stmt::Return(Some(expr)) => Some(expr.clone()),
            _ => None,
        }),
        FunctionBody::None => None,
    }
}

/// Keys set to `true` in a `{ a: true, b: true }` mask
fn mask_keys(mask: &Expr) -> Option<Vec<String>> {
    let Expr::Object(props) = mask.strip_const() else { return None };
    Some(
        props
            .iter()
            .filter_map(|prop| match prop {
                ObjectProperty::KeyValue {
                    key: PropertyKey::Name(key),
                    value: Expr::Literal(Literal::Boolean(true)),
                } => Some(key.clone()),
                ObjectProperty::Shorthand(key) => Some(key.clone()),
                _ => None,
            })
            .collect(),
    )
}

/// Numeric literal, including a negated one
fn number_value(expr: &Expr) -> Option<f64> {
    match expr.strip_const() {
        Expr::Literal(Literal::Number(n)) => Some(*n),
        Expr::Unary { op, operand } if op == "-" => number_value(operand).map(|n| -n),
        Expr::Unary { op, operand } if op == "+" => number_value(operand),
        _ => None,
    }
}

fn literal_or_number(expr: &Expr) -> Option<Value> {
    literal_value(expr).or_else(|| number_value(expr).map(json_num_pref_i64))
}

/// Sets the description from a `describe` text; a leading `@deprecated` marker flags the
/// node instead of appearing in the text.
fn apply_description(node: &mut SchemaNode, text: &str) {
    let trimmed = text.trim();
    let rest = match trimmed.strip_prefix("@deprecated") {
        Some(rest) => {
            node.deprecated = true;
            rest.trim_start_matches([':', ' ', '-']).trim()
        }
        None => trimmed,
    };
    if !rest.is_empty() {
        node.description = Some(rest.to_string());
    }
}

fn apply_metadata_object(node: &mut SchemaNode, props: &[ObjectProperty]) {
    for prop in props {
        let ObjectProperty::KeyValue {
            key: PropertyKey::Name(key),
            value,
        } = prop
        else {
            continue;
        };
        match key.as_str() {
            "description" => {
                if let Some(text) = value.as_str() {
                    apply_description(node, text);
                }
            }
            "example" => node.example = literal_or_number(value),
            "default" => node.default = literal_or_number(value),
            "deprecated" => node.deprecated = matches!(value, Expr::Literal(Literal::Boolean(true))),
            "format" => node.format = value.as_str().map(str::to_string),
            _ => {}
        }
    }
}

/// OpenAPI format named by a string format modifier
fn string_format(method: &str) -> Option<&'static str> {
    Some(match method {
        "email" => "email",
        "url" => "uri",
        "uuid" | "guid" => "uuid",
        "datetime" => "date-time",
        "date" => "date",
        "time" => "time",
        "duration" => "duration",
        "cuid" => "cuid",
        "cuid2" => "cuid2",
        "ulid" => "ulid",
        "nanoid" => "nanoid",
        "ip" => "ip",
        "ipv4" => "ipv4",
        "ipv6" => "ipv6",
        "emoji" => "emoji",
        "base64" => "byte",
        _ => return None,
    })
}

fn is_bound_modifier(method: &str) -> bool {
    matches!(
        method,
        "min"
            | "max"
            | "length"
            | "gt"
            | "gte"
            | "lt"
            | "lte"
            | "positive"
            | "nonnegative"
            | "negative"
            | "nonpositive"
            | "nonempty"
            | "multipleOf"
            | "step"
    )
}

/// Applies a size or range modifier according to the kind of the node
fn apply_bound(node: &mut SchemaNode, method: &str, n: Option<f64>) {
    let count = n.filter(|v| *v >= 0.0).map(|v| v as u64);
    match (BoundTarget::of(node), method) {
        (BoundTarget::Length, "min") => node.min_length = count,
        (BoundTarget::Length, "max") => node.max_length = count,
        (BoundTarget::Length, "length") => {
            node.min_length = count;
            node.max_length = count;
        }
        (BoundTarget::Length, "nonempty") => node.min_length = Some(1),
        (BoundTarget::Items, "min") => node.min_items = count,
        (BoundTarget::Items, "max") => node.max_items = count,
        (BoundTarget::Items, "length") => {
            node.min_items = count;
            node.max_items = count;
        }
        (BoundTarget::Items, "nonempty") => node.min_items = Some(1),
        (BoundTarget::Numeric, "min" | "gte") => {
            node.minimum = n;
            node.exclusive_minimum = false;
        }
        (BoundTarget::Numeric, "gt") => {
            node.minimum = n;
            node.exclusive_minimum = true;
        }
        (BoundTarget::Numeric, "max" | "lte") => {
            node.maximum = n;
            node.exclusive_maximum = false;
        }
        (BoundTarget::Numeric, "lt") => {
            node.maximum = n;
            node.exclusive_maximum = true;
        }
        (BoundTarget::Numeric, "positive") => {
            node.minimum = Some(0.0);
            node.exclusive_minimum = true;
        }
        (BoundTarget::Numeric, "nonnegative") => {
            node.minimum = Some(0.0);
            node.exclusive_minimum = false;
        }
        (BoundTarget::Numeric, "negative") => {
            node.maximum = Some(0.0);
            node.exclusive_maximum = true;
        }
        (BoundTarget::Numeric, "nonpositive") => {
            node.maximum = Some(0.0);
            node.exclusive_maximum = false;
        }
        (BoundTarget::Numeric, "multipleOf" | "step") => node.multiple_of = n,
        (target, method) => debug!("Ignoring .{}() on a {:?} schema", method, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::merger::SchemaEngine;
    use crate::resolver::ValueRole;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    const SCHEMAS: &str = r#"
        import { z } from "zod";

        export const A = z.object({ a: z.string() });
        export const B = z.object({ b: z.number() });

        export const Both = A.and(B);
        export const Intersected = z.intersection(A, B);
        export const Three = A.and(B).and(z.object({ c: z.boolean() }));

        export const Scalar = z.string().or(z.number()).or(z.boolean());
        export const MaybeText = z.string().or(z.null());

        export const Pair = z.tuple([z.string(), z.number()]);
        export const Row = z.tuple([z.string()], z.number());

        export const Base = z.object({ id: z.string(), name: z.string() });
        export const Loose = Base.extend({ id: z.string().optional(), x: z.number() }).extend({ y: z.number() });
        export const Twice = Base.extend({ id: z.string() }).extend({ id: z.string().uuid() });
    "#;

    fn resolve_schemas(name: &str) -> (Value, BTreeMap<String, SchemaNode>) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("schemas.ts"), SCHEMAS).unwrap();
        let mut engine = SchemaEngine::new(temp_dir.path(), EngineConfig::default());
        let node = engine.resolve_by_name(name, ValueRole::Body).to_value();
        (node, engine.named_schemas())
    }

    fn reference(name: &str) -> Value {
        json!({ "$ref": format!("#/components/schemas/{}", name) })
    }

    #[test]
    fn test_apply_bound_by_kind() {
        let mut s = SchemaNode::string();
        apply_bound(&mut s, "min", Some(2.0));
        apply_bound(&mut s, "max", Some(10.0));
        assert_eq!(s.to_value(), json!({ "type": "string", "minLength": 2, "maxLength": 10 }));

        let mut n = SchemaNode::primitive(PrimitiveKind::Integer);
        apply_bound(&mut n, "positive", None);
        apply_bound(&mut n, "lte", Some(100.0));
        assert_eq!(
            n.to_value(),
            json!({ "type": "integer", "minimum": 0, "exclusiveMinimum": true, "maximum": 100 })
        );

        let mut a = SchemaNode::array(SchemaNode::string());
        apply_bound(&mut a, "nonempty", None);
        assert_eq!(a.min_items, Some(1));
    }

    #[test]
    fn test_describe_extracts_deprecated() {
        let mut node = SchemaNode::string();
        apply_description(&mut node, "@deprecated use slug instead");
        assert!(node.deprecated);
        assert_eq!(node.description.as_deref(), Some("use slug instead"));

        let mut plain = SchemaNode::string();
        apply_description(&mut plain, "Display name");
        assert!(!plain.deprecated);
        assert_eq!(plain.description.as_deref(), Some("Display name"));
    }

    #[test]
    fn test_union_with_null_lifts_nullable() {
        let node = union_with_null(vec![SchemaNode::string(), SchemaNode::primitive(PrimitiveKind::Null)]);
        assert_eq!(node.to_value(), json!({ "type": "string", "nullable": true }));
    }

    #[test]
    fn test_record_with_literal_keys() {
        let keys = SchemaNode::enumeration(vec![json!("en"), json!("fr")]);
        let node = record_schema(Some(&keys), SchemaNode::string());
        assert_eq!(node.property_names(), vec!["en", "fr"]);

        let open = record_schema(Some(&SchemaNode::string()), SchemaNode::string());
        assert_eq!(open.to_value(), json!({ "type": "object", "additionalProperties": { "type": "string" } }));
    }

    #[test]
    fn test_number_value_handles_negation() {
        let expr = Expr::Unary {
            op: "-".into(),
            operand: Box::new(Expr::Literal(Literal::Number(5.0))),
        };
        assert_eq!(number_value(&expr), Some(-5.0));
    }

    #[test]
    fn test_and_keeps_operands_as_references() {
        let (both, table) = resolve_schemas("Both");
        assert_eq!(both, json!({ "allOf": [reference("A"), reference("B")] }));
        assert!(table.contains_key("A"));
        assert!(table.contains_key("B"));

        let (intersected, _) = resolve_schemas("Intersected");
        assert_eq!(intersected, both);
    }

    #[test]
    fn test_chained_and_stays_flat() {
        let (three, _) = resolve_schemas("Three");
        assert_eq!(
            three,
            json!({
                "allOf": [
                    reference("A"),
                    reference("B"),
                    { "type": "object", "properties": { "c": { "type": "boolean" } }, "required": ["c"] }
                ]
            })
        );
    }

    #[test]
    fn test_or_chain_flattens_into_one_of() {
        let (scalar, _) = resolve_schemas("Scalar");
        assert_eq!(
            scalar,
            json!({ "oneOf": [{ "type": "string" }, { "type": "number" }, { "type": "boolean" }] })
        );

        let (maybe, _) = resolve_schemas("MaybeText");
        assert_eq!(maybe, json!({ "type": "string", "nullable": true }));
    }

    #[test]
    fn test_tuple_builder() {
        let (pair, _) = resolve_schemas("Pair");
        assert_eq!(
            pair,
            json!({
                "type": "array",
                "prefixItems": [{ "type": "string" }, { "type": "number" }],
                "minItems": 2,
                "maxItems": 2
            })
        );

        let (row, _) = resolve_schemas("Row");
        assert_eq!(
            row,
            json!({
                "type": "array",
                "prefixItems": [{ "type": "string" }],
                "items": { "type": "number" },
                "minItems": 1
            })
        );
    }

    #[test]
    fn test_extend_unions_required_names() {
        let (loose, _) = resolve_schemas("Loose");
        assert_eq!(loose["required"], json!(["id", "name", "x", "y"]));
        assert_eq!(loose["properties"]["id"], json!({ "type": "string" }));

        let (twice, _) = resolve_schemas("Twice");
        assert_eq!(twice["required"], json!(["id", "name"]));
        assert_eq!(twice["properties"]["id"], json!({ "type": "string", "format": "uuid" }));
    }
}
