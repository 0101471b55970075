//! Schema nodes and their OpenAPI-style JSON emission.
//!
//! A [`SchemaNode`] is a tagged shape ([`SchemaKind`]) plus the metadata any node may carry
//! (description, nullability, bounds, formats). Nodes are plain values: every composition in
//! the resolver clones and builds a new node.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Prefix used for component references
pub const COMPONENT_PREFIX: &str = "#/components/schemas/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Null,
}

impl PrimitiveKind {
    pub fn type_name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Object => "object",
            PrimitiveKind::Null => "null",
        }
    }

    /// Kind of a literal JSON value
    pub fn of_value(value: &Value) -> PrimitiveKind {
        match value {
            Value::String(_) => PrimitiveKind::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => PrimitiveKind::Integer,
            Value::Number(_) => PrimitiveKind::Number,
            Value::Bool(_) => PrimitiveKind::Boolean,
            Value::Null => PrimitiveKind::Null,
            _ => PrimitiveKind::Object,
        }
    }
}

/// The shape of a schema node
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Primitive(PrimitiveKind),
    Object {
        properties: IndexMap<String, SchemaNode>,
        /// Required property names, in insertion order and without duplicates
        required: Vec<String>,
        additional_properties: Option<Box<SchemaNode>>,
    },
    Array {
        items: Option<Box<SchemaNode>>,
        /// Fixed-position items of a tuple
        prefix_items: Vec<SchemaNode>,
    },
    Enum {
        values: Vec<Value>,
        kind: PrimitiveKind,
    },
    OneOf {
        alternatives: Vec<SchemaNode>,
        discriminator: Option<String>,
    },
    AllOf(Vec<SchemaNode>),
    Reference(String),
    /// A value taken as-is from an override document
    Verbatim(Value),
}

/// A resolved schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub description: Option<String>,
    pub nullable: bool,
    pub deprecated: bool,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub format: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

impl Default for SchemaNode {
    fn default() -> Self {
        SchemaNode::new(SchemaKind::Primitive(PrimitiveKind::Object))
    }
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
            nullable: false,
            deprecated: false,
            default: None,
            example: None,
            format: None,
            minimum: None,
            maximum: None,
            exclusive_minimum: false,
            exclusive_maximum: false,
            multiple_of: None,
            min_length: None,
            max_length: None,
            pattern: None,
            min_items: None,
            max_items: None,
        }
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(SchemaKind::Primitive(kind))
    }

    /// The "anything object" node every unrecognized shape degrades to
    pub fn opaque() -> Self {
        Self::primitive(PrimitiveKind::Object)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String)
    }

    pub fn string_with_format(format: &str) -> Self {
        let mut node = Self::string();
        node.format = Some(format.to_string());
        node
    }

    pub fn object(properties: IndexMap<String, SchemaNode>, required: Vec<String>) -> Self {
        let mut deduped = Vec::with_capacity(required.len());
        for name in required {
            if !deduped.contains(&name) {
                deduped.push(name);
            }
        }
        Self::new(SchemaKind::Object {
            properties,
            required: deduped,
            additional_properties: None,
        })
    }

    pub fn array(items: SchemaNode) -> Self {
        Self::new(SchemaKind::Array {
            items: Some(Box::new(items)),
            prefix_items: Vec::new(),
        })
    }

    pub fn tuple(prefix_items: Vec<SchemaNode>, rest: Option<SchemaNode>, min_items: u64) -> Self {
        let max_items = if rest.is_none() { Some(prefix_items.len() as u64) } else { None };
        let mut node = Self::new(SchemaKind::Array {
            items: rest.map(Box::new),
            prefix_items,
        });
        node.min_items = Some(min_items);
        node.max_items = max_items;
        node
    }

    pub fn enumeration(values: Vec<Value>) -> Self {
        let kind = values
            .iter()
            .find(|v| !v.is_null())
            .map(PrimitiveKind::of_value)
            .unwrap_or(PrimitiveKind::Null);
        Self::new(SchemaKind::Enum { values, kind })
    }

    pub fn one_of(alternatives: Vec<SchemaNode>, discriminator: Option<String>) -> Self {
        Self::new(SchemaKind::OneOf {
            alternatives,
            discriminator,
        })
    }

    pub fn all_of(parts: Vec<SchemaNode>) -> Self {
        Self::new(SchemaKind::AllOf(parts))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(SchemaKind::Reference(name.into()))
    }

    pub fn verbatim(value: Value) -> Self {
        Self::new(SchemaKind::Verbatim(value))
    }

    pub fn is_opaque(&self) -> bool {
        *self == Self::opaque()
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, SchemaKind::Object { .. })
    }

    pub fn reference_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Reference(name) => Some(name),
            _ => None,
        }
    }

    /// The primitive kind a modifier acts on: string, number, integer, ...
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match &self.kind {
            SchemaKind::Primitive(kind) => Some(*kind),
            SchemaKind::Enum { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Property names of an object node, in order
    pub fn property_names(&self) -> Vec<String> {
        match &self.kind {
            SchemaKind::Object { properties, .. } => properties.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether any metadata beyond the shape is set
    pub fn has_metadata(&self) -> bool {
        let bare = SchemaNode::new(self.kind.clone());
        *self != bare
    }

    /// Moves the metadata of `other` onto this node wherever this node has none
    pub fn inherit_metadata(&mut self, other: &SchemaNode) {
        if self.description.is_none() {
            self.description = other.description.clone();
        }
        self.nullable |= other.nullable;
        self.deprecated |= other.deprecated;
        if self.default.is_none() {
            self.default = other.default.clone();
        }
        if self.example.is_none() {
            self.example = other.example.clone();
        }
        if self.format.is_none() {
            self.format = other.format.clone();
        }
    }

    /// Emits the OpenAPI-style JSON value of this node
    pub fn to_value(&self) -> Value {
        let mut o = Map::new();

        match &self.kind {
            SchemaKind::Verbatim(value) => return value.clone(),
            SchemaKind::Reference(name) => {
                let target = json!({ "$ref": format!("{}{}", COMPONENT_PREFIX, name) });
                if !self.has_metadata() {
                    return target;
                }
                o.insert("allOf".into(), Value::Array(vec![target]));
            }
            SchemaKind::Primitive(kind) => {
                o.insert("type".into(), Value::from(kind.type_name()));
            }
            SchemaKind::Enum { values, kind } => {
                if *kind != PrimitiveKind::Null {
                    o.insert("type".into(), Value::from(kind.type_name()));
                }
                o.insert("enum".into(), Value::Array(values.clone()));
            }
            SchemaKind::Object {
                properties,
                required,
                additional_properties,
            } => {
                o.insert("type".into(), Value::from("object"));
                if !properties.is_empty() {
                    let props: Map<String, Value> = properties.iter().map(|(k, v)| (k.clone(), v.to_value())).collect();
                    o.insert("properties".into(), Value::Object(props));
                }
                if !required.is_empty() {
                    o.insert("required".into(), Value::Array(required.iter().cloned().map(Value::from).collect()));
                }
                if let Some(additional) = additional_properties {
                    o.insert("additionalProperties".into(), additional.to_value());
                }
            }
            SchemaKind::Array { items, prefix_items } => {
                o.insert("type".into(), Value::from("array"));
                if !prefix_items.is_empty() {
                    o.insert("prefixItems".into(), Value::Array(prefix_items.iter().map(SchemaNode::to_value).collect()));
                }
                if let Some(items) = items {
                    o.insert("items".into(), items.to_value());
                }
            }
            SchemaKind::OneOf {
                alternatives,
                discriminator,
            } => {
                o.insert("oneOf".into(), Value::Array(alternatives.iter().map(SchemaNode::to_value).collect()));
                if let Some(property) = discriminator {
                    o.insert("discriminator".into(), json!({ "propertyName": property }));
                }
            }
            SchemaKind::AllOf(parts) => {
                o.insert("allOf".into(), Value::Array(parts.iter().map(SchemaNode::to_value).collect()));
            }
        }

        if let Some(format) = &self.format {
            o.insert("format".into(), Value::from(format.clone()));
        }
        if let Some(description) = &self.description {
            o.insert("description".into(), Value::from(description.clone()));
        }
        if self.nullable {
            o.insert("nullable".into(), Value::Bool(true));
        }
        if self.deprecated {
            o.insert("deprecated".into(), Value::Bool(true));
        }
        if let Some(default) = &self.default {
            o.insert("default".into(), default.clone());
        }
        if let Some(example) = &self.example {
            o.insert("example".into(), example.clone());
        }
        if let Some(minimum) = self.minimum {
            o.insert("minimum".into(), json_num_pref_i64(minimum));
            if self.exclusive_minimum {
                o.insert("exclusiveMinimum".into(), Value::Bool(true));
            }
        }
        if let Some(maximum) = self.maximum {
            o.insert("maximum".into(), json_num_pref_i64(maximum));
            if self.exclusive_maximum {
                o.insert("exclusiveMaximum".into(), Value::Bool(true));
            }
        }
        if let Some(multiple_of) = self.multiple_of {
            o.insert("multipleOf".into(), json_num_pref_i64(multiple_of));
        }
        if let Some(n) = self.min_length {
            o.insert("minLength".into(), Value::from(n));
        }
        if let Some(n) = self.max_length {
            o.insert("maxLength".into(), Value::from(n));
        }
        if let Some(pattern) = &self.pattern {
            o.insert("pattern".into(), Value::from(pattern.clone()));
        }
        if let Some(n) = self.min_items {
            o.insert("minItems".into(), Value::from(n));
        }
        if let Some(n) = self.max_items {
            o.insert("maxItems".into(), Value::from(n));
        }

        Value::Object(o)
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Emits an integral float as a JSON integer
pub fn json_num_pref_i64(n: f64) -> Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_emission() {
        let mut props = IndexMap::new();
        props.insert("id".to_string(), SchemaNode::primitive(PrimitiveKind::Integer));
        props.insert("email".to_string(), SchemaNode::string_with_format("email"));
        let node = SchemaNode::object(props, vec!["id".into(), "id".into()]);

        assert_eq!(
            node.to_value(),
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "email": { "type": "string", "format": "email" }
                },
                "required": ["id"]
            })
        );
    }

    #[test]
    fn test_reference_with_metadata_wraps_in_all_of() {
        assert_eq!(
            SchemaNode::reference("User").to_value(),
            json!({ "$ref": "#/components/schemas/User" })
        );

        let mut node = SchemaNode::reference("User");
        node.nullable = true;
        node.description = Some("Owner".into());
        assert_eq!(
            node.to_value(),
            json!({
                "allOf": [{ "$ref": "#/components/schemas/User" }],
                "description": "Owner",
                "nullable": true
            })
        );
    }

    #[test]
    fn test_enum_and_bounds() {
        let node = SchemaNode::enumeration(vec![json!("a"), json!("b")]);
        assert_eq!(node.to_value(), json!({ "type": "string", "enum": ["a", "b"] }));

        let mut number = SchemaNode::primitive(PrimitiveKind::Number);
        number.minimum = Some(0.0);
        number.exclusive_minimum = true;
        number.maximum = Some(2.5);
        assert_eq!(
            number.to_value(),
            json!({ "type": "number", "minimum": 0, "exclusiveMinimum": true, "maximum": 2.5 })
        );
    }

    #[test]
    fn test_tuple_and_discriminator() {
        let tuple = SchemaNode::tuple(vec![SchemaNode::string(), SchemaNode::primitive(PrimitiveKind::Number)], None, 2);
        assert_eq!(
            tuple.to_value(),
            json!({
                "type": "array",
                "prefixItems": [{ "type": "string" }, { "type": "number" }],
                "minItems": 2,
                "maxItems": 2
            })
        );

        let union = SchemaNode::one_of(vec![SchemaNode::reference("A"), SchemaNode::reference("B")], Some("kind".into()));
        assert_eq!(union.to_value()["discriminator"], json!({ "propertyName": "kind" }));
    }

    #[test]
    fn test_opaque_and_metadata() {
        assert!(SchemaNode::opaque().is_opaque());
        assert!(!SchemaNode::opaque().has_metadata());
        let mut described = SchemaNode::opaque();
        described.description = Some("x".into());
        assert!(!described.is_opaque());
        assert!(described.has_metadata());
    }

    #[test]
    fn test_serialize_matches_to_value() {
        let node = SchemaNode::array(SchemaNode::string());
        let text = serde_json::to_string(&node).unwrap();
        assert_eq!(text, r#"{"type":"array","items":{"type":"string"}}"#);
    }
}
