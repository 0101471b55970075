//! Syntax tree for the subset of TypeScript the schema engine reads.
//!
//! The tree keeps only what schema resolution needs: type-level declarations,
//! variable initializers, function signatures and the statements that can
//! produce a return value. Everything else is collapsed into `Opaque` /
//! `Unsupported` markers by the parser.

use std::rc::Rc;

/// A parsed source module
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Import bindings in source order
    pub imports: Vec<Import>,
    /// `export ... from` re-exports
    pub reexports: Vec<ReExport>,
    /// Top-level declarations in source order
    pub declarations: Vec<Rc<Declaration>>,
}

/// One local binding introduced by an `import` statement
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub local: String,
    pub imported: ImportedName,
    pub source: String,
}

/// What an import binding refers to in the source module
#[derive(Debug, Clone, PartialEq)]
pub enum ImportedName {
    Named(String),
    Default,
    Namespace,
}

/// `export { a as b } from "./x"` or `export * from "./x"`
#[derive(Debug, Clone, PartialEq)]
pub struct ReExport {
    /// `None` for `export *`; otherwise `(original, exported)`
    pub names: Option<Vec<(String, String)>>,
    pub source: String,
}

/// A named top-level declaration
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub exported: bool,
    pub doc: Option<String>,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone)]
pub enum DeclarationKind {
    TypeAlias {
        params: Vec<TypeParam>,
        body: TypeExpr,
    },
    Interface {
        params: Vec<TypeParam>,
        extends: Vec<TypeExpr>,
        members: Vec<TypeMember>,
    },
    Enum {
        members: Vec<EnumMember>,
    },
    Variable {
        annotation: Option<TypeExpr>,
        init: Option<Expr>,
        is_const: bool,
    },
    Function(Rc<Function>),
}

impl Declaration {
    /// Whether the declaration lives in the type namespace
    pub fn is_type(&self) -> bool {
        matches!(
            self.kind,
            DeclarationKind::TypeAlias { .. } | DeclarationKind::Interface { .. } | DeclarationKind::Enum { .. }
        )
    }

    /// Whether the declaration lives in the value namespace
    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            DeclarationKind::Variable { .. } | DeclarationKind::Function(_) | DeclarationKind::Enum { .. }
        )
    }

    /// Returns the function behind a `function` declaration or a `const f = () => ...` binding
    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match &self.kind {
            DeclarationKind::Function(f) => Some(f),
            DeclarationKind::Variable { init: Some(Expr::Function(f)), .. } => Some(f),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Option<TypeExpr>,
    pub default: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expr>,
}

/// Member of an interface body or object type literal
#[derive(Debug, Clone, PartialEq)]
pub enum TypeMember {
    Property(PropertySignature),
    /// `[key: string]: T`
    Index { value: TypeExpr },
    /// Method and call signatures carry no data shape
    Method { name: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySignature {
    pub name: String,
    pub optional: bool,
    pub readonly: bool,
    pub ty: TypeExpr,
    pub doc: Option<String>,
}

/// Built-in type keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    String,
    Number,
    Boolean,
    BigInt,
    Any,
    Unknown,
    Null,
    Undefined,
    Void,
    Never,
    Object,
    Symbol,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "string" => Keyword::String,
            "number" => Keyword::Number,
            "boolean" => Keyword::Boolean,
            "bigint" => Keyword::BigInt,
            "any" => Keyword::Any,
            "unknown" => Keyword::Unknown,
            "null" => Keyword::Null,
            "undefined" => Keyword::Undefined,
            "void" => Keyword::Void,
            "never" => Keyword::Never,
            "object" => Keyword::Object,
            "symbol" => Keyword::Symbol,
            _ => return None,
        })
    }
}

/// Literal values shared by type and value positions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleElement {
    pub ty: TypeExpr,
    pub optional: bool,
    pub rest: bool,
}

/// A type expression
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Keyword(Keyword),
    Literal(Literal),
    /// Template literal type
    TemplateLiteral,
    /// Possibly qualified name with type arguments
    Reference { name: String, args: Vec<TypeExpr> },
    Object(Vec<TypeMember>),
    Array(Box<TypeExpr>),
    Tuple(Vec<TupleElement>),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    /// `typeof name`
    Query(String),
    KeyOf(Box<TypeExpr>),
    IndexedAccess { object: Box<TypeExpr>, index: Box<TypeExpr> },
    Function { params: Vec<Param>, ret: Box<TypeExpr> },
    /// Conditional, mapped, `infer` and other shapes with no static data
    Unsupported,
}

impl TypeExpr {
    /// Whether this is the `null` or `undefined` keyword
    pub fn is_nullish(&self) -> bool {
        matches!(
            self,
            TypeExpr::Keyword(Keyword::Null | Keyword::Undefined) | TypeExpr::Literal(Literal::Null | Literal::Undefined)
        )
    }

    /// Whether this is `undefined`, or a union containing it
    pub fn admits_undefined(&self) -> bool {
        match self {
            TypeExpr::Keyword(Keyword::Undefined) | TypeExpr::Literal(Literal::Undefined) => true,
            TypeExpr::Union(members) => members.iter().any(TypeExpr::admits_undefined),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamPattern {
    Ident(String),
    /// Object or array destructuring
    Destructured,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: ParamPattern,
    pub optional: bool,
    pub rest: bool,
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
}

impl Param {
    pub fn name(&self) -> Option<&str> {
        match &self.pattern {
            ParamPattern::Ident(name) => Some(name),
            ParamPattern::Destructured => None,
        }
    }
}

/// A function declaration, function expression or arrow function
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: FunctionBody,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// Concise arrow body
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
    /// Overload signature or ambient declaration
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Return(Option<Expr>),
    If {
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Const { name: String, init: Option<Expr> },
    Expr(Expr),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Name(String),
    Computed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    KeyValue { key: PropertyKey, value: Expr },
    Shorthand(String),
    Spread(Expr),
}

/// A value expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Literal(Literal),
    Regex(String),
    Member { object: Box<Expr>, property: String },
    Index { object: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, type_args: Vec<TypeExpr>, args: Vec<Expr> },
    New { callee: Box<Expr>, args: Vec<Expr> },
    Object(Vec<ObjectProperty>),
    Array(Vec<Expr>),
    Spread(Box<Expr>),
    Function(Rc<Function>),
    Unary { op: String, operand: Box<Expr> },
    Binary { op: String, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    /// `expr as const`
    AsConst(Box<Expr>),
    /// Template literal with substitutions, class expressions and similar
    Opaque,
}

impl Expr {
    /// Dotted path of a member chain made only of identifiers (`z.coerce.number`)
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Member { object, property } => object.dotted_path().map(|base| format!("{}.{}", base, property)),
            _ => None,
        }
    }

    /// Removes `as const` wrappers
    pub fn strip_const(&self) -> &Expr {
        match self {
            Expr::AsConst(inner) => inner.strip_const(),
            other => other,
        }
    }

    /// The literal string value of this expression, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self.strip_const() {
            Expr::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_path() {
        let expr = Expr::Member {
            object: Box::new(Expr::Member {
                object: Box::new(Expr::Ident("z".into())),
                property: "coerce".into(),
            }),
            property: "number".into(),
        };
        assert_eq!(expr.dotted_path().as_deref(), Some("z.coerce.number"));
    }

    #[test]
    fn test_admits_undefined() {
        let ty = TypeExpr::Union(vec![TypeExpr::Keyword(Keyword::String), TypeExpr::Keyword(Keyword::Undefined)]);
        assert!(ty.admits_undefined());
        assert!(!TypeExpr::Keyword(Keyword::Null).admits_undefined());
    }
}
