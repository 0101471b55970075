//! One tagged classification of value expressions.
//!
//! Every interpreter dispatches on [`CallShape`] with a closed `match`, so the question
//! "what kind of call is this?" is answered in exactly one place.

use crate::ast::Expr;
use crate::detector::ValidatorBindings;

/// Maximum modifier-chain depth followed when testing validator-ness
const MAX_CHAIN_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum FactoryCallee {
    /// `makeList(x)`
    Local(String),
    /// `Factories.makeList(x)` through a namespace import
    Namespaced { namespace: String, member: String },
}

impl FactoryCallee {
    pub fn display_name(&self) -> String {
        match self {
            FactoryCallee::Local(name) => name.clone(),
            FactoryCallee::Namespaced { namespace, member } => format!("{}.{}", namespace, member),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallShape<'e> {
    /// `z.string()`, `z.coerce.number()`, or a standalone imported builder
    Builder { name: String, args: &'e [Expr] },
    /// `receiver.method(args)` on anything that is not a builder namespace
    Modifier {
        receiver: &'e Expr,
        method: &'e str,
        args: &'e [Expr],
    },
    /// `createInsertSchema(table, refinements)`
    OrmHelper { args: &'e [Expr] },
    /// Call of a user-defined function that may return a validator chain
    Factory { callee: FactoryCallee, args: &'e [Expr] },
    /// Bare identifier naming another declaration
    SchemaRef(&'e str),
    /// `Schemas.User` through a namespace import
    NamespacedRef { namespace: &'e str, member: &'e str },
    Opaque,
}

/// Classifies a value expression in the scope described by `bindings`.
pub fn classify<'e>(expr: &'e Expr, bindings: &ValidatorBindings) -> CallShape<'e> {
    match expr.strip_const() {
        Expr::Ident(name) => CallShape::SchemaRef(name),
        Expr::Member { object, property } => match object.as_ref() {
            Expr::Ident(namespace) if bindings.namespace_imports.contains(namespace) => CallShape::NamespacedRef {
                namespace,
                member: property,
            },
            _ => CallShape::Opaque,
        },
        Expr::Call { callee, args, .. } => classify_call(callee, args, bindings),
        _ => CallShape::Opaque,
    }
}

fn classify_call<'e>(callee: &'e Expr, args: &'e [Expr], bindings: &ValidatorBindings) -> CallShape<'e> {
    match callee {
        Expr::Ident(name) => {
            if let Some(builder) = bindings.builder_functions.get(name) {
                CallShape::Builder {
                    name: builder.clone(),
                    args,
                }
            } else if bindings.is_orm_helper(name) {
                CallShape::OrmHelper { args }
            } else {
                CallShape::Factory {
                    callee: FactoryCallee::Local(name.clone()),
                    args,
                }
            }
        }
        Expr::Member { object, property } => {
            if let Some(path) = object.dotted_path() {
                let mut segments = path.splitn(2, '.');
                let first = segments.next().unwrap_or_default();
                if bindings.is_builder_namespace(first) {
                    let name = match segments.next() {
                        Some(rest) => format!("{}.{}", rest, property),
                        None => property.clone(),
                    };
                    return CallShape::Builder { name, args };
                }
                if !path.contains('.') && bindings.namespace_imports.contains(&path) {
                    return CallShape::Factory {
                        callee: FactoryCallee::Namespaced {
                            namespace: path,
                            member: property.clone(),
                        },
                        args,
                    };
                }
            }
            CallShape::Modifier {
                receiver: object,
                method: property,
                args,
            }
        }
        _ => CallShape::Opaque,
    }
}

/// Whether an expression is something the validator interpreter can read.
///
/// Builders, ORM helpers and factory calls qualify; a modifier qualifies when its receiver
/// does. A bare identifier qualifies only as the root of a modifier chain.
pub fn is_validator_expr(expr: &Expr, bindings: &ValidatorBindings, depth: usize) -> bool {
    if depth > MAX_CHAIN_DEPTH {
        return false;
    }
    match classify(expr, bindings) {
        CallShape::Builder { .. } | CallShape::OrmHelper { .. } | CallShape::Factory { .. } => true,
        CallShape::Modifier { receiver, .. } => is_validator_expr(receiver, bindings, depth + 1),
        CallShape::SchemaRef(_) | CallShape::NamespacedRef { .. } => depth > 0,
        CallShape::Opaque => false,
    }
}

/// Walks a modifier chain and reports whether it makes its value optional.
///
/// `optional()` and `nullish()` anywhere on the spine, or a `z.optional(x)` root, make the
/// property optional; `default()` does not.
pub fn chain_is_optional(expr: &Expr, bindings: &ValidatorBindings) -> bool {
    let mut current = expr;
    for _ in 0..MAX_CHAIN_DEPTH {
        match classify(current, bindings) {
            CallShape::Modifier { receiver, method, .. } => {
                if matches!(method, "optional" | "nullish") {
                    return true;
                }
                current = receiver;
            }
            CallShape::Builder { name, .. } => return matches!(name.as_str(), "optional" | "nullish"),
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::declaration_index::initializer;
    use crate::detector::ValidatorDetector;
    use crate::parser::AstParser;
    use pretty_assertions::assert_eq;

    fn with_init<R>(source: &str, f: impl FnOnce(&Expr, &ValidatorBindings) -> R) -> R {
        let module = AstParser::parse_source(source).unwrap();
        let bindings = ValidatorDetector::detect(&module, &EngineConfig::default());
        let decl = module.declarations.last().unwrap();
        f(initializer(decl).unwrap(), &bindings)
    }

    #[test]
    fn test_classify_builders() {
        with_init("const a = z.string();", |e, b| {
            assert!(matches!(classify(e, b), CallShape::Builder { name, .. } if name == "string"));
        });
        with_init("const a = z.coerce.number();", |e, b| {
            assert!(matches!(classify(e, b), CallShape::Builder { name, .. } if name == "coerce.number"));
        });
        with_init("import { object } from 'zod'; const a = object({});", |e, b| {
            assert!(matches!(classify(e, b), CallShape::Builder { name, .. } if name == "object"));
        });
    }

    #[test]
    fn test_classify_modifier_and_refs() {
        with_init("const a = Base.extend({});", |e, b| {
            match classify(e, b) {
                CallShape::Modifier { receiver, method, .. } => {
                    assert_eq!(method, "extend");
                    assert_eq!(receiver, &Expr::Ident("Base".into()));
                }
                other => panic!("unexpected {:?}", other),
            }
        });
        with_init("const a = Base;", |e, b| assert_eq!(classify(e, b), CallShape::SchemaRef("Base")));
    }

    #[test]
    fn test_classify_factories_and_orm() {
        with_init("const a = paginated(Item);", |e, b| {
            assert!(matches!(classify(e, b), CallShape::Factory { callee: FactoryCallee::Local(n), .. } if n == "paginated"));
        });
        with_init("import * as F from './f'; const a = F.paginated(Item);", |e, b| {
            assert!(matches!(
                classify(e, b),
                CallShape::Factory { callee: FactoryCallee::Namespaced { .. }, .. }
            ));
        });
        with_init("const a = createInsertSchema(users, {});", |e, b| {
            assert!(matches!(classify(e, b), CallShape::OrmHelper { args } if args.len() == 2));
        });
    }

    #[test]
    fn test_is_validator_expr() {
        with_init("const a = z.string().min(1);", |e, b| assert!(is_validator_expr(e, b, 0)));
        with_init("const a = Base.partial();", |e, b| assert!(is_validator_expr(e, b, 0)));
        with_init("const a = Base;", |e, b| assert!(!is_validator_expr(e, b, 0)));
        with_init("const a = [1, 2];", |e, b| assert!(!is_validator_expr(e, b, 0)));
    }

    #[test]
    fn test_chain_optionality() {
        with_init("const a = z.string().optional().describe('x');", |e, b| assert!(chain_is_optional(e, b)));
        with_init("const a = z.string().nullish();", |e, b| assert!(chain_is_optional(e, b)));
        with_init("const a = z.string().nullable();", |e, b| assert!(!chain_is_optional(e, b)));
        with_init("const a = z.string().default('x');", |e, b| assert!(!chain_is_optional(e, b)));
        with_init("const a = z.optional(z.string());", |e, b| assert!(chain_is_optional(e, b)));
    }
}
