//! Call-site expansion of user-defined schema factories.
//!
//! A factory is a function whose returned expression is a validator chain. A call to it is
//! expanded by cloning that expression with every parameter identifier replaced by the
//! matching call argument, then interpreting the clone like any other chain.

use super::classify::{is_validator_expr, FactoryCallee};
use super::Resolver;
use crate::ast::{Expr, Function, FunctionBody, Literal, ObjectProperty, Param, PropertyKey, Stmt};
use crate::declaration_index::{Located, Namespace};
use crate::detector::ValidatorBindings;
use crate::schema::SchemaNode;
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Cached result of analyzing a function as a factory
#[derive(Debug, Clone)]
pub enum FactoryOutcome {
    Template(Rc<FactoryTemplate>),
    NotFactory,
}

/// A factory's returned chain, ready for substitution
#[derive(Debug)]
pub struct FactoryTemplate {
    /// File whose scope the returned chain is read in
    pub file: PathBuf,
    pub params: Vec<Param>,
    /// Returned expression with block-local constants inlined
    pub body: Expr,
}

impl Resolver<'_> {
    /// Expands a factory call, or returns `None` when the callee is not a factory.
    ///
    /// # Arguments
    ///
    /// * `callee` - The called function, local or through a namespace import
    /// * `args` - Call arguments, substituted positionally for the parameters
    ///
    /// # Returns
    ///
    /// The schema of the substituted chain. Recursive expansion of a factory already being
    /// expanded yields `None`.
    pub fn expand_factory(&mut self, callee: &FactoryCallee, args: &[Expr]) -> Option<SchemaNode> {
        let located = self.locate_factory(callee)?;
        let key = format!("{}#{}", located.file.display(), located.decl.name);

        if self.ctx.expanding.contains(&key) {
            debug!("Recursive expansion of {}; giving up", key);
            return None;
        }

        let outcome = match self.ctx.factory_cache.get(&key) {
            Some(outcome) => outcome.clone(),
            None => {
                let bindings = self.index.bindings(&located.file);
                let outcome = match located.decl.as_function() {
                    Some(function) => analyze(&located.file, function, &bindings),
                    None => FactoryOutcome::NotFactory,
                };
                if matches!(outcome, FactoryOutcome::NotFactory) {
                    debug!("{} does not return a validator chain", key);
                }
                self.ctx.factory_cache.insert(key.clone(), outcome.clone());
                outcome
            }
        };
        let FactoryOutcome::Template(template) = outcome else { return None };

        let args: Vec<Expr> = args.iter().map(|arg| self.canonical_argument(arg)).collect();
        let substitutions = bind_arguments(&template.params, &args);
        let body = substitute(&template.body, &substitutions);

        self.ctx.expanding.insert(key.clone());
        let node = self.in_file(template.file.clone(), |r| r.resolve_validator(&body));
        self.ctx.expanding.remove(&key);
        Some(node)
    }

    /// Rewrites a name argument to the declaration it denotes at the call site, so it still
    /// resolves when the factory body is read in the factory's own file.
    fn canonical_argument(&mut self, arg: &Expr) -> Expr {
        let located = match arg {
            Expr::Ident(name) => self.lookup(name, Namespace::Value),
            Expr::Member { object, property } => match (object.as_ref(), self.current_file().cloned()) {
                (Expr::Ident(namespace), Some(file)) => {
                    self.index.resolve_namespace_member(&file, namespace, property, Namespace::Value)
                }
                _ => None,
            },
            _ => None,
        };
        match located {
            Some(located) => Expr::Ident(located.decl.name.clone()),
            None => arg.clone(),
        }
    }

    fn locate_factory(&mut self, callee: &FactoryCallee) -> Option<Located> {
        match callee {
            FactoryCallee::Local(name) => self.lookup(name, Namespace::Value),
            FactoryCallee::Namespaced { namespace, member } => {
                let file = self.current_file().cloned()?;
                self.index.resolve_namespace_member(&file, namespace, member, Namespace::Value)
            }
        }
    }
}

/// Decides whether `function` is a factory and extracts its returned chain
fn analyze(file: &std::path::Path, function: &Function, bindings: &ValidatorBindings) -> FactoryOutcome {
    if function.params.iter().any(|p| p.name().is_none()) {
        debug!("Destructured parameters are not supported in factories");
        return FactoryOutcome::NotFactory;
    }

    let body = match &function.body {
        FunctionBody::Expr(expr) => Some((**expr).clone()),
        FunctionBody::Block(stmts) => {
            let locals: HashMap<String, Expr> = stmts
                .iter()
                .filter_map(|stmt| match stmt {
                    Stmt::Const { name, init: Some(init) } => Some((name.clone(), init.clone())),
                    _ => None,
                })
                .collect();
            let mut returns = Vec::new();
            collect_returns(stmts, 0, &mut returns);
            returns
                .into_iter()
                .map(|expr| substitute(expr, &locals))
                .find(|expr| is_validator_expr(expr, bindings, 0))
        }
        FunctionBody::None => None,
    };

    match body {
        Some(body) if is_validator_expr(&body, bindings, 0) => FactoryOutcome::Template(Rc::new(FactoryTemplate {
            file: file.to_path_buf(),
            params: function.params.clone(),
            body,
        })),
        _ => FactoryOutcome::NotFactory,
    }
}

/// Returned expressions in source order, looking one `if`/`else` level deep
fn collect_returns<'s>(stmts: &'s [Stmt], depth: usize, out: &mut Vec<&'s Expr>) {
    for stmt in stmts {
        collect_stmt_returns(stmt, depth, out);
    }
}

fn collect_stmt_returns<'s>(stmt: &'s Stmt, depth: usize, out: &mut Vec<&'s Expr>) {
    match stmt {
        Stmt::Return(Some(expr)) => out.push(expr),
        Stmt::Block(inner) => collect_returns(inner, depth, out),
        Stmt::If { consequent, alternate } if depth == 0 => {
            collect_stmt_returns(consequent, depth + 1, out);
            if let Some(alternate) = alternate {
                collect_stmt_returns(alternate, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Pairs parameters with arguments; a missing argument takes the parameter default and a
/// rest parameter collects the remaining arguments.
fn bind_arguments(params: &[Param], args: &[Expr]) -> HashMap<String, Expr> {
    let mut bound = HashMap::new();
    for (i, param) in params.iter().enumerate() {
        let Some(name) = param.name() else { continue };
        let value = if param.rest {
            Expr::Array(args.iter().skip(i).cloned().collect())
        } else {
            match (args.get(i), &param.default) {
                (Some(arg), _) if !is_undefined(arg) => arg.clone(),
                (_, Some(default)) => default.clone(),
                (_, None) => Expr::Literal(Literal::Undefined),
            }
        };
        bound.insert(name.to_string(), value);
    }
    bound
}

fn is_undefined(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(Literal::Undefined)) || matches!(expr, Expr::Ident(name) if name == "undefined")
}

/// Clones `expr`, replacing free identifiers bound in `bindings`.
///
/// Member property names are never substituted, and a nested function's own parameters
/// shadow outer bindings inside its body.
pub fn substitute(expr: &Expr, bindings: &HashMap<String, Expr>) -> Expr {
    if bindings.is_empty() {
        return expr.clone();
    }
    match expr {
        Expr::Ident(name) => bindings.get(name).cloned().unwrap_or_else(|| expr.clone()),
        Expr::Member { object, property } => Expr::Member {
            object: boxed(object, bindings),
            property: property.clone(),
        },
        Expr::Index { object, index } => Expr::Index {
            object: boxed(object, bindings),
            index: boxed(index, bindings),
        },
        Expr::Call { callee, type_args, args } => Expr::Call {
            callee: boxed(callee, bindings),
            type_args: type_args.clone(),
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
        },
        Expr::New { callee, args } => Expr::New {
            callee: boxed(callee, bindings),
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
        },
        Expr::Object(props) => Expr::Object(
            props
                .iter()
                .map(|prop| match prop {
                    ObjectProperty::KeyValue { key, value } => ObjectProperty::KeyValue {
                        key: key.clone(),
                        value: substitute(value, bindings),
                    },
                    ObjectProperty::Shorthand(name) => match bindings.get(name) {
                        Some(value) => ObjectProperty::KeyValue {
                            key: PropertyKey::Name(name.clone()),
                            value: value.clone(),
                        },
                        None => ObjectProperty::Shorthand(name.clone()),
                    },
                    ObjectProperty::Spread(inner) => ObjectProperty::Spread(substitute(inner, bindings)),
                })
                .collect(),
        ),
        Expr::Array(items) => Expr::Array(items.iter().map(|item| substitute(item, bindings)).collect()),
        Expr::Spread(inner) => Expr::Spread(boxed(inner, bindings)),
        Expr::Function(function) => Expr::Function(substitute_function(function, bindings)),
        Expr::Unary { op, operand } => Expr::Unary {
            op: op.clone(),
            operand: boxed(operand, bindings),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: op.clone(),
            left: boxed(left, bindings),
            right: boxed(right, bindings),
        },
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => Expr::Conditional {
            test: boxed(test, bindings),
            consequent: boxed(consequent, bindings),
            alternate: boxed(alternate, bindings),
        },
        Expr::AsConst(inner) => Expr::AsConst(boxed(inner, bindings)),
        Expr::Literal(_) | Expr::Regex(_) | Expr::Opaque => expr.clone(),
    }
}

fn boxed(expr: &Expr, bindings: &HashMap<String, Expr>) -> Box<Expr> {
    Box::new(substitute(expr, bindings))
}

fn substitute_function(function: &Rc<Function>, bindings: &HashMap<String, Expr>) -> Rc<Function> {
    let mut inner = bindings.clone();
    for param in &function.params {
        if let Some(name) = param.name() {
            inner.remove(name);
        }
    }
    if inner.is_empty() {
        return Rc::clone(function);
    }
    let body = match &function.body {
        FunctionBody::Expr(expr) => FunctionBody::Expr(Box::new(substitute(expr, &inner))),
        FunctionBody::Block(stmts) => FunctionBody::Block(stmts.iter().map(|s| substitute_stmt(s, &inner)).collect()),
        FunctionBody::None => FunctionBody::None,
    };
    Rc::new(Function {
        body,
        ..(**function).clone()
    })
}

fn substitute_stmt(stmt: &Stmt, bindings: &HashMap<String, Expr>) -> Stmt {
    match stmt {
        Stmt::Return(expr) => Stmt::Return(expr.as_ref().map(|e| substitute(e, bindings))),
        Stmt::If { consequent, alternate } => Stmt::If {
            consequent: Box::new(substitute_stmt(consequent, bindings)),
            alternate: alternate.as_ref().map(|a| Box::new(substitute_stmt(a, bindings))),
        },
        Stmt::Block(stmts) => Stmt::Block(stmts.iter().map(|s| substitute_stmt(s, bindings)).collect()),
        Stmt::Const { name, init } => Stmt::Const {
            name: name.clone(),
            init: init.as_ref().map(|e| substitute(e, bindings)),
        },
        Stmt::Expr(expr) => Stmt::Expr(substitute(expr, bindings)),
        Stmt::Other => Stmt::Other,
    }
}
