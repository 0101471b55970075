use crate::ast::*;
use crate::error::{Error, Result as ParseResult};
use crate::lexer::{Lexer, Token, TokenKind};
use std::path::PathBuf;
use std::rc::Rc;

/// AST parser for TypeScript-style source files.
///
/// The `AstParser` tokenizes a file with the [`Lexer`] and builds a [`Module`] holding the
/// file's imports, re-exports and top-level declarations. Statement forms that cannot carry a
/// schema (classes, namespaces, loops) are skipped by balanced-token scanning, so the parser
/// fails only on genuinely malformed input.
///
/// # Example
///
/// ```
/// use schema_from_source::parser::AstParser;
///
/// let module = AstParser::parse_source("export type Id = string | number;").unwrap();
/// assert_eq!(module.declarations[0].name, "Id");
/// ```
pub struct AstParser;

/// A successfully parsed source file with its syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// The parsed module
    pub module: Module,
}

impl AstParser {
    /// Parses source text that did not come from a file.
    pub fn parse_source(source: &str) -> ParseResult<Module> {
        let tokens = Lexer::new(source).tokenize()?;
        Parser::new(tokens).parse_module()
    }

    /// Parses a standalone type expression such as `Wrapper<Inner>`.
    pub fn parse_type(source: &str) -> ParseResult<TypeExpr> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser::new(tokens);
        let ty = parser.parse_type()?;
        if !parser.at_eof() {
            return Err(parser.error("unexpected trailing input after type"));
        }
        Ok(ty)
    }
}

const DECLARATION_KEYWORDS: &[&str] = &[
    "export", "import", "const", "let", "var", "function", "type", "interface", "enum", "class", "declare",
    "async", "abstract", "namespace",
];

const ASSIGNMENT_OPERATORS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "**=", "&=", "|=", "^=", "??=", "&&=", "||="];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    // ----- token helpers -------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn is_punct(&self, p: &str) -> bool {
        self.punct_at(0, p)
    }

    fn punct_at(&self, offset: usize, p: &str) -> bool {
        matches!(&self.peek_at(offset).kind, TokenKind::Punct(q) if *q == p)
    }

    fn is_ident(&self, word: &str) -> bool {
        self.ident_at(0, word)
    }

    fn ident_at(&self, offset: usize, word: &str) -> bool {
        matches!(&self.peek_at(offset).kind, TokenKind::Ident(w) if w == word)
    }

    fn is_any_ident_at(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset).kind, TokenKind::Ident(_))
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.is_ident(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> ParseResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`, found {}", p, describe(&self.peek().kind))))
        }
    }

    fn expect_ident(&mut self, word: &str) -> ParseResult<()> {
        if self.eat_ident(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`, found {}", word, describe(&self.peek().kind))))
        }
    }

    /// Any identifier, keywords included
    fn ident_name(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found {}", describe(other)))),
        }
    }

    fn string_literal(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected string literal, found {}", describe(other)))),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let token = self.peek();
        Error::parse("<source>", token.line, token.column, message)
    }

    fn try_parse<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> Option<T> {
        let saved = self.pos;
        match f(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.pos = saved;
                None
            }
        }
    }

    /// Skips a bracketed group starting at the current opener, nested groups included.
    fn skip_balanced(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        loop {
            match &self.peek().kind {
                TokenKind::Eof => return Err(self.error("unbalanced brackets")),
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                TokenKind::Punct(")" | "]" | "}") => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Skips one statement the parser has no use for.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        let mut consumed = false;
        loop {
            let token = self.peek();
            if consumed && depth == 0 && token.newline_before {
                if let TokenKind::Ident(word) = &token.kind {
                    if DECLARATION_KEYWORDS.contains(&word.as_str()) {
                        return;
                    }
                }
            }
            match &token.kind {
                TokenKind::Eof => return,
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                TokenKind::Punct(")" | "]" | "}") => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    let closes_block = matches!(token.kind, TokenKind::Punct("}"));
                    self.advance();
                    if depth == 0 && closes_block {
                        if ["else", "catch", "finally", "while"].iter().any(|w| self.is_ident(w)) {
                            consumed = true;
                            continue;
                        }
                        self.eat_punct(";");
                        return;
                    }
                    consumed = true;
                    continue;
                }
                TokenKind::Punct(";") if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
            consumed = true;
        }
    }

    /// Skips tokens up to the first top-level `{` and then the braced body.
    fn skip_braced_construct(&mut self) -> ParseResult<()> {
        let mut parens = 0usize;
        loop {
            match &self.peek().kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::Punct("(") => parens += 1,
                TokenKind::Punct(")") => parens = parens.saturating_sub(1),
                TokenKind::Punct(";") if parens == 0 => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::Punct("{") if parens == 0 => return self.skip_balanced(),
                _ => {}
            }
            self.advance();
        }
    }

    // ----- module level --------------------------------------------------

    fn parse_module(&mut self) -> ParseResult<Module> {
        let mut module = Module::default();
        while !self.at_eof() {
            if self.eat_punct(";") {
                continue;
            }
            self.parse_top_level(&mut module)?;
        }
        Ok(module)
    }

    fn parse_top_level(&mut self, module: &mut Module) -> ParseResult<()> {
        let doc = self.peek().doc.clone();

        while self.is_punct("@") {
            self.advance();
            self.parse_postfix()?;
        }

        if self.is_ident("import") && !self.punct_at(1, "(") && !self.punct_at(1, ".") {
            return self.parse_import(module);
        }

        let mut exported = false;
        if self.eat_ident("export") {
            exported = true;
            if self.is_punct("*") || self.is_punct("{") || (self.is_ident("type") && self.punct_at(1, "{")) {
                return self.parse_export_list(module);
            }
            if self.eat_ident("default") {
                if self.is_ident("function") || (self.is_ident("async") && self.ident_at(1, "function")) {
                    if let Some(decl) = self.parse_function_declaration(true, doc)? {
                        module.declarations.push(Rc::new(decl));
                    }
                    return Ok(());
                }
                if self.is_ident("class") || self.is_ident("abstract") {
                    return self.skip_braced_construct();
                }
                self.skip_statement();
                return Ok(());
            }
            if self.is_punct("=") || self.is_ident("import") || self.is_ident("as") {
                self.skip_statement();
                return Ok(());
            }
        }

        self.eat_ident("declare");

        let Some(word) = (match &self.peek().kind {
            TokenKind::Ident(word) => Some(word.clone()),
            _ => None,
        }) else {
            self.parse_or_skip_expression_statement();
            return Ok(());
        };

        match word.as_str() {
            "type" if self.is_any_ident_at(1) && (self.punct_at(2, "=") || self.punct_at(2, "<")) => {
                let decl = self.parse_type_alias(exported, doc)?;
                module.declarations.push(Rc::new(decl));
            }
            "interface" if self.is_any_ident_at(1) => {
                let decl = self.parse_interface(exported, doc)?;
                module.declarations.push(Rc::new(decl));
            }
            "enum" => {
                let decl = self.parse_enum(exported, doc)?;
                module.declarations.push(Rc::new(decl));
            }
            "const" if self.ident_at(1, "enum") => {
                self.advance();
                let decl = self.parse_enum(exported, doc)?;
                module.declarations.push(Rc::new(decl));
            }
            "const" | "let" | "var" => {
                for decl in self.parse_variable_declarations(exported, doc)? {
                    module.declarations.push(Rc::new(decl));
                }
            }
            "function" => {
                if let Some(decl) = self.parse_function_declaration(exported, doc)? {
                    module.declarations.push(Rc::new(decl));
                }
            }
            "async" if self.ident_at(1, "function") => {
                if let Some(decl) = self.parse_function_declaration(exported, doc)? {
                    module.declarations.push(Rc::new(decl));
                }
            }
            "class" | "abstract" | "namespace" | "module" | "global" => {
                self.skip_braced_construct()?;
            }
            _ => self.parse_or_skip_expression_statement(),
        }
        Ok(())
    }

    fn parse_or_skip_expression_statement(&mut self) {
        let parsed = self.try_parse(|p| {
            let expr = p.parse_expression()?;
            if p.eat_punct(";") || p.is_punct("}") || p.at_eof() || p.peek().newline_before {
                Ok(expr)
            } else {
                Err(p.error("expected end of statement"))
            }
        });
        if parsed.is_none() {
            self.skip_statement();
        }
    }

    fn parse_import(&mut self, module: &mut Module) -> ParseResult<()> {
        self.expect_ident("import")?;

        // `import type X from` / `import type { X } from`
        if self.is_ident("type") && (self.punct_at(1, "{") || self.punct_at(1, "*") || (self.is_any_ident_at(1) && !self.ident_at(1, "from"))) {
            self.advance();
        }

        if let TokenKind::Str(_) = self.peek().kind {
            self.advance();
            self.eat_punct(";");
            return Ok(());
        }

        let mut bindings: Vec<(String, ImportedName)> = Vec::new();

        if self.is_any_ident_at(0) && !self.is_ident("from") || (self.is_ident("from") && self.ident_at(1, "from")) {
            let local = self.ident_name()?;
            if self.is_punct("=") {
                // import x = require("y")
                self.skip_statement();
                return Ok(());
            }
            bindings.push((local, ImportedName::Default));
            self.eat_punct(",");
        }

        if self.eat_punct("*") {
            self.expect_ident("as")?;
            let local = self.ident_name()?;
            bindings.push((local, ImportedName::Namespace));
        } else if self.eat_punct("{") {
            while !self.is_punct("}") {
                if self.is_ident("type") && !self.punct_at(1, ",") && !self.punct_at(1, "}") && !self.ident_at(1, "as") {
                    self.advance();
                }
                let imported = match &self.peek().kind {
                    TokenKind::Str(_) => self.string_literal()?,
                    _ => self.ident_name()?,
                };
                let local = if self.eat_ident("as") { self.ident_name()? } else { imported.clone() };
                let name = if imported == "default" { ImportedName::Default } else { ImportedName::Named(imported) };
                bindings.push((local, name));
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct("}")?;
        }

        self.expect_ident("from")?;
        let source = self.string_literal()?;
        if (self.is_ident("assert") || self.is_ident("with")) && self.punct_at(1, "{") {
            self.advance();
            self.skip_balanced()?;
        }
        self.eat_punct(";");

        for (local, imported) in bindings {
            module.imports.push(Import {
                local,
                imported,
                source: source.clone(),
            });
        }
        Ok(())
    }

    fn parse_export_list(&mut self, module: &mut Module) -> ParseResult<()> {
        self.eat_ident("type");
        let names = if self.eat_punct("*") {
            if self.eat_ident("as") {
                self.ident_name()?;
            }
            None
        } else {
            self.expect_punct("{")?;
            let mut names = Vec::new();
            while !self.is_punct("}") {
                if self.is_ident("type") && !self.punct_at(1, ",") && !self.punct_at(1, "}") && !self.ident_at(1, "as") {
                    self.advance();
                }
                let original = self.ident_name()?;
                let exported = if self.eat_ident("as") { self.ident_name()? } else { original.clone() };
                names.push((original, exported));
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct("}")?;
            Some(names)
        };
        if self.eat_ident("from") {
            let source = self.string_literal()?;
            module.reexports.push(ReExport { names, source });
        }
        self.eat_punct(";");
        Ok(())
    }

    fn parse_type_alias(&mut self, exported: bool, doc: Option<String>) -> ParseResult<Declaration> {
        self.expect_ident("type")?;
        let name = self.ident_name()?;
        let params = self.parse_type_params()?;
        self.expect_punct("=")?;
        let body = self.parse_type()?;
        self.eat_punct(";");
        Ok(Declaration {
            name,
            exported,
            doc,
            kind: DeclarationKind::TypeAlias { params, body },
        })
    }

    fn parse_interface(&mut self, exported: bool, doc: Option<String>) -> ParseResult<Declaration> {
        self.expect_ident("interface")?;
        let name = self.ident_name()?;
        let params = self.parse_type_params()?;
        let mut extends = Vec::new();
        if self.eat_ident("extends") {
            loop {
                extends.push(self.parse_type()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        let members = self.parse_object_type_members()?;
        Ok(Declaration {
            name,
            exported,
            doc,
            kind: DeclarationKind::Interface { params, extends, members },
        })
    }

    fn parse_enum(&mut self, exported: bool, doc: Option<String>) -> ParseResult<Declaration> {
        self.expect_ident("enum")?;
        let name = self.ident_name()?;
        self.expect_punct("{")?;
        let mut members = Vec::new();
        while !self.is_punct("}") {
            let member_name = match &self.peek().kind {
                TokenKind::Str(_) => self.string_literal()?,
                _ => self.ident_name()?,
            };
            let value = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            members.push(EnumMember { name: member_name, value });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Declaration {
            name,
            exported,
            doc,
            kind: DeclarationKind::Enum { members },
        })
    }

    fn parse_variable_declarations(&mut self, exported: bool, doc: Option<String>) -> ParseResult<Vec<Declaration>> {
        let is_const = self.is_ident("const");
        self.advance();
        let mut declarations = Vec::new();
        let mut doc = doc;
        loop {
            if self.is_punct("{") || self.is_punct("[") {
                self.skip_balanced()?;
                if self.eat_punct(":") {
                    self.parse_type()?;
                }
                if self.eat_punct("=") {
                    self.parse_assignment()?;
                }
            } else {
                let name = self.ident_name()?;
                self.eat_punct("!");
                let annotation = if self.eat_punct(":") { Some(self.parse_type()?) } else { None };
                let init = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
                declarations.push(Declaration {
                    name,
                    exported,
                    doc: doc.take(),
                    kind: DeclarationKind::Variable { annotation, init, is_const },
                });
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.eat_punct(";");
        Ok(declarations)
    }

    fn parse_function_declaration(&mut self, exported: bool, doc: Option<String>) -> ParseResult<Option<Declaration>> {
        let is_async = self.eat_ident("async");
        self.expect_ident("function")?;
        self.eat_punct("*");
        let name = if self.is_any_ident_at(0) { Some(self.ident_name()?) } else { None };
        let function = self.parse_function_rest(is_async)?;
        Ok(Some(Declaration {
            name: name.unwrap_or_else(|| "default".to_string()),
            exported,
            doc,
            kind: DeclarationKind::Function(Rc::new(function)),
        }))
    }

    /// Parses everything after the function name: type parameters, parameters,
    /// return annotation and body.
    fn parse_function_rest(&mut self, is_async: bool) -> ParseResult<Function> {
        let type_params = self.parse_type_params()?;
        let params = self.parse_params()?;
        let return_type = if self.eat_punct(":") { Some(self.parse_return_type()?) } else { None };
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.parse_block()?)
        } else {
            self.eat_punct(";");
            FunctionBody::None
        };
        Ok(Function {
            type_params,
            params,
            return_type,
            body,
            is_async,
        })
    }

    fn parse_type_params(&mut self) -> ParseResult<Vec<TypeParam>> {
        let mut params = Vec::new();
        if !self.eat_punct("<") {
            return Ok(params);
        }
        while !self.is_punct(">") {
            while (self.is_ident("in") || self.is_ident("out") || self.is_ident("const")) && self.is_any_ident_at(1) {
                self.advance();
            }
            let name = self.ident_name()?;
            let constraint = if self.eat_ident("extends") { Some(self.parse_type()?) } else { None };
            let default = if self.eat_punct("=") { Some(self.parse_type()?) } else { None };
            params.push(TypeParam { name, constraint, default });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(">")?;
        Ok(params)
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.is_punct(")") {
            while self.is_punct("@") {
                self.advance();
                self.parse_postfix()?;
            }
            while ["public", "private", "protected", "readonly", "override"].iter().any(|m| self.is_ident(m))
                && (self.is_any_ident_at(1) || self.punct_at(1, "{") || self.punct_at(1, "["))
            {
                self.advance();
            }
            let rest = self.eat_punct("...");
            let pattern = if self.is_punct("{") || self.is_punct("[") {
                self.skip_balanced()?;
                ParamPattern::Destructured
            } else {
                ParamPattern::Ident(self.ident_name()?)
            };
            let optional = self.eat_punct("?");
            let ty = if self.eat_punct(":") { Some(self.parse_type()?) } else { None };
            let default = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            params.push(Param {
                pattern,
                optional,
                rest,
                ty,
                default,
            });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    fn parse_return_type(&mut self) -> ParseResult<TypeExpr> {
        // `asserts x`, `asserts x is T`, `x is T`
        if self.is_ident("asserts") && self.is_any_ident_at(1) {
            self.advance();
            self.advance();
            if self.eat_ident("is") {
                self.parse_type()?;
            }
            return Ok(TypeExpr::Keyword(Keyword::Void));
        }
        if self.is_any_ident_at(0) && self.ident_at(1, "is") {
            self.advance();
            self.advance();
            self.parse_type()?;
            return Ok(TypeExpr::Keyword(Keyword::Boolean));
        }
        self.parse_type()
    }

    // ----- statements ----------------------------------------------------

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut statements = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.error("unterminated block"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect_punct("}")?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Other);
        }

        let word = match &self.peek().kind {
            TokenKind::Ident(word) => word.clone(),
            _ => return Ok(self.parse_expression_statement()),
        };

        match word.as_str() {
            "return" => {
                self.advance();
                let value = if self.is_punct(";") || self.is_punct("}") || self.peek().newline_before {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.eat_punct(";");
                Ok(Stmt::Return(value))
            }
            "if" => {
                self.advance();
                self.expect_punct("(")?;
                self.parse_expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.eat_ident("else") { Some(Box::new(self.parse_statement()?)) } else { None };
                Ok(Stmt::If { consequent, alternate })
            }
            "const" | "let" | "var" if self.is_any_ident_at(1) || self.punct_at(1, "{") || self.punct_at(1, "[") => {
                if self.ident_at(1, "enum") {
                    self.advance();
                    self.parse_enum(false, None)?;
                    return Ok(Stmt::Other);
                }
                let mut statements: Vec<Stmt> = self
                    .parse_variable_declarations(false, None)?
                    .into_iter()
                    .filter_map(|decl| match decl.kind {
                        DeclarationKind::Variable { init, .. } => Some(Stmt::Const { name: decl.name, init }),
                        _ => None,
                    })
                    .collect();
                Ok(match statements.len() {
                    0 => Stmt::Other,
                    1 => statements.remove(0),
                    _ => Stmt::Block(statements),
                })
            }
            "function" => {
                self.parse_function_declaration(false, None)?;
                Ok(Stmt::Other)
            }
            "async" if self.ident_at(1, "function") => {
                self.parse_function_declaration(false, None)?;
                Ok(Stmt::Other)
            }
            "type" if self.is_any_ident_at(1) && (self.punct_at(2, "=") || self.punct_at(2, "<")) => {
                self.parse_type_alias(false, None)?;
                Ok(Stmt::Other)
            }
            "interface" | "enum" | "class" if self.is_any_ident_at(1) || self.punct_at(1, "{") => {
                self.skip_braced_construct()?;
                Ok(Stmt::Other)
            }
            "for" | "while" | "do" | "switch" | "try" | "with" => {
                self.skip_statement();
                Ok(Stmt::Other)
            }
            _ => Ok(self.parse_expression_statement()),
        }
    }

    fn parse_expression_statement(&mut self) -> Stmt {
        let parsed = self.try_parse(|p| {
            let expr = p.parse_expression()?;
            if p.eat_punct(";") || p.is_punct("}") || p.at_eof() || p.peek().newline_before {
                Ok(expr)
            } else {
                Err(p.error("expected end of statement"))
            }
        });
        match parsed {
            Some(expr) => Stmt::Expr(expr),
            None => {
                let before = self.pos;
                self.skip_statement();
                if self.pos == before && !self.at_eof() {
                    // a stray closer that is not ours; consume it so parsing progresses
                    self.advance();
                }
                Stmt::Other
            }
        }
    }

    // ----- types ---------------------------------------------------------

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let ty = self.parse_union_type()?;
        if self.is_ident("extends") && !self.peek().newline_before {
            // conditional type: check extends target ? a : b
            self.advance();
            self.parse_union_type()?;
            self.expect_punct("?")?;
            self.parse_type()?;
            self.expect_punct(":")?;
            self.parse_type()?;
            return Ok(TypeExpr::Unsupported);
        }
        Ok(ty)
    }

    fn parse_union_type(&mut self) -> ParseResult<TypeExpr> {
        self.eat_punct("|");
        let mut members = vec![self.parse_intersection_type()?];
        while self.eat_punct("|") {
            members.push(self.parse_intersection_type()?);
        }
        Ok(if members.len() == 1 { members.remove(0) } else { TypeExpr::Union(members) })
    }

    fn parse_intersection_type(&mut self) -> ParseResult<TypeExpr> {
        self.eat_punct("&");
        let mut members = vec![self.parse_type_operator()?];
        while self.eat_punct("&") {
            members.push(self.parse_type_operator()?);
        }
        Ok(if members.len() == 1 { members.remove(0) } else { TypeExpr::Intersection(members) })
    }

    fn parse_type_operator(&mut self) -> ParseResult<TypeExpr> {
        if self.is_ident("keyof") && !self.punct_at(1, ".") {
            self.advance();
            return Ok(TypeExpr::KeyOf(Box::new(self.parse_type_operator()?)));
        }
        if (self.is_ident("readonly") || self.is_ident("unique")) && !self.punct_at(1, ".") && !self.punct_at(1, "[") {
            self.advance();
            return self.parse_type_operator();
        }
        if self.is_ident("infer") && self.is_any_ident_at(1) {
            self.advance();
            self.advance();
            if self.is_ident("extends") {
                self.advance();
                self.parse_type_operator()?;
            }
            return Ok(TypeExpr::Unsupported);
        }
        self.parse_postfix_type()
    }

    fn parse_postfix_type(&mut self) -> ParseResult<TypeExpr> {
        let mut ty = self.parse_primary_type()?;
        while self.is_punct("[") && !self.peek().newline_before {
            self.advance();
            if self.eat_punct("]") {
                ty = TypeExpr::Array(Box::new(ty));
            } else {
                let index = self.parse_type()?;
                self.expect_punct("]")?;
                ty = TypeExpr::IndexedAccess {
                    object: Box::new(ty),
                    index: Box::new(index),
                };
            }
        }
        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> ParseResult<TypeExpr> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Punct("(") => {
                if let Some(function) = self.try_parse(|p| p.parse_function_type()) {
                    return Ok(function);
                }
                self.advance();
                let inner = self.parse_type()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("<") => self.parse_function_type(),
            TokenKind::Punct("{") => {
                if self.is_mapped_type_start() {
                    self.skip_balanced()?;
                    return Ok(TypeExpr::Unsupported);
                }
                Ok(TypeExpr::Object(self.parse_object_type_members()?))
            }
            TokenKind::Punct("[") => self.parse_tuple_type(),
            TokenKind::Punct("-") => {
                self.advance();
                match self.peek().kind {
                    TokenKind::Number(n) => {
                        self.advance();
                        Ok(TypeExpr::Literal(Literal::Number(-n)))
                    }
                    _ => Err(self.error("expected numeric literal after `-`")),
                }
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(TypeExpr::Literal(Literal::String(s.clone())))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(TypeExpr::Literal(Literal::Number(*n)))
            }
            TokenKind::Template { .. } => {
                self.advance();
                Ok(TypeExpr::TemplateLiteral)
            }
            TokenKind::Ident(word) => {
                if self.punct_at(1, ".") && word != "typeof" && word != "import" {
                    return self.parse_type_reference();
                }
                match word.as_str() {
                    "true" => {
                        self.advance();
                        Ok(TypeExpr::Literal(Literal::Boolean(true)))
                    }
                    "false" => {
                        self.advance();
                        Ok(TypeExpr::Literal(Literal::Boolean(false)))
                    }
                    "typeof" => {
                        self.advance();
                        if self.is_ident("import") {
                            self.advance();
                            self.skip_balanced()?;
                            return Ok(TypeExpr::Unsupported);
                        }
                        let mut name = self.ident_name()?;
                        while self.is_punct(".") && self.is_any_ident_at(1) {
                            self.advance();
                            name.push('.');
                            name.push_str(&self.ident_name()?);
                        }
                        if self.is_punct("<") && !self.peek().newline_before {
                            self.parse_type_args()?;
                        }
                        Ok(TypeExpr::Query(name))
                    }
                    "import" if self.punct_at(1, "(") => {
                        self.advance();
                        self.skip_balanced()?;
                        if self.eat_punct(".") {
                            return self.parse_type_reference();
                        }
                        Ok(TypeExpr::Unsupported)
                    }
                    "new" => {
                        self.advance();
                        self.parse_function_type()?;
                        Ok(TypeExpr::Unsupported)
                    }
                    "abstract" if self.ident_at(1, "new") => {
                        self.advance();
                        self.advance();
                        self.parse_function_type()?;
                        Ok(TypeExpr::Unsupported)
                    }
                    "this" => {
                        self.advance();
                        Ok(TypeExpr::Unsupported)
                    }
                    other => match Keyword::from_ident(other) {
                        Some(keyword) => {
                            self.advance();
                            Ok(TypeExpr::Keyword(keyword))
                        }
                        None => self.parse_type_reference(),
                    },
                }
            }
            other => Err(self.error(format!("expected type, found {}", describe(other)))),
        }
    }

    fn parse_type_reference(&mut self) -> ParseResult<TypeExpr> {
        let mut name = self.ident_name()?;
        while self.is_punct(".") && self.is_any_ident_at(1) {
            self.advance();
            name.push('.');
            name.push_str(&self.ident_name()?);
        }
        let args = if self.is_punct("<") && !self.peek().newline_before { self.parse_type_args()? } else { Vec::new() };
        Ok(TypeExpr::Reference { name, args })
    }

    fn parse_type_args(&mut self) -> ParseResult<Vec<TypeExpr>> {
        self.expect_punct("<")?;
        let mut args = Vec::new();
        while !self.is_punct(">") {
            args.push(self.parse_type()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(">")?;
        Ok(args)
    }

    fn parse_function_type(&mut self) -> ParseResult<TypeExpr> {
        self.parse_type_params()?;
        let params = self.parse_params()?;
        self.expect_punct("=>")?;
        let ret = self.parse_return_type()?;
        Ok(TypeExpr::Function {
            params,
            ret: Box::new(ret),
        })
    }

    fn is_mapped_type_start(&self) -> bool {
        let mut offset = 1;
        if self.ident_at(offset, "readonly") || self.punct_at(offset, "+") || self.punct_at(offset, "-") {
            offset += 1;
            if self.ident_at(offset, "readonly") {
                offset += 1;
            }
        }
        self.punct_at(offset, "[") && self.is_any_ident_at(offset + 1) && self.ident_at(offset + 2, "in")
    }

    fn parse_tuple_type(&mut self) -> ParseResult<TypeExpr> {
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.is_punct("]") {
            let rest = self.eat_punct("...");
            let named = self.is_any_ident_at(0)
                && (self.punct_at(1, ":") || (self.punct_at(1, "?") && self.punct_at(2, ":")));
            let (ty, optional) = if named {
                self.advance();
                let optional = self.eat_punct("?");
                self.expect_punct(":")?;
                (self.parse_type()?, optional)
            } else {
                let ty = self.parse_type()?;
                (ty, self.eat_punct("?"))
            };
            elements.push(TupleElement { ty, optional, rest });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(TypeExpr::Tuple(elements))
    }

    fn parse_object_type_members(&mut self) -> ParseResult<Vec<TypeMember>> {
        self.expect_punct("{")?;
        let mut members = Vec::new();
        loop {
            while self.eat_punct(";") || self.eat_punct(",") {}
            if self.eat_punct("}") {
                break;
            }
            if self.at_eof() {
                return Err(self.error("unterminated object type"));
            }
            members.push(self.parse_type_member()?);
        }
        Ok(members)
    }

    fn parse_type_member(&mut self) -> ParseResult<TypeMember> {
        let doc = self.peek().doc.clone();

        let mut readonly = false;
        if self.is_ident("readonly")
            && !self.punct_at(1, ":")
            && !self.punct_at(1, "?")
            && !self.punct_at(1, "(")
            && !self.punct_at(1, ";")
        {
            self.advance();
            readonly = true;
        }

        if self.is_punct("[") {
            if self.is_any_ident_at(1) && self.punct_at(2, ":") {
                self.advance();
                self.advance();
                self.advance();
                self.parse_type()?;
                self.expect_punct("]")?;
                self.eat_punct("?");
                self.expect_punct(":")?;
                let value = self.parse_type()?;
                return Ok(TypeMember::Index { value });
            }
            // computed key such as [Symbol.iterator]
            self.skip_balanced()?;
            self.eat_punct("?");
            if self.is_punct("(") || self.is_punct("<") {
                self.parse_function_type_tail()?;
            } else if self.eat_punct(":") {
                self.parse_type()?;
            }
            return Ok(TypeMember::Method { name: None });
        }

        if self.is_punct("(") || self.is_punct("<") {
            self.parse_function_type_tail()?;
            return Ok(TypeMember::Method { name: None });
        }

        if self.is_ident("new") && (self.punct_at(1, "(") || self.punct_at(1, "<")) {
            self.advance();
            self.parse_function_type_tail()?;
            return Ok(TypeMember::Method { name: None });
        }

        if (self.is_ident("get") || self.is_ident("set"))
            && (self.is_any_ident_at(1) || matches!(self.peek_at(1).kind, TokenKind::Str(_)))
            && !self.punct_at(1, ":")
        {
            self.advance();
        }

        let name = match &self.peek().kind {
            TokenKind::Ident(name) | TokenKind::Str(name) => name.clone(),
            TokenKind::Number(n) => number_key(*n),
            other => return Err(self.error(format!("expected property name, found {}", describe(other)))),
        };
        self.advance();

        let optional = self.eat_punct("?");
        self.eat_punct("!");

        if self.is_punct("(") || self.is_punct("<") {
            self.parse_function_type_tail()?;
            return Ok(TypeMember::Method { name: Some(name) });
        }

        self.expect_punct(":")?;
        let ty = self.parse_type()?;
        Ok(TypeMember::Property(PropertySignature {
            name,
            optional,
            readonly,
            ty,
            doc,
        }))
    }

    /// `<T>(params): Ret` of a method or call signature
    fn parse_function_type_tail(&mut self) -> ParseResult<()> {
        self.parse_type_params()?;
        self.parse_params()?;
        if self.eat_punct(":") {
            self.parse_return_type()?;
        }
        Ok(())
    }

    // ----- expressions ---------------------------------------------------

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_assignment()?;
        while self.eat_punct(",") {
            expr = self.parse_assignment()?;
        }
        Ok(expr)
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        if self.looks_like_arrow() {
            if let Some(arrow) = self.try_parse(|p| p.parse_arrow()) {
                return Ok(arrow);
            }
        }

        let left = self.parse_conditional()?;
        if let TokenKind::Punct(op) = self.peek().kind {
            if ASSIGNMENT_OPERATORS.contains(&op) {
                self.advance();
                let right = self.parse_assignment()?;
                return Ok(Expr::Binary {
                    op: op.to_string(),
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }
        }
        Ok(left)
    }

    fn looks_like_arrow(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Punct("(") | TokenKind::Punct("<") => true,
            TokenKind::Ident(word) => {
                self.punct_at(1, "=>")
                    || (word == "async" && (self.punct_at(1, "(") || self.punct_at(1, "<") || (self.is_any_ident_at(1) && self.punct_at(2, "=>"))))
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> ParseResult<Expr> {
        let is_async = if self.is_ident("async") && !self.punct_at(1, "=>") {
            self.advance();
            true
        } else {
            false
        };
        let type_params = self.parse_type_params()?;
        let params = if self.is_any_ident_at(0) && self.punct_at(1, "=>") {
            vec![Param {
                pattern: ParamPattern::Ident(self.ident_name()?),
                optional: false,
                rest: false,
                ty: None,
                default: None,
            }]
        } else {
            self.parse_params()?
        };
        let return_type = if self.eat_punct(":") { Some(self.parse_return_type()?) } else { None };
        if self.peek().newline_before && self.is_punct("=>") {
            return Err(self.error("line break before `=>`"));
        }
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        Ok(Expr::Function(Rc::new(Function {
            type_params,
            params,
            return_type,
            body,
            is_async,
        })))
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let test = self.parse_binary(0)?;
        if self.eat_punct("?") {
            let consequent = self.parse_assignment()?;
            self.expect_punct(":")?;
            let alternate = self.parse_assignment()?;
            return Ok(Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }
        Ok(test)
    }

    /// Returns the binary operator at the cursor with its precedence and token width.
    fn binary_operator(&self) -> Option<(String, u8, usize)> {
        let token = self.peek();
        let (op, prec) = match &token.kind {
            TokenKind::Punct(p) => match *p {
                "??" => ("??", 1),
                "||" => ("||", 2),
                "&&" => ("&&", 3),
                "|" => ("|", 4),
                "^" => ("^", 5),
                "&" => ("&", 6),
                "==" | "!=" | "===" | "!==" => (*p, 7),
                ">" => {
                    // `>>` and `>>>` arrive as adjacent `>` tokens
                    let mut width = 1;
                    while width < 3 {
                        let next = self.peek_at(width);
                        let prev = self.peek_at(width - 1);
                        if matches!(next.kind, TokenKind::Punct(">")) && next.line == prev.line && next.column == prev.column + 1 {
                            width += 1;
                        } else {
                            break;
                        }
                    }
                    return Some(if width == 1 {
                        (">".to_string(), 8, 1)
                    } else {
                        (">".repeat(width), 9, width)
                    });
                }
                "<" | "<=" | ">=" => (*p, 8),
                "+" | "-" => (*p, 10),
                "*" | "/" | "%" => (*p, 11),
                "**" => ("**", 12),
                _ => return None,
            },
            TokenKind::Ident(word) if word == "instanceof" || word == "in" => {
                return Some((word.clone(), 8, 1));
            }
            _ => return None,
        };
        Some((op.to_string(), prec, 1))
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            if (self.is_ident("as") || self.is_ident("satisfies")) && !self.peek().newline_before {
                let is_as = self.is_ident("as");
                self.advance();
                if is_as && self.eat_ident("const") {
                    left = Expr::AsConst(Box::new(left));
                } else {
                    self.parse_type()?;
                }
                continue;
            }
            let Some((op, prec, width)) = self.binary_operator() else { break };
            if prec < min_prec {
                break;
            }
            for _ in 0..width {
                self.advance();
            }
            let right = if op == "**" { self.parse_binary(prec)? } else { self.parse_binary(prec + 1)? };
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if let TokenKind::Punct(op @ ("!" | "-" | "+" | "~" | "++" | "--")) = self.peek().kind {
            self.advance();
            let operand = self.parse_unary()?;
            if op == "-" {
                if let Expr::Literal(Literal::Number(n)) = operand {
                    return Ok(Expr::Literal(Literal::Number(-n)));
                }
            }
            if op == "+" {
                if let Expr::Literal(Literal::Number(_)) = operand {
                    return Ok(operand);
                }
            }
            return Ok(Expr::Unary {
                op: op.to_string(),
                operand: Box::new(operand),
            });
        }
        if let TokenKind::Ident(word) = &self.peek().kind {
            if matches!(word.as_str(), "typeof" | "void" | "delete" | "await")
                && !matches!(self.peek_at(1).kind, TokenKind::Punct(")" | "," | ";" | "]" | "}" | "=" | ":" | "."))
            {
                let op = word.clone();
                self.advance();
                let operand = self.parse_unary()?;
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
        }
        if self.is_punct("<") {
            // `<T>expr` type assertion
            self.parse_type_args()?;
            return self.parse_unary();
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_punct(".") || self.is_punct("?.") {
                let optional = self.is_punct("?.");
                self.advance();
                if optional && self.is_punct("(") {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        type_args: Vec::new(),
                        args,
                    };
                    continue;
                }
                if optional && self.is_punct("[") {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect_punct("]")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                    continue;
                }
                self.eat_punct("#");
                let property = self.ident_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.is_punct("[") && !self.peek().newline_before {
                self.advance();
                let index = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_punct("(") && !self.peek().newline_before {
                let args = self.parse_arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    type_args: Vec::new(),
                    args,
                };
            } else if self.is_punct("<") && !self.peek().newline_before {
                let call = self.try_parse(|p| {
                    let type_args = p.parse_type_args()?;
                    if !p.is_punct("(") {
                        return Err(p.error("expected call arguments after type arguments"));
                    }
                    let args = p.parse_arguments()?;
                    Ok((type_args, args))
                });
                match call {
                    Some((type_args, args)) => {
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            type_args,
                            args,
                        };
                    }
                    None => break,
                }
            } else if self.is_punct("!") && !self.peek().newline_before {
                // non-null assertion
                self.advance();
            } else if matches!(self.peek().kind, TokenKind::Template { .. }) && !self.peek().newline_before {
                // tagged template
                self.advance();
                expr = Expr::Opaque;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.is_punct(")") {
            if self.eat_punct("...") {
                args.push(Expr::Spread(Box::new(self.parse_assignment()?)));
            } else {
                args.push(self.parse_assignment()?);
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Ident(word) => match word.as_str() {
                "function" => {
                    self.advance();
                    self.eat_punct("*");
                    if self.is_any_ident_at(0) {
                        self.advance();
                    }
                    Ok(Expr::Function(Rc::new(self.parse_function_rest(false)?)))
                }
                "async" if self.ident_at(1, "function") => {
                    self.advance();
                    self.advance();
                    self.eat_punct("*");
                    if self.is_any_ident_at(0) {
                        self.advance();
                    }
                    Ok(Expr::Function(Rc::new(self.parse_function_rest(true)?)))
                }
                "new" => {
                    self.advance();
                    if self.eat_punct(".") {
                        self.ident_name()?;
                        return Ok(Expr::Opaque);
                    }
                    let mut callee = self.parse_primary()?;
                    while self.is_punct(".") {
                        self.advance();
                        let property = self.ident_name()?;
                        callee = Expr::Member {
                            object: Box::new(callee),
                            property,
                        };
                    }
                    if self.is_punct("<") {
                        self.try_parse(|p| p.parse_type_args());
                    }
                    let args = if self.is_punct("(") { self.parse_arguments()? } else { Vec::new() };
                    Ok(Expr::New {
                        callee: Box::new(callee),
                        args,
                    })
                }
                "class" => {
                    self.skip_braced_construct()?;
                    Ok(Expr::Opaque)
                }
                "true" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Boolean(true)))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Boolean(false)))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Null))
                }
                "undefined" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Undefined))
                }
                _ => {
                    self.advance();
                    Ok(Expr::Ident(word.clone()))
                }
            },
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(*n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s.clone())))
            }
            TokenKind::Template { text, substitutions } => {
                self.advance();
                Ok(if *substitutions { Expr::Opaque } else { Expr::Literal(Literal::String(text.clone())) })
            }
            TokenKind::Regex(body) => {
                self.advance();
                Ok(Expr::Regex(body.clone()))
            }
            TokenKind::Punct("(") => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => self.parse_array_literal(),
            TokenKind::Punct("{") => self.parse_object_literal(),
            TokenKind::Punct("#") => {
                self.advance();
                self.ident_name()?;
                Ok(Expr::Opaque)
            }
            other => Err(self.error(format!("expected expression, found {}", describe(other)))),
        }
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expr> {
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.is_punct("]") {
            if self.eat_punct(",") {
                continue;
            }
            if self.eat_punct("...") {
                elements.push(Expr::Spread(Box::new(self.parse_assignment()?)));
            } else {
                elements.push(self.parse_assignment()?);
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Expr::Array(elements))
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expr> {
        self.expect_punct("{")?;
        let mut properties = Vec::new();
        while !self.is_punct("}") {
            if self.eat_punct("...") {
                properties.push(ObjectProperty::Spread(self.parse_assignment()?));
            } else {
                let is_modifier = ["get", "set", "async"].iter().any(|w| self.is_ident(w))
                    && matches!(
                        self.peek_at(1).kind,
                        TokenKind::Ident(_) | TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Punct("[") | TokenKind::Punct("*")
                    );
                if is_modifier {
                    self.advance();
                }
                self.eat_punct("*");

                let key = match &self.peek().kind {
                    TokenKind::Ident(name) | TokenKind::Str(name) => {
                        let key = PropertyKey::Name(name.clone());
                        self.advance();
                        key
                    }
                    TokenKind::Number(n) => {
                        let key = PropertyKey::Name(number_key(*n));
                        self.advance();
                        key
                    }
                    TokenKind::Punct("[") => {
                        self.skip_balanced()?;
                        PropertyKey::Computed
                    }
                    other => return Err(self.error(format!("expected property key, found {}", describe(other)))),
                };
                let shorthand_name = match (&key, &token_ident(&self.tokens[self.pos - 1])) {
                    (PropertyKey::Name(name), Some(_)) => Some(name.clone()),
                    _ => None,
                };

                if self.is_punct("(") || self.is_punct("<") {
                    let function = self.parse_function_rest(false)?;
                    properties.push(ObjectProperty::KeyValue {
                        key,
                        value: Expr::Function(Rc::new(function)),
                    });
                } else if self.eat_punct(":") {
                    let value = self.parse_assignment()?;
                    properties.push(ObjectProperty::KeyValue { key, value });
                } else if let Some(name) = shorthand_name {
                    if self.eat_punct("=") {
                        self.parse_assignment()?;
                    }
                    properties.push(ObjectProperty::Shorthand(name));
                } else {
                    return Err(self.error("expected `:` after property key"));
                }
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(properties))
    }
}

fn token_ident(token: &Token) -> Option<&str> {
    match &token.kind {
        TokenKind::Ident(name) => Some(name),
        _ => None,
    }
}

fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("`{}`", name),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::Template { .. } => "template literal".to_string(),
        TokenKind::Number(n) => format!("number `{}`", n),
        TokenKind::Regex(_) => "regular expression".to_string(),
        TokenKind::Punct(p) => format!("`{}`", p),
        TokenKind::Eof => "end of file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn declaration<'m>(module: &'m Module, name: &str) -> &'m Declaration {
        module
            .declarations
            .iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("declaration {} not found", name))
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = AstParser::parse_source("export interface User {\n  id: number;\n  name: \n}").unwrap_err();
        match err {
            Error::ParseError { line, .. } => assert!(line >= 3, "error reported on line {}", line),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_import_forms() {
        let module = AstParser::parse_source(
            r#"
            import Default, { a, b as c, type D } from "./mod";
            import * as ns from '../ns';
            import type { E } from "./types";
            import "./side-effect";
            "#,
        )
        .unwrap();

        let locals: Vec<_> = module.imports.iter().map(|i| (i.local.as_str(), i.source.as_str())).collect();
        assert_eq!(
            locals,
            vec![
                ("Default", "./mod"),
                ("a", "./mod"),
                ("c", "./mod"),
                ("D", "./mod"),
                ("ns", "../ns"),
                ("E", "./types"),
            ]
        );
        assert_eq!(module.imports[2].imported, ImportedName::Named("b".into()));
        assert_eq!(module.imports[4].imported, ImportedName::Namespace);
    }

    #[test]
    fn test_reexports() {
        let module = AstParser::parse_source(r#"export { makeList as list } from "./factories"; export * from "./all";"#).unwrap();
        assert_eq!(module.reexports.len(), 2);
        assert_eq!(
            module.reexports[0].names,
            Some(vec![("makeList".to_string(), "list".to_string())])
        );
        assert_eq!(module.reexports[1].names, None);
    }

    #[test]
    fn test_type_alias_with_generics_and_union() {
        let module = AstParser::parse_source("type Result<T, E = Error> = | { ok: true; value: T } | { ok: false; error: E };").unwrap();
        match &declaration(&module, "Result").kind {
            DeclarationKind::TypeAlias { params, body } => {
                assert_eq!(params.len(), 2);
                assert!(params[1].default.is_some());
                assert!(matches!(body, TypeExpr::Union(members) if members.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_interface_members() {
        let module = AstParser::parse_source(
            r#"
            interface Post extends Base, Timestamps<Date> {
                /** Title shown in lists */
                readonly title: string;
                tags?: string[];
                'content-type': "markdown" | "html";
                [key: string]: unknown;
                render(): string;
            }
            "#,
        )
        .unwrap();
        match &declaration(&module, "Post").kind {
            DeclarationKind::Interface { extends, members, .. } => {
                assert_eq!(extends.len(), 2);
                assert_eq!(members.len(), 5);
                match &members[0] {
                    TypeMember::Property(p) => {
                        assert_eq!(p.name, "title");
                        assert!(p.readonly);
                        assert_eq!(p.doc.as_deref(), Some("Title shown in lists"));
                    }
                    other => panic!("unexpected {:?}", other),
                }
                assert!(matches!(&members[1], TypeMember::Property(p) if p.optional));
                assert!(matches!(&members[2], TypeMember::Property(p) if p.name == "content-type"));
                assert!(matches!(&members[3], TypeMember::Index { .. }));
                assert!(matches!(&members[4], TypeMember::Method { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_enum_declaration() {
        let module = AstParser::parse_source("export const enum Role { Admin = 'admin', User = \"user\" }").unwrap();
        match &declaration(&module, "Role").kind {
            DeclarationKind::Enum { members } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].value, Some(Expr::Literal(Literal::String("admin".into()))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validator_chain_expression() {
        let module = AstParser::parse_source(
            r#"export const Name = z.string().min(2).regex(/^[A-Z]/).describe("Display name");"#,
        )
        .unwrap();
        match &declaration(&module, "Name").kind {
            DeclarationKind::Variable { init: Some(Expr::Call { callee, args, .. }), .. } => {
                assert!(matches!(&**callee, Expr::Member { property, .. } if property == "describe"));
                assert_eq!(args[0], Expr::Literal(Literal::String("Display name".into())));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_arrow_and_block_functions() {
        let module = AstParser::parse_source(
            r#"
            export const paginated = <T extends z.ZodTypeAny>(item: T) => z.object({ data: z.array(item) });

            export function envelope(schema, strict = false) {
                if (strict) {
                    return z.object({ data: schema }).strict();
                } else {
                    return z.object({ data: schema });
                }
            }
            "#,
        )
        .unwrap();

        let arrow = declaration(&module, "paginated").as_function().unwrap();
        assert_eq!(arrow.params[0].name(), Some("item"));
        assert!(matches!(arrow.body, FunctionBody::Expr(_)));

        let block = declaration(&module, "envelope").as_function().unwrap();
        assert_eq!(block.params.len(), 2);
        match &block.body {
            FunctionBody::Block(stmts) => assert!(matches!(stmts[0], Stmt::If { alternate: Some(_), .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_skips_classes_and_statements() {
        let module = AstParser::parse_source(
            r#"
            class Service<T> extends Base {
                private items: T[] = [];
                get(id: string) { return this.items.find(i => i.id === id); }
            }
            for (const x of [1, 2, 3]) { console.log(x >> 1) }
            app.listen(3000)
            export type Id = string
            "#,
        )
        .unwrap();
        assert_eq!(module.declarations.len(), 1);
        assert_eq!(module.declarations[0].name, "Id");
    }

    #[test]
    fn test_destructured_parameter() {
        let module = AstParser::parse_source("function make({ item }: { item: unknown }) { return item }").unwrap();
        let function = declaration(&module, "make").as_function().unwrap();
        assert_eq!(function.params[0].pattern, ParamPattern::Destructured);
    }

    #[test]
    fn test_as_const_array() {
        let module = AstParser::parse_source("export const ROLES = ['admin', 'user'] as const;").unwrap();
        match &declaration(&module, "ROLES").kind {
            DeclarationKind::Variable { init: Some(Expr::AsConst(inner)), .. } => {
                assert!(matches!(&**inner, Expr::Array(items) if items.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_type_standalone() {
        let ty = AstParser::parse_type("Wrapper<Map<string, Inner[]>>").unwrap();
        assert!(matches!(ty, TypeExpr::Reference { ref name, ref args } if name == "Wrapper" && args.len() == 1));
        assert!(AstParser::parse_type("Wrapper<").is_err());
    }
}
