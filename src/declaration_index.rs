//! Lazy, cached lookup of named declarations across source roots.

use crate::ast::{Declaration, DeclarationKind, Expr, FunctionBody, ImportedName, TypeExpr};
use crate::config::EngineConfig;
use crate::detector::{ValidatorBindings, ValidatorDetector};
use crate::parser::{AstParser, ParsedFile};
use crate::scanner::FileScanner;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

/// Which declaration space a lookup targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Type aliases, interfaces and enums
    Type,
    /// Variables, functions and enums
    Value,
}

impl Namespace {
    fn admits(self, decl: &Declaration) -> bool {
        match self {
            Namespace::Type => decl.is_type(),
            Namespace::Value => decl.is_value(),
        }
    }
}

/// A declaration together with the file that declares it
#[derive(Debug, Clone)]
pub struct Located {
    pub decl: Rc<Declaration>,
    pub file: PathBuf,
}

/// Declaration index over one or more source roots.
///
/// Every cache is append-only for the lifetime of the index: the directory listing is taken
/// once, each file is read once and parsed at most once, and a file that fails to parse stays
/// unavailable.
pub struct DeclarationIndex {
    roots: Vec<PathBuf>,
    config: EngineConfig,
    /// Directory listing, taken on first use
    files: Option<Rc<Vec<PathBuf>>>,
    /// File text, `None` when unreadable
    texts: HashMap<PathBuf, Option<Rc<str>>>,
    /// Parsed files, `None` when parsing failed
    parsed: HashMap<PathBuf, Option<Rc<ParsedFile>>>,
    bindings: HashMap<PathBuf, Rc<ValidatorBindings>>,
    /// `type X = z.infer<typeof Y>` pre-scan: X to Y
    aliases: Option<HashMap<String, String>>,
}

impl DeclarationIndex {
    /// Creates an index over the given roots.
    ///
    /// # Arguments
    ///
    /// * `roots` - Directories to scan for sources
    /// * `config` - Extensions, ignored directories and validator-library settings
    pub fn new(roots: Vec<PathBuf>, config: &EngineConfig) -> Self {
        Self {
            roots,
            config: config.clone(),
            files: None,
            texts: HashMap::new(),
            parsed: HashMap::new(),
            bindings: HashMap::new(),
            aliases: None,
        }
    }

    /// All source files under the roots, sorted. Scanned once.
    pub fn files(&mut self) -> Rc<Vec<PathBuf>> {
        if let Some(files) = &self.files {
            return Rc::clone(files);
        }

        let mut all = Vec::new();
        for root in &self.roots {
            match FileScanner::new(root.clone(), &self.config).scan() {
                Ok(result) => all.extend(result.source_files),
                Err(e) => warn!("Skipping source root {}: {:#}", root.display(), e),
            }
        }
        all.sort();
        all.dedup();
        debug!("Indexed {} source files", all.len());

        let files = Rc::new(all);
        self.files = Some(Rc::clone(&files));
        files
    }

    fn text(&mut self, path: &Path) -> Option<Rc<str>> {
        if let Some(text) = self.texts.get(path) {
            return text.clone();
        }
        let text = match fs::read_to_string(path) {
            Ok(content) => Some(Rc::from(content)),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        };
        self.texts.insert(path.to_path_buf(), text.clone());
        text
    }

    /// Returns the parsed file, parsing it on first request.
    ///
    /// Malformed files are logged once and reported as unavailable from then on.
    pub fn parsed_file(&mut self, path: &Path) -> Option<Rc<ParsedFile>> {
        if let Some(parsed) = self.parsed.get(path) {
            return parsed.clone();
        }

        let parsed = match self.text(path) {
            Some(text) => match AstParser::parse_source(&text) {
                Ok(module) => Some(Rc::new(ParsedFile {
                    path: path.to_path_buf(),
                    module,
                })),
                Err(e) => {
                    warn!("Treating {} as unavailable: {}", path.display(), e.with_file(path));
                    None
                }
            },
            None => None,
        };
        self.parsed.insert(path.to_path_buf(), parsed.clone());
        parsed
    }

    /// Validator bindings of a file; configured defaults when the file is unavailable
    pub fn bindings(&mut self, path: &Path) -> Rc<ValidatorBindings> {
        if let Some(bindings) = self.bindings.get(path) {
            return Rc::clone(bindings);
        }
        let bindings = match self.parsed_file(path) {
            Some(parsed) => ValidatorDetector::detect(&parsed.module, &self.config),
            None => ValidatorBindings::defaults(&self.config),
        };
        let bindings = Rc::new(bindings);
        self.bindings.insert(path.to_path_buf(), Rc::clone(&bindings));
        bindings
    }

    /// Finds a top-level declaration by name anywhere under the roots.
    ///
    /// Files are visited in sorted order and only parsed when their text mentions `name`.
    ///
    /// # Returns
    ///
    /// Returns the first matching declaration in `namespace`, or `None`.
    pub fn find_declaration(&mut self, name: &str, namespace: Namespace) -> Option<Located> {
        let files = self.files();
        for file in files.iter() {
            let Some(text) = self.text(file) else { continue };
            if !text.contains(name) {
                continue;
            }
            if let Some(decl) = self.find_in_file(file, name, namespace) {
                debug!("Found {:?} declaration {} in {}", namespace, name, file.display());
                return Some(Located {
                    decl,
                    file: file.clone(),
                });
            }
        }
        debug!("No {:?} declaration named {}", namespace, name);
        None
    }

    /// Finds a declaration declared directly in `file`.
    ///
    /// For functions, an implementation with a body wins over overload signatures.
    pub fn find_in_file(&mut self, file: &Path, name: &str, namespace: Namespace) -> Option<Rc<Declaration>> {
        let parsed = self.parsed_file(file)?;
        let mut found: Option<&Rc<Declaration>> = None;
        for decl in &parsed.module.declarations {
            if decl.name != name || !namespace.admits(decl) {
                continue;
            }
            match found {
                None => found = Some(decl),
                Some(previous) if is_bodiless_function(previous) && !is_bodiless_function(decl) => found = Some(decl),
                Some(_) => {}
            }
        }
        found.cloned()
    }

    /// Resolves `name` as seen from `file`: local declarations first, then imports, then any
    /// declaration with that name under the roots.
    pub fn resolve_binding(&mut self, file: &Path, name: &str, namespace: Namespace) -> Option<Located> {
        if let Some(located) = self.resolve_in_scope(file, name, namespace) {
            return Some(located);
        }
        self.find_declaration(name, namespace)
    }

    /// Like [`resolve_binding`](Self::resolve_binding) without the global fallback.
    pub fn resolve_in_scope(&mut self, file: &Path, name: &str, namespace: Namespace) -> Option<Located> {
        if let Some(decl) = self.find_in_file(file, name, namespace) {
            return Some(Located {
                decl,
                file: file.to_path_buf(),
            });
        }

        let parsed = self.parsed_file(file)?;
        let import = parsed.module.imports.iter().find(|i| i.local == name)?;
        let target = self.resolve_import(&import.source, file)?;
        let exported = match &import.imported {
            ImportedName::Named(imported) => imported.clone(),
            ImportedName::Default => "default".to_string(),
            ImportedName::Namespace => return None,
        };
        let mut visited = HashSet::new();
        self.find_exported(&target, &exported, namespace, &mut visited)
    }

    /// Resolves `ns.member` where `ns` is a namespace import in `file`.
    pub fn resolve_namespace_member(&mut self, file: &Path, namespace_local: &str, member: &str, namespace: Namespace) -> Option<Located> {
        let parsed = self.parsed_file(file)?;
        let import = parsed
            .module
            .imports
            .iter()
            .find(|i| i.local == namespace_local && i.imported == ImportedName::Namespace)?;
        let target = self.resolve_import(&import.source, file)?;
        let mut visited = HashSet::new();
        self.find_exported(&target, member, namespace, &mut visited)
    }

    /// Finds what `file` exports under `name`, following re-exports.
    fn find_exported(&mut self, file: &Path, name: &str, namespace: Namespace, visited: &mut HashSet<(PathBuf, String)>) -> Option<Located> {
        if !visited.insert((file.to_path_buf(), name.to_string())) {
            return None;
        }

        if let Some(decl) = self.find_in_file(file, name, namespace) {
            return Some(Located {
                decl,
                file: file.to_path_buf(),
            });
        }

        let parsed = self.parsed_file(file)?;
        for reexport in &parsed.module.reexports {
            let original = match &reexport.names {
                Some(names) => match names.iter().find(|(_, exported)| exported == name) {
                    Some((original, _)) => original.clone(),
                    None => continue,
                },
                None => name.to_string(),
            };
            let Some(target) = self.resolve_import(&reexport.source, file) else { continue };
            if let Some(located) = self.find_exported(&target, &original, namespace, visited) {
                return Some(located);
            }
        }

        // `import { X } from "./x"; export { X };` keeps X reachable through the import
        let import = parsed.module.imports.iter().find(|i| i.local == name)?;
        let target = self.resolve_import(&import.source, file)?;
        let imported = match &import.imported {
            ImportedName::Named(imported) => imported.clone(),
            ImportedName::Default => "default".to_string(),
            ImportedName::Namespace => return None,
        };
        self.find_exported(&target, &imported, namespace, visited)
    }

    /// Resolves a relative module specifier against the importing file.
    ///
    /// Tries the path as written, each source extension, `.js`-family to TypeScript
    /// substitution and `index.*` inside a directory. Bare package specifiers yield `None`.
    pub fn resolve_import(&self, specifier: &str, from_file: &Path) -> Option<PathBuf> {
        if !specifier.starts_with('.') {
            return None;
        }
        let base_dir = from_file.parent().unwrap_or_else(|| Path::new("."));
        let joined = normalize(&base_dir.join(specifier));

        let mut candidates = vec![joined.clone()];
        if let Some(ext) = joined.extension().and_then(|e| e.to_str()) {
            let substitutes: &[&str] = match ext {
                "js" => &["ts", "tsx"],
                "jsx" => &["tsx"],
                "mjs" => &["mts"],
                "cjs" => &["cts"],
                _ => &[],
            };
            for substitute in substitutes {
                candidates.push(joined.with_extension(substitute));
            }
        }
        for ext in &self.config.extensions {
            let mut with_ext = joined.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            candidates.push(PathBuf::from(with_ext));
        }
        for ext in &self.config.extensions {
            candidates.push(joined.join(format!("index.{}", ext)));
        }

        let resolved = candidates.into_iter().find(|c| c.is_file());
        if resolved.is_none() {
            debug!("Unresolved import {} from {}", specifier, from_file.display());
        }
        resolved
    }

    /// `type X = z.infer<typeof Y>` aliases found in every file, computed once.
    pub fn alias_targets(&mut self) -> HashMap<String, String> {
        if let Some(aliases) = &self.aliases {
            return aliases.clone();
        }

        let mut aliases = HashMap::new();
        let files = self.files();
        for file in files.iter() {
            let Some(text) = self.text(file) else { continue };
            if !text.contains("typeof") {
                continue;
            }
            let Some(parsed) = self.parsed_file(file) else { continue };
            for decl in &parsed.module.declarations {
                if let DeclarationKind::TypeAlias { body, .. } = &decl.kind {
                    if let Some(target) = inferred_schema_name(body) {
                        aliases.entry(decl.name.clone()).or_insert_with(|| target.to_string());
                    }
                }
            }
        }
        debug!("Pre-scan found {} schema type aliases", aliases.len());

        self.aliases = Some(aliases.clone());
        aliases
    }
}

/// `Y` of `z.infer<typeof Y>`, `z.input<...>`, `z.output<...>` or `TypeOf<typeof Y>`
pub fn inferred_schema_name(ty: &TypeExpr) -> Option<&str> {
    let TypeExpr::Reference { name, args } = ty else { return None };
    let last = name.rsplit('.').next().unwrap_or(name);
    let is_infer = matches!(last, "infer" | "input" | "output" | "TypeOf" | "Infer");
    match args.as_slice() {
        [TypeExpr::Query(target)] if is_infer => Some(target),
        _ => None,
    }
}

fn is_bodiless_function(decl: &Declaration) -> bool {
    matches!(&decl.kind, DeclarationKind::Function(f) if f.body == FunctionBody::None)
}

/// Lexically removes `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The initializer of a value declaration, when it has one
pub fn initializer(decl: &Declaration) -> Option<&Expr> {
    match &decl.kind {
        DeclarationKind::Variable { init: Some(init), .. } => Some(init),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    fn index_for(dir: &TempDir) -> DeclarationIndex {
        DeclarationIndex::new(vec![dir.path().to_path_buf()], &EngineConfig::default())
    }

    #[test]
    fn test_find_declaration_by_namespace() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(
            &temp_dir,
            "user.ts",
            "export const User = z.object({});\nexport type User = z.infer<typeof User>;",
        );
        let mut index = index_for(&temp_dir);

        let value = index.find_declaration("User", Namespace::Value).unwrap();
        assert!(matches!(value.decl.kind, DeclarationKind::Variable { .. }));
        let ty = index.find_declaration("User", Namespace::Type).unwrap();
        assert!(matches!(ty.decl.kind, DeclarationKind::TypeAlias { .. }));
        assert!(index.find_declaration("Missing", Namespace::Type).is_none());
    }

    #[test]
    fn test_malformed_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "a_broken.ts", "export type Broken = {");
        create_temp_file(&temp_dir, "b_good.ts", "export type Good = string; // Broken");
        let mut index = index_for(&temp_dir);

        assert!(index.find_declaration("Broken", Namespace::Type).is_none());
        assert!(index.find_declaration("Good", Namespace::Type).is_some());
    }

    #[test]
    fn test_resolve_import_variants() {
        let temp_dir = TempDir::new().unwrap();
        let from = create_temp_file(&temp_dir, "src/routes/api.ts", "");
        let plain = create_temp_file(&temp_dir, "src/schemas.ts", "");
        let index_file = create_temp_file(&temp_dir, "src/lib/index.ts", "");
        let tsx = create_temp_file(&temp_dir, "src/ui.tsx", "");
        let index = index_for(&temp_dir);

        assert_eq!(index.resolve_import("../schemas", &from), Some(plain.clone()));
        assert_eq!(index.resolve_import("../schemas.js", &from), Some(plain));
        assert_eq!(index.resolve_import("../lib", &from), Some(index_file));
        assert_eq!(index.resolve_import("../ui.js", &from), Some(tsx));
        assert_eq!(index.resolve_import("zod", &from), None);
        assert_eq!(index.resolve_import("./missing", &from), None);
    }

    #[test]
    fn test_resolve_binding_through_alias_and_reexport() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(&temp_dir, "lib/factories.ts", "export function makeList(item) { return z.array(item); }");
        create_temp_file(&temp_dir, "lib/index.ts", "export { makeList as list } from './factories';");
        let route = create_temp_file(&temp_dir, "route.ts", "import { list as L } from './lib';\nimport * as F from './lib';");
        let mut index = index_for(&temp_dir);

        let located = index.resolve_in_scope(&route, "L", Namespace::Value).unwrap();
        assert_eq!(located.decl.name, "makeList");
        assert!(located.file.ends_with("lib/factories.ts"));

        let member = index.resolve_namespace_member(&route, "F", "list", Namespace::Value).unwrap();
        assert_eq!(member.decl.name, "makeList");
    }

    #[test]
    fn test_prefers_implementation_over_overload() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(
            &temp_dir,
            "f.ts",
            "export function wrap(a: string): X;\nexport function wrap(a) { return z.object({ a }); }",
        );
        let mut index = index_for(&temp_dir);
        let located = index.find_declaration("wrap", Namespace::Value).unwrap();
        let function = located.decl.as_function().unwrap();
        assert!(matches!(function.body, FunctionBody::Block(_)));
    }

    #[test]
    fn test_alias_prescan() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(
            &temp_dir,
            "types.ts",
            "export type User = z.infer<typeof UserSchema>;\nexport type Input = z.input<typeof FormSchema>;\ntype Plain = string;",
        );
        let mut index = index_for(&temp_dir);
        let aliases = index.alias_targets();
        assert_eq!(aliases.get("User").map(String::as_str), Some("UserSchema"));
        assert_eq!(aliases.get("Input").map(String::as_str), Some("FormSchema"));
        assert!(!aliases.contains_key("Plain"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }
}
