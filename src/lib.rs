//! Schema From Source - Static schema resolution for TypeScript projects.
//!
//! This library reads TypeScript sources without executing them and resolves named types
//! into JSON-Schema-style schema values. Three kinds of declarations are understood:
//!
//! - **Native types**: interfaces, type aliases, enums and the built-in utility types
//! - **Validator chains**: builder-library schemas such as `z.object({ ... }).partial()`,
//!   including ORM "derive schema from table" helpers
//! - **Schema factories**: user functions returning validator chains, expanded per call site
//!
//! # Architecture
//!
//! 1. [`scanner`] - Recursively scans source roots for TypeScript files
//! 2. [`lexer`] and [`parser`] - Parse declarations into the [`ast`]
//! 3. [`detector`] - Finds which imports name the validator library and ORM helpers
//! 4. [`declaration_index`] - Finds declarations by name and follows imports across files
//! 5. [`resolver`] - Turns type expressions, validator chains and factory calls into schemas
//! 6. [`merger`] - The [`merger::SchemaEngine`] and its layered named-schema table
//! 7. [`operation`] - Resolves the names an API operation uses, per value role
//! 8. [`serializer`] - Serializes the result to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use schema_from_source::{
//!     config::EngineConfig,
//!     merger::SchemaEngine,
//!     resolver::ValueRole,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let mut engine = SchemaEngine::new(Path::new("./my-app"), EngineConfig::default());
//!
//! // Resolve a name, then collect every schema it referenced
//! let user = engine.resolve_by_name("Paginated<User>", ValueRole::Response);
//! let schemas = engine.named_schemas();
//!
//! println!("{}", user.to_value());
//! println!("{}", serialize_yaml(&schemas).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod ast;
pub mod cli;
pub mod config;
pub mod declaration_index;
pub mod detector;
pub mod error;
pub mod lexer;
pub mod merger;
pub mod naming;
pub mod operation;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod schema;
pub mod serializer;
