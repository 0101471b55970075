//! Schema From Source - Command-line tool for resolving TypeScript schemas.
//!
//! This binary statically reads a TypeScript project and resolves type declarations and
//! validator-library schema definitions into JSON-Schema-style documents, without running
//! any of the project's code.
//!
//! # Usage
//!
//! ```bash
//! schema-from-source [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Resolve every exported declaration:
//! ```bash
//! schema-from-source ./my-app -o schemas.yaml
//! ```
//!
//! Resolve selected names as query parameters, in JSON:
//! ```bash
//! schema-from-source ./my-app -n ListUsersQuery -r query -f json
//! ```
//!
//! Resolve operations with an override document on top:
//! ```bash
//! schema-from-source ./my-app --operations ops.yaml --override overrides.yaml -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use schema_from_source::cli;

fn main() -> Result<()> {
    // Parse once so the verbose flag can pick the log level before validation logs anything
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env().filter_level(log_level).init();

    info!("Schema From Source starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("Schema resolution completed successfully");

    Ok(())
}
