use crate::config::EngineConfig;
use crate::merger::SchemaEngine;
use crate::operation::load_operations;
use crate::resolver::ValueRole;
use crate::serializer::{load_override_document, serialize_json, serialize_yaml, write_to_file, Components, SchemaDocument};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// Schema From Source - Resolve TypeScript types and validator schemas into JSON-Schema-style documents
#[derive(Parser, Debug)]
#[command(name = "schema-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the TypeScript project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Schema name to resolve; may be a generic instantiation such as `Paginated<User>`
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Role of the values requested with --name
    #[arg(short = 'r', long = "role", value_enum, default_value = "body")]
    pub role: ValueRole,

    /// Operations file (YAML or JSON) listing the schema names each operation uses
    #[arg(long = "operations", value_name = "FILE")]
    pub operations: Option<PathBuf>,

    /// Override document (YAML or JSON); later documents win over earlier ones
    #[arg(long = "override", value_name = "FILE")]
    pub overrides: Vec<PathBuf>,

    /// Engine configuration file (YAML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Source root relative to the project; replaces the configured roots
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!("Project path does not exist: {}", args.project_path.display());
    }

    if !args.project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
    }

    for file in args.overrides.iter().chain(args.operations.iter()).chain(args.config.iter()) {
        if !file.is_file() {
            anyhow::bail!("Input file does not exist: {}", file.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if args.names.is_empty() && args.operations.is_none() {
        info!("Requested: every exported declaration");
    } else {
        info!("Requested names: {:?} as {:?}", args.names, args.role);
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting schema resolution...");

    // Step 1: Configuration
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if !args.roots.is_empty() {
        config.roots = args.roots.clone();
    }
    debug!("Source roots: {:?}", config.resolved_roots(&args.project_path));
    let mut engine = SchemaEngine::new(&args.project_path, config);

    // Step 2: Overrides, in command-line order
    for path in &args.overrides {
        let document = load_override_document(path)?;
        info!("Loaded {} override schemas from {}", document.len(), path.display());
        engine.add_overrides(document);
    }

    // Step 3: Resolve what was asked for
    let mut document = SchemaDocument::default();
    for name in &args.names {
        debug!("Resolving requested name {}", name);
        let node = engine.resolve_by_name(name, args.role);
        document.requested.insert(name.clone(), node);
    }

    if let Some(path) = &args.operations {
        let records = load_operations(path)?;
        info!("Resolving {} operations", records.len());
        document.operations = records.iter().map(|record| engine.resolve_operation(record)).collect();
    }

    if args.names.is_empty() && args.operations.is_none() {
        info!("No names requested, resolving every exported declaration...");
        engine.resolve_exported();
    }

    // Step 4: Named-schema table
    document.components = Components {
        schemas: engine.named_schemas(),
    };
    info!("Named schemas: {}", document.components.schemas.len());

    // Step 5: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    // Step 6: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote schema document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    info!("Resolution complete!");
    info!("Summary:");
    info!("  - Requested names: {}", document.requested.len());
    info!("  - Operations: {}", document.operations.len());
    info!("  - Named schemas: {}", document.components.schemas.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses_repeated_names_and_role() {
        let args = CliArgs::try_parse_from([
            "schema-from-source",
            "./app",
            "-n",
            "User",
            "--name",
            "Paginated<User>",
            "-r",
            "query",
            "-f",
            "json",
            "--root",
            "src",
        ])
        .unwrap();
        assert_eq!(args.names, vec!["User", "Paginated<User>"]);
        assert_eq!(args.roots, vec![PathBuf::from("src")]);
        assert_eq!(args.role, ValueRole::Query);
        assert!(matches!(args.output_format, OutputFormat::Json));
        assert!(args.overrides.is_empty());
    }

    #[test]
    fn test_validation_rejects_missing_project() {
        let args = CliArgs::try_parse_from(["schema-from-source", "/definitely/not/here"]).unwrap();
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_validation_rejects_missing_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().to_str().unwrap();
        let args = CliArgs::try_parse_from(["schema-from-source", project, "--override", "missing.yaml"]).unwrap();
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_run_writes_exported_schemas() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("types.ts"), "export interface User { id: number; name?: string }\n").unwrap();
        let output = temp_dir.path().join("out").join("schemas.json");

        let args = CliArgs::try_parse_from([
            "schema-from-source",
            temp_dir.path().to_str().unwrap(),
            "-f",
            "json",
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(parse_args_from_parsed(args).unwrap()).unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["components"]["schemas"]["User"]["required"], serde_json::json!(["id"]));
    }
}
