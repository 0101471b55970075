use crate::config::EngineConfig;
use anyhow::Result;
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// File scanner for traversing source roots.
///
/// The `FileScanner` recursively walks a root directory to find source files with one of the
/// configured extensions. It skips hidden directories (those starting with `.`) and the
/// configured ignored directory names such as `node_modules` and `dist`.
///
/// # Example
///
/// ```no_run
/// use schema_from_source::config::EngineConfig;
/// use schema_from_source::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let config = EngineConfig::default();
/// let scanner = FileScanner::new(PathBuf::from("./my-project"), &config);
/// let result = scanner.scan().unwrap();
/// println!("Found {} source files", result.source_files.len());
/// ```
pub struct FileScanner<'a> {
    root_path: PathBuf,
    config: &'a EngineConfig,
}

/// Result of directory scanning operation.
///
/// Contains the list of discovered source files and any warnings encountered during scanning.
pub struct ScanResult {
    /// Discovered source files, sorted by path
    pub source_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl<'a> FileScanner<'a> {
    /// Creates a new `FileScanner` for the specified root directory.
    ///
    /// # Arguments
    ///
    /// * `root_path` - The root directory to scan
    /// * `config` - Supplies the source extensions and ignored directory names
    pub fn new(root_path: PathBuf, config: &'a EngineConfig) -> Self {
        Self { root_path, config }
    }

    /// Scans the directory tree and collects all source files.
    ///
    /// Declaration files (`.d.ts`) are collected like any other source, except under the
    /// ignored directories. If any directories or files cannot be accessed, warnings are
    /// logged and added to the result, but scanning continues.
    ///
    /// # Returns
    ///
    /// Returns a `ScanResult` with the files sorted so lookups are deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.exists() {
            anyhow::bail!("Source root does not exist: {}", self.root_path.display());
        }

        let mut source_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path).into_iter().filter_entry(|e| {
            // Don't filter the root directory itself
            if e.path() == self.root_path {
                return true;
            }
            if !e.file_type().is_dir() {
                return true;
            }
            let file_name = e.file_name().to_string_lossy();
            let is_hidden = file_name.starts_with('.');
            let is_ignored = self.config.ignored_dirs.iter().any(|d| *d == file_name);
            !is_hidden && !is_ignored
        }) {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let is_source = path
                        .extension()
                        .and_then(|s| s.to_str())
                        .map(|ext| self.config.is_source_extension(ext))
                        .unwrap_or(false);
                    if entry.file_type().is_file() && is_source {
                        source_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        source_files.sort();

        Ok(ScanResult {
            source_files,
            warnings,
        })
    }
}
