use std::path::PathBuf;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the application
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    InvalidArgument(String),
    SerializationError(String),
}

impl Error {
    /// Builds a parse error at a source position
    pub fn parse(file: impl Into<PathBuf>, line: usize, column: usize, message: impl Into<String>) -> Self {
        Error::ParseError {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Rebinds a parse error produced for in-memory source to the file it came from
    pub fn with_file(self, path: &std::path::Path) -> Self {
        match self {
            Error::ParseError { line, column, message, .. } => Error::ParseError {
                file: path.to_path_buf(),
                line,
                column,
                message,
            },
            other => other,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::ParseError { file, line, column, message } => {
                write!(f, "Parse error {}:{}:{}: {}", file.display(), line, column, message)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_includes_position() {
        let err = Error::parse("<source>", 3, 14, "expected `>`").with_file(std::path::Path::new("src/types.ts"));
        assert_eq!(err.to_string(), "Parse error src/types.ts:3:14: expected `>`");
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(err.source().is_some());
    }
}
