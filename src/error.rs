use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for chunking operations
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Errors that can occur while chunking Python sources
#[derive(Error, Debug)]
pub enum ChunkError {
    /// The file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid UTF-8 text
    #[error("Failed to decode {} as UTF-8: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// The file is not valid Python
    #[error("Syntax error in {}{}", path.display(), line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Syntax { path: PathBuf, line: Option<usize> },

    /// The grammar could not be loaded into the parser
    #[error("Failed to load Python grammar: {0}")]
    Language(String),

    /// The repository root is missing or not a directory
    #[error("Repository root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChunkError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn syntax(path: impl AsRef<Path>, line: Option<usize>) -> Self {
        Self::Syntax {
            path: path.as_ref().to_path_buf(),
            line,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error only affects a single file and the walk may go on
    pub fn is_file_local(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Decode { .. } | Self::Syntax { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_mentions_line() {
        let err = ChunkError::syntax("pkg/mod.py", Some(12));
        assert_eq!(err.to_string(), "Syntax error in pkg/mod.py at line 12");

        let err = ChunkError::syntax("pkg/mod.py", None);
        assert_eq!(err.to_string(), "Syntax error in pkg/mod.py");
    }

    #[test]
    fn file_local_errors() {
        assert!(ChunkError::syntax("a.py", None).is_file_local());
        assert!(!ChunkError::RootNotFound(PathBuf::from("/nope")).is_file_local());
    }
}
