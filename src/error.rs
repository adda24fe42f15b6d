use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the analysis library.
///
/// Malformed Solidity is never an error; it degrades to a sentinel contract.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl GuardError {
    /// Maps an I/O error on `path` to `NotFound` or `Io`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinct() {
        let err = GuardError::from_io(
            "/missing/Token.sol",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );

        assert!(matches!(err, GuardError::NotFound(_)));
        assert_eq!(err.to_string(), "File not found: /missing/Token.sol");
    }

    #[test]
    fn test_other_io_errors_keep_source() {
        let err = GuardError::from_io(
            "Token.sol",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );

        assert!(matches!(err, GuardError::Io { .. }));
        assert!(err.to_string().contains("denied"));
    }
}
