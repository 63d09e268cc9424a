use thiserror::Error;

/// Top-level error type for the Bookchat system.
///
/// Subsystem crates either reuse these variants directly (storage) or define
/// their own error type and convert at the boundary, so that `?` works across
/// crates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BookchatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for BookchatError {
    fn from(err: toml::de::Error) -> Self {
        BookchatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BookchatError {
    fn from(err: toml::ser::Error) -> Self {
        BookchatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BookchatError {
    fn from(err: serde_json::Error) -> Self {
        BookchatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Bookchat operations.
pub type Result<T> = std::result::Result<T, BookchatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(BookchatError, &str)> = vec![
            (
                BookchatError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                BookchatError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                BookchatError::Model("quota exceeded".to_string()),
                "Model error: quota exceeded",
            ),
            (
                BookchatError::Api("bind failed".to_string()),
                "API error: bind failed",
            ),
            (
                BookchatError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: BookchatError = io_err.into();
        assert!(matches!(err, BookchatError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: BookchatError = err.unwrap_err().into();
        assert!(matches!(err, BookchatError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: BookchatError = err.unwrap_err().into();
        assert!(matches!(err, BookchatError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
