use thiserror::Error;

/// Error type for level generation and settings handling
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid room rule: {0}")]
    InvalidRule(String),
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] ron::error::SpannedError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GenerationError::Configuration("no starting room".into());
        assert_eq!(err.to_string(), "Configuration error: no starting room");

        let err = GenerationError::InvalidRule("empty table".into());
        assert_eq!(err.to_string(), "Invalid room rule: empty table");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GenerationError = io.into();
        assert!(matches!(err, GenerationError::Io(_)));
    }
}
