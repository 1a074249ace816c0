use astplay_parser::ParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for astplay operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use astplay_parser::{parse, ParserOptions};

    #[test]
    fn test_parse_error_display() {
        let err = parse("var = 1;", ParserOptions::default()).unwrap_err();
        let err = Error::from(err);
        let text = err.to_string();
        assert!(text.starts_with("Parse error: "), "{text}");
        assert!(text.ends_with("(1:5)"), "{text}");
    }

    #[test]
    fn test_other() {
        assert_eq!(Error::other("nope").to_string(), "nope");
    }
}
