//! Error taxonomy for schema loading, formatting requests and imports
//!
//! Schema errors are fatal to startup. Everything else is recoverable and is
//! surfaced to the user as a single notification.

use std::fmt;

use thiserror::Error;

/// Failure to obtain a usable option schema
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Schema endpoint unreachable, non-2xx, or body not JSON
    #[error("failed to fetch option schema: {0}")]
    Fetch(String),

    /// Schema JSON is structurally unusable
    #[error("invalid option schema: {0}")]
    Format(String),
}

/// Failure of a single `/format` round trip
#[derive(Error, Debug)]
pub enum TransformRequestError {
    #[error("format request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("format service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Service answered 2xx with an error object instead of text
    #[error("format service reported an error: {0}")]
    Service(String),

    #[error("unexpected format response: {0}")]
    Decode(String),
}

/// Imported file could not be read as a key/value mapping
#[derive(Error, Debug)]
pub enum ImportParseError {
    #[error("the file does not appear to be valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("the file must contain a mapping of option names to values, found {0}")]
    NotAMapping(&'static str),
}

/// Derivation requested for a version the schema does not know
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown clang-format version '{version}'")]
pub struct UnknownOptionError {
    pub version: String,
}

/// Non-fatal: imported or persisted data named an option the target version lacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOptionWarning {
    pub option: String,
    pub version: String,
}

impl fmt::Display for UnknownOptionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "option '{}' is not available in version {} and was ignored",
            self.option, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_message_names_option_and_version() {
        let warning = UnknownOptionWarning {
            option: "UnknownOpt".to_string(),
            version: "v2".to_string(),
        };
        let text = warning.to_string();
        assert!(text.contains("UnknownOpt"));
        assert!(text.contains("v2"));
    }

    #[test]
    fn test_status_error_includes_code() {
        let err = TransformRequestError::Status {
            status: 503,
            body: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "format service returned HTTP 503: busy");
    }
}
