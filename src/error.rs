//! Error types for the repository forker.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for loading configuration and setting up a run.
#[derive(Error, Debug)]
pub enum ForkerError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Missing required sections: {}", sections.join(", "))]
    MissingSection { sections: Vec<String> },

    #[error("Missing required options in {section}: {}", options.join(", "))]
    MissingOption {
        section: String,
        options: Vec<String>,
    },

    #[error("Duplicate section in config: {0}")]
    DuplicateSection(String),

    #[error("Duplicate option {option} in section {section}")]
    DuplicateOption { section: String, option: String },

    #[error("Failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ForkerError {
    /// Whether this error came from reading or validating the config file.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ForkerError::ConfigNotFound(_)
                | ForkerError::MissingSection { .. }
                | ForkerError::MissingOption { .. }
                | ForkerError::DuplicateSection(_)
                | ForkerError::DuplicateOption { .. }
                | ForkerError::ConfigParse { .. }
                | ForkerError::Io(_)
        )
    }
}

/// Why a single fork request did not produce a new fork.
#[derive(Error, Debug)]
pub enum ForkRequestError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),
}

impl ForkRequestError {
    /// Whether the request can be sent again without risking a second fork.
    ///
    /// Only a failed connect guarantees the server never saw the request. A
    /// timeout may fire after the body was delivered.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ForkRequestError::Connect(_))
    }
}

impl From<reqwest::Error> for ForkRequestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ForkRequestError::Timeout(e.to_string())
        } else if e.is_connect() {
            ForkRequestError::Connect(e.to_string())
        } else if e.is_decode() || e.is_body() {
            ForkRequestError::MalformedResponse(e.to_string())
        } else {
            ForkRequestError::Request(e.to_string())
        }
    }
}

/// A specialized Result type for forker operations.
pub type Result<T> = std::result::Result<T, ForkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_section_message_lists_all() {
        let err = ForkerError::MissingSection {
            sections: vec!["USER".into(), "OWNER".into()],
        };
        assert_eq!(err.to_string(), "Missing required sections: USER, OWNER");
    }

    #[test]
    fn test_missing_option_message() {
        let err = ForkerError::MissingOption {
            section: "REPO1".into(),
            options: vec!["LANGUAGE".into()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required options in REPO1: LANGUAGE"
        );
    }

    #[test]
    fn test_config_error_classification() {
        assert!(ForkerError::ConfigNotFound(PathBuf::from("x.cfg")).is_config_error());
        assert!(ForkerError::DuplicateSection("REPO1".into()).is_config_error());
        assert!(
            ForkerError::DuplicateOption {
                section: "USER".into(),
                option: "USERNAME".into()
            }
            .is_config_error()
        );
        assert!(!ForkerError::InvalidConfig("bad url".into()).is_config_error());
    }

    #[test]
    fn test_only_connect_failures_are_retryable() {
        assert!(ForkRequestError::Connect("c".into()).is_retryable());
        assert!(!ForkRequestError::Timeout("t".into()).is_retryable());
        assert!(!ForkRequestError::Request("closed".into()).is_retryable());
        assert!(
            !ForkRequestError::UnexpectedStatus {
                status: 400,
                body: String::new()
            }
            .is_retryable()
        );
    }
}
