//! All error types for the inisync crate.
//!
//! Every fallible operation (fetching, classifying, decoding, snapshot I/O)
//! returns [`Error`]. Nothing is retried: each variant is fatal to the run.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("remote fetch failed: {message}")]
    RemoteFetch {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("missing required resource `{name}` in folder `{folder}`")]
    MissingRequiredResource { folder: String, name: String },

    #[error("malformed local state at {path}: {message}")]
    MalformedLocalState { path: String, message: String },

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("merged {merged} keys but the base document has {base} lines")]
    BaseMismatch { merged: usize, base: usize },
}

impl Error {
    /// Creates a new remote fetch error with optional source error
    pub fn remote_fetch(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::RemoteFetch {
            message: message.into(),
            source,
        }
    }

    /// Creates a new malformed local state error for `path`
    pub fn malformed_local_state(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Error::MalformedLocalState {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    pub fn missing_resource(folder: impl Into<String>, name: impl Into<String>) -> Self {
        Error::MissingRequiredResource {
            folder: folder.into(),
            name: name.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        let message = match value.status() {
            Some(status) => format!("HTTP {} from {}", status, url_of(&value)),
            None => format!("request to {} failed", url_of(&value)),
        };
        Error::remote_fetch(message, Some(Box::new(value)))
    }
}

fn url_of(error: &reqwest::Error) -> String {
    error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unknown url>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_resource_names_folder_and_file() {
        let error = Error::missing_resource("override-rules", "3d-replacement");
        assert_eq!(
            error.to_string(),
            "missing required resource `3d-replacement` in folder `override-rules`"
        );
    }

    #[test]
    fn test_remote_fetch_with_source() {
        let source = Box::new(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
        let error = Error::remote_fetch("listing files", Some(source));
        assert!(error.to_string().contains("remote fetch failed: listing files"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_malformed_local_state_mentions_path() {
        let error = Error::malformed_local_state("out/final.json", "file not found");
        assert_eq!(
            error.to_string(),
            "malformed local state at out/final.json: file not found"
        );
    }

    #[test]
    fn test_parse_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let error = Error::Parse(json_error);
        assert!(error.to_string().contains("parse error"));
    }

    #[test]
    fn test_base_mismatch_counts() {
        let error = Error::BaseMismatch { merged: 2, base: 3 };
        assert_eq!(
            error.to_string(),
            "merged 2 keys but the base document has 3 lines"
        );
    }

    #[test]
    fn test_error_debug() {
        let error = Error::InvalidConfig("concurrency must be >= 1".to_string());
        let debug = format!("{:?}", error);
        assert!(debug.contains("InvalidConfig"));
    }
}
