//! Submission envelopes: mode, metadata, and transport references.
//!
//! `meta` and `sftp` arrive as loosely-typed JSON blobs. They are modeled as
//! validated envelopes: the required keys are checked and typed accessors are
//! provided for them, the remainder passes through opaquely so new client
//! fields never break older servers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// How the code under review reaches the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// Uploaded zip bundle.
    Zip,
    /// Server-side fetch over SFTP.
    Sftp,
}

impl SubmissionMode {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_lowercase().as_str() {
            "zip" => Ok(Self::Zip),
            "sftp" => Ok(Self::Sftp),
            other => Err(format!("Invalid mode: {}", other)),
        }
    }
}

impl std::fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zip => write!(f, "zip"),
            Self::Sftp => write!(f, "sftp"),
        }
    }
}

/// Error raised when a submission envelope fails validation.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("{field} is not valid JSON: {source}")]
    Json {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("{field} must be a JSON object")]
    NotAnObject { field: &'static str },

    #[error("{field} is missing required key '{key}'")]
    MissingKey { field: &'static str, key: &'static str },
}

/// Validated free-form submission metadata.
///
/// Required key: `project`. Everything else is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaEnvelope(serde_json::Value);

impl MetaEnvelope {
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|source| EnvelopeError::Json {
                field: "meta",
                source,
            })?;
        let object = value
            .as_object()
            .ok_or(EnvelopeError::NotAnObject { field: "meta" })?;
        if !object.contains_key("project") {
            return Err(EnvelopeError::MissingKey {
                field: "meta",
                key: "project",
            });
        }
        Ok(Self(value))
    }

    pub fn project(&self) -> &str {
        self.0
            .get("project")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Validated SFTP connection parameters.
///
/// Required keys: `host`, `username`, `path`. Credentials and any transport
/// tuning keys ride along opaquely for the fetch layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SftpEnvelope(serde_json::Value);

impl SftpEnvelope {
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|source| EnvelopeError::Json {
                field: "sftp",
                source,
            })?;
        let object = value
            .as_object()
            .ok_or(EnvelopeError::NotAnObject { field: "sftp" })?;
        for key in ["host", "username", "path"] {
            if !object.contains_key(key) {
                return Err(EnvelopeError::MissingKey { field: "sftp", key });
            }
        }
        Ok(Self(value))
    }

    pub fn host(&self) -> &str {
        self.key_str("host")
    }

    pub fn username(&self) -> &str {
        self.key_str("username")
    }

    pub fn path(&self) -> &str {
        self.key_str("path")
    }

    fn key_str(&self, key: &str) -> &str {
        self.0.get(key).and_then(|v| v.as_str()).unwrap_or_default()
    }
}

/// Reference to an uploaded code bundle, spooled by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleRef {
    pub filename: String,
    pub size_bytes: u64,
    /// Where the transport layer spooled the bundle bytes, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spool_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!(SubmissionMode::parse("ZIP").unwrap(), SubmissionMode::Zip);
        assert_eq!(SubmissionMode::parse("sftp").unwrap(), SubmissionMode::Sftp);
        assert!(SubmissionMode::parse("tarball").is_err());
    }

    #[test]
    fn meta_requires_project_key() {
        assert!(MetaEnvelope::parse(r#"{"project": "api"}"#).is_ok());
        assert!(matches!(
            MetaEnvelope::parse(r#"{"branch": "main"}"#),
            Err(EnvelopeError::MissingKey { key: "project", .. })
        ));
        assert!(matches!(
            MetaEnvelope::parse("[1, 2]"),
            Err(EnvelopeError::NotAnObject { .. })
        ));
        assert!(matches!(
            MetaEnvelope::parse("not json"),
            Err(EnvelopeError::Json { .. })
        ));
    }

    #[test]
    fn meta_preserves_unknown_keys() {
        let meta = MetaEnvelope::parse(r#"{"project": "api", "ticket": "SEC-42"}"#).unwrap();
        assert_eq!(meta.project(), "api");
        assert_eq!(
            meta.as_value().get("ticket").and_then(|v| v.as_str()),
            Some("SEC-42")
        );
    }

    #[test]
    fn sftp_requires_connection_keys() {
        let ok = r#"{"host": "sftp.example.com", "username": "ci", "path": "/srv/code.zip"}"#;
        let envelope = SftpEnvelope::parse(ok).unwrap();
        assert_eq!(envelope.host(), "sftp.example.com");
        assert_eq!(envelope.path(), "/srv/code.zip");

        assert!(matches!(
            SftpEnvelope::parse(r#"{"host": "sftp.example.com", "username": "ci"}"#),
            Err(EnvelopeError::MissingKey { key: "path", .. })
        ));
    }
}
