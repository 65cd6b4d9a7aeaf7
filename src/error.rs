//! Error handling for the service catalog pipeline
//!
//! Only run-level (fatal) conditions are represented here. Per-item
//! mutation failures are collected into `ReconcileStats::errors` and
//! malformed details documents degrade to defaults, so neither escalates
//! through this type.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for catalog reconciliation runs
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("No canonical service definitions supplied; nothing to reconcile against")]
    EmptyCanonicalSource,

    #[error("Failed to read canonical source {}: {source}", .path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate canonical definition '{name}'")]
    DuplicateDefinition { name: String },

    #[error("Invalid definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Backup of {subject} failed, destructive operation aborted: {source}")]
    BackupFailed {
        subject: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot {}: {source}", .path.display())]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Whether this error came from the backup guard in front of a delete
    pub fn is_backup_failure(&self) -> bool {
        matches!(self, CatalogError::BackupFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_failure_message() {
        let err = CatalogError::BackupFailed {
            subject: "3 service rows".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        };
        assert!(err.is_backup_failure());
        assert!(err.to_string().contains("3 service rows"));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_store_error_from_anyhow() {
        let err: CatalogError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, CatalogError::Store(_)));
        assert!(!err.is_backup_failure());
    }
}
