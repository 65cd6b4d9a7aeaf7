//! Backup manager
//!
//! Captures recoverable prior state before anything is destroyed or
//! overwritten:
//!
//! | Subject | Location | On failure |
//! |---------|----------|------------|
//! | Row set | `<backup_dir>/services-backup-<ts>.json` | caller must abort the delete |
//! | File | `<file>.<ts>.bak` next to the file | caller may continue with a warning |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::fs::ArtifactFs;
use crate::types::PersistedServiceRow;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%3f";

/// Serialized row-set backup with run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSetBackup {
    pub created_at: DateTime<Utc>,
    pub environment: String,
    pub reason: String,
    pub item_count: usize,
    pub rows: Vec<PersistedServiceRow>,
}

/// What to back up
#[derive(Debug, Clone, Copy)]
pub enum BackupSubject<'a> {
    Rows {
        rows: &'a [PersistedServiceRow],
        reason: &'a str,
    },
    File(&'a Path),
}

impl BackupSubject<'_> {
    /// Human-readable label for logs and errors
    pub fn describe(&self) -> String {
        match self {
            BackupSubject::Rows { rows, .. } => format!("{} service rows", rows.len()),
            BackupSubject::File(path) => format!("file {}", path.display()),
        }
    }
}

pub struct BackupManager {
    fs: Arc<dyn ArtifactFs>,
    backup_dir: PathBuf,
    environment: String,
}

impl BackupManager {
    pub fn new(
        fs: Arc<dyn ArtifactFs>,
        backup_dir: impl Into<PathBuf>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            backup_dir: backup_dir.into(),
            environment: environment.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Back up a subject, returning where the copy was written.
    ///
    /// `Ok(None)` means there was nothing to preserve (file subject that
    /// does not exist yet).
    pub async fn backup(&self, subject: BackupSubject<'_>) -> io::Result<Option<PathBuf>> {
        match subject {
            BackupSubject::Rows { rows, reason } => self.backup_rows(rows, reason).await.map(Some),
            BackupSubject::File(path) => self.backup_file(path).await,
        }
    }

    /// Serialize the full row set to a new file in the backup directory
    pub async fn backup_rows(
        &self,
        rows: &[PersistedServiceRow],
        reason: &str,
    ) -> io::Result<PathBuf> {
        let now = Utc::now();
        let backup = RowSetBackup {
            created_at: now,
            environment: self.environment.clone(),
            reason: reason.to_string(),
            item_count: rows.len(),
            rows: rows.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&backup)?;

        self.fs.create_dir_all(&self.backup_dir).await?;
        let stem = format!("services-backup-{}", now.format(TIMESTAMP_FORMAT));
        let path = self.unique_path(&self.backup_dir.join(&stem), "json").await?;
        self.fs.write(&path, &json).await?;

        info!(
            "Backed up {} service rows to {} ({})",
            rows.len(),
            path.display(),
            reason
        );
        Ok(path)
    }

    /// Copy an existing file to a timestamped sibling before it is overwritten
    pub async fn backup_file(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        if !self.fs.exists(path).await? {
            debug!("No existing file at {}, nothing to back up", path.display());
            return Ok(None);
        }

        let stamped = format!(
            "{}.{}",
            path.display(),
            Utc::now().format(TIMESTAMP_FORMAT)
        );
        let target = self.unique_path(Path::new(&stamped), "bak").await?;
        self.fs.copy(path, &target).await?;

        debug!("Backed up {} to {}", path.display(), target.display());
        Ok(Some(target))
    }

    /// Load a row-set backup written by `backup_rows`
    pub async fn load_rows(&self, path: &Path) -> io::Result<RowSetBackup> {
        let content = self.fs.read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn unique_path(&self, base: &Path, extension: &str) -> io::Result<PathBuf> {
        let base = base.display().to_string();
        let mut candidate = PathBuf::from(format!("{}.{}", base, extension));
        let mut n = 1;
        while self.fs.exists(&candidate).await? {
            candidate = PathBuf::from(format!("{}-{}.{}", base, n, extension));
            n += 1;
        }
        Ok(candidate)
    }
}
