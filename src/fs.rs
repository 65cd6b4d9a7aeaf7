//! Artifact filesystem abstraction
//!
//! Snapshot files and backups are written through this trait so the
//! pipeline can target the local disk or a test double that fails on demand.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// File I/O used by the snapshot writer and backup manager
#[async_trait]
pub trait ArtifactFs: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write `contents`, creating or truncating the file
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    async fn copy(&self, src: &Path, dst: &Path) -> io::Result<()>;

    async fn exists(&self, path: &Path) -> io::Result<bool>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// Local filesystem implementation backed by `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    root: Option<PathBuf>,
}

impl LocalFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root` instead of the process cwd
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ArtifactFs for LocalFs {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(self.resolve(path)).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let path = self.resolve(path);

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&path, contents).await
    }

    async fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        tokio::fs::copy(self.resolve(src), self.resolve(dst)).await?;
        Ok(())
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(self.resolve(path)).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)).await
    }
}
