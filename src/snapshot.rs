//! Static catalog snapshot
//!
//! The snapshot is the fallback copy of the catalog that presentation code
//! reads when the primary store is unreachable. It is derived output:
//! rendered from canonical definitions alone, regenerated in full on every
//! write, never patched or hand-edited.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backup::BackupManager;
use crate::details_codec::DetailsCodec;
use crate::duration::average_duration_days;
use crate::error::{CatalogError, CatalogResult};
use crate::fs::ArtifactFs;
use crate::reconcile::resolve_display_order;
use crate::types::{ServiceDefinition, ServiceDetails};

pub const GENERATED_NOTICE: &str =
    "AUTO-GENERATED from the canonical service definitions. DO NOT EDIT: changes are lost on regeneration.";

/// Output layout of the snapshot file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    /// ES module exporting the entries, for bundlers that import it directly
    Typescript,
}

/// One snapshot entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    pub details: ServiceDetails,
    pub display_order: i32,
    pub average_duration_days: u32,
}

/// Rendered snapshot, entries in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    #[serde(rename = "_notice")]
    pub notice: String,
    /// SHA-256 of the canonical input, identical input gives an identical file
    pub source_hash: String,
    pub services: Vec<SnapshotEntry>,
}

/// What `write` did
#[derive(Debug, Clone, Default)]
pub struct SnapshotWriteReport {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
    pub entries: usize,
    /// Existing file already held these exact bytes; nothing was written
    pub unchanged: bool,
    pub warnings: Vec<String>,
}

pub struct SnapshotWriter {
    fs: Arc<dyn ArtifactFs>,
    backups: Arc<BackupManager>,
    format: SnapshotFormat,
}

impl SnapshotWriter {
    pub fn new(
        fs: Arc<dyn ArtifactFs>,
        backups: Arc<BackupManager>,
        format: SnapshotFormat,
    ) -> Self {
        Self {
            fs,
            backups,
            format,
        }
    }

    /// Render definitions into snapshot entries.
    ///
    /// Entries keep the order of `definitions` (pass the planned order) and
    /// are numbered densely from 1, using the same rule as the engine.
    pub fn render(definitions: &[ServiceDefinition]) -> SnapshotDocument {
        let (indices, _) = resolve_display_order(definitions, &[]);

        let services = indices
            .iter()
            .zip(1..)
            .map(|(&i, order)| {
                let def = &definitions[i];
                let details = DetailsCodec::resolve(&def.details);
                let average =
                    average_duration_days(&details.capture_duration, &details.treatment_duration);
                SnapshotEntry {
                    name: def.name.clone(),
                    description: def.description.clone(),
                    base_price: def.base_price,
                    details,
                    display_order: order,
                    average_duration_days: average,
                }
            })
            .collect();

        SnapshotDocument {
            notice: GENERATED_NOTICE.to_string(),
            source_hash: source_hash(definitions),
            services,
        }
    }

    /// Serialize a document in this writer's format
    pub fn to_text(&self, document: &SnapshotDocument) -> CatalogResult<String> {
        match self.format {
            SnapshotFormat::Json => {
                let mut text = serde_json::to_string_pretty(document)?;
                text.push('\n');
                Ok(text)
            }
            SnapshotFormat::Typescript => {
                let entries = serde_json::to_string_pretty(&document.services)?;
                Ok(format!(
                    "// {notice}\n// source-hash: {hash}\n\nexport const servicesFallback = {entries};\n\nexport default servicesFallback;\n",
                    notice = document.notice,
                    hash = document.source_hash,
                    entries = entries,
                ))
            }
        }
    }

    /// Back up the existing file (best effort), then overwrite it.
    ///
    /// A file that already holds the rendered bytes is left alone, with no
    /// backup taken.
    pub async fn write(
        &self,
        path: &Path,
        document: &SnapshotDocument,
    ) -> CatalogResult<SnapshotWriteReport> {
        let mut report = SnapshotWriteReport {
            path: path.to_path_buf(),
            entries: document.services.len(),
            ..Default::default()
        };

        let text = self.to_text(document)?;
        if let Ok(existing) = self.fs.read_to_string(path).await {
            if existing == text {
                debug!(
                    "Snapshot {} is up to date (source hash {})",
                    path.display(),
                    document.source_hash
                );
                report.unchanged = true;
                return Ok(report);
            }
        }

        match self.backups.backup_file(path).await {
            Ok(backup) => report.backup = backup,
            Err(e) => {
                let msg = format!(
                    "Could not back up {} before regenerating: {}",
                    path.display(),
                    e
                );
                warn!("{}", msg);
                report.warnings.push(msg);
            }
        }

        self.fs
            .write(path, text.as_bytes())
            .await
            .map_err(|source| CatalogError::SnapshotWrite {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "Wrote catalog snapshot with {} entries to {}",
            report.entries,
            path.display()
        );
        Ok(report)
    }
}

/// Render a snapshot document from canonical definitions
pub fn render_snapshot(definitions: &[ServiceDefinition]) -> SnapshotDocument {
    SnapshotWriter::render(definitions)
}

fn source_hash(definitions: &[ServiceDefinition]) -> String {
    let mut hasher = Sha256::new();
    for def in definitions {
        // Serialization of plain data structs cannot fail
        let bytes = serde_json::to_vec(def).unwrap_or_default();
        hasher.update(&bytes);
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details_codec::DEFAULT_ON_REQUEST;
    use crate::fs::LocalFs;
    use tempfile::tempdir;

    fn def(name: &str, capture: &str, treatment: &str, order: Option<i32>) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            description: String::new(),
            base_price: Decimal::new(35000, 2),
            details: ServiceDetails {
                capture_duration: capture.to_string(),
                treatment_duration: treatment.to_string(),
                ..Default::default()
            },
            display_order: order,
        }
    }

    /// Local disk, except that copies (backups) always fail
    struct NoCopyFs(LocalFs);

    #[async_trait::async_trait]
    impl ArtifactFs for NoCopyFs {
        async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
            self.0.read_to_string(path).await
        }

        async fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
            self.0.write(path, contents).await
        }

        async fn copy(&self, _src: &Path, _dst: &Path) -> std::io::Result<()> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "copy refused",
            ))
        }

        async fn exists(&self, path: &Path) -> std::io::Result<bool> {
            self.0.exists(path).await
        }

        async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
            self.0.create_dir_all(path).await
        }
    }

    fn writer(dir: &Path, format: SnapshotFormat) -> SnapshotWriter {
        let fs: Arc<dyn ArtifactFs> = Arc::new(LocalFs::new());
        let backups = Arc::new(BackupManager::new(fs.clone(), dir.join("backups"), "test"));
        SnapshotWriter::new(fs, backups, format)
    }

    #[test]
    fn test_render_orders_and_defaults() {
        let defs = vec![
            def("B", "2 a 4 horas", "10 dias úteis", Some(2)),
            def("A", "", "", Some(1)),
        ];
        let doc = render_snapshot(&defs);

        // Input order wins over authored display_order
        assert_eq!(doc.services[0].name, "B");
        assert_eq!(doc.services[0].display_order, 1);
        assert_eq!(doc.services[0].average_duration_days, 7);

        assert_eq!(doc.services[1].name, "A");
        assert_eq!(doc.services[1].display_order, 2);
        assert_eq!(doc.services[1].average_duration_days, 3);
        assert_eq!(doc.services[1].details.capture_duration, DEFAULT_ON_REQUEST);
    }

    #[test]
    fn test_render_is_deterministic() {
        let defs = vec![def("A", "1 dia", "5 dias", None)];
        assert_eq!(render_snapshot(&defs), render_snapshot(&defs));

        let changed = vec![def("A", "1 dia", "6 dias", None)];
        assert_ne!(
            render_snapshot(&defs).source_hash,
            render_snapshot(&changed).source_hash
        );
    }

    #[tokio::test]
    async fn test_write_json_and_backup_previous() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("services.generated.json");
        std::fs::write(&path, "hand edited").unwrap();

        let writer = writer(dir.path(), SnapshotFormat::Json);
        let doc = render_snapshot(&[def("A", "1 dia", "", None)]);
        let report = writer.write(&path, &doc).await.unwrap();

        let backup = report.backup.expect("previous file backed up");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "hand edited");
        assert!(report.warnings.is_empty());

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: SnapshotDocument = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, doc);
        assert!(written.contains("DO NOT EDIT"));
        assert!(written.contains("\"basePrice\": 350.0"));
    }

    #[tokio::test]
    async fn test_write_typescript_module() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servicesFallback.ts");

        let writer = writer(dir.path(), SnapshotFormat::Typescript);
        let doc = render_snapshot(&[def("A", "1 dia", "", None)]);
        let report = writer.write(&path, &doc).await.unwrap();
        assert!(report.backup.is_none());

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("// AUTO-GENERATED"));
        assert!(written.contains(&format!("// source-hash: {}", doc.source_hash)));
        assert!(written.contains("export const servicesFallback = ["));
        assert!(written.contains("\"averageDurationDays\": 1"));
    }

    #[tokio::test]
    async fn test_failed_backup_still_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servicesFallback.json");
        std::fs::write(&path, "previous contents").unwrap();

        let fs: Arc<dyn ArtifactFs> = Arc::new(NoCopyFs(LocalFs::new()));
        let backups = Arc::new(BackupManager::new(fs.clone(), dir.path(), "test"));
        let writer = SnapshotWriter::new(fs, backups, SnapshotFormat::Json);

        let doc = render_snapshot(&[def("A", "1 dia", "", None)]);
        let report = writer.write(&path, &doc).await.unwrap();

        assert!(report.backup.is_none());
        assert!(!report.unchanged);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("copy refused"));

        let written: SnapshotDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, doc);
    }

    #[tokio::test]
    async fn test_identical_snapshot_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servicesFallback.json");
        let writer = writer(dir.path(), SnapshotFormat::Json);
        let doc = render_snapshot(&[def("A", "1 dia", "", None)]);

        let first = writer.write(&path, &doc).await.unwrap();
        assert!(!first.unchanged);

        let second = writer.write(&path, &doc).await.unwrap();
        assert!(second.unchanged);
        assert!(second.backup.is_none());

        let siblings = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(siblings, 1);

        // A changed source is backed up and rewritten
        let changed = render_snapshot(&[def("A", "2 dias", "", None)]);
        let third = writer.write(&path, &changed).await.unwrap();
        assert!(!third.unchanged);
        assert!(third.backup.is_some());
    }
}
