//! End-to-end catalog sync: load → reconcile → apply → snapshot

use std::sync::Arc;
use tracing::{info, warn};

use crate::backup::BackupManager;
use crate::config::CatalogConfig;
use crate::error::CatalogResult;
use crate::fs::ArtifactFs;
use crate::loader::DefinitionLoader;
use crate::reconcile::{ReconcileStats, ReconciliationEngine};
use crate::snapshot::{SnapshotWriteReport, SnapshotWriter};
use crate::store::CatalogStore;

/// Result of a full sync run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub stats: ReconcileStats,
    pub warnings: Vec<String>,
    /// `None` when no snapshot path is configured or the run had item errors
    pub snapshot: Option<SnapshotWriteReport>,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.stats.is_success()
    }
}

/// Run one reconciliation batch as described by `config`.
///
/// Fatal conditions (missing or invalid canonical source, failed backup
/// before a removal, failed snapshot write) return `Err`. Item failures are
/// reported in `SyncOutcome::stats` and suppress snapshot regeneration.
pub async fn sync_catalog(
    config: &CatalogConfig,
    store: Arc<dyn CatalogStore>,
    fs: Arc<dyn ArtifactFs>,
) -> CatalogResult<SyncOutcome> {
    let definitions = DefinitionLoader::new(&config.definitions_path).load()?;

    let backups = Arc::new(BackupManager::new(
        fs.clone(),
        &config.backup_dir,
        &config.environment,
    ));
    let engine = ReconciliationEngine::new(store, backups.clone());

    let plan = engine.reconcile(&definitions, &config.policy()).await?;
    let stats = engine.apply(&plan).await?;
    let mut warnings = plan.warnings.clone();

    let snapshot = match &config.snapshot_path {
        Some(path) if stats.is_success() => {
            let writer = SnapshotWriter::new(fs, backups, config.snapshot_format);
            let document = SnapshotWriter::render(plan.ordered_definitions());
            let report = writer.write(path, &document).await?;
            warnings.extend(report.warnings.iter().cloned());
            Some(report)
        }
        Some(path) => {
            warn!(
                "Skipping snapshot regeneration of {}: {} items failed",
                path.display(),
                stats.errors.len()
            );
            None
        }
        None => None,
    };

    info!(
        "Catalog sync finished ({} warnings, snapshot {})",
        warnings.len(),
        match &snapshot {
            Some(report) if report.unchanged => "unchanged",
            Some(_) => "written",
            None => "not written",
        }
    );

    Ok(SyncOutcome {
        stats,
        warnings,
        snapshot,
    })
}
