//! Service catalog reconciliation pipeline
//!
//! Keeps a service entity consistent across its three representations:
//! persisted rows (legacy flat fields plus a serialized details document),
//! canonical definitions, and the generated static fallback snapshot.
//!
//! ```text
//! DefinitionLoader ──→ ReconciliationEngine ──→ CatalogStore
//!                            │    ├── DetailsCodec
//!                            │    └── BackupManager
//!                            └──→ SnapshotWriter ──→ ArtifactFs
//!                                      └── DurationParser
//! ```

pub mod backup;
pub mod config;
pub mod details_codec;
pub mod duration;
pub mod error;
pub mod fs;
pub mod loader;
#[cfg(feature = "database")]
pub mod postgres;
pub mod reconcile;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod types;

pub use backup::{BackupManager, BackupSubject, RowSetBackup};
pub use config::CatalogConfig;
pub use details_codec::{DetailsCodec, EncodedDetails, DEFAULT_ON_REQUEST};
pub use duration::{average_duration_days, parse_duration, FALLBACK_AVERAGE_DAYS};
pub use error::{CatalogError, CatalogResult};
pub use fs::{ArtifactFs, LocalFs};
pub use loader::{validate_definitions, DefinitionLoader};
#[cfg(feature = "database")]
pub use postgres::PgCatalogStore;
pub use reconcile::{
    resolve_display_order, ItemError, PlanAction, ReconcilePlan, ReconcilePolicy, ReconcileStats,
    ReconciliationEngine,
};
pub use snapshot::{
    render_snapshot, SnapshotDocument, SnapshotEntry, SnapshotFormat, SnapshotWriteReport,
    SnapshotWriter,
};
pub use store::{CatalogStore, MemoryCatalogStore};
pub use sync::{sync_catalog, SyncOutcome};
pub use types::{
    DetailsDocument, FlatDetails, PersistedServiceRow, ServiceDefinition, ServiceDetails,
    ServiceKey, ServiceRowWrite,
};
