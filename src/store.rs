use crate::types::{PersistedServiceRow, ServiceKey, ServiceRowWrite};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// Persistence trait for the service catalog.
///
/// The reconciliation engine reads and mutates the catalog exclusively
/// through this trait (MemoryCatalogStore for tests and dry runs, Postgres
/// behind the `database` feature).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All rows, in store order (ascending key)
    async fn list_services(&self) -> Result<Vec<PersistedServiceRow>>;

    async fn create_service(&self, row: &ServiceRowWrite) -> Result<ServiceKey>;
    async fn update_service(&self, key: ServiceKey, row: &ServiceRowWrite) -> Result<()>;
    async fn delete_service(&self, key: ServiceKey) -> Result<()>;

    /// Remove every row. Returns the number of rows removed.
    async fn delete_all_services(&self) -> Result<u64>;
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<PersistedServiceRow>,
    next_id: ServiceKey,
    failing_names: HashSet<String>,
    delete_all_calls: usize,
}

/// In-memory catalog store
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    state: RwLock<MemoryState>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing rows (ids preserved, possibly duplicated by name)
    pub fn with_rows(rows: Vec<PersistedServiceRow>) -> Self {
        let next_id = rows.iter().map(|r| r.id).max().unwrap_or(0);
        Self {
            state: RwLock::new(MemoryState {
                rows,
                next_id,
                ..Default::default()
            }),
        }
    }

    /// Make create/update fail for rows with this name
    pub async fn fail_writes_for(&self, name: &str) {
        self.state
            .write()
            .await
            .failing_names
            .insert(name.to_string());
    }

    /// Number of times `delete_all_services` was invoked
    pub async fn delete_all_calls(&self) -> usize {
        self.state.read().await.delete_all_calls
    }

    pub async fn find_by_name(&self, name: &str) -> Vec<PersistedServiceRow> {
        self.state
            .read()
            .await
            .rows
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn list_services(&self) -> Result<Vec<PersistedServiceRow>> {
        let state = self.state.read().await;
        let mut rows = state.rows.clone();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn create_service(&self, row: &ServiceRowWrite) -> Result<ServiceKey> {
        let mut state = self.state.write().await;
        if state.failing_names.contains(&row.name) {
            bail!("simulated write failure for '{}'", row.name);
        }

        state.next_id += 1;
        let id = state.next_id;
        state.rows.push(PersistedServiceRow::from_write(id, row));
        Ok(id)
    }

    async fn update_service(&self, key: ServiceKey, row: &ServiceRowWrite) -> Result<()> {
        let mut state = self.state.write().await;
        if state.failing_names.contains(&row.name) {
            bail!("simulated write failure for '{}'", row.name);
        }

        let Some(existing) = state.rows.iter_mut().find(|r| r.id == key) else {
            bail!("service {} not found", key);
        };
        *existing = PersistedServiceRow::from_write(key, row);
        Ok(())
    }

    async fn delete_service(&self, key: ServiceKey) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.rows.len();
        state.rows.retain(|r| r.id != key);
        if state.rows.len() == before {
            bail!("service {} not found", key);
        }
        Ok(())
    }

    async fn delete_all_services(&self) -> Result<u64> {
        let mut state = self.state.write().await;
        state.delete_all_calls += 1;
        let removed = state.rows.len() as u64;
        state.rows.clear();
        Ok(removed)
    }
}
