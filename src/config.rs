//! Catalog sync configuration: YAML file plus environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::reconcile::ReconcilePolicy;
use crate::snapshot::SnapshotFormat;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "CATALOG_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/catalog.yaml";

/// Root catalog configuration loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Canonical definitions file (YAML or JSON)
    pub definitions_path: PathBuf,

    /// Where to regenerate the static fallback; no snapshot when absent
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    #[serde(default)]
    pub snapshot_format: SnapshotFormat,

    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Recorded in row-set backups
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub priority_order: Vec<String>,

    #[serde(default)]
    pub force_update: bool,

    #[serde(default)]
    pub delete_existing: bool,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_environment() -> String {
    "development".to_string()
}

impl CatalogConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Parsing {}", path.display()))
    }

    /// Load the file named by `CATALOG_CONFIG` (default `config/catalog.yaml`)
    /// and apply `CATALOG_*` overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from_file(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup.
    ///
    /// Recognized keys: `CATALOG_FORCE_UPDATE`, `CATALOG_DELETE_EXISTING`,
    /// `CATALOG_ENV`, `CATALOG_SNAPSHOT_PATH`, `CATALOG_BACKUP_DIR`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CATALOG_FORCE_UPDATE").and_then(|v| parse_flag(&v)) {
            self.force_update = v;
        }
        if let Some(v) = lookup("CATALOG_DELETE_EXISTING").and_then(|v| parse_flag(&v)) {
            self.delete_existing = v;
        }
        if let Some(v) = lookup("CATALOG_ENV").filter(|v| !v.is_empty()) {
            self.environment = v;
        }
        if let Some(v) = lookup("CATALOG_SNAPSHOT_PATH").filter(|v| !v.is_empty()) {
            self.snapshot_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CATALOG_BACKUP_DIR").filter(|v| !v.is_empty()) {
            self.backup_dir = PathBuf::from(v);
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            force_update: self.force_update,
            delete_existing: self.delete_existing,
            priority_order: self.priority_order.clone(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
