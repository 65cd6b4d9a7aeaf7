//! Canonical definition loader
//!
//! Loads the authoritative service list from a YAML or JSON file.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CatalogError, CatalogResult};
use crate::types::ServiceDefinition;

/// Root of a canonical definitions file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionFile {
    #[serde(default)]
    pub description: Option<String>,
    pub services: Vec<ServiceDefinition>,
}

/// Loads canonical service definitions from disk
pub struct DefinitionLoader {
    path: PathBuf,
}

impl DefinitionLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load and validate all definitions.
    ///
    /// `.json` files are parsed as JSON, anything else as YAML. Both accept
    /// either a `services:` root or a bare list.
    pub fn load(&self) -> CatalogResult<Vec<ServiceDefinition>> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| CatalogError::SourceRead {
                path: self.path.clone(),
                source,
            })?;

        let is_json = self
            .path
            .extension()
            .map(|ext| ext == "json")
            .unwrap_or(false);

        let definitions = if is_json {
            parse_json(&content)?
        } else {
            parse_yaml(&content)?
        };

        validate_definitions(&definitions)?;
        info!(
            "Loaded {} canonical service definitions from {}",
            definitions.len(),
            self.path.display()
        );
        Ok(definitions)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionSource {
    File(DefinitionFile),
    List(Vec<ServiceDefinition>),
}

impl DefinitionSource {
    fn into_definitions(self) -> Vec<ServiceDefinition> {
        match self {
            DefinitionSource::File(file) => file.services,
            DefinitionSource::List(list) => list,
        }
    }
}

fn parse_yaml(content: &str) -> CatalogResult<Vec<ServiceDefinition>> {
    if content.trim().is_empty() {
        return Err(CatalogError::EmptyCanonicalSource);
    }
    let source: DefinitionSource = serde_yaml::from_str(content)?;
    Ok(source.into_definitions())
}

fn parse_json(content: &str) -> CatalogResult<Vec<ServiceDefinition>> {
    if content.trim().is_empty() {
        return Err(CatalogError::EmptyCanonicalSource);
    }
    let source: DefinitionSource = serde_json::from_str(content)?;
    Ok(source.into_definitions())
}

/// Reject a definition set that cannot be reconciled.
///
/// Empty sets, blank or duplicate names, and negative prices are fatal.
pub fn validate_definitions(definitions: &[ServiceDefinition]) -> CatalogResult<()> {
    if definitions.is_empty() {
        return Err(CatalogError::EmptyCanonicalSource);
    }

    let mut seen = HashSet::new();
    for def in definitions {
        if def.name.trim().is_empty() {
            return Err(CatalogError::InvalidDefinition {
                name: def.name.clone(),
                reason: "name is blank".to_string(),
            });
        }
        if def.base_price < Decimal::ZERO {
            return Err(CatalogError::InvalidDefinition {
                name: def.name.clone(),
                reason: format!("negative base price {}", def.base_price),
            });
        }
        if !seen.insert(def.name.as_str()) {
            return Err(CatalogError::DuplicateDefinition {
                name: def.name.clone(),
            });
        }
    }

    Ok(())
}
