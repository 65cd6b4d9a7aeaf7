//! Catalog data model
//!
//! ```text
//! ServiceDefinition (canonical, authored externally)
//!        ↓ DetailsCodec::encode
//! ServiceRowWrite (document + flat mirror from the same values)
//!        ↓ CatalogStore
//! PersistedServiceRow (may carry legacy divergence)
//!        ↓ DetailsCodec::decode
//! ServiceDetails (always fully populated)
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Store key of a persisted service row
pub type ServiceKey = i64;

/// The five free-text detail fields of a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDetails {
    #[serde(alias = "capture_duration")]
    pub capture_duration: String,
    #[serde(alias = "treatment_duration")]
    pub treatment_duration: String,
    pub deliverables: String,
    #[serde(alias = "add_ons")]
    pub add_ons: String,
    #[serde(alias = "travel_fee")]
    pub travel_fee: String,
}

/// Canonical service definition, the source of truth for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "base_price")]
    pub base_price: Decimal,
    #[serde(default)]
    pub details: ServiceDetails,
    /// Resolved position; any authored value is replaced during planning
    #[serde(default, alias = "display_order")]
    pub display_order: Option<i32>,
}

/// Stored details sub-document
///
/// Rows read from a text column carry `Text`; stores with a JSON column
/// (or rows restored from a backup) may already hold `Structured`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailsDocument {
    Structured(Map<String, JsonValue>),
    Text(String),
}

/// Legacy flat mirror of the details fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatDetails {
    pub capture_duration: Option<String>,
    pub treatment_duration: Option<String>,
    pub deliverables: Option<String>,
    pub add_ons: Option<String>,
    pub travel_fee: Option<String>,
}

impl From<&ServiceDetails> for FlatDetails {
    fn from(details: &ServiceDetails) -> Self {
        Self {
            capture_duration: Some(details.capture_duration.clone()),
            treatment_duration: Some(details.treatment_duration.clone()),
            deliverables: Some(details.deliverables.clone()),
            add_ons: Some(details.add_ons.clone()),
            travel_fee: Some(details.travel_fee.clone()),
        }
    }
}

/// A service row as read from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedServiceRow {
    pub id: ServiceKey,
    pub name: String,
    pub description: String,
    pub base_price: Decimal,
    pub display_order: Option<i32>,
    pub details_document: Option<DetailsDocument>,
    #[serde(flatten)]
    pub flat: FlatDetails,
}

impl PersistedServiceRow {
    /// Materialize the row a store would hold after persisting `write` under `id`
    pub fn from_write(id: ServiceKey, write: &ServiceRowWrite) -> Self {
        Self {
            id,
            name: write.name.clone(),
            description: write.description.clone(),
            base_price: write.base_price,
            display_order: Some(write.display_order),
            details_document: Some(DetailsDocument::Text(write.details_document.clone())),
            flat: write.flat.clone(),
        }
    }
}

/// Full row payload for create/update mutations
///
/// `details_document` and `flat` are always produced together by
/// `DetailsCodec::encode`, so they describe the same values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRowWrite {
    pub name: String,
    pub description: String,
    pub base_price: Decimal,
    pub display_order: i32,
    pub details_document: String,
    pub flat: FlatDetails,
}
