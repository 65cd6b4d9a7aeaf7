//! Details sub-document codec
//!
//! The details of a service live twice in a row: as a serialized
//! sub-document and as a legacy flat mirror. This module is the single
//! place that decides which source wins:
//!
//! ```text
//! document field (non-blank) → flat mirror field (non-blank) → literal default
//! ```
//!
//! Writes always go through `encode`, which produces the document and the
//! flat mirror from the same values.

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::types::{DetailsDocument, FlatDetails, PersistedServiceRow, ServiceDetails};

/// Default for duration and travel fields that carry no value
pub const DEFAULT_ON_REQUEST: &str = "Sob consulta";

// Document keys
const KEY_CAPTURE_DURATION: &str = "captureDuration";
const KEY_TREATMENT_DURATION: &str = "treatmentDuration";
const KEY_DELIVERABLES: &str = "deliverables";
const KEY_ADD_ONS: &str = "addOns";
const KEY_TRAVEL_FEE: &str = "travelFee";

/// Serialized details plus the flat-mirror equivalent of the same values
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDetails {
    pub document: String,
    pub flat: FlatDetails,
}

/// Stateless codec between `ServiceDetails` and the stored representations
pub struct DetailsCodec;

impl DetailsCodec {
    /// Decode the details of a stored row.
    ///
    /// Never fails: a malformed document degrades to an empty structure and
    /// every field is then backfilled from the flat mirror and defaults.
    pub fn decode(row: &PersistedServiceRow) -> ServiceDetails {
        let document = match &row.details_document {
            Some(DetailsDocument::Structured(map)) => map.clone(),
            Some(DetailsDocument::Text(text)) => Self::parse_document_text(&row.name, text),
            None => Map::new(),
        };

        let flat = &row.flat;
        ServiceDetails {
            capture_duration: pick(
                document_field(&document, KEY_CAPTURE_DURATION),
                flat.capture_duration.as_deref(),
                DEFAULT_ON_REQUEST,
            ),
            treatment_duration: pick(
                document_field(&document, KEY_TREATMENT_DURATION),
                flat.treatment_duration.as_deref(),
                DEFAULT_ON_REQUEST,
            ),
            deliverables: pick(
                document_field(&document, KEY_DELIVERABLES),
                flat.deliverables.as_deref(),
                "",
            ),
            add_ons: pick(
                document_field(&document, KEY_ADD_ONS),
                flat.add_ons.as_deref(),
                "",
            ),
            travel_fee: pick(
                document_field(&document, KEY_TRAVEL_FEE),
                flat.travel_fee.as_deref(),
                DEFAULT_ON_REQUEST,
            ),
        }
    }

    /// Apply the same defaulting to canonical (authored) details
    pub fn resolve(details: &ServiceDetails) -> ServiceDetails {
        let authored = |value: &str, default: &str| pick(None, Some(value), default);
        ServiceDetails {
            capture_duration: authored(&details.capture_duration, DEFAULT_ON_REQUEST),
            treatment_duration: authored(&details.treatment_duration, DEFAULT_ON_REQUEST),
            deliverables: authored(&details.deliverables, ""),
            add_ons: authored(&details.add_ons, ""),
            travel_fee: authored(&details.travel_fee, DEFAULT_ON_REQUEST),
        }
    }

    /// Encode fully-populated details into the storage document and flat mirror
    pub fn encode(details: &ServiceDetails) -> EncodedDetails {
        let mut document = Map::new();
        document.insert(
            KEY_CAPTURE_DURATION.to_string(),
            JsonValue::String(details.capture_duration.clone()),
        );
        document.insert(
            KEY_TREATMENT_DURATION.to_string(),
            JsonValue::String(details.treatment_duration.clone()),
        );
        document.insert(
            KEY_DELIVERABLES.to_string(),
            JsonValue::String(details.deliverables.clone()),
        );
        document.insert(
            KEY_ADD_ONS.to_string(),
            JsonValue::String(details.add_ons.clone()),
        );
        document.insert(
            KEY_TRAVEL_FEE.to_string(),
            JsonValue::String(details.travel_fee.clone()),
        );

        EncodedDetails {
            document: JsonValue::Object(document).to_string(),
            flat: FlatDetails::from(details),
        }
    }

    /// Whether the row carries its own details document and the flat mirror
    /// describes the same values.
    ///
    /// A row without a document is never consistent, however complete its
    /// flat mirror is.
    pub fn is_consistent(row: &PersistedServiceRow) -> bool {
        if row.details_document.is_none() {
            return false;
        }

        let from_document_only = Self::decode(&PersistedServiceRow {
            flat: FlatDetails::default(),
            ..row.clone()
        });
        let from_flat_only = Self::decode(&PersistedServiceRow {
            details_document: None,
            ..row.clone()
        });
        from_document_only == from_flat_only
    }

    fn parse_document_text(name: &str, text: &str) -> Map<String, JsonValue> {
        if text.trim().is_empty() {
            return Map::new();
        }

        match serde_json::from_str::<JsonValue>(text) {
            Ok(JsonValue::Object(map)) => map,
            // Legacy writers stringified the document twice
            Ok(JsonValue::String(inner)) => match serde_json::from_str::<JsonValue>(&inner) {
                Ok(JsonValue::Object(map)) => {
                    debug!("Unwrapped double-encoded details document for '{}'", name);
                    map
                }
                _ => {
                    warn!(
                        "Details document for '{}' is a string, not an object; using defaults",
                        name
                    );
                    Map::new()
                }
            },
            Ok(other) => {
                warn!(
                    "Details document for '{}' is not an object ({}); using defaults",
                    name,
                    json_kind(&other)
                );
                Map::new()
            }
            Err(e) => {
                warn!(
                    "Failed to parse details document for '{}': {}; using defaults",
                    name, e
                );
                Map::new()
            }
        }
    }
}

/// Read a field from a decoded document as text.
///
/// Arrays of strings (list-like fields written by older editors) are joined;
/// numbers and booleans are stringified; null and nested objects count as absent.
fn document_field(document: &Map<String, JsonValue>, key: &str) -> Option<String> {
    match document.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    JsonValue::String(s) => Some(s.trim().to_string()),
                    JsonValue::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect();
            Some(parts.join(", "))
        }
        JsonValue::Null | JsonValue::Object(_) => None,
    }
}

/// First non-blank candidate, else the default
fn pick(document: Option<String>, flat: Option<&str>, default: &str) -> String {
    document
        .filter(|s| !s.trim().is_empty())
        .or_else(|| flat.filter(|s| !s.trim().is_empty()).map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
