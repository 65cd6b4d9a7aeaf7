//! Reconciliation Engine
//!
//! Aligns persisted service rows with a list of canonical definitions.
//!
//! # Flow
//!
//! ```text
//! canonical definitions ─┐
//!                        ├─ plan() ──→ ReconcilePlan ── apply() ──→ ReconcileStats
//! store rows ────────────┘                                │
//!                                                         ├── backup rows (before any removal)
//!                                                         ├── delete all | delete duplicates
//!                                                         └── create / update / re-order, one by one
//! ```
//!
//! Planning is pure. Application is best-effort: a failing item is recorded
//! in `ReconcileStats::errors` and the batch moves on. The only fatal
//! conditions are an empty canonical source, invalid definitions, and a
//! failed backup in front of a removal.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backup::{BackupManager, BackupSubject};
use crate::details_codec::DetailsCodec;
use crate::error::{CatalogError, CatalogResult};
use crate::loader::validate_definitions;
use crate::store::CatalogStore;
use crate::types::{
    PersistedServiceRow, ServiceDefinition, ServiceDetails, ServiceKey, ServiceRowWrite,
};

// =============================================================================
// POLICY / PLAN / STATS
// =============================================================================

/// Caller-supplied policy for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Overwrite content of rows that already exist
    pub force_update: bool,
    /// Replace the whole catalog (backup first)
    pub delete_existing: bool,
    /// Names that must come first, in this order
    pub priority_order: Vec<String>,
}

/// One planned mutation, carrying its resolved display order
#[derive(Debug, Clone, PartialEq)]
pub enum PlanAction {
    Create {
        definition: ServiceDefinition,
        order: i32,
    },
    Update {
        key: ServiceKey,
        definition: ServiceDefinition,
        order: i32,
    },
    /// Content is left untouched; order is re-asserted when it differs
    Skip {
        current: PersistedServiceRow,
        order: i32,
    },
}

impl PlanAction {
    pub fn name(&self) -> &str {
        match self {
            PlanAction::Create { definition, .. } | PlanAction::Update { definition, .. } => {
                &definition.name
            }
            PlanAction::Skip { current, .. } => &current.name,
        }
    }

    pub fn order(&self) -> i32 {
        match self {
            PlanAction::Create { order, .. }
            | PlanAction::Update { order, .. }
            | PlanAction::Skip { order, .. } => *order,
        }
    }
}

/// Result of planning: what will be removed and what will be written
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Whole-table replacement requested
    pub delete_existing: bool,
    /// Rows this plan removes: every row when `delete_existing`, otherwise
    /// later duplicates of an already-seen name. Backed up before removal.
    pub removals: Vec<PersistedServiceRow>,
    /// Mutations in resolved display order
    pub actions: Vec<PlanAction>,
    /// Canonical definitions in resolved order, `display_order` filled in
    pub ordered: Vec<ServiceDefinition>,
    /// Non-fatal findings (unknown priority names, orphaned rows)
    pub warnings: Vec<String>,
}

impl ReconcilePlan {
    pub fn creates(&self) -> usize {
        self.count(|a| matches!(a, PlanAction::Create { .. }))
    }

    pub fn updates(&self) -> usize {
        self.count(|a| matches!(a, PlanAction::Update { .. }))
    }

    pub fn skips(&self) -> usize {
        self.count(|a| matches!(a, PlanAction::Skip { .. }))
    }

    /// Canonical definitions in display order, for snapshot rendering
    pub fn ordered_definitions(&self) -> &[ServiceDefinition] {
        &self.ordered
    }

    fn count(&self, f: impl Fn(&PlanAction) -> bool) -> usize {
        self.actions.iter().filter(|a| f(a)).count()
    }
}

/// A single item that failed during `apply`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub name: String,
    pub operation: &'static str,
    pub message: String,
}

/// Outcome of `apply`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    /// Skipped rows whose display order was corrected
    pub reordered: usize,
    pub errors: Vec<ItemError>,
    pub duration_ms: u64,
}

impl ReconcileStats {
    /// True only when no item failed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_error(&mut self, name: &str, operation: &'static str, err: anyhow::Error) {
        error!("Failed to {} service '{}': {:#}", operation, name, err);
        self.errors.push(ItemError {
            name: name.to_string(),
            operation,
            message: format!("{:#}", err),
        });
    }
}

impl std::fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Catalog reconciliation:")?;
        writeln!(f, "  Created: {}", self.created)?;
        writeln!(f, "  Updated: {}", self.updated)?;
        writeln!(f, "  Skipped: {} ({} re-ordered)", self.skipped, self.reordered)?;
        writeln!(f, "  Deleted: {}", self.deleted)?;
        writeln!(f, "  Errors: {}", self.errors.len())?;
        for e in &self.errors {
            writeln!(f, "    - {} ({}): {}", e.name, e.operation, e.message)?;
        }
        Ok(())
    }
}

// =============================================================================
// ORDER RESOLUTION
// =============================================================================

/// Resolve display order, returning definition indices in display order.
///
/// Priority names present in `definitions` come first, in list order; the
/// rest follow in input order. A definition's own `display_order` never
/// affects placement, with or without a priority list.
pub fn resolve_display_order(
    definitions: &[ServiceDefinition],
    priority_order: &[String],
) -> (Vec<usize>, Vec<String>) {
    let mut warnings = Vec::new();

    let by_name: HashMap<&str, usize> = definitions
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    let mut indices = Vec::with_capacity(definitions.len());
    let mut placed = HashSet::new();

    for name in priority_order {
        match by_name.get(name.as_str()) {
            Some(&i) => {
                if placed.insert(i) {
                    indices.push(i);
                }
            }
            None => {
                let msg = format!("Priority entry '{}' has no canonical definition", name);
                warn!("{}", msg);
                warnings.push(msg);
            }
        }
    }

    indices.extend((0..definitions.len()).filter(|i| !placed.contains(i)));
    (indices, warnings)
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct ReconciliationEngine {
    store: Arc<dyn CatalogStore>,
    backups: Arc<BackupManager>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn CatalogStore>, backups: Arc<BackupManager>) -> Self {
        Self { store, backups }
    }

    /// Read current rows from the store and plan against them
    pub async fn reconcile(
        &self,
        definitions: &[ServiceDefinition],
        policy: &ReconcilePolicy,
    ) -> CatalogResult<ReconcilePlan> {
        let current = self.store.list_services().await?;
        debug!("Loaded {} persisted service rows", current.len());
        Self::plan(definitions, &current, policy)
    }

    /// Compute the plan for `definitions` against `current` rows.
    ///
    /// Pure: nothing is read or written.
    pub fn plan(
        definitions: &[ServiceDefinition],
        current: &[PersistedServiceRow],
        policy: &ReconcilePolicy,
    ) -> CatalogResult<ReconcilePlan> {
        validate_definitions(definitions)?;

        let (indices, mut warnings) =
            resolve_display_order(definitions, &policy.priority_order);

        let ordered: Vec<ServiceDefinition> = indices
            .iter()
            .zip(1..)
            .map(|(&i, order)| ServiceDefinition {
                display_order: Some(order),
                ..definitions[i].clone()
            })
            .collect();

        if policy.delete_existing {
            let actions = ordered
                .iter()
                .map(|d| PlanAction::Create {
                    definition: d.clone(),
                    order: d.display_order.unwrap_or_default(),
                })
                .collect();

            info!(
                "Planned catalog replacement: {} rows removed, {} created",
                current.len(),
                ordered.len()
            );
            return Ok(ReconcilePlan {
                delete_existing: true,
                removals: current.to_vec(),
                actions,
                ordered,
                warnings,
            });
        }

        // First-seen row per name is canonical; later ones are duplicates
        let mut by_name: HashMap<&str, &PersistedServiceRow> = HashMap::new();
        let mut removals = Vec::new();
        for row in current {
            if by_name.contains_key(row.name.as_str()) {
                warn!(
                    "Duplicate service row '{}' (id {}) scheduled for removal",
                    row.name, row.id
                );
                removals.push(row.clone());
            } else {
                by_name.insert(row.name.as_str(), row);
            }
        }

        let canonical_names: HashSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        let dense_range = 1..=ordered.len() as i32;
        for (name, row) in by_name.iter().filter(|(n, _)| !canonical_names.contains(*n)) {
            let msg = match row.display_order {
                Some(order) if dense_range.contains(&order) => format!(
                    "Service row '{}' has no canonical definition (left as is); \
                     its display order {} collides with the canonical range 1..={}",
                    name,
                    order,
                    ordered.len()
                ),
                Some(order) => format!(
                    "Service row '{}' has no canonical definition (left as is, display order {})",
                    name, order
                ),
                None => format!(
                    "Service row '{}' has no canonical definition (left as is, no display order)",
                    name
                ),
            };
            warn!("{}", msg);
            warnings.push(msg);
        }
        // HashMap iteration order is arbitrary; keep warnings deterministic
        warnings.sort();

        let actions = ordered
            .iter()
            .map(|d| {
                let order = d.display_order.unwrap_or_default();
                match by_name.get(d.name.as_str()) {
                    None => PlanAction::Create {
                        definition: d.clone(),
                        order,
                    },
                    Some(row) if policy.force_update => PlanAction::Update {
                        key: row.id,
                        definition: d.clone(),
                        order,
                    },
                    Some(row) => PlanAction::Skip {
                        current: (*row).clone(),
                        order,
                    },
                }
            })
            .collect::<Vec<_>>();

        let plan = ReconcilePlan {
            delete_existing: false,
            removals,
            actions,
            ordered,
            warnings,
        };

        info!(
            "Planned reconciliation: {} create, {} update, {} skip, {} duplicate removals",
            plan.creates(),
            plan.updates(),
            plan.skips(),
            plan.removals.len()
        );
        Ok(plan)
    }

    /// Apply a plan to the store.
    ///
    /// Returns `Err` only for fatal conditions (failed backup in front of a
    /// removal, failed table wipe). Item failures land in `errors`.
    pub async fn apply(&self, plan: &ReconcilePlan) -> CatalogResult<ReconcileStats> {
        let start = Instant::now();
        let mut stats = ReconcileStats::default();

        if !plan.removals.is_empty() {
            let reason = if plan.delete_existing {
                "delete_existing"
            } else {
                "duplicate_removal"
            };
            let subject = BackupSubject::Rows {
                rows: &plan.removals,
                reason,
            };
            self.backups
                .backup(subject)
                .await
                .map_err(|source| CatalogError::BackupFailed {
                    subject: subject.describe(),
                    source,
                })?;

            if plan.delete_existing {
                let removed = self.store.delete_all_services().await?;
                info!("Deleted all {} existing service rows", removed);
                stats.deleted += removed as usize;
            } else {
                for row in &plan.removals {
                    match self.store.delete_service(row.id).await {
                        Ok(()) => {
                            stats.deleted += 1;
                            debug!("Removed duplicate '{}' (id {})", row.name, row.id);
                        }
                        Err(e) => stats.record_error(&row.name, "delete", e),
                    }
                }
            }
        }

        for action in &plan.actions {
            match action {
                PlanAction::Create { definition, order } => {
                    let write = definition_write(definition, *order);
                    match self.store.create_service(&write).await {
                        Ok(key) => {
                            stats.created += 1;
                            debug!("Created '{}' (id {}, order {})", write.name, key, order);
                        }
                        Err(e) => stats.record_error(&definition.name, "create", e),
                    }
                }
                PlanAction::Update {
                    key,
                    definition,
                    order,
                } => {
                    let write = definition_write(definition, *order);
                    match self.store.update_service(*key, &write).await {
                        Ok(()) => {
                            stats.updated += 1;
                            debug!("Updated '{}' (id {}, order {})", write.name, key, order);
                        }
                        Err(e) => stats.record_error(&definition.name, "update", e),
                    }
                }
                PlanAction::Skip { current, order } => {
                    stats.skipped += 1;
                    if current.display_order == Some(*order) {
                        debug!("'{}' unchanged", current.name);
                        continue;
                    }
                    let write = reorder_write(current, *order);
                    match self.store.update_service(current.id, &write).await {
                        Ok(()) => {
                            stats.reordered += 1;
                            debug!(
                                "Re-ordered '{}' from {:?} to {}",
                                current.name, current.display_order, order
                            );
                        }
                        Err(e) => stats.record_error(&current.name, "reorder", e),
                    }
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;

        if stats.is_success() {
            info!(
                "Catalog reconciliation complete: {} created, {} updated, {} skipped, {} deleted in {}ms",
                stats.created, stats.updated, stats.skipped, stats.deleted, stats.duration_ms
            );
        } else {
            warn!(
                "Catalog reconciliation finished with {} item errors: {} created, {} updated, {} skipped, {} deleted",
                stats.errors.len(),
                stats.created,
                stats.updated,
                stats.skipped,
                stats.deleted
            );
        }

        Ok(stats)
    }
}

/// Full write payload for a canonical definition
fn definition_write(definition: &ServiceDefinition, order: i32) -> ServiceRowWrite {
    row_write(
        &definition.name,
        &definition.description,
        definition.base_price,
        &DetailsCodec::resolve(&definition.details),
        order,
    )
}

/// Existing content, new order. Decoding and re-encoding also brings a
/// divergent flat mirror back in line with the document.
fn reorder_write(current: &PersistedServiceRow, order: i32) -> ServiceRowWrite {
    row_write(
        &current.name,
        &current.description,
        current.base_price,
        &DetailsCodec::decode(current),
        order,
    )
}

fn row_write(
    name: &str,
    description: &str,
    base_price: rust_decimal::Decimal,
    details: &ServiceDetails,
    order: i32,
) -> ServiceRowWrite {
    let encoded = DetailsCodec::encode(details);
    ServiceRowWrite {
        name: name.to_string(),
        description: description.to_string(),
        base_price,
        display_order: order,
        details_document: encoded.document,
        flat: encoded.flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlatDetails;
    use rust_decimal::Decimal;

    fn def(name: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            description: format!("{} description", name),
            base_price: Decimal::new(50000, 2),
            details: ServiceDetails::default(),
            display_order: None,
        }
    }

    fn row(id: ServiceKey, name: &str, order: Option<i32>) -> PersistedServiceRow {
        PersistedServiceRow {
            id,
            name: name.to_string(),
            description: String::new(),
            base_price: Decimal::ZERO,
            display_order: order,
            details_document: None,
            flat: FlatDetails::default(),
        }
    }

    fn plan_with_defaults(
        defs: &[ServiceDefinition],
        current: &[PersistedServiceRow],
    ) -> ReconcilePlan {
        ReconciliationEngine::plan(defs, current, &ReconcilePolicy::default()).unwrap()
    }

    fn names(defs: &[ServiceDefinition], indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| defs[i].name.clone()).collect()
    }

    #[test]
    fn test_priority_first_then_input_order() {
        let defs = vec![def("C"), def("A"), def("D"), def("B")];
        let priority = vec!["A".to_string(), "B".to_string()];
        let (indices, warnings) = resolve_display_order(&defs, &priority);
        assert_eq!(names(&defs, &indices), vec!["A", "B", "C", "D"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unknown_priority_name_warns() {
        let defs = vec![def("A"), def("B")];
        let priority = vec!["Z".to_string(), "B".to_string(), "B".to_string()];
        let (indices, warnings) = resolve_display_order(&defs, &priority);
        assert_eq!(names(&defs, &indices), vec!["B", "A"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'Z'"));
    }

    #[test]
    fn test_authored_order_never_reorders_tail() {
        let mut a = def("A");
        a.display_order = Some(2);
        let mut b = def("B");
        b.display_order = Some(1);
        let defs = vec![a, b, def("C")];

        let (indices, _) = resolve_display_order(&defs, &[]);
        assert_eq!(names(&defs, &indices), vec!["A", "B", "C"]);

        let (indices, _) = resolve_display_order(&defs, &["C".to_string()]);
        assert_eq!(names(&defs, &indices), vec!["C", "A", "B"]);

        let plan = plan_with_defaults(&defs, &[]);
        let orders: Vec<(&str, i32)> = plan
            .actions
            .iter()
            .map(|a| (a.name(), a.order()))
            .collect();
        assert_eq!(orders, vec![("A", 1), ("B", 2), ("C", 3)]);
    }

    #[test]
    fn test_plan_assigns_dense_orders() {
        let defs = vec![def("A"), def("B"), def("C")];
        let policy = ReconcilePolicy {
            priority_order: vec!["C".to_string()],
            ..Default::default()
        };
        let plan = ReconciliationEngine::plan(&defs, &[], &policy).unwrap();
        let orders: Vec<(String, i32)> = plan
            .actions
            .iter()
            .map(|a| (a.name().to_string(), a.order()))
            .collect();
        assert_eq!(
            orders,
            vec![
                ("C".to_string(), 1),
                ("A".to_string(), 2),
                ("B".to_string(), 3)
            ]
        );
        assert_eq!(plan.creates(), 3);
        assert_eq!(plan.ordered_definitions()[0].display_order, Some(1));
    }

    #[test]
    fn test_plan_skip_and_update() {
        let defs = vec![def("A"), def("B")];
        let current = vec![row(1, "A", Some(1))];

        let plan = plan_with_defaults(&defs, &current);
        assert_eq!((plan.creates(), plan.updates(), plan.skips()), (1, 0, 1));

        let forced = ReconcilePolicy {
            force_update: true,
            ..Default::default()
        };
        let plan = ReconciliationEngine::plan(&defs, &current, &forced).unwrap();
        assert_eq!((plan.creates(), plan.updates(), plan.skips()), (1, 1, 0));
    }

    #[test]
    fn test_plan_marks_duplicates() {
        let defs = vec![def("X")];
        let current = vec![row(1, "X", Some(1)), row(2, "X", Some(2))];
        let plan = plan_with_defaults(&defs, &current);

        assert_eq!(plan.removals.len(), 1);
        assert_eq!(plan.removals[0].id, 2);
        match &plan.actions[0] {
            PlanAction::Skip { current, .. } => assert_eq!(current.id, 1),
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_delete_existing_recreates_everything() {
        let defs = vec![def("A")];
        let current = vec![row(1, "A", Some(1)), row(2, "Old", Some(2))];
        let policy = ReconcilePolicy {
            delete_existing: true,
            ..Default::default()
        };
        let plan = ReconciliationEngine::plan(&defs, &current, &policy).unwrap();
        assert!(plan.delete_existing);
        assert_eq!(plan.removals.len(), 2);
        assert_eq!(plan.creates(), 1);
    }

    #[test]
    fn test_plan_reports_orphans() {
        let defs = vec![def("A")];
        let current = vec![row(1, "Legacy", Some(1))];
        let plan = plan_with_defaults(&defs, &current);
        assert!(plan.removals.is_empty());
        assert!(plan.warnings.iter().any(|w| w.contains("'Legacy'")));
    }

    #[test]
    fn test_orphan_warning_flags_order_collision() {
        let defs = vec![def("A"), def("B")];
        let current = vec![row(1, "Legacy", Some(2)), row(2, "Retired", Some(40))];
        let plan = plan_with_defaults(&defs, &current);

        let legacy = plan.warnings.iter().find(|w| w.contains("'Legacy'")).unwrap();
        assert!(legacy.contains("display order 2 collides with the canonical range 1..=2"));

        let retired = plan.warnings.iter().find(|w| w.contains("'Retired'")).unwrap();
        assert!(retired.contains("display order 40"));
        assert!(!retired.contains("collides"));
    }

    #[test]
    fn test_plan_rejects_empty_source() {
        let result = ReconciliationEngine::plan(&[], &[], &ReconcilePolicy::default());
        assert!(matches!(result, Err(CatalogError::EmptyCanonicalSource)));
    }

    #[test]
    fn test_reorder_write_repairs_mirror() {
        let mut current = row(3, "A", Some(4));
        current.details_document = Some(crate::types::DetailsDocument::Text(
            r#"{"captureDuration":"2 horas"}"#.to_string(),
        ));
        current.flat.capture_duration = Some("stale".to_string());

        let write = reorder_write(&current, 1);
        assert_eq!(write.display_order, 1);
        assert_eq!(write.flat.capture_duration.as_deref(), Some("2 horas"));
        assert!(write.details_document.contains("2 horas"));
    }
}
