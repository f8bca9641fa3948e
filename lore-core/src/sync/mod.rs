//! The relationship consistency engine.
//!
//! The host calls [`SyncEngine::sync_entity`] after every save and
//! [`SyncEngine::handle_deletion`] around every delete. The engine diffs the
//! saved entity's relationship fields against their previous values and
//! writes the matching additions and removals onto every related document,
//! including ancestor propagation through the location tree.
//!
//! Mappings are processed one after another and every step re-lists the
//! documents it touches, so a write made by one mapping is visible to the
//! next. Failures are contained to the edge being applied and reported; the
//! entry points themselves never fail.

mod apply;
mod cascade;
mod coordinator;
mod diff;
mod guard;
mod hierarchy;
mod rename;
mod report;

pub use coordinator::SaveCoordinator;
pub use diff::{diff_tokens, field_tokens, scalar_change, Subject, TokenDiff};
pub use guard::{GuardTicket, ReentrancyGuard};
pub use report::{CascadeReport, Inconsistency, Problem, SyncFailure, SyncReport};

use crate::config::SyncConfig;
use crate::entity::{Entity, EntityType, FieldView};
use crate::error::{SyncError, SyncResult};
use crate::registry::{Registry, RelationshipMapping};
use crate::resolver::{RefStyle, Resolver};
use crate::store::EntityStore;

/// Keeps mirror edges consistent across independently saved documents.
#[derive(Debug)]
pub struct SyncEngine<S> {
    store: SaveCoordinator<S>,
    registry: Registry,
    config: SyncConfig,
    resolver: Resolver,
    guard: ReentrancyGuard,
}

impl<S: EntityStore> SyncEngine<S> {
    /// Create an engine over `store` with the standard registry.
    pub fn new(store: S) -> Self {
        let config = SyncConfig::default();
        Self {
            store: SaveCoordinator::new(store),
            registry: Registry::standard(),
            resolver: Resolver::new(config.fuzzy_matching),
            config,
            guard: ReentrancyGuard::new(),
        }
    }

    /// Replace the mapping table.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Configure the engine.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.resolver = Resolver::new(config.fuzzy_matching);
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        self.store.store()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether a sync for `entity` is currently running.
    pub fn is_syncing(&self, entity: &Entity) -> bool {
        self.guard.is_active(&guard_key(entity))
    }

    /// Propagate an entity save to every related document.
    ///
    /// `old` is the document as it was before the save, or `None` for a newly
    /// created entity. Returns immediately if a sync for the same entity is
    /// already in flight.
    pub async fn sync_entity(&self, new: &Entity, old: Option<&Entity>) -> SyncReport {
        let key = guard_key(new);
        let Some(_ticket) = self.guard.enter(key.as_str()) else {
            tracing::debug!(entity = %key, "sync already in flight, skipping");
            return SyncReport {
                reentrant_skip: true,
                ..Default::default()
            };
        };

        let writes_before = self.store.write_count();
        let subject = Subject::new(new, old);
        let entity_type = new.entity_type();
        let mut report = SyncReport::default();

        // Renames first, so the diffs below see entries under the new key
        report.failures.extend(self.rekey_mirrors(subject).await);

        for mapping in self.registry.as_source(entity_type) {
            report.mappings_processed += 1;
            let failures = self.sync_relationship(mapping, subject).await;
            report.failures.extend(failures);
        }

        for mapping in self.registry.as_target(entity_type) {
            // Self-mirrored edges were fully handled from the source side
            if mapping.is_self_mirrored() {
                continue;
            }
            report.mappings_processed += 1;
            let failures = self.reconcile_reverse(mapping, subject).await;
            report.failures.extend(failures);
        }

        if entity_type == EntityType::Location && self.config.propagate_hierarchy {
            let failures = self.sync_location_hierarchy(subject).await;
            report.failures.extend(failures);
        }

        report.writes = self.store.write_count() - writes_before;
        tracing::info!(
            entity = %key,
            mappings = report.mappings_processed,
            writes = report.writes,
            failures = report.failures.len(),
            "sync complete"
        );
        report
    }

    /// Re-apply every forward edge of every stored document, treating source
    /// fields as authoritative, and re-propagate every location ref.
    ///
    /// Used after imports or bulk creation, when no per-save history exists.
    pub async fn repair_all(&self) -> SyncReport {
        let mut report = SyncReport::default();

        for entity_type in EntityType::ALL {
            let entities = match self.store.list(entity_type).await {
                Ok(entities) => entities,
                Err(error) => {
                    tracing::warn!(error = %error, "repair: cannot list {entity_type}");
                    report.failures.push(SyncFailure {
                        mapping: "repair".to_string(),
                        reference: entity_type.to_string(),
                        error,
                    });
                    continue;
                }
            };

            for entity in &entities {
                let Some(_ticket) = self.guard.enter(guard_key(entity)) else {
                    continue;
                };
                report.merge(self.repair_entity(entity).await);
            }
        }

        tracing::info!(
            writes = report.writes,
            failures = report.failures.len(),
            "repair complete"
        );
        report
    }

    /// Re-apply the forward edges of one stored document.
    async fn repair_entity(&self, entity: &Entity) -> SyncReport {
        let writes_before = self.store.write_count();
        let entity_type = entity.entity_type();
        let subject = Subject::new(entity, None);
        let mut report = SyncReport::default();

        for mapping in self.registry.as_source(entity_type) {
            report.mappings_processed += 1;
            let failures = self.sync_relationship(mapping, subject).await;
            report.failures.extend(failures);
        }
        if entity_type == EntityType::Location && self.config.propagate_hierarchy {
            let failures = self.propagate_all_refs(entity).await;
            report.failures.extend(failures);
        }

        report.writes = self.store.write_count() - writes_before;
        report
    }

    /// List every forward edge whose target is missing or lacks its mirror
    /// entry. Read-only.
    pub async fn audit(&self) -> Vec<Inconsistency> {
        let mut found = Vec::new();
        for mapping in self.registry.mappings() {
            let (sources, targets) = match (
                self.store.list(mapping.source_type).await,
                self.store.list(mapping.target_type).await,
            ) {
                (Ok(sources), Ok(targets)) => (sources, targets),
                (Err(error), _) | (_, Err(error)) => {
                    tracing::warn!(error = %error, mapping = %mapping, "audit: listing failed");
                    continue;
                }
            };

            for source in &sources {
                let subject = Subject::new(source, None);
                for token in field_tokens(Some(source), mapping.source_field, None) {
                    let problem = match self.resolver.resolve(&targets, &token, mapping.source_style()) {
                        None => Some(Problem::UnresolvedTarget),
                        Some(target) if mapping.source_type == mapping.target_type && subject.is(target) => None,
                        Some(target) => (!has_mirror(target, mapping, subject)).then_some(Problem::MissingMirror),
                    };
                    if let Some(problem) = problem {
                        found.push(Inconsistency {
                            mapping: mapping.to_string(),
                            source: source.key().to_string(),
                            reference: token,
                            problem,
                        });
                    }
                }
            }
        }
        found
    }

    /// Index of the entity `reference` resolves to.
    pub(crate) fn locate(
        &self,
        entities: &[Entity],
        entity_type: EntityType,
        reference: &str,
        style: RefStyle,
    ) -> SyncResult<usize> {
        self.resolver
            .position(entities, reference, style)
            .ok_or_else(|| SyncError::TargetNotFound {
                entity_type,
                reference: reference.to_string(),
            })
    }
}

/// The reentrancy key for `entity`.
fn guard_key(entity: &Entity) -> String {
    format!("{}:{}", entity.entity_type(), entity.key())
}

/// Whether `target` carries the back-reference `mapping` requires for `subject`.
fn has_mirror(target: &Entity, mapping: &RelationshipMapping, subject: Subject<'_>) -> bool {
    match target.field(mapping.target_field) {
        Some(FieldView::Scalar(value)) => value.is_some_and(|v| subject.refers(v)),
        Some(FieldView::List(values)) => values.iter().any(|v| subject.refers(v)),
        Some(FieldView::Refs(refs)) => refs
            .iter()
            .any(|r| r.entity_type == subject.entity_type() && subject.refers(&r.entity_id)),
        Some(FieldView::Relations(relations)) => relations.iter().any(|r| subject.refers(r.target())),
        None => false,
    }
}
