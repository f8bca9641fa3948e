//! Error types for the sync engine and its store collaborator.

use crate::entity::{EntityType, Field};
use thiserror::Error;

/// Errors reported by an [`EntityStore`](crate::store::EntityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity_type} '{key}' not found")]
    NotFound { entity_type: EntityType, key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors raised while applying a single relationship edge.
///
/// These never escape [`SyncEngine`](crate::sync::SyncEngine) entry points;
/// they are logged and collected into the returned report.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No {entity_type} matches '{reference}'")]
    TargetNotFound {
        entity_type: EntityType,
        reference: String,
    },

    #[error("{entity_type} has no relationship field {field}")]
    UnsupportedField { entity_type: EntityType, field: Field },

    #[error("Parent '{parent}' of location '{location}' not found")]
    MissingParent { location: String, parent: String },

    #[error("Location hierarchy cycle at '{location}'")]
    HierarchyCycle { location: String },
}

/// Errors from building a relationship registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{entity_type} has no relationship field {field}")]
    UnknownField { entity_type: EntityType, field: Field },

    #[error("Field {field} cannot be a mapping source")]
    InvalidSource { field: Field },
}

/// Errors from loading engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_hierarchy_depth must be at least 1")]
    ZeroDepth,
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for edge-level sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::TargetNotFound {
            entity_type: EntityType::Location,
            reference: "Old Mill".to_string(),
        };
        assert_eq!(err.to_string(), "No location matches 'Old Mill'");
    }

    #[test]
    fn test_store_error_conversion() {
        let store_err = StoreError::Backend("disk full".to_string());
        let err: SyncError = store_err.into();
        assert!(matches!(err, SyncError::Store(_)));
    }
}
