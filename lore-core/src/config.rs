//! Engine configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tunables for [`SyncEngine`](crate::sync::SyncEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fall back to substring matching when resolving references.
    pub fuzzy_matching: bool,

    /// Copy location refs up the ancestor chain and retract orphaned ones.
    pub propagate_hierarchy: bool,

    /// Sweep locations for refs left behind by unresolvable targets.
    pub sweep_stale_refs: bool,

    /// Maximum number of ancestors visited by a single hierarchy walk.
    pub max_hierarchy_depth: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fuzzy_matching: true,
            propagate_hierarchy: true,
            sweep_stale_refs: true,
            max_hierarchy_depth: 64,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON config document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.max_hierarchy_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(config)
    }

    /// Enable or disable tier-3 substring matching.
    pub fn with_fuzzy_matching(mut self, enabled: bool) -> Self {
        self.fuzzy_matching = enabled;
        self
    }

    /// Enable or disable ancestor propagation.
    pub fn with_hierarchy_propagation(mut self, enabled: bool) -> Self {
        self.propagate_hierarchy = enabled;
        self
    }

    /// Enable or disable the stale-ref sweep.
    pub fn with_stale_ref_sweep(mut self, enabled: bool) -> Self {
        self.sweep_stale_refs = enabled;
        self
    }

    /// Set the ancestor walk limit (clamped to at least 1).
    pub fn with_max_hierarchy_depth(mut self, depth: usize) -> Self {
        self.max_hierarchy_depth = depth.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SyncConfig::from_json(r#"{"fuzzy_matching": false}"#).unwrap();
        assert!(!config.fuzzy_matching);
        assert!(config.propagate_hierarchy);
        assert_eq!(config.max_hierarchy_depth, 64);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = SyncConfig::from_json(r#"{"max_hierarchy_depth": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDepth));
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::default()
            .with_stale_ref_sweep(false)
            .with_max_hierarchy_depth(0);
        assert!(!config.sweep_stale_refs);
        assert_eq!(config.max_hierarchy_depth, 1);
    }
}
