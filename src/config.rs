//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - ted.toml (default configuration)
//! - ted.local.toml (git-ignored local overrides)
//! - Environment variables (TED_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # ted.toml
//! initial_table_capacity = 4
//! default_keyed_index_priority = 1000
//! default_general_index_priority_per_column = 100
//! max_load_factor = 0.5
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! TED_INITIAL_TABLE_CAPACITY=4
//! TED_MAX_LOAD_FACTOR=0.75
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Tunables that govern storage-layer performance without affecting query
/// results (SPEC_FULL.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Starting capacity for a freshly created table. Rounded up to the
    /// nearest power of two ≥ 2 if not already one.
    #[serde(default = "default_initial_table_capacity")]
    pub initial_table_capacity: usize,

    /// Priority assigned to key indices unless the host overrides it at
    /// construction time. Used to break ties in access-path selection.
    #[serde(default = "default_keyed_index_priority")]
    pub default_keyed_index_priority: u32,

    /// Base priority for a general index; the engine multiplies this by the
    /// table's column count when no explicit priority is supplied.
    #[serde(default = "default_general_index_priority_per_column")]
    pub default_general_index_priority_per_column: u32,

    /// Hash-index load factor above which a table's capacity doubles.
    #[serde(default = "default_max_load_factor")]
    pub max_load_factor: f64,
}

fn default_initial_table_capacity() -> usize {
    2
}
fn default_keyed_index_priority() -> u32 {
    1000
}
fn default_general_index_priority_per_column() -> u32 {
    100
}
fn default_max_load_factor() -> f64 {
    0.5
}

impl EngineConfig {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. `ted.toml` (base configuration)
    /// 2. `ted.local.toml` (local overrides, git-ignored)
    /// 3. Environment variables (`TED_*` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("ted.toml"))
            .merge(Toml::file("ted.local.toml"))
            .merge(Env::prefixed("TED_"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TED_"))
            .extract()
    }

    /// Round `initial_table_capacity` up to a power of two ≥ 2, as
    /// SPEC_FULL.md §4.9 requires for invalid values.
    pub fn normalized_initial_capacity(&self) -> usize {
        self.initial_table_capacity.max(2).next_power_of_two()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_table_capacity: default_initial_table_capacity(),
            default_keyed_index_priority: default_keyed_index_priority(),
            default_general_index_priority_per_column: default_general_index_priority_per_column(),
            max_load_factor: default_max_load_factor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.initial_table_capacity, 2);
        assert_eq!(config.default_keyed_index_priority, 1000);
        assert_eq!(config.default_general_index_priority_per_column, 100);
        assert_eq!(config.max_load_factor, 0.5);
    }

    #[test]
    fn odd_capacity_rounds_up_to_power_of_two() {
        let config = EngineConfig {
            initial_table_capacity: 5,
            ..EngineConfig::default()
        };
        assert_eq!(config.normalized_initial_capacity(), 8);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("initial_table_capacity"));
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
