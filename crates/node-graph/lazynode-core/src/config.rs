//! Tunables shared by node constructors.

use serde::{Deserialize, Serialize};

pub const DEFAULT_FILTER_CACHE_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvalConfig {
    /// Maximum number of exposing-node shapes remembered per node by
    /// `filter_nodes`. Zero disables caching.
    pub filter_cache_capacity: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            filter_cache_capacity: DEFAULT_FILTER_CACHE_CAPACITY,
        }
    }
}
