//! Per-node memoization of dependency extraction.

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

use log::{debug, trace};
use lru::LruCache;

use crate::config::EvalConfig;
use crate::error::EvalResult;
use crate::types::{DependencyMap, ExposingNodes, ExposingShape};

/// Remembers `filter_nodes` results for the most recently used exposing-node
/// shapes.
///
/// Entries are never invalidated: nodes are immutable, so a result computed for
/// a given shape stays correct for the node's lifetime. Shapes and maps hold
/// nodes weakly, so a cache never keeps its own graph alive. Failed traversals
/// are not stored. A capacity of zero disables caching.
pub struct FilterCache {
    entries: RefCell<LruCache<ExposingShape, Rc<DependencyMap>>>,
    enable_caching: bool,
}

impl FilterCache {
    pub fn new(config: &EvalConfig) -> Self {
        Self::with_capacity(config.filter_cache_capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let cache_size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        FilterCache {
            entries: RefCell::new(LruCache::new(cache_size)),
            enable_caching: capacity > 0,
        }
    }

    /// Configured capacity; zero when caching is disabled.
    pub fn capacity(&self) -> usize {
        if self.enable_caching {
            self.entries.borrow().cap().get()
        } else {
            0
        }
    }

    /// Config reproducing this cache's capacity, for nodes derived from its owner.
    pub fn config(&self) -> EvalConfig {
        EvalConfig {
            filter_cache_capacity: self.capacity(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Return the cached map for `exposing`'s shape, or run `compute` and
    /// remember its result.
    pub fn get_or_compute<F>(
        &self,
        exposing: &ExposingNodes,
        compute: F,
    ) -> EvalResult<Rc<DependencyMap>>
    where
        F: FnOnce() -> EvalResult<Rc<DependencyMap>>,
    {
        if !self.enable_caching {
            return compute();
        }

        let shape = exposing.shape();
        if let Some(hit) = self.entries.borrow_mut().get(&shape) {
            trace!("filter_nodes cache hit ({} names)", exposing.len());
            return Ok(Rc::clone(hit));
        }

        // No borrow is held across `compute`: it may re-enter through exposing nodes.
        let computed = compute()?;

        let mut entries = self.entries.borrow_mut();
        if let Some((evicted, _)) = entries.push(shape.clone(), Rc::clone(&computed)) {
            if evicted != shape {
                debug!("filter_nodes cache full, evicted least recently used shape");
            }
        }
        Ok(computed)
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new(&EvalConfig::default())
    }
}

impl fmt::Debug for FilterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
