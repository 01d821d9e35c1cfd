//! Records which markets each sector draws from.
//!
//! Only the edges are collected here; ordering sectors for solution is done
//! by whoever consumes them.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyFinder {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `sector` consumes from `market`. Returns `true` if the
    /// edge is new.
    pub fn add_dependency(&mut self, sector: &str, market: &str) -> bool {
        self.edges
            .entry(sector.to_string())
            .or_default()
            .insert(market.to_string())
    }

    /// Markets `sector` depends on, in name order.
    pub fn dependencies_of(&self, sector: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(sector)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }
}
