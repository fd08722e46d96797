use crate::{Cost, RouterId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A distance vector: every known destination mapped to the best known cost
/// to reach it. Keys are unique, iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    entries: HashMap<RouterId, Cost>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Deep copy, used to compare a table against its pre-recomputation state.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn get(&self, id: &str) -> Option<Cost> {
        self.entries.get(id).copied()
    }

    pub fn insert(&mut self, id: RouterId, cost: Cost) {
        self.entries.insert(id, cost);
    }

    pub fn remove(&mut self, id: &str) -> Option<Cost> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &RouterId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouterId, &Cost)> {
        self.entries.iter()
    }

    /// Destinations whose cost currently matches `cost`, collected so the
    /// caller can mutate the table while walking them.
    pub fn keys_with_cost(&self, cost: Cost) -> Vec<RouterId> {
        self.entries
            .iter()
            .filter(|(_, c)| **c == cost)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<RouterId, Cost> {
        &self.entries
    }
}

impl FromIterator<(RouterId, Cost)> for RouteTable {
    fn from_iter<T: IntoIterator<Item = (RouterId, Cost)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
