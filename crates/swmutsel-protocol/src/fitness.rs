use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fitness values for one site and one clade, in the site's amino-acid order.
/// The first entry is the anchor and stays at zero whenever the vector is optimised.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(transparent)]
pub struct Fitness {
    pub values: Vec<f64>,
}

impl Fitness {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    /// Rebuilds a vector from its free entries, re-inserting the anchor.
    pub fn from_free(free: &[f64]) -> Self {
        let mut values = Vec::with_capacity(free.len() + 1);
        values.push(0.0);
        values.extend_from_slice(free);
        Self { values }
    }

    pub fn free_parameters(&self) -> &[f64] {
        self.values.get(1..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fitness vectors keyed by site index. Each site holds one vector per clade,
/// the root clade first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct FitnessStore {
    pub sites: BTreeMap<usize, Vec<Fitness>>,
}

impl FitnessStore {
    pub fn get(&self, site: usize) -> Option<&[Fitness]> {
        self.sites.get(&site).map(Vec::as_slice)
    }

    pub fn insert(&mut self, site: usize, fitness: Vec<Fitness>) {
        self.sites.insert(site, fitness);
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Copy of the entries for `indices`; sites without an entry are skipped.
    pub fn subset(&self, indices: &[usize]) -> FitnessStore {
        let sites = indices
            .iter()
            .filter_map(|i| self.sites.get(i).map(|f| (*i, f.clone())))
            .collect();
        FitnessStore { sites }
    }

    pub fn merge(&mut self, other: FitnessStore) {
        self.sites.extend(other.sites);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_reinserted() {
        let f = Fitness::from_free(&[1.5, -2.0]);
        assert_eq!(f.values, vec![0.0, 1.5, -2.0]);
        assert_eq!(f.free_parameters(), &[1.5, -2.0]);
        assert!(Fitness::zeros(0).free_parameters().is_empty());
    }

    #[test]
    fn test_subset_and_merge() {
        let mut store = FitnessStore::default();
        store.insert(0, vec![Fitness::zeros(2)]);
        store.insert(3, vec![Fitness::new(vec![0.0, 1.0])]);
        store.insert(7, vec![Fitness::zeros(1)]);

        let part = store.subset(&[3, 7, 9]);
        assert_eq!(part.len(), 2);
        assert!(part.get(0).is_none());

        let mut other = FitnessStore::default();
        other.insert(3, vec![Fitness::new(vec![0.0, -4.0])]);
        store.merge(other);
        assert_eq!(store.get(3).unwrap()[0].values, vec![0.0, -4.0]);
    }
}
