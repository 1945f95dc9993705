use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed codon per taxon at one alignment column. `None` marks gaps,
/// ambiguous characters and stop codons.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SitePattern {
    pub index: usize,
    pub states: BTreeMap<String, Option<u8>>,
}

impl SitePattern {
    pub fn new(index: usize, states: BTreeMap<String, Option<u8>>) -> Self {
        Self { index, states }
    }

    /// Codon observed for `taxon`; the outer `None` means the taxon is absent.
    pub fn state(&self, taxon: &str) -> Option<Option<u8>> {
        self.states.get(taxon).copied()
    }
}
