pub mod loader;

pub use self::loader::{parse_alignment, read_alignment_file};

use crate::code::GeneticCode;
use crate::consts::AMINO_ACID_COUNT;
use crate::error::{SelError, SelResult};
use crate::SitePattern;
use std::collections::{BTreeMap, HashSet};

/// Aligned coding sequences, one per taxon, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    taxa: Vec<String>,
    sequences: Vec<Vec<u8>>,
}

impl Alignment {
    /// Sequences are uppercased and `U` becomes `T`. All sequences must have
    /// the same length, a multiple of three.
    pub fn new(records: Vec<(String, Vec<u8>)>) -> SelResult<Self> {
        if records.is_empty() {
            return Err(SelError::Config("alignment has no sequences".to_string()));
        }

        let mut seen = HashSet::new();
        let mut taxa = Vec::with_capacity(records.len());
        let mut sequences = Vec::with_capacity(records.len());
        let width = records[0].1.len();

        for (name, raw) in records {
            if !seen.insert(name.clone()) {
                return Err(SelError::Config(format!("duplicate taxon '{}' in alignment", name)));
            }
            if raw.len() != width {
                return Err(SelError::Config(format!(
                    "sequence '{}' has length {}, expected {}",
                    name,
                    raw.len(),
                    width
                )));
            }
            let seq = raw
                .into_iter()
                .map(|c| match c.to_ascii_uppercase() {
                    b'U' => b'T',
                    other => other,
                })
                .collect();
            taxa.push(name);
            sequences.push(seq);
        }

        if width == 0 || width % 3 != 0 {
            return Err(SelError::Config(format!(
                "alignment length {} is not a positive multiple of 3",
                width
            )));
        }

        Ok(Self { taxa, sequences })
    }

    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    pub fn contains(&self, taxon: &str) -> bool {
        self.taxa.iter().any(|t| t == taxon)
    }

    /// Number of codon sites.
    pub fn site_count(&self) -> usize {
        self.sequences[0].len() / 3
    }

    /// Codon index at `site` for the `row`-th taxon; `None` for gaps and ambiguity codes.
    pub fn codon(&self, row: usize, site: usize) -> Option<usize> {
        let start = site * 3;
        GeneticCode::codon_from_str(&self.sequences[row][start..start + 3])
    }

    /// Taxon -> codon at one site. Stop codons are treated as missing data.
    pub fn site_pattern(&self, site: usize, code: &GeneticCode) -> SitePattern {
        let states: BTreeMap<String, Option<u8>> = self
            .taxa
            .iter()
            .enumerate()
            .map(|(row, taxon)| {
                let state = self
                    .codon(row, site)
                    .filter(|&c| !code.is_stop(c))
                    .map(|c| c as u8);
                (taxon.clone(), state)
            })
            .collect();
        SitePattern::new(site, states)
    }

    pub fn site_patterns(&self, code: &GeneticCode) -> Vec<SitePattern> {
        (0..self.site_count())
            .map(|site| self.site_pattern(site, code))
            .collect()
    }
}

/// Amino acids observed at a site, most frequent first; ties follow canonical order.
pub fn distinct_amino_acids(pattern: &SitePattern, code: &GeneticCode) -> Vec<u8> {
    let mut counts = [0usize; AMINO_ACID_COUNT];
    for codon in pattern.states.values().flatten() {
        if let Some(aa) = code.amino_acid_of(*codon as usize) {
            counts[aa as usize] += 1;
        }
    }
    let mut observed: Vec<u8> = (0..AMINO_ACID_COUNT as u8)
        .filter(|&aa| counts[aa as usize] > 0)
        .collect();
    // Stable sort keeps canonical order among ties.
    observed.sort_by(|a, b| counts[*b as usize].cmp(&counts[*a as usize]));
    observed
}
