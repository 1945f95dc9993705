use crate::consts::{AMINO_ACIDS, AMINO_ACID_COUNT, CODON_COUNT, NUCLEOTIDES};
use crate::error::{SelError, SelResult};
use crate::SitePattern;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

const STANDARD_CODE: &str = "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";
const VERTEBRATE_MITOCHONDRIAL_CODE: &str =
    "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum GeneticCodeKind {
    Standard,
    VertebrateMitochondrial,
}

impl GeneticCodeKind {
    pub fn code_string(&self) -> &'static str {
        match self {
            GeneticCodeKind::Standard => STANDARD_CODE,
            GeneticCodeKind::VertebrateMitochondrial => VERTEBRATE_MITOCHONDRIAL_CODE,
        }
    }
}

/// Immutable translation table between the 64 codons and the canonical amino acids.
///
/// Codons are indexed `16 * n1 + 4 * n2 + n3` with nucleotides in `TCAG` order.
#[derive(Debug, Clone)]
pub struct GeneticCode {
    amino_acid_of: [Option<u8>; CODON_COUNT],
    codons_of: Vec<Vec<usize>>,
    sense_codons: Vec<usize>,
}

impl GeneticCode {
    pub fn new(kind: GeneticCodeKind) -> Self {
        // Both built-in strings are valid.
        match Self::from_code_string(kind.code_string()) {
            Ok(code) => code,
            Err(e) => unreachable!("built-in genetic code is invalid: {e}"),
        }
    }

    pub fn standard() -> Self {
        Self::new(GeneticCodeKind::Standard)
    }

    pub fn from_name(name: &str) -> SelResult<Self> {
        let kind: GeneticCodeKind = name
            .parse()
            .map_err(|_| SelError::Config(format!("Unknown genetic code '{}'", name)))?;
        Ok(Self::new(kind))
    }

    /// Builds a table from 64 one-letter amino acids in `TCAG` codon order, `*` for stop.
    pub fn from_code_string(code: &str) -> SelResult<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != CODON_COUNT {
            return Err(SelError::Config(format!(
                "Genetic code string must have {} characters, found {}",
                CODON_COUNT,
                bytes.len()
            )));
        }

        let mut amino_acid_of = [None; CODON_COUNT];
        let mut codons_of = vec![Vec::new(); AMINO_ACID_COUNT];
        let mut sense_codons = Vec::new();

        for (codon, &letter) in bytes.iter().enumerate() {
            if letter == b'*' {
                continue;
            }
            let aa = amino_acid_index(letter).ok_or_else(|| {
                SelError::Config(format!("Invalid amino acid '{}' in genetic code", letter as char))
            })?;
            amino_acid_of[codon] = Some(aa);
            codons_of[aa as usize].push(codon);
            sense_codons.push(codon);
        }

        Ok(Self {
            amino_acid_of,
            codons_of,
            sense_codons,
        })
    }

    /// Amino acid encoded by `codon`; `None` for stop codons.
    #[inline]
    pub fn amino_acid_of(&self, codon: usize) -> Option<u8> {
        self.amino_acid_of[codon]
    }

    #[inline]
    pub fn is_stop(&self, codon: usize) -> bool {
        self.amino_acid_of[codon].is_none()
    }

    /// Codons for an amino acid, ascending.
    #[inline]
    pub fn codons_of(&self, amino_acid: u8) -> &[usize] {
        &self.codons_of[amino_acid as usize]
    }

    pub fn sense_codons(&self) -> &[usize] {
        &self.sense_codons
    }

    /// Checks that every observed state of `pattern` is a sense codon under this code.
    pub fn check_pattern(&self, pattern: &SitePattern) -> SelResult<()> {
        for (taxon, state) in &pattern.states {
            let Some(codon) = *state else { continue };
            let codon = codon as usize;
            if codon >= CODON_COUNT || self.is_stop(codon) {
                return Err(SelError::InvalidParameter(format!(
                    "site {} taxon '{}': {} is not a sense codon",
                    pattern.index, taxon, codon
                )));
            }
        }
        Ok(())
    }

    /// Nucleotide indices (`TCAG` order) of a codon.
    #[inline]
    pub fn nucleotides_of(codon: usize) -> [u8; 3] {
        [(codon >> 4) as u8, ((codon >> 2) & 3) as u8, (codon & 3) as u8]
    }

    /// Purine-purine (A,G) or pyrimidine-pyrimidine (T,C) exchange.
    #[inline]
    pub fn is_transition(n1: u8, n2: u8) -> bool {
        n1 != n2 && (n1 < 2) == (n2 < 2)
    }

    /// Codon index for three nucleotide characters; `None` for gaps or ambiguity codes.
    pub fn codon_from_str(triplet: &[u8]) -> Option<usize> {
        if triplet.len() != 3 {
            return None;
        }
        let mut codon = 0;
        for &c in triplet {
            codon = codon * 4 + nucleotide_index(c)? as usize;
        }
        Some(codon)
    }

    pub fn codon_to_string(codon: usize) -> String {
        Self::nucleotides_of(codon)
            .iter()
            .map(|&n| NUCLEOTIDES[n as usize] as char)
            .collect()
    }
}

pub fn nucleotide_index(c: u8) -> Option<u8> {
    match c.to_ascii_uppercase() {
        b'T' | b'U' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None,
    }
}

pub fn amino_acid_index(letter: u8) -> Option<u8> {
    AMINO_ACIDS
        .iter()
        .position(|&a| a == letter.to_ascii_uppercase())
        .map(|i| i as u8)
}

pub fn amino_acid_letter(index: u8) -> char {
    AMINO_ACIDS[index as usize] as char
}
