#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use swmutsel_core::code::GeneticCode;
use swmutsel_core::globals::MutationGlobals;
use swmutsel_core::tree::newick::parse_newick;
use swmutsel_core::tree::Tree;
use swmutsel_core::{EvaluationSettings, MutationParams, SitePattern};

pub const TAXA: [&str; 6] = ["human", "chimp", "mouse", "rat", "chicken", "frog"];

pub fn six_taxon_tree() -> Tree {
    parse_newick(
        "(((human:0.05,chimp:0.06)primates:0.2,(mouse:0.1,rat:0.12)rodents:0.25)mammals:0.3,chicken:0.5,frog:0.7);",
        "fixture",
    )
    .unwrap()
}

pub fn code() -> Arc<GeneticCode> {
    Arc::new(GeneticCode::standard())
}

pub fn globals() -> Arc<MutationGlobals> {
    globals_with(MutationParams {
        tau: 0.02,
        kappa: 3.0,
        pi: [0.3, 0.2, 0.25, 0.25],
        mu: 1.0,
        gamma: 0.0,
    })
}

pub fn globals_with(params: MutationParams) -> Arc<MutationGlobals> {
    Arc::new(MutationGlobals::new(code(), params).unwrap())
}

pub fn pattern(index: usize, codons: &[&str]) -> SitePattern {
    let states: BTreeMap<String, Option<u8>> = TAXA
        .iter()
        .zip(codons)
        .map(|(t, c)| (t.to_string(), GeneticCode::codon_from_str(c.as_bytes()).map(|x| x as u8)))
        .collect();
    SitePattern::new(index, states)
}

/// Deterministic columns drawn from a handful of codons per site, so most
/// sites carry two or three amino acids and a few are conserved or gapped.
pub fn synthetic_patterns(count: usize, seed: u64) -> Vec<SitePattern> {
    const POOL: [&str; 12] = [
        "GCC", "GCT", "TGG", "AGC", "TCT", "CTG", "TTA", "AAA", "AAG", "GAT", "GAC", "---",
    ];
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|site| {
            let choices: Vec<&str> = (0..3).map(|_| POOL[rng.usize(..POOL.len())]).collect();
            let column: Vec<&str> = TAXA.iter().map(|_| choices[rng.usize(..choices.len())]).collect();
            pattern(site, &column)
        })
        .collect()
}

pub fn settings(seed: u64) -> Arc<EvaluationSettings> {
    Arc::new(EvaluationSettings {
        seed: Some(seed),
        simplex_max_iters: 150,
        ..Default::default()
    })
}
