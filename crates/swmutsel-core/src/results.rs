use crate::code::{amino_acid_index, amino_acid_letter};
use crate::consts::FITNESS_BOUND;
use crate::error::{SelError, SelResult};
use crate::fitness::{Fitness, FitnessStore};
use crate::likelihood::site::ROOT_CLADE;
use crate::likelihood::SiteEvaluator;
use crate::optimizer::EstimationResult;
use crate::params::MutationParams;
use crate::tree::newick::write_newick_file;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// One row of the long-format fitness table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRow {
    pub site: usize,
    pub clade: String,
    pub amino_acid: char,
    pub fitness: f64,
}

/// Summary written next to the fitness table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalsReport {
    pub params: MutationParams,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn clade_labels(sites: &[SiteEvaluator]) -> Vec<String> {
    let mut labels = vec![ROOT_CLADE.to_string()];
    if let Some(site) = sites.first() {
        labels.extend(site.settings().clades.iter().cloned());
    }
    labels
}

/// Flattens `store` into rows, in site order. Sites without an evaluator are skipped.
pub fn fitness_rows(store: &FitnessStore, sites: &[SiteEvaluator]) -> Vec<FitnessRow> {
    let labels = clade_labels(sites);
    let mut rows = Vec::new();
    for site in sites {
        let Some(stored) = store.get(site.index()) else {
            continue;
        };
        for (clade, fitness) in labels.iter().zip(stored) {
            for (&aa, &value) in site.amino_acids().iter().zip(&fitness.values) {
                rows.push(FitnessRow {
                    site: site.index(),
                    clade: clade.clone(),
                    amino_acid: amino_acid_letter(aa),
                    fitness: value,
                });
            }
        }
    }
    rows
}

pub fn write_fitness_csv<W: Write>(writer: W, store: &FitnessStore, sites: &[SiteEvaluator]) -> SelResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in fitness_rows(store, sites) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reads a long-format fitness table back into per-site vectors ordered the
/// way each site expects.
///
/// A site with no rows is left out of the store. Residues missing from a site
/// that does have rows take the lower fitness bound, but the site's anchor
/// residue must be present; values are shifted so the anchor is zero.
pub fn read_fitness_csv<R: Read>(reader: R, sites: &[SiteEvaluator]) -> SelResult<FitnessStore> {
    let labels = clade_labels(sites);
    let clade_index: HashMap<&str, usize> = labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();

    // (site, clade) -> amino acid -> value
    let mut table: HashMap<(usize, usize), HashMap<u8, f64>> = HashMap::new();
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    for (line, result) in rdr.deserialize::<FitnessRow>().enumerate() {
        let row = result?;
        let parse_error = |message: String| SelError::Parse {
            source_name: "fitness table".to_string(),
            line: line + 2,
            message,
        };
        let clade = *clade_index
            .get(row.clade.as_str())
            .ok_or_else(|| parse_error(format!("unknown clade '{}'", row.clade)))?;
        let aa = amino_acid_index(row.amino_acid as u8)
            .ok_or_else(|| parse_error(format!("unknown amino acid '{}'", row.amino_acid)))?;
        if !row.fitness.is_finite() {
            return Err(parse_error(format!("fitness {} is not finite", row.fitness)));
        }
        table.entry((row.site, clade)).or_default().insert(aa, row.fitness);
    }

    let mut store = FitnessStore::default();
    for site in sites {
        if !(0..labels.len()).any(|c| table.contains_key(&(site.index(), c))) {
            continue;
        }
        let mut vectors = Vec::with_capacity(labels.len());
        for (c, label) in labels.iter().enumerate() {
            let values = table.get(&(site.index(), c));
            let anchor_aa = site.amino_acids().first().copied();
            let anchor = match (values, anchor_aa) {
                (_, None) => 0.0,
                (Some(v), Some(aa)) => *v.get(&aa).ok_or_else(|| {
                    SelError::InvalidParameter(format!(
                        "site {} clade '{}' has no fitness for anchor residue {}",
                        site.index(),
                        label,
                        amino_acid_letter(aa)
                    ))
                })?,
                (None, Some(_)) => {
                    return Err(SelError::InvalidParameter(format!(
                        "site {} has no fitness for clade '{}'",
                        site.index(),
                        label
                    )))
                }
            };
            let fitness = site
                .amino_acids()
                .iter()
                .map(|aa| {
                    values
                        .and_then(|v| v.get(aa))
                        .map(|f| (f - anchor).clamp(-FITNESS_BOUND, FITNESS_BOUND))
                        .unwrap_or(-FITNESS_BOUND)
                })
                .collect();
            vectors.push(Fitness::new(fitness));
        }
        store.insert(site.index(), vectors);
    }
    Ok(store)
}

pub fn write_fitness_file<P: AsRef<Path>>(path: P, store: &FitnessStore, sites: &[SiteEvaluator]) -> SelResult<()> {
    write_fitness_csv(File::create(path)?, store, sites)
}

pub fn read_fitness_file<P: AsRef<Path>>(path: P, sites: &[SiteEvaluator]) -> SelResult<FitnessStore> {
    read_fitness_csv(File::open(path)?, sites)
}

pub fn write_globals_file<P: AsRef<Path>>(path: P, report: &GlobalsReport) -> SelResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

pub fn read_globals_file<P: AsRef<Path>>(path: P) -> SelResult<GlobalsReport> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// Paths of the three result files sharing `prefix`.
pub fn output_paths(prefix: &str) -> [PathBuf; 3] {
    [
        PathBuf::from(format!("{}.fitness.csv", prefix)),
        PathBuf::from(format!("{}.tree.nwk", prefix)),
        PathBuf::from(format!("{}.globals.json", prefix)),
    ]
}

/// Writes the fitness table, the tree and the globals report of an estimation.
pub fn write_estimation_outputs(prefix: &str, result: &EstimationResult, sites: &[SiteEvaluator]) -> SelResult<()> {
    let [fitness_path, tree_path, globals_path] = output_paths(prefix);
    write_fitness_file(&fitness_path, &result.store, sites)?;
    write_newick_file(&result.tree, &tree_path)?;
    write_globals_file(
        &globals_path,
        &GlobalsReport {
            params: result.params.clone(),
            log_likelihood: result.log_likelihood,
            iterations: result.iterations,
            converged: result.converged,
        },
    )?;
    info!(
        "💾 Results saved to {}, {} and {}",
        fitness_path.display(),
        tree_path.display(),
        globals_path.display()
    );
    Ok(())
}
