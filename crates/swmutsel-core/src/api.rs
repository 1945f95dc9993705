use crate::alignment::loader::read_alignment_file;
use crate::alignment::Alignment;
use crate::code::GeneticCode;
use crate::config::Config;
use crate::error::{SelError, SelResult};
use crate::fitness::FitnessStore;
use crate::likelihood::SiteEvaluator;
use crate::results::read_fitness_file;
use crate::tree::newick::read_newick_file;
use crate::tree::Tree;
use crate::{EvaluationSettings, SitePattern};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A tree and an alignment checked against each other, with the genetic code
/// and per-site settings an estimation runs under.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    pub tree: Tree,
    pub alignment: Alignment,
    pub code: Arc<GeneticCode>,
    pub settings: Arc<EvaluationSettings>,
}

impl AnalysisSession {
    /// Fails with `TaxonMismatch` for the first tree tip absent from the alignment.
    /// Alignment rows without a tip are ignored.
    pub fn load(tree: Tree, alignment: Alignment, code: Arc<GeneticCode>) -> SelResult<Self> {
        Self::with_settings(tree, alignment, code, EvaluationSettings::default())
    }

    pub fn with_settings(
        tree: Tree,
        alignment: Alignment,
        code: Arc<GeneticCode>,
        settings: EvaluationSettings,
    ) -> SelResult<Self> {
        if let Some(missing) = tree.tip_names().into_iter().find(|name| !alignment.contains(name)) {
            return Err(SelError::TaxonMismatch(missing.to_string()));
        }
        let unused = alignment.taxa().iter().filter(|t| tree.find(t).is_none()).count();
        if unused > 0 {
            warn!("{} alignment rows have no matching tip and are ignored", unused);
        }
        if !(0.0..=1.0).contains(&settings.clade_split) {
            return Err(SelError::InvalidParameter(format!(
                "clade_split must lie in [0, 1], got {}",
                settings.clade_split
            )));
        }

        info!(
            "🌳 Loaded {} tips and {} codon sites ({} genetic code)",
            tree.tips().count(),
            alignment.site_count(),
            settings.genetic_code
        );
        Ok(Self {
            tree,
            alignment,
            code,
            settings: Arc::new(settings),
        })
    }

    /// Reads the tree and alignment files named on the command line and applies `config`.
    pub fn from_files<P: AsRef<Path>>(tree_path: P, alignment_path: P, config: &Config) -> SelResult<Self> {
        let settings = config.search.evaluation_settings();
        let code = Arc::new(GeneticCode::from_name(&settings.genetic_code)?);
        let tree = read_newick_file(tree_path)?;
        let alignment = read_alignment_file(alignment_path)?;
        Self::with_settings(tree, alignment, code, settings)
    }

    pub fn site_count(&self) -> usize {
        self.alignment.site_count()
    }

    pub fn site_patterns(&self) -> Vec<SitePattern> {
        self.alignment.site_patterns(&self.code)
    }

    pub fn site_evaluators(&self) -> Vec<SiteEvaluator> {
        self.site_patterns()
            .into_iter()
            .map(|p| SiteEvaluator::new(p, self.code.clone(), self.settings.clone()))
            .collect()
    }

    pub fn site_evaluator(&self, site: usize) -> SelResult<SiteEvaluator> {
        if site >= self.site_count() {
            return Err(SelError::InvalidParameter(format!(
                "site {} out of range, the alignment has {} codon sites",
                site,
                self.site_count()
            )));
        }
        Ok(SiteEvaluator::new(
            self.alignment.site_pattern(site, &self.code),
            self.code.clone(),
            self.settings.clone(),
        ))
    }

    /// Starting fitness for every site, optionally overlaid by a saved table.
    pub fn initial_store(&self, fitness_path: Option<&Path>) -> SelResult<FitnessStore> {
        let sites = self.site_evaluators();
        let mut store = FitnessStore::default();
        for site in &sites {
            store.insert(site.index(), site.initial_fitness());
        }
        if let Some(path) = fitness_path {
            let saved = read_fitness_file(path, &sites)?;
            info!("Loaded fitness for {} sites from {}", saved.len(), path.display());
            store.merge(saved);
        }
        Ok(store)
    }
}
