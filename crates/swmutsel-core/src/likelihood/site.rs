use super::branch::BranchCache;
use super::calculator::{LikelihoodCalculator, ScalingPolicy};
use crate::alignment::distinct_amino_acids;
use crate::code::GeneticCode;
use crate::consts::{AMINO_ACID_COUNT, FITNESS_BOUND, FITNESS_SIMPLEX_STEP, VERY_POOR_SCORE};
use crate::error::{SelError, SelResult};
use crate::fitness::Fitness;
use crate::globals::MutationGlobals;
use crate::model::CodonModel;
use crate::optimizer::initialization::{fitness_starting_points, site_rng};
use crate::optimizer::simplex::{minimize_simplex, SimplexOptions, SimplexStep};
use crate::tree::{NodeId, Tree};
use crate::{EvaluationSettings, SitePattern};
use std::cell::RefCell;
use std::sync::Arc;
use tracing::trace;

pub const ROOT_CLADE: &str = "root";

/// Everything needed to evaluate and optimise one alignment column.
///
/// Stored fitness vectors follow [`SiteEvaluator::amino_acids`]: the observed
/// residues, most frequent first, then (without `approximate`) the remaining
/// canonical residues. Sites with at most one observed residue have nothing to
/// optimise and are always evaluated on that residue's codons alone.
#[derive(Debug, Clone)]
pub struct SiteEvaluator {
    pattern: SitePattern,
    code: Arc<GeneticCode>,
    settings: Arc<EvaluationSettings>,
    observed: Vec<u8>,
    amino_acids: Vec<u8>,
}

impl SiteEvaluator {
    pub fn new(pattern: SitePattern, code: Arc<GeneticCode>, settings: Arc<EvaluationSettings>) -> Self {
        let observed = distinct_amino_acids(&pattern, &code);
        let mut amino_acids = observed.clone();
        if !settings.approximate {
            amino_acids.extend((0..AMINO_ACID_COUNT as u8).filter(|aa| !observed.contains(aa)));
        }
        Self {
            pattern,
            code,
            settings,
            observed,
            amino_acids,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.pattern.index
    }

    pub fn pattern(&self) -> &SitePattern {
        &self.pattern
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Order of the entries of every stored fitness vector.
    pub fn amino_acids(&self) -> &[u8] {
        &self.amino_acids
    }

    pub fn observed(&self) -> &[u8] {
        &self.observed
    }

    pub fn is_conserved(&self) -> bool {
        self.observed.len() <= 1
    }

    fn model_amino_acids(&self) -> &[u8] {
        if self.is_conserved() {
            &self.observed
        } else {
            &self.amino_acids
        }
    }

    /// Codons in the evaluated state space; used to balance work.
    pub fn state_space_size(&self) -> usize {
        self.model_amino_acids()
            .iter()
            .map(|&aa| self.code.codons_of(aa).len())
            .sum()
    }

    /// Fitness to store before the first optimisation, one vector per clade.
    pub fn initial_fitness(&self) -> Vec<Fitness> {
        let n = self.amino_acids.len();
        let vector = if self.observed.len() == 1 {
            let mut values = vec![-FITNESS_BOUND; n];
            values[0] = 0.0;
            Fitness::new(values)
        } else {
            Fitness::zeros(n)
        };
        vec![vector; self.settings.clade_count()]
    }

    fn check_stored(&self, stored: &[Fitness]) -> SelResult<()> {
        if stored.len() != self.settings.clade_count() {
            return Err(SelError::InvalidParameter(format!(
                "{} fitness vectors stored for {} clades",
                stored.len(),
                self.settings.clade_count()
            )));
        }
        if let Some(bad) = stored.iter().find(|f| f.len() != self.amino_acids.len()) {
            return Err(SelError::InvalidParameter(format!(
                "fitness vector has {} entries, site has {} amino acids",
                bad.len(),
                self.amino_acids.len()
            )));
        }
        Ok(())
    }

    fn model_fitness(&self, stored: Option<&[Fitness]>) -> SelResult<Vec<Fitness>> {
        if self.is_conserved() {
            return Ok(vec![Fitness::zeros(self.observed.len()); self.settings.clade_count()]);
        }
        match stored {
            Some(stored) => {
                self.check_stored(stored)?;
                Ok(stored.to_vec())
            }
            None => Ok(self.initial_fitness()),
        }
    }

    /// Calculator on `tree` with one model per clade; `None` when nothing is
    /// observed at the site.
    pub fn calculator<'t>(
        &self,
        tree: &'t Tree,
        globals: &Arc<MutationGlobals>,
        stored: Option<&[Fitness]>,
    ) -> SelResult<Option<LikelihoodCalculator<'t>>> {
        if self.observed.is_empty() {
            return Ok(None);
        }
        let fitness = self.model_fitness(stored)?;
        let scaling = ScalingPolicy {
            step: self.settings.scaling_step,
            threshold: self.settings.scaling_threshold,
        };
        let mut calc = LikelihoodCalculator::new(tree, &self.pattern)?
            .with_scaling(scaling)
            .with_clade_split(self.settings.clade_split);
        for (k, f) in fitness.into_iter().enumerate() {
            let label = if k == 0 {
                ROOT_CLADE
            } else {
                self.settings.clades[k - 1].as_str()
            };
            let model = CodonModel::new(globals.clone(), f, self.model_amino_acids().to_vec())?;
            calc.add_clade_model(label, model);
        }
        Ok(Some(calc))
    }

    pub fn log_likelihood(
        &self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        stored: Option<&[Fitness]>,
    ) -> SelResult<f64> {
        let run = || -> SelResult<f64> {
            match self.calculator(tree, globals, stored)? {
                Some(calc) => calc.log_likelihood(),
                None => Ok(0.0),
            }
        };
        run().map_err(|e| e.at_site(self.index()))
    }

    /// Cache for re-evaluating the branch above `target`, a child of the root.
    pub fn branch_cache(
        &self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        stored: Option<&[Fitness]>,
        target: NodeId,
    ) -> SelResult<Option<BranchCache>> {
        let run = || -> SelResult<Option<BranchCache>> {
            match self.calculator(tree, globals, stored)? {
                Some(calc) => Ok(Some(calc.branch_cache(target)?)),
                None => Ok(None),
            }
        };
        run().map_err(|e| e.at_site(self.index()))
    }

    /// Maximises the site likelihood over the free fitness parameters from
    /// several starting points. Returns the fitness vectors to store and the
    /// optimised log-likelihood.
    pub fn optimise(
        &self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        current: Option<&[Fitness]>,
    ) -> SelResult<(Vec<Fitness>, f64)> {
        self.optimise_inner(tree, globals, current)
            .map_err(|e| e.at_site(self.index()))
    }

    fn optimise_inner(
        &self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        current: Option<&[Fitness]>,
    ) -> SelResult<(Vec<Fitness>, f64)> {
        if self.is_conserved() {
            let lnl = self.log_likelihood(tree, globals, None)?;
            return Ok((self.initial_fitness(), lnl));
        }

        let calc = match self.calculator(tree, globals, current)? {
            Some(calc) => RefCell::new(calc),
            None => return Ok((self.initial_fitness(), 0.0)),
        };

        let start_fitness = self.model_fitness(current)?;
        let current_free: Vec<f64> = start_fitness
            .iter()
            .flat_map(|f| f.free_parameters().iter().copied())
            .collect();
        let observed_mask: Vec<bool> = (0..self.settings.clade_count())
            .flat_map(|_| self.amino_acids[1..].iter().map(|aa| self.observed.contains(aa)))
            .collect();

        let mut rng = site_rng(self.settings.seed, self.index());
        let starts = fitness_starting_points(&current_free, &observed_mask, &mut rng);
        let options = SimplexOptions {
            step: SimplexStep::Fixed(FITNESS_SIMPLEX_STEP),
            max_iters: self.settings.simplex_max_iters,
            tolerance: self.settings.simplex_tolerance,
        };

        let objective = |x: &[f64]| -> SelResult<f64> {
            if x.iter().any(|v| !v.is_finite() || v.abs() > FITNESS_BOUND) {
                return Ok(VERY_POOR_SCORE);
            }
            match calc.borrow_mut().evaluate(x) {
                Ok(lnl) => Ok(-lnl),
                Err(SelError::ZeroLikelihood) => Ok(VERY_POOR_SCORE),
                Err(e) => Err(e),
            }
        };

        let mut best: Option<(Vec<f64>, f64)> = None;
        for start in &starts {
            let (x, cost) = minimize_simplex(&objective, start, options)?;
            trace!("Site {} start gave {}", self.index(), -cost);
            if best.as_ref().is_none_or(|(_, c)| cost < *c) {
                best = Some((x, cost));
            }
        }

        let (x, cost) = best.ok_or_else(|| SelError::Optimizer("no starting point".to_string()))?;
        if cost >= VERY_POOR_SCORE {
            return Err(SelError::ZeroLikelihood);
        }

        let free = self.amino_acids.len() - 1;
        let fitness = x.chunks(free).map(Fitness::from_free).collect();
        Ok((fitness, -cost))
    }
}
