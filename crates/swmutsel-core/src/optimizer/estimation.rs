use crate::code::GeneticCode;
use crate::config::Config;
use crate::consts::{BRANCH_LENGTH_BOUNDS, VERY_POOR_SCORE};
use crate::error::{SelError, SelResult};
use crate::fitness::FitnessStore;
use crate::globals::MutationGlobals;
use crate::optimizer::simplex::{minimize_scalar_brent_bounded, minimize_simplex, SimplexOptions, SimplexStep};
use crate::optimizer::transform::MutationEncoding;
use crate::params::MutationParams;
use crate::runner::Runner;
use crate::tree::{BranchSchedule, Tree};
use std::cell::RefCell;
use std::sync::Arc;
use strum_macros::Display;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Initial,
    Mutation,
    Branches,
    Fitness,
}

pub trait ProgressCallback {
    /// Called after every stage. Returning `false` stops the estimation.
    fn on_progress(&self, iteration: usize, stage: Stage, log_likelihood: f64) -> bool;
}

/// Callback that only logs.
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_progress(&self, iteration: usize, stage: Stage, log_likelihood: f64) -> bool {
        info!("📈 Iteration {} [{}]: lnL = {:.4}", iteration, stage, log_likelihood);
        true
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct EstimationOptions {
    #[builder(default = 0.05)]
    pub tolerance: f64,
    #[builder(default = 50)]
    pub max_iterations: usize,
    #[builder(default = true)]
    pub optimise_mutation: bool,
    #[builder(default = true)]
    pub optimise_branches: bool,
    #[builder(default = false)]
    pub optimise_mu: bool,
    #[builder(default = 500)]
    pub mutation_max_iters: u64,
    #[builder(default = 1e-6)]
    pub mutation_tolerance: f64,
    #[builder(default = 100)]
    pub brent_max_iters: u64,
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Config> for EstimationOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            tolerance: cfg.search.tolerance,
            max_iterations: cfg.search.max_iterations,
            optimise_mutation: !cfg.search.fix_mutation,
            optimise_branches: !cfg.search.fix_branches,
            optimise_mu: cfg.search.optimise_mu,
            mutation_max_iters: cfg.search.mutation_max_iters,
            mutation_tolerance: cfg.search.simplex_tolerance,
            brent_max_iters: cfg.search.brent_max_iters,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EstimationResult {
    pub params: MutationParams,
    pub tree: Tree,
    pub store: FitnessStore,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl EstimationResult {
    fn snapshot(
        params: &MutationParams,
        tree: &Tree,
        store: &FitnessStore,
        log_likelihood: f64,
        iterations: usize,
    ) -> Self {
        Self {
            params: params.clone(),
            tree: tree.clone(),
            store: store.clone(),
            log_likelihood,
            iterations,
            converged: false,
        }
    }
}

/// Alternates mutation, branch-length and per-site fitness optimisation until
/// the fitness-stage log-likelihood stops improving.
pub struct Estimator<R: Runner> {
    runner: R,
    code: Arc<GeneticCode>,
    options: EstimationOptions,
}

impl<R: Runner> Estimator<R> {
    pub fn new(runner: R, code: Arc<GeneticCode>, options: EstimationOptions) -> Self {
        Self { runner, code, options }
    }

    pub fn runner(&mut self) -> &mut R {
        &mut self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    pub fn run<CB: ProgressCallback>(
        &mut self,
        tree: Tree,
        params: MutationParams,
        store: FitnessStore,
        callback: &CB,
    ) -> SelResult<EstimationResult> {
        let mut tree = tree;
        let mut store = store;
        let mut params = params;
        let mut globals = Arc::new(MutationGlobals::new(self.code.clone(), params.clone())?);

        // 1. Starting point
        let initial = self.runner.log_likelihood(&tree, &store, &globals)?;
        info!("🧬 Starting estimation over {} sites: lnL = {:.4}", self.runner.site_count(), initial);
        let mut result = EstimationResult::snapshot(&params, &tree, &store, initial, 0);
        if !callback.on_progress(0, Stage::Initial, initial) {
            return Ok(result);
        }

        // 2. Main loop. `result` always describes the state after the last finished stage.
        let mut previous = initial;
        for iteration in 1..=self.options.max_iterations {
            if self.options.optimise_mutation {
                let (new_params, new_globals, lnl) = self.optimise_mutation(&tree, &params, &store)?;
                params = new_params;
                globals = new_globals;
                debug!("Mutation parameters now {:?}", params);
                result = EstimationResult::snapshot(&params, &tree, &store, lnl, iteration);
                if !callback.on_progress(iteration, Stage::Mutation, lnl) {
                    break;
                }
            }

            if self.options.optimise_branches {
                let (new_tree, lnl) = self.optimise_branches(tree, &store, &globals)?;
                tree = new_tree;
                result = EstimationResult::snapshot(&params, &tree, &store, lnl, iteration);
                if !callback.on_progress(iteration, Stage::Branches, lnl) {
                    break;
                }
            }

            let lnl = self.runner.optimise_fitness(&tree, &globals, &mut store)?;
            result = EstimationResult::snapshot(&params, &tree, &store, lnl, iteration);
            if !callback.on_progress(iteration, Stage::Fitness, lnl) {
                break;
            }

            // 3. Convergence
            if (lnl - previous).abs() < self.options.tolerance {
                info!("✅ Converged after {} iterations: lnL = {:.4}", iteration, lnl);
                result.converged = true;
                break;
            }
            if lnl < previous {
                warn!("Log-likelihood decreased from {:.4} to {:.4}", previous, lnl);
            }
            previous = lnl;
        }

        Ok(result)
    }

    /// Simplex over `(tau, kappa, pi[, mu])` with every site's fitness held fixed.
    pub fn optimise_mutation(
        &mut self,
        tree: &Tree,
        params: &MutationParams,
        store: &FitnessStore,
    ) -> SelResult<(MutationParams, Arc<MutationGlobals>, f64)> {
        let encoding = MutationEncoding {
            optimise_mu: self.options.optimise_mu,
        };
        let code = self.code.clone();
        let runner = RefCell::new(&mut self.runner);

        let objective = |x: &[f64]| -> SelResult<f64> {
            let Some(candidate) = encoding.decode(x, params) else {
                return Ok(VERY_POOR_SCORE);
            };
            let globals = match MutationGlobals::new(code.clone(), candidate) {
                Ok(g) => Arc::new(g),
                Err(SelError::InvalidParameter(_)) => return Ok(VERY_POOR_SCORE),
                Err(e) => return Err(e),
            };
            match runner.borrow_mut().log_likelihood(tree, store, &globals) {
                Ok(lnl) => Ok(-lnl),
                Err(e) if e.is_zero_likelihood() => Ok(VERY_POOR_SCORE),
                Err(e) => Err(e),
            }
        };

        let options = SimplexOptions {
            step: SimplexStep::Relative,
            max_iters: self.options.mutation_max_iters,
            tolerance: self.options.mutation_tolerance,
        };
        let (x, cost) = minimize_simplex(&objective, &encoding.encode(params), options)?;
        if cost >= VERY_POOR_SCORE {
            return Err(SelError::ZeroLikelihood);
        }

        let best = encoding
            .decode(&x, params)
            .ok_or_else(|| SelError::Optimizer("mutation search ended on an infeasible point".to_string()))?;
        let globals = Arc::new(MutationGlobals::new(self.code.clone(), best.clone())?);
        Ok((best, globals, -cost))
    }

    /// One pass over every branch. Each branch is optimised with the tree
    /// rooted at one of its internal ends; the returned tree has its original root.
    pub fn optimise_branches(
        &mut self,
        tree: Tree,
        store: &FitnessStore,
        globals: &Arc<MutationGlobals>,
    ) -> SelResult<(Tree, f64)> {
        let original_root = tree.root();
        let schedule = BranchSchedule::new(&tree);
        let mut current = tree;
        let mut rooted_at = None;
        let mut last = None;

        for visit in schedule {
            if rooted_at != Some(visit.root) {
                current = current.rerooted(visit.root)?;
                let lnl = self.runner.update_likelihood_calculators(&current, store, globals)?;
                debug!("Rooted at {}: {:.6}", visit.root, lnl);
                rooted_at = Some(visit.root);
            }

            let target = visit.target;
            let existing = current.branch_length(target);
            let (length, cost) = {
                let runner = RefCell::new(&mut self.runner);
                let objective = |t: f64| -> SelResult<f64> { Ok(-runner.borrow_mut().branch_likelihood(target, t)?) };
                let existing_cost = objective(existing)?;
                let (best, best_cost) =
                    minimize_scalar_brent_bounded(&objective, BRANCH_LENGTH_BOUNDS, self.options.brent_max_iters)
                        .map_err(|e| e.at_branch(target))?;
                if best_cost < existing_cost {
                    (best, best_cost)
                } else {
                    (existing, existing_cost)
                }
            };

            debug!("Branch {} -> {}: {:.6} -> {:.6}", visit.root, target, existing, length);
            current.set_branch_length(target, length)?;
            self.runner.set_branch_length(target, length)?;
            last = Some(-cost);
        }

        let tree = current.rerooted(original_root)?;
        let lnl = match last {
            Some(lnl) => lnl,
            None => self.runner.log_likelihood(&tree, store, globals)?,
        };
        Ok((tree, lnl))
    }
}
