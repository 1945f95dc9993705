use super::{Runner, SiteWorkload};
use crate::code::GeneticCode;
use crate::error::{SelError, SelResult};
use crate::fitness::FitnessStore;
use crate::globals::MutationGlobals;
use crate::tree::{NodeId, Tree};
use crate::{EvaluationSettings, SitePattern};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::info;

/// Spreads sites over a private rayon pool. Each task builds its own
/// calculator, so no tree-walk state is shared between threads.
pub struct ThreadPoolRunner {
    workload: SiteWorkload,
    pool: ThreadPool,
}

impl ThreadPoolRunner {
    /// `threads == 0` lets rayon pick one thread per core.
    pub fn new(
        patterns: Vec<SitePattern>,
        code: Arc<GeneticCode>,
        settings: Arc<EvaluationSettings>,
        threads: usize,
    ) -> SelResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("swmutsel-site-{}", i))
            .build()
            .map_err(|e| SelError::Config(format!("Failed to configure thread pool: {}", e)))?;
        info!(
            "🧵 Thread pool ready: {} threads for {} sites",
            pool.current_num_threads(),
            patterns.len()
        );
        Ok(Self {
            workload: SiteWorkload::new(patterns, code, settings),
            pool,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn workload(&self) -> &SiteWorkload {
        &self.workload
    }
}

impl Runner for ThreadPoolRunner {
    fn site_count(&self) -> usize {
        self.workload.sites().len()
    }

    fn log_likelihood(&mut self, tree: &Tree, store: &FitnessStore, globals: &Arc<MutationGlobals>) -> SelResult<f64> {
        self.workload.log_likelihood(Some(&self.pool), tree, store, globals)
    }

    fn optimise_fitness(
        &mut self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        store: &mut FitnessStore,
    ) -> SelResult<f64> {
        self.workload.optimise_fitness(Some(&self.pool), tree, globals, store)
    }

    fn update_likelihood_calculators(
        &mut self,
        tree: &Tree,
        store: &FitnessStore,
        globals: &Arc<MutationGlobals>,
    ) -> SelResult<f64> {
        self.workload.update_context(Some(&self.pool), tree, store, globals)
    }

    fn branch_likelihood(&mut self, node: NodeId, branch_length: f64) -> SelResult<f64> {
        self.workload.branch_likelihood(Some(&self.pool), node, branch_length)
    }

    fn set_branch_length(&mut self, node: NodeId, branch_length: f64) -> SelResult<()> {
        self.workload.set_branch_length(node, branch_length)
    }
}
