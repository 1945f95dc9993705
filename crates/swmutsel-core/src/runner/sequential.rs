use super::{Runner, SiteWorkload};
use crate::code::GeneticCode;
use crate::error::SelResult;
use crate::fitness::FitnessStore;
use crate::globals::MutationGlobals;
use crate::tree::{NodeId, Tree};
use crate::{EvaluationSettings, SitePattern};
use std::sync::Arc;

/// Evaluates every site on the calling thread.
#[derive(Debug)]
pub struct SequentialRunner {
    workload: SiteWorkload,
}

impl SequentialRunner {
    pub fn new(patterns: Vec<SitePattern>, code: Arc<GeneticCode>, settings: Arc<EvaluationSettings>) -> Self {
        Self {
            workload: SiteWorkload::new(patterns, code, settings),
        }
    }

    pub fn workload(&self) -> &SiteWorkload {
        &self.workload
    }
}

impl Runner for SequentialRunner {
    fn site_count(&self) -> usize {
        self.workload.sites().len()
    }

    fn log_likelihood(&mut self, tree: &Tree, store: &FitnessStore, globals: &Arc<MutationGlobals>) -> SelResult<f64> {
        self.workload.log_likelihood(None, tree, store, globals)
    }

    fn optimise_fitness(
        &mut self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        store: &mut FitnessStore,
    ) -> SelResult<f64> {
        self.workload.optimise_fitness(None, tree, globals, store)
    }

    fn update_likelihood_calculators(
        &mut self,
        tree: &Tree,
        store: &FitnessStore,
        globals: &Arc<MutationGlobals>,
    ) -> SelResult<f64> {
        self.workload.update_context(None, tree, store, globals)
    }

    fn branch_likelihood(&mut self, node: NodeId, branch_length: f64) -> SelResult<f64> {
        self.workload.branch_likelihood(None, node, branch_length)
    }

    fn set_branch_length(&mut self, node: NodeId, branch_length: f64) -> SelResult<()> {
        self.workload.set_branch_length(node, branch_length)
    }
}
