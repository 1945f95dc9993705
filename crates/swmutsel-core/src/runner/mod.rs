pub mod pool;
pub mod sequential;
pub mod workload;

pub use self::pool::ThreadPoolRunner;
pub use self::sequential::SequentialRunner;
pub use self::workload::SiteWorkload;

use crate::error::SelResult;
use crate::fitness::FitnessStore;
use crate::globals::MutationGlobals;
use crate::tree::{NodeId, Tree};
use std::sync::Arc;

/// Execution strategy for the per-site work of an estimation.
///
/// All strategies return the same totals for the same inputs; they differ only
/// in where the sites are evaluated. A failure at any site fails the whole
/// call, a partial sum is never returned.
pub trait Runner {
    /// Number of sites this runner evaluates.
    fn site_count(&self) -> usize;

    /// Sum of per-site log-likelihoods under the stored fitness.
    fn log_likelihood(&mut self, tree: &Tree, store: &FitnessStore, globals: &Arc<MutationGlobals>) -> SelResult<f64>;

    /// Optimises every site's fitness, writes the results into `store` and
    /// returns the summed optimised log-likelihood.
    fn optimise_fitness(
        &mut self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        store: &mut FitnessStore,
    ) -> SelResult<f64>;

    /// Prepares branch evaluation on `tree`, usually a re-rooted copy, and
    /// returns the summed log-likelihood on it.
    fn update_likelihood_calculators(
        &mut self,
        tree: &Tree,
        store: &FitnessStore,
        globals: &Arc<MutationGlobals>,
    ) -> SelResult<f64>;

    /// Summed log-likelihood if the branch above `node`, a child of the root,
    /// had length `branch_length`.
    fn branch_likelihood(&mut self, node: NodeId, branch_length: f64) -> SelResult<f64>;

    /// Commits a new length for the branch above `node`.
    fn set_branch_length(&mut self, node: NodeId, branch_length: f64) -> SelResult<()>;
}
