use crate::code::GeneticCode;
use crate::error::{SelError, SelResult};
use crate::fitness::FitnessStore;
use crate::globals::MutationGlobals;
use crate::likelihood::{BranchCache, SiteEvaluator};
use crate::tree::{NodeId, Tree};
use crate::{EvaluationSettings, SitePattern};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Tree, fitness and globals the branch stage is currently working against.
#[derive(Debug, Clone)]
struct BranchContext {
    tree: Tree,
    store: FitnessStore,
    globals: Arc<MutationGlobals>,
}

/// The sites owned by one runner (or one remote worker) and the per-site
/// branch caches of the current branch stage.
///
/// Every operation maps over the sites, optionally inside a thread pool, and
/// combines the results in site order, so sequential and pooled runs add the
/// same numbers in the same order.
#[derive(Debug)]
pub struct SiteWorkload {
    sites: Vec<SiteEvaluator>,
    context: Option<BranchContext>,
    caches: HashMap<NodeId, Vec<Option<BranchCache>>>,
}

fn map_sites<I, T, F>(pool: Option<&ThreadPool>, items: &[I], f: F) -> Vec<T>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync + Send,
{
    match pool {
        Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        None => items.iter().map(&f).collect(),
    }
}

impl SiteWorkload {
    pub fn new(patterns: Vec<SitePattern>, code: Arc<GeneticCode>, settings: Arc<EvaluationSettings>) -> Self {
        let sites = patterns
            .into_iter()
            .map(|p| SiteEvaluator::new(p, code.clone(), settings.clone()))
            .collect();
        Self::from_sites(sites)
    }

    pub fn from_sites(sites: Vec<SiteEvaluator>) -> Self {
        Self {
            sites,
            context: None,
            caches: HashMap::new(),
        }
    }

    pub fn sites(&self) -> &[SiteEvaluator] {
        &self.sites
    }

    pub fn site_indices(&self) -> Vec<usize> {
        self.sites.iter().map(SiteEvaluator::index).collect()
    }

    pub fn log_likelihood(
        &self,
        pool: Option<&ThreadPool>,
        tree: &Tree,
        store: &FitnessStore,
        globals: &Arc<MutationGlobals>,
    ) -> SelResult<f64> {
        let values = map_sites(pool, &self.sites, |site| {
            site.log_likelihood(tree, globals, store.get(site.index()))
        });
        sum_in_order(values)
    }

    /// Optimises every site and writes the results into `store`.
    pub fn optimise_fitness(
        &self,
        pool: Option<&ThreadPool>,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        store: &mut FitnessStore,
    ) -> SelResult<f64> {
        let snapshot: &FitnessStore = store;
        let results = map_sites(pool, &self.sites, |site| {
            site.optimise(tree, globals, snapshot.get(site.index()))
                .map(|(fitness, lnl)| (site.index(), fitness, lnl))
        });
        let results = results.into_iter().collect::<SelResult<Vec<_>>>()?;

        let mut total = 0.0;
        for (index, fitness, lnl) in results {
            store.insert(index, fitness);
            total += lnl;
        }
        Ok(total)
    }

    /// Starts a new branch-stage context; all branch caches are dropped.
    /// Returns the summed log-likelihood on `tree`.
    pub fn update_context(
        &mut self,
        pool: Option<&ThreadPool>,
        tree: &Tree,
        store: &FitnessStore,
        globals: &Arc<MutationGlobals>,
    ) -> SelResult<f64> {
        self.caches.clear();
        self.context = Some(BranchContext {
            tree: tree.clone(),
            store: store.subset(&self.site_indices()),
            globals: globals.clone(),
        });
        self.log_likelihood(pool, tree, store, globals)
    }

    fn context(&self) -> SelResult<&BranchContext> {
        self.context.as_ref().ok_or_else(|| {
            SelError::Config("likelihood calculators have not been updated for the branch stage".to_string())
        })
    }

    /// Summed log-likelihood with the branch above `node` set to `branch_length`.
    pub fn branch_likelihood(
        &mut self,
        pool: Option<&ThreadPool>,
        node: NodeId,
        branch_length: f64,
    ) -> SelResult<f64> {
        if !self.caches.contains_key(&node) {
            let ctx = self.context()?;
            let caches = map_sites(pool, &self.sites, |site| {
                site.branch_cache(&ctx.tree, &ctx.globals, ctx.store.get(site.index()), node)
            });
            let caches = caches
                .into_iter()
                .collect::<SelResult<Vec<_>>>()
                .map_err(|e| e.at_branch(node))?;
            debug!("Built branch caches for node {} over {} sites", node, caches.len());
            self.caches.insert(node, caches);
        }

        let caches = &self.caches[&node];
        let values = map_sites(pool, caches, |cache| match cache {
            Some(cache) => cache.log_likelihood(branch_length),
            None => Ok(0.0),
        });
        sum_in_order(values).map_err(|e| e.at_branch(node))
    }

    /// Commits a branch length; caches built on the old length are dropped.
    pub fn set_branch_length(&mut self, node: NodeId, branch_length: f64) -> SelResult<()> {
        let ctx = self.context.as_mut().ok_or_else(|| {
            SelError::Config("likelihood calculators have not been updated for the branch stage".to_string())
        })?;
        ctx.tree.set_branch_length(node, branch_length)?;
        self.caches.clear();
        Ok(())
    }
}

fn sum_in_order(values: Vec<SelResult<f64>>) -> SelResult<f64> {
    let mut total = 0.0;
    for value in values {
        total += value?;
    }
    Ok(total)
}
