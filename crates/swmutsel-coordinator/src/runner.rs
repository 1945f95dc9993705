use crate::balance::assign_lpt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swmutsel_core::code::GeneticCode;
use swmutsel_core::error::{SelError, SelResult};
use swmutsel_core::globals::MutationGlobals;
use swmutsel_core::likelihood::SiteEvaluator;
use swmutsel_core::runner::Runner;
use swmutsel_core::tree::{NodeId, Tree};
use swmutsel_core::{EvaluationSettings, FitnessStore, SitePattern, TreeSpec};
use swmutsel_protocol::protocol::{
    routes, AckResponse, BranchRequest, ErrorResponse, FitnessResponse, GlobalsRequest, LikelihoodResponse,
    SetFitnessStoreRequest, SetSitesRequest, SetTreeRequest,
};
use tokio::runtime::Runtime;
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct RemoteOptions {
    pub connect_timeout: Duration,
    /// Upper bound on a single call, including the site work it triggers.
    pub request_timeout: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
        }
    }
}

/// One remote worker and what it is known to hold.
#[derive(Debug)]
struct WorkerHandle {
    url: String,
    sites: Vec<usize>,
    tree: Option<TreeSpec>,
    store: Option<FitnessStore>,
}

impl WorkerHandle {
    /// A returned store must cover exactly the sites this worker owns.
    fn check_fitness_share(&self, share: &FitnessStore) -> SelResult<()> {
        let remote = |message: String| SelError::Remote {
            worker: self.url.clone(),
            message,
        };
        if let Some(site) = share.sites.keys().find(|s| !self.sites.contains(s)) {
            return Err(remote(format!("returned fitness for site {} it does not own", site)));
        }
        if share.len() != self.sites.len() {
            return Err(remote(format!(
                "returned fitness for {} of {} sites",
                share.len(),
                self.sites.len()
            )));
        }
        Ok(())
    }
}

/// Runner that spreads sites over remote workers.
///
/// Sites are assigned once, longest state space first, to balance the
/// per-round work. Every call fans out to all workers and waits for all of
/// them; a single failure fails the call.
pub struct DistributedRunner {
    runtime: Runtime,
    client: Client,
    workers: Vec<WorkerHandle>,
    site_count: usize,
}

impl DistributedRunner {
    pub fn connect(
        urls: &[String],
        patterns: Vec<SitePattern>,
        settings: EvaluationSettings,
        options: RemoteOptions,
    ) -> SelResult<Self> {
        if urls.is_empty() {
            return Err(SelError::Config("at least one worker URL is required".to_string()));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("swmutsel-coordinator")
            .build()?;
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| SelError::Config(format!("Failed to build HTTP client: {}", e)))?;

        // 1. Balance by state-space size
        let code = Arc::new(GeneticCode::from_name(&settings.genetic_code)?);
        let shared = Arc::new(settings.clone());
        let costs: Vec<usize> = patterns
            .iter()
            .map(|p| SiteEvaluator::new(p.clone(), code.clone(), shared.clone()).state_space_size())
            .collect();
        let assignment = assign_lpt(&costs, urls.len());

        let mut workers = Vec::with_capacity(urls.len());
        let mut bodies = Vec::with_capacity(urls.len());
        for (url, items) in urls.iter().zip(&assignment) {
            let sites: Vec<SitePattern> = items.iter().map(|&i| patterns[i].clone()).collect();
            info!(
                "🔗 Worker {}: {} sites, {} codons",
                url,
                sites.len(),
                items.iter().map(|&i| costs[i]).sum::<usize>()
            );
            workers.push(WorkerHandle {
                url: url.trim_end_matches('/').to_string(),
                sites: sites.iter().map(|p| p.index).collect(),
                tree: None,
                store: None,
            });
            bodies.push(SetSitesRequest {
                sites,
                settings: settings.clone(),
            });
        }

        let runner = Self {
            runtime,
            client,
            workers,
            site_count: patterns.len(),
        };

        // 2. Ship the site lists
        let acks: Vec<AckResponse> = runner.fan_out(routes::SITES, bodies)?;
        for (worker, ack) in runner.workers.iter().zip(&acks) {
            if ack.sites != worker.sites.len() {
                return Err(SelError::Remote {
                    worker: worker.url.clone(),
                    message: format!("acknowledged {} of {} sites", ack.sites, worker.sites.len()),
                });
            }
        }
        Ok(runner)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Site indices held by each worker.
    pub fn assignment(&self) -> Vec<Vec<usize>> {
        self.workers.iter().map(|w| w.sites.clone()).collect()
    }

    /// Posts `bodies[k]` to worker `k` concurrently and returns the responses
    /// in worker order.
    fn fan_out<Req, Resp>(&self, route: &'static str, bodies: Vec<Req>) -> SelResult<Vec<Resp>>
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        let targets: Vec<(usize, String)> = self.workers.iter().map(|w| w.url.clone()).enumerate().collect();
        self.runtime.block_on(async {
            let mut set = JoinSet::new();
            for ((k, url), body) in targets.into_iter().zip(bodies) {
                let client = self.client.clone();
                set.spawn(async move { (k, post_json::<Req, Resp>(&client, &url, route, &body).await) });
            }

            let mut responses: Vec<Option<Resp>> = (0..self.workers.len()).map(|_| None).collect();
            let mut first_error = None;
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((k, Ok(resp))) => responses[k] = Some(resp),
                    Ok((_, Err(e))) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(SelError::Optimizer(format!("worker call panicked: {}", e)));
                        }
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
            responses
                .into_iter()
                .map(|r| r.ok_or_else(|| SelError::Optimizer("missing worker response".to_string())))
                .collect()
        })
    }

    /// Same body to every worker.
    fn broadcast<Req, Resp>(&self, route: &'static str, body: Req) -> SelResult<Vec<Resp>>
    where
        Req: Serialize + Clone + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        let bodies = vec![body; self.workers.len()];
        self.fan_out(route, bodies)
    }

    /// Sends `tree` to the workers that do not already hold it.
    fn ensure_tree(&mut self, tree: &Tree) -> SelResult<()> {
        let spec = tree.to_spec();
        let stale: Vec<usize> = (0..self.workers.len())
            .filter(|&k| self.workers[k].tree.as_ref() != Some(&spec))
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        debug!("Sending tree to {} workers", stale.len());
        self.send_subset(&stale, routes::TREE, |_| SetTreeRequest { tree: spec.clone() })?;
        for k in stale {
            self.workers[k].tree = Some(spec.clone());
        }
        Ok(())
    }

    /// Sends each worker its share of `store` unless it already holds it.
    fn ensure_store(&mut self, store: &FitnessStore) -> SelResult<()> {
        let shares: Vec<FitnessStore> = self.workers.iter().map(|w| store.subset(&w.sites)).collect();
        let stale: Vec<usize> = (0..self.workers.len())
            .filter(|&k| self.workers[k].store.as_ref() != Some(&shares[k]))
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        debug!("Sending fitness to {} workers", stale.len());
        self.send_subset(&stale, routes::FITNESS_STORE, |k| SetFitnessStoreRequest {
            store: shares[k].clone(),
        })?;
        for k in stale {
            self.workers[k].store = Some(shares[k].clone());
        }
        Ok(())
    }

    fn send_subset<Req, F>(&self, indices: &[usize], route: &'static str, body: F) -> SelResult<()>
    where
        Req: Serialize + Send + Sync + 'static,
        F: Fn(usize) -> Req,
    {
        let targets: Vec<(String, Req)> = indices
            .iter()
            .map(|&k| (self.workers[k].url.clone(), body(k)))
            .collect();
        self.runtime.block_on(async {
            let mut set = JoinSet::new();
            for (url, req) in targets {
                let client = self.client.clone();
                set.spawn(async move { post_json::<Req, AckResponse>(&client, &url, route, &req).await });
            }
            let mut result = Ok(());
            while let Some(joined) = set.join_next().await {
                let outcome = joined
                    .map_err(|e| SelError::Optimizer(format!("worker call panicked: {}", e)))
                    .and_then(|r| r);
                if let (Err(e), Ok(())) = (outcome, &result) {
                    result = Err(e);
                }
            }
            result
        })
    }

    /// Collects the fitness vectors every worker currently holds into one store.
    pub fn fetch_fitness_store(&self) -> SelResult<FitnessStore> {
        let urls: Vec<String> = self.workers.iter().map(|w| w.url.clone()).collect();
        self.runtime.block_on(async {
            let mut store = FitnessStore::default();
            for url in urls {
                let share: FitnessStore = get_json(&self.client, &url, routes::FITNESS_STORE).await?;
                store.merge(share);
            }
            Ok(store)
        })
    }

    fn sum(values: &[f64]) -> f64 {
        values.iter().sum()
    }
}

async fn post_json<Req, Resp>(client: &Client, url: &str, route: &str, body: &Req) -> SelResult<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let response = client.post(format!("{}{}", url, route)).json(body).send().await;
    read_response(url, route, response).await
}

async fn get_json<Resp: DeserializeOwned>(client: &Client, url: &str, route: &str) -> SelResult<Resp> {
    let response = client.get(format!("{}{}", url, route)).send().await;
    read_response(url, route, response).await
}

async fn read_response<Resp: DeserializeOwned>(
    url: &str,
    route: &str,
    response: reqwest::Result<reqwest::Response>,
) -> SelResult<Resp> {
    let remote = |message: String| SelError::Remote {
        worker: url.to_string(),
        message,
    };
    let response = response.map_err(|e| remote(format!("{} failed: {}", route, e)))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(err) if err.zero_likelihood => SelError::ZeroLikelihood,
            Ok(err) => remote(format!("{} returned {}: {}", route, status, err.error)),
            Err(_) => remote(format!("{} returned {}: {}", route, status, text)),
        });
    }
    response
        .json::<Resp>()
        .await
        .map_err(|e| remote(format!("{} sent an unreadable response: {}", route, e)))
}

impl Runner for DistributedRunner {
    fn site_count(&self) -> usize {
        self.site_count
    }

    fn log_likelihood(&mut self, tree: &Tree, store: &FitnessStore, globals: &Arc<MutationGlobals>) -> SelResult<f64> {
        self.ensure_tree(tree)?;
        self.ensure_store(store)?;
        let responses: Vec<LikelihoodResponse> = self.broadcast(
            routes::MUTATION_MODEL,
            GlobalsRequest {
                params: globals.params().clone(),
            },
        )?;
        let values: Vec<f64> = responses.iter().map(|r| r.log_likelihood).collect();
        Ok(Self::sum(&values))
    }

    fn optimise_fitness(
        &mut self,
        tree: &Tree,
        globals: &Arc<MutationGlobals>,
        store: &mut FitnessStore,
    ) -> SelResult<f64> {
        self.ensure_tree(tree)?;
        self.ensure_store(store)?;
        let responses: Vec<FitnessResponse> = self.broadcast(
            routes::OPTIMISE_FITNESS,
            GlobalsRequest {
                params: globals.params().clone(),
            },
        )?;

        // Check every share before touching the caller's store.
        for (worker, response) in self.workers.iter().zip(&responses) {
            worker.check_fitness_share(&response.store)?;
        }

        let mut values = Vec::with_capacity(responses.len());
        for (worker, response) in self.workers.iter_mut().zip(responses) {
            values.push(response.log_likelihood);
            store.merge(response.store.clone());
            worker.store = Some(response.store);
        }
        Ok(Self::sum(&values))
    }

    fn update_likelihood_calculators(
        &mut self,
        tree: &Tree,
        store: &FitnessStore,
        globals: &Arc<MutationGlobals>,
    ) -> SelResult<f64> {
        self.ensure_tree(tree)?;
        self.ensure_store(store)?;
        let responses: Vec<LikelihoodResponse> = self.broadcast(
            routes::CALCULATORS,
            GlobalsRequest {
                params: globals.params().clone(),
            },
        )?;
        let values: Vec<f64> = responses.iter().map(|r| r.log_likelihood).collect();
        Ok(Self::sum(&values))
    }

    fn branch_likelihood(&mut self, node: NodeId, branch_length: f64) -> SelResult<f64> {
        let responses: Vec<LikelihoodResponse> =
            self.broadcast(routes::NODE_LIKELIHOOD, BranchRequest { node, branch_length })?;
        let values: Vec<f64> = responses.iter().map(|r| r.log_likelihood).collect();
        Ok(Self::sum(&values))
    }

    fn set_branch_length(&mut self, node: NodeId, branch_length: f64) -> SelResult<()> {
        let _: Vec<AckResponse> = self.broadcast(routes::BRANCH_LENGTH, BranchRequest { node, branch_length })?;
        // Workers update their own tree copy; keep ours in step so it is not resent.
        for worker in &mut self.workers {
            if let Some(node_spec) = worker.tree.as_mut().and_then(|t| t.nodes.get_mut(node)) {
                node_spec.branch_length = branch_length;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swmutsel_core::Fitness;

    fn handle(sites: Vec<usize>) -> WorkerHandle {
        WorkerHandle {
            url: "http://w1".to_string(),
            sites,
            tree: None,
            store: None,
        }
    }

    fn share(sites: &[usize]) -> FitnessStore {
        let mut store = FitnessStore::default();
        for &s in sites {
            store.insert(s, vec![Fitness::zeros(2)]);
        }
        store
    }

    #[test]
    fn test_fitness_share_must_match_owned_sites() {
        let worker = handle(vec![2, 5, 9]);
        assert!(worker.check_fitness_share(&share(&[2, 5, 9])).is_ok());
        assert!(matches!(
            worker.check_fitness_share(&share(&[2, 5])),
            Err(SelError::Remote { ref message, .. }) if message.contains("2 of 3")
        ));
        assert!(matches!(
            worker.check_fitness_share(&share(&[2, 5, 7])),
            Err(SelError::Remote { ref message, .. }) if message.contains("site 7")
        ));
    }
}
