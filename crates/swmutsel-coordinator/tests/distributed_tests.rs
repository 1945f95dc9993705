use axum::routing::post;
use axum::{Json, Router};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swmutsel_coordinator::{DistributedRunner, RemoteOptions};
use swmutsel_core::code::GeneticCode;
use swmutsel_core::error::SelError;
use swmutsel_core::globals::MutationGlobals;
use swmutsel_core::optimizer::estimation::LogProgress;
use swmutsel_core::optimizer::{EstimationOptions, Estimator};
use swmutsel_core::runner::{Runner, SequentialRunner};
use swmutsel_core::tree::newick::parse_newick;
use swmutsel_core::tree::Tree;
use swmutsel_core::{EvaluationSettings, FitnessStore, MutationParams, SitePattern};
use swmutsel_core::Fitness;
use swmutsel_protocol::protocol::{
    routes, AckResponse, FitnessResponse, GlobalsRequest, SetFitnessStoreRequest, SetSitesRequest, SetTreeRequest,
};
use tokio::runtime::Runtime;

const TAXA: [&str; 5] = ["a", "b", "c", "d", "e"];
const POOL: [&str; 9] = ["GCC", "GCT", "TGG", "AGC", "TCT", "CTG", "AAA", "GAT", "---"];

/// Hosts in-process workers for the lifetime of the test.
struct Cluster {
    _runtime: Runtime,
    urls: Vec<String>,
}

fn cluster(workers: usize) -> Cluster {
    let runtime = Runtime::new().unwrap();
    let urls = (0..workers)
        .map(|_| {
            let listener = runtime
                .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
                .unwrap();
            let addr = listener.local_addr().unwrap();
            runtime.spawn(swmutsel_worker::serve_listener(listener, 1));
            format!("http://{}", addr)
        })
        .collect();
    Cluster {
        _runtime: runtime,
        urls,
    }
}

fn tree() -> Tree {
    parse_newick("(((a:0.1,b:0.15):0.1,c:0.2):0.05,d:0.3,e:0.25);", "t").unwrap()
}

fn patterns(count: usize) -> Vec<SitePattern> {
    let mut rng = fastrand::Rng::with_seed(17);
    (0..count)
        .map(|site| {
            let states: BTreeMap<String, Option<u8>> = TAXA
                .iter()
                .map(|t| {
                    let codon = POOL[rng.usize(..POOL.len())];
                    (t.to_string(), GeneticCode::codon_from_str(codon.as_bytes()).map(|c| c as u8))
                })
                .collect();
            SitePattern::new(site, states)
        })
        .collect()
}

fn settings() -> EvaluationSettings {
    EvaluationSettings {
        seed: Some(21),
        simplex_max_iters: 80,
        ..Default::default()
    }
}

fn options() -> RemoteOptions {
    RemoteOptions {
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(60),
    }
}

#[test]
fn test_distributed_total_matches_sequential() {
    let cluster = cluster(3);
    let code = Arc::new(GeneticCode::standard());
    let globals = Arc::new(MutationGlobals::new(code.clone(), MutationParams::default()).unwrap());
    let tree = tree();

    let mut remote = DistributedRunner::connect(&cluster.urls, patterns(30), settings(), options()).unwrap();
    let mut local = SequentialRunner::new(patterns(30), code, Arc::new(settings()));
    assert_eq!(remote.site_count(), 30);
    assert_eq!(remote.worker_count(), 3);
    let mut assigned: Vec<usize> = remote.assignment().concat();
    assigned.sort_unstable();
    assert_eq!(assigned, (0..30).collect::<Vec<_>>());

    let store = FitnessStore::default();
    let a = remote.log_likelihood(&tree, &store, &globals).unwrap();
    let b = local.log_likelihood(&tree, &store, &globals).unwrap();
    assert!((a - b).abs() < 1e-8, "{a} vs {b}");

    let mut remote_store = FitnessStore::default();
    let mut local_store = FitnessStore::default();
    let a = remote.optimise_fitness(&tree, &globals, &mut remote_store).unwrap();
    let b = local.optimise_fitness(&tree, &globals, &mut local_store).unwrap();
    assert!((a - b).abs() < 1e-8, "{a} vs {b}");
    assert_eq!(remote_store, local_store);
    assert_eq!(remote.fetch_fitness_store().unwrap(), local_store);

    let a = remote.update_likelihood_calculators(&tree, &remote_store, &globals).unwrap();
    let b = local.update_likelihood_calculators(&tree, &local_store, &globals).unwrap();
    assert!((a - b).abs() < 1e-8, "{a} vs {b}");
    let full = local.log_likelihood(&tree, &local_store, &globals).unwrap();
    assert!((a - full).abs() < 1e-8, "{a} vs {full}");
    let d = tree.find("d").unwrap();
    let a = remote.branch_likelihood(d, 0.7).unwrap();
    let b = local.branch_likelihood(d, 0.7).unwrap();
    assert!((a - b).abs() < 1e-8, "{a} vs {b}");
}

#[test]
fn test_unreachable_worker_fails_the_round() {
    let cluster = cluster(1);
    let mut urls = cluster.urls.clone();
    // Nothing listens on the discard port.
    urls.push("http://127.0.0.1:9".to_string());
    match DistributedRunner::connect(&urls, patterns(8), settings(), options()) {
        Err(SelError::Remote { worker, .. }) => assert!(worker.ends_with(":9")),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("connecting to a dead worker succeeded"),
    }
}

#[test]
fn test_estimation_over_workers() {
    let cluster = cluster(2);
    let code = Arc::new(GeneticCode::standard());
    let runner = DistributedRunner::connect(&cluster.urls, patterns(10), settings(), options()).unwrap();
    let options = EstimationOptions::builder()
        .max_iterations(1)
        .mutation_max_iters(15)
        .brent_max_iters(15)
        .build();
    let mut estimator = Estimator::new(runner, code, options);
    let tree = tree();
    let result = estimator
        .run(tree.clone(), MutationParams::default(), FitnessStore::default(), &LogProgress)
        .unwrap();
    assert_eq!(result.iterations, 1);
    assert_eq!(result.store.len(), 10);
    assert_eq!(result.tree.root(), tree.root());
    assert!(result.log_likelihood.is_finite());
}

/// Worker that owns its sites but only ever returns fitness for the first one.
fn truncating_worker(runtime: &Runtime) -> String {
    let owned: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let owned_for_sites = owned.clone();
    let owned_for_fitness = owned.clone();

    let app = Router::new()
        .route(
            routes::SITES,
            post(move |Json(payload): Json<SetSitesRequest>| {
                let owned = owned_for_sites.clone();
                async move {
                    let mut owned = owned.lock().unwrap();
                    *owned = payload.sites.iter().map(|p| p.index).collect();
                    Json(AckResponse {
                        status: "ok".to_string(),
                        sites: owned.len(),
                    })
                }
            }),
        )
        .route(
            routes::TREE,
            post(|Json(_): Json<SetTreeRequest>| async {
                Json(AckResponse {
                    status: "ok".to_string(),
                    sites: 0,
                })
            }),
        )
        .route(
            routes::FITNESS_STORE,
            post(|Json(_): Json<SetFitnessStoreRequest>| async {
                Json(AckResponse {
                    status: "ok".to_string(),
                    sites: 0,
                })
            }),
        )
        .route(
            routes::OPTIMISE_FITNESS,
            post(move |Json(_): Json<GlobalsRequest>| {
                let owned = owned_for_fitness.clone();
                async move {
                    let mut store = FitnessStore::default();
                    if let Some(&first) = owned.lock().unwrap().first() {
                        store.insert(first, vec![Fitness::zeros(1)]);
                    }
                    Json(FitnessResponse {
                        log_likelihood: -1.0,
                        store,
                    })
                }
            }),
        );

    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    runtime.spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[test]
fn test_short_fitness_share_fails_the_round() {
    let runtime = Runtime::new().unwrap();
    let url = truncating_worker(&runtime);
    let code = Arc::new(GeneticCode::standard());
    let globals = Arc::new(MutationGlobals::new(code, MutationParams::default()).unwrap());

    let mut remote = DistributedRunner::connect(&[url.clone()], patterns(6), settings(), options()).unwrap();
    let mut store = FitnessStore::default();
    match remote.optimise_fitness(&tree(), &globals, &mut store) {
        Err(SelError::Remote { worker, message }) => {
            assert_eq!(worker, url);
            assert!(message.contains("1 of 6"), "{message}");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(total) => panic!("a short share was summed into {total}"),
    }
    assert!(store.is_empty());
}
