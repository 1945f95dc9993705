use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use swmutsel_core::code::GeneticCode;
use swmutsel_core::globals::MutationGlobals;
use swmutsel_core::runner::{Runner, SequentialRunner};
use swmutsel_core::tree::newick::parse_newick;
use swmutsel_core::{EvaluationSettings, FitnessStore, MutationParams, SitePattern};
use swmutsel_protocol::protocol::{
    routes, AckResponse, BranchRequest, ErrorResponse, FitnessResponse, GlobalsRequest, LikelihoodResponse,
    SetSitesRequest, SetTreeRequest,
};
use tokio::net::TcpListener;

const TREE: &str = "((a:0.1,b:0.2):0.1,c:0.3,d:0.15);";

async fn start_worker() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(swmutsel_worker::serve_listener(listener, 2));
    format!("http://{}", addr)
}

fn patterns() -> Vec<SitePattern> {
    let columns = [
        ["GCC", "GCT", "TGG", "GCA"],
        ["AGC", "TCT", "TCC", "AGC"],
        ["CTG", "CTG", "CTA", "TTA"],
        ["AAA", "AAG", "GAT", "---"],
    ];
    columns
        .iter()
        .enumerate()
        .map(|(site, column)| {
            let states: BTreeMap<String, Option<u8>> = ["a", "b", "c", "d"]
                .iter()
                .zip(column)
                .map(|(t, c)| (t.to_string(), GeneticCode::codon_from_str(c.as_bytes()).map(|x| x as u8)))
                .collect();
            SitePattern::new(site, states)
        })
        .collect()
}

fn settings() -> EvaluationSettings {
    EvaluationSettings {
        seed: Some(3),
        simplex_max_iters: 100,
        ..Default::default()
    }
}

async fn post<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
    client: &Client,
    base: &str,
    route: &str,
    body: &Req,
) -> Resp {
    let response = client.post(format!("{}{}", base, route)).json(body).send().await.unwrap();
    assert!(response.status().is_success(), "{} failed with {}", route, response.status());
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_worker_matches_local_runner() {
    let base = start_worker().await;
    let client = Client::new();
    let tree = parse_newick(TREE, "t").unwrap();

    let ack: AckResponse = post(
        &client,
        &base,
        routes::SITES,
        &SetSitesRequest {
            sites: patterns(),
            settings: settings(),
        },
    )
    .await;
    assert_eq!(ack.sites, 4);
    let _: AckResponse = post(&client, &base, routes::TREE, &SetTreeRequest { tree: tree.to_spec() }).await;

    let params = MutationParams::default();
    let remote: LikelihoodResponse =
        post(&client, &base, routes::MUTATION_MODEL, &GlobalsRequest { params: params.clone() }).await;

    let code = Arc::new(GeneticCode::standard());
    let globals = Arc::new(MutationGlobals::new(code.clone(), params.clone()).unwrap());
    let mut local = SequentialRunner::new(patterns(), code, Arc::new(settings()));
    let expected = local.log_likelihood(&tree, &FitnessStore::default(), &globals).unwrap();
    assert_eq!(remote.log_likelihood.to_bits(), expected.to_bits());

    let fitness: FitnessResponse =
        post(&client, &base, routes::OPTIMISE_FITNESS, &GlobalsRequest { params: params.clone() }).await;
    let mut local_store = FitnessStore::default();
    let local_total = local.optimise_fitness(&tree, &globals, &mut local_store).unwrap();
    assert_eq!(fitness.log_likelihood.to_bits(), local_total.to_bits());
    assert_eq!(fitness.store, local_store);
    let held: FitnessStore = client
        .get(format!("{}{}", base, routes::FITNESS_STORE))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(held, local_store);

    // Branch stage on the worker's copy of the tree.
    let rooted: LikelihoodResponse = post(&client, &base, routes::CALCULATORS, &GlobalsRequest { params }).await;
    let expected = local.update_likelihood_calculators(&tree, &local_store, &globals).unwrap();
    assert_eq!(rooted.log_likelihood.to_bits(), expected.to_bits());
    let c = tree.find("c").unwrap();
    let branch: LikelihoodResponse = post(
        &client,
        &base,
        routes::NODE_LIKELIHOOD,
        &BranchRequest {
            node: c,
            branch_length: 0.3,
        },
    )
    .await;
    assert!((branch.log_likelihood - fitness.log_likelihood).abs() < 1e-6);
    let _: AckResponse = post(
        &client,
        &base,
        routes::BRANCH_LENGTH,
        &BranchRequest {
            node: c,
            branch_length: 0.5,
        },
    )
    .await;
}

#[tokio::test]
async fn test_calls_before_setup_are_rejected() {
    let base = start_worker().await;
    let client = Client::new();
    let response = client
        .post(format!("{}{}", base, routes::MUTATION_MODEL))
        .json(&GlobalsRequest {
            params: MutationParams::default(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("has not been set"));
    assert!(!body.zero_likelihood);
}

#[tokio::test]
async fn test_invalid_parameters_are_a_bad_request() {
    let base = start_worker().await;
    let client = Client::new();
    let _: AckResponse = post(
        &client,
        &base,
        routes::SITES,
        &SetSitesRequest {
            sites: patterns(),
            settings: settings(),
        },
    )
    .await;
    let tree = parse_newick(TREE, "t").unwrap();
    let _: AckResponse = post(&client, &base, routes::TREE, &SetTreeRequest { tree: tree.to_spec() }).await;

    let response = client
        .post(format!("{}{}", base, routes::MUTATION_MODEL))
        .json(&GlobalsRequest {
            params: MutationParams {
                kappa: -1.0,
                ..Default::default()
            },
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_codon_is_rejected_and_worker_recovers() {
    let base = start_worker().await;
    let client = Client::new();

    let mut bad = patterns();
    bad[0].states.insert("a".to_string(), Some(200));
    let response = client
        .post(format!("{}{}", base, routes::SITES))
        .json(&SetSitesRequest {
            sites: bad,
            settings: settings(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("not a sense codon"), "{}", body.error);

    let ack: AckResponse = post(
        &client,
        &base,
        routes::SITES,
        &SetSitesRequest {
            sites: patterns(),
            settings: settings(),
        },
    )
    .await;
    assert_eq!(ack.sites, 4);
}
