use crate::fitness::FitnessStore;
use crate::params::{EvaluationSettings, MutationParams};
use crate::site::SitePattern;
use crate::tree::TreeSpec;
use serde::{Deserialize, Serialize};

/// Route paths served by a worker.
pub mod routes {
    pub const HEALTH: &str = "/health";
    pub const SITES: &str = "/sites";
    pub const TREE: &str = "/tree";
    pub const FITNESS_STORE: &str = "/fitness";
    pub const MUTATION_MODEL: &str = "/likelihood/mutation";
    pub const OPTIMISE_FITNESS: &str = "/likelihood/fitness";
    pub const CALCULATORS: &str = "/likelihood/calculators";
    pub const NODE_LIKELIHOOD: &str = "/likelihood/node";
    pub const BRANCH_LENGTH: &str = "/branch";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetSitesRequest {
    pub sites: Vec<SitePattern>,
    pub settings: EvaluationSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetTreeRequest {
    pub tree: TreeSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetFitnessStoreRequest {
    pub store: FitnessStore,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GlobalsRequest {
    pub params: MutationParams,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct BranchRequest {
    pub node: usize,
    pub branch_length: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct LikelihoodResponse {
    pub log_likelihood: f64,
}

/// Result of a fitness round: the worker's summed likelihood and the new
/// fitness of its own sites.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FitnessResponse {
    pub log_likelihood: f64,
    pub store: FitnessStore,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AckResponse {
    pub status: String,
    pub sites: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub error: String,
    /// Set when the failure was a zero root likelihood, which callers treat as
    /// a very poor score rather than a fatal error.
    #[serde(default)]
    pub zero_likelihood: bool,
}
