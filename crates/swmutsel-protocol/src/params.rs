use serde::{Deserialize, Serialize};

/// Raw mutation parameters. Validation happens when the core builds
/// `MutationGlobals` from them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MutationParams {
    pub tau: f64,
    pub kappa: f64,
    /// Nucleotide frequencies in T, C, A, G order.
    pub pi: [f64; 4],
    pub mu: f64,
    #[serde(default)]
    pub gamma: f64,
}

impl Default for MutationParams {
    fn default() -> Self {
        Self {
            tau: 0.01,
            kappa: 2.0,
            pi: [0.25; 4],
            mu: 1.0,
            gamma: 0.0,
        }
    }
}

/// Per-site evaluation settings. Sent once to every worker together with its sites.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EvaluationSettings {
    pub genetic_code: String,
    /// Restrict each site to the amino acids actually observed there.
    pub approximate: bool,
    /// Non-root clade labels, matched as node-name prefixes. Empty means homogeneous.
    pub clades: Vec<String>,
    /// Fraction of a clade-transition branch evolved under the parent clade's model.
    pub clade_split: f64,
    pub seed: Option<u64>,
    pub simplex_max_iters: u64,
    pub simplex_tolerance: f64,
    /// Internal nodes between underflow checks during pruning.
    pub scaling_step: usize,
    pub scaling_threshold: f64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            genetic_code: "standard".to_string(),
            approximate: true,
            clades: Vec::new(),
            clade_split: 0.5,
            seed: None,
            simplex_max_iters: 2000,
            simplex_tolerance: 1e-6,
            scaling_step: 4,
            scaling_threshold: 1e-20,
        }
    }
}

impl EvaluationSettings {
    /// Number of fitness vectors stored per site.
    pub fn clade_count(&self) -> usize {
        self.clades.len() + 1
    }
}
