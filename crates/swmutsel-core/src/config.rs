use crate::error::{SelError, SelResult};
use crate::params::{EvaluationSettings, MutationParams};
use clap::{parser::ValueSource, ArgMatches, Args};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub mutation: MutationArgs,
    #[command(flatten)]
    pub search: SearchParams,
}

impl Config {
    /// Reads a JSON config; missing fields keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SelResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SelError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Overrides file values with arguments given explicitly on the command line.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        self.mutation.merge_from_cli(&cli.mutation, matches);
        self.search.merge_from_cli(&cli.search, matches);
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationArgs {
    /// Relative rate of each extra simultaneous nucleotide change
    #[arg(long, default_value_t = 0.01)]
    pub tau: f64,
    /// Transition/transversion ratio
    #[arg(long, default_value_t = 2.0)]
    pub kappa: f64,
    /// Nucleotide frequencies in T,C,A,G order
    #[arg(long, default_value = "0.25,0.25,0.25,0.25")]
    pub pi: String,
    /// Branch-length scaling of the mutation process
    #[arg(long, default_value_t = 1.0)]
    pub mu: f64,
    #[arg(long, default_value_t = 0.0)]
    pub gamma: f64,
}

impl Default for MutationArgs {
    fn default() -> Self {
        Self {
            tau: 0.01,
            kappa: 2.0,
            pi: "0.25,0.25,0.25,0.25".to_string(),
            mu: 1.0,
            gamma: 0.0,
        }
    }
}

impl MutationArgs {
    pub fn to_params(&self) -> SelResult<MutationParams> {
        Ok(MutationParams {
            tau: self.tau,
            kappa: self.kappa,
            pi: parse_f64_array::<4>(&self.pi, "pi")?,
            mu: self.mu,
            gamma: self.gamma,
        })
    }

    pub fn from_params(params: &MutationParams) -> Self {
        Self {
            tau: params.tau,
            kappa: params.kappa,
            pi: params.pi.iter().join(","),
            mu: params.mu,
            gamma: params.gamma,
        }
    }

    pub fn merge_from_cli(&mut self, cli: &MutationArgs, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident, $arg_name:expr) => {
                if matches.value_source($arg_name) == Some(ValueSource::CommandLine) {
                    self.$field = cli.$field.clone();
                }
            };
        }

        update_if_present!(tau, "tau");
        update_if_present!(kappa, "kappa");
        update_if_present!(pi, "pi");
        update_if_present!(mu, "mu");
        update_if_present!(gamma, "gamma");
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Stop when the log-likelihood improves by less than this between iterations
    #[arg(long, default_value_t = 0.05)]
    pub tolerance: f64,
    #[arg(long, default_value_t = 50)]
    pub max_iterations: usize,

    // === STAGES ===
    #[arg(long)]
    pub fix_branches: bool,
    #[arg(long)]
    pub fix_mutation: bool,
    /// Also optimise mu in the mutation stage
    #[arg(long)]
    pub optimise_mu: bool,

    // === SITE MODEL ===
    /// Give every site all 20 amino acids instead of the observed ones
    #[arg(long)]
    pub full: bool,
    #[arg(long, default_value = "standard")]
    pub genetic_code: String,
    /// Comma-separated node-name prefixes, each with its own fitness vector
    #[arg(long, default_value = "")]
    pub clades: String,
    #[arg(long, default_value_t = 0.5)]
    pub clade_split: f64,

    // === NUMERICS ===
    #[arg(long, default_value_t = 2000)]
    pub simplex_max_iters: u64,
    #[arg(long, default_value_t = 1e-6)]
    pub simplex_tolerance: f64,
    #[arg(long, default_value_t = 500)]
    pub mutation_max_iters: u64,
    #[arg(long, default_value_t = 100)]
    pub brent_max_iters: u64,
    #[arg(long, default_value_t = 4)]
    pub scaling_step: usize,
    #[arg(long, default_value_t = 1e-20)]
    pub scaling_threshold: f64,

    // === EXECUTION ===
    /// Worker threads; 0 uses every core
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Seconds before a remote worker call is abandoned
    #[arg(long, visible_alias = "timeout", default_value_t = 600)]
    pub worker_timeout_secs: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            tolerance: 0.05,
            max_iterations: 50,
            fix_branches: false,
            fix_mutation: false,
            optimise_mu: false,
            full: false,
            genetic_code: "standard".to_string(),
            clades: String::new(),
            clade_split: 0.5,
            simplex_max_iters: 2000,
            simplex_tolerance: 1e-6,
            mutation_max_iters: 500,
            brent_max_iters: 100,
            scaling_step: 4,
            scaling_threshold: 1e-20,
            threads: 0,
            seed: None,
            worker_timeout_secs: 600,
        }
    }
}

impl SearchParams {
    pub fn clade_labels(&self) -> Vec<String> {
        self.clades
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn evaluation_settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            genetic_code: self.genetic_code.clone(),
            approximate: !self.full,
            clades: self.clade_labels(),
            clade_split: self.clade_split,
            seed: self.seed,
            simplex_max_iters: self.simplex_max_iters,
            simplex_tolerance: self.simplex_tolerance,
            scaling_step: self.scaling_step,
            scaling_threshold: self.scaling_threshold,
        }
    }

    pub fn merge_from_cli(&mut self, cli: &SearchParams, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident, $arg_name:expr) => {
                if matches.value_source($arg_name) == Some(ValueSource::CommandLine) {
                    self.$field = cli.$field.clone();
                }
            };
        }

        update_if_present!(tolerance, "tolerance");
        update_if_present!(max_iterations, "max_iterations");

        update_if_present!(fix_branches, "fix_branches");
        update_if_present!(fix_mutation, "fix_mutation");
        update_if_present!(optimise_mu, "optimise_mu");

        update_if_present!(full, "full");
        update_if_present!(genetic_code, "genetic_code");
        update_if_present!(clades, "clades");
        update_if_present!(clade_split, "clade_split");

        update_if_present!(simplex_max_iters, "simplex_max_iters");
        update_if_present!(simplex_tolerance, "simplex_tolerance");
        update_if_present!(mutation_max_iters, "mutation_max_iters");
        update_if_present!(brent_max_iters, "brent_max_iters");
        update_if_present!(scaling_step, "scaling_step");
        update_if_present!(scaling_threshold, "scaling_threshold");

        update_if_present!(threads, "threads");
        update_if_present!(seed, "seed");
        update_if_present!(worker_timeout_secs, "worker_timeout_secs");
    }
}

pub fn parse_f64_array<const N: usize>(s: &str, name: &str) -> SelResult<[f64; N]> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != N {
        return Err(SelError::Config(format!("--{} requires {} values", name, N)));
    }
    let mut arr = [0.0; N];
    for (i, p) in parts.iter().enumerate() {
        arr[i] = p
            .trim()
            .parse()
            .map_err(|_| SelError::Config(format!("Invalid number '{}' in {}", p.trim(), name)))?;
    }
    Ok(arr)
}
