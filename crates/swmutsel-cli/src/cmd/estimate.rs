use super::Inputs;
use crate::reports;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use swmutsel_coordinator::{DistributedRunner, RemoteOptions};
use swmutsel_core::api::AnalysisSession;
use swmutsel_core::config::Config;
use swmutsel_core::error::SelResult;
use swmutsel_core::globals::MutationGlobals;
use swmutsel_core::optimizer::{EstimationOptions, EstimationResult, Estimator, ProgressCallback, Stage};
use swmutsel_core::results::{output_paths, write_estimation_outputs, write_globals_file, GlobalsReport};
use swmutsel_core::runner::{Runner, ThreadPoolRunner};
use swmutsel_core::tree::newick::write_newick_file;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub config: Config,

    /// Prefix of the result files
    #[arg(short, long, default_value = "swmutsel")]
    pub output: String,

    /// Starting fitness table
    #[arg(long)]
    pub fitness: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BranchesArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(short, long, default_value = "swmutsel")]
    pub output: String,

    /// Fitness table to hold fixed; sites without an entry use their starting fitness
    #[arg(long)]
    pub fitness: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MasterArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(short, long, default_value = "swmutsel")]
    pub output: String,

    #[arg(long)]
    pub fitness: Option<PathBuf>,

    /// Comma-separated worker base URLs, e.g. http://host:7000
    #[arg(long, value_delimiter = ',', required = true)]
    pub workers: Vec<String>,
}

struct CliLogger;
impl ProgressCallback for CliLogger {
    fn on_progress(&self, iteration: usize, stage: Stage, log_likelihood: f64) -> bool {
        info!("Iter {:3} | {:<9} | lnL {:.4}", iteration, stage.to_string(), log_likelihood);
        true
    }
}

fn estimate<R: Runner>(
    runner: R,
    session: &AnalysisSession,
    config: &Config,
    fitness: Option<&PathBuf>,
) -> SelResult<EstimationResult> {
    let store = session.initial_store(fitness.map(PathBuf::as_path))?;
    let params = config.mutation.to_params()?;
    let mut estimator = Estimator::new(runner, session.code.clone(), EstimationOptions::from(config));
    estimator.run(session.tree.clone(), params, store, &CliLogger)
}

fn finish(session: &AnalysisSession, result: &EstimationResult, output: &str) -> SelResult<()> {
    info!("\n=== 🏁 FINAL RESULT ===");
    reports::print_estimation_summary(result);
    write_estimation_outputs(output, result, &session.site_evaluators())
}

pub fn run_estimate(inputs: &Inputs, args: EstimateArgs, config: Config) -> SelResult<()> {
    let session = inputs.load(&config)?;
    let runner = ThreadPoolRunner::new(
        session.site_patterns(),
        session.code.clone(),
        session.settings.clone(),
        config.search.threads,
    )?;
    let result = estimate(runner, &session, &config, args.fitness.as_ref())?;
    finish(&session, &result, &args.output)
}

pub fn run_master(inputs: &Inputs, args: MasterArgs, config: Config) -> SelResult<()> {
    let session = inputs.load(&config)?;
    let options = RemoteOptions {
        request_timeout: Duration::from_secs(config.search.worker_timeout_secs),
        ..Default::default()
    };
    info!("🛰️  Distributing {} sites over {} workers", session.site_count(), args.workers.len());
    let runner = DistributedRunner::connect(
        &args.workers,
        session.site_patterns(),
        (*session.settings).clone(),
        options,
    )?;
    let result = estimate(runner, &session, &config, args.fitness.as_ref())?;
    finish(&session, &result, &args.output)
}

/// One pass of branch optimisation; fitness and mutation parameters stay as given.
pub fn run_branches(inputs: &Inputs, args: BranchesArgs, config: Config) -> SelResult<()> {
    let session = inputs.load(&config)?;
    let store = session.initial_store(args.fitness.as_deref())?;
    let params = config.mutation.to_params()?;
    let globals = Arc::new(MutationGlobals::new(session.code.clone(), params.clone())?);

    let runner = ThreadPoolRunner::new(
        session.site_patterns(),
        session.code.clone(),
        session.settings.clone(),
        config.search.threads,
    )?;
    let mut estimator = Estimator::new(runner, session.code.clone(), EstimationOptions::from(&config));
    let before = estimator.runner().log_likelihood(&session.tree, &store, &globals)?;
    let (tree, lnl) = estimator.optimise_branches(session.tree.clone(), &store, &globals)?;
    info!("🌿 Branch lengths optimised: lnL {:.4} -> {:.4}", before, lnl);
    info!("   Tree length {:.4} -> {:.4}", session.tree.total_length(), tree.total_length());

    let [_, tree_path, globals_path] = output_paths(&args.output);
    write_newick_file(&tree, &tree_path)?;
    write_globals_file(
        &globals_path,
        &GlobalsReport {
            params,
            log_likelihood: lnl,
            iterations: 1,
            converged: false,
        },
    )?;
    info!("💾 Results saved to {} and {}", tree_path.display(), globals_path.display());
    Ok(())
}
