use super::Inputs;
use crate::reports;
use clap::Args;
use std::sync::Arc;
use swmutsel_core::config::Config;
use swmutsel_core::error::SelResult;
use swmutsel_core::globals::MutationGlobals;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct SiteArgs {
    #[command(flatten)]
    pub config: Config,

    /// Zero-based codon site
    #[arg(long)]
    pub site: usize,
}

pub fn run(inputs: &Inputs, args: SiteArgs, config: Config) -> SelResult<()> {
    let session = inputs.load(&config)?;
    let evaluator = session.site_evaluator(args.site)?;
    let globals = Arc::new(MutationGlobals::new(session.code.clone(), config.mutation.to_params()?)?);

    let start = evaluator.log_likelihood(&session.tree, &globals, None)?;
    let (fitness, lnl) = evaluator.optimise(&session.tree, &globals, None)?;
    info!("🔬 Site {}: lnL {:.4} -> {:.4}", args.site, start, lnl);

    reports::print_site_fitness(&evaluator, &fitness, lnl);
    Ok(())
}
