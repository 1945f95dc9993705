use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::process;
use swmutsel_core::config::Config;
use swmutsel_core::error::SelResult;
use tracing::{error, info};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Site-wise mutation-selection estimation on a phylogeny", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Newick tree
    #[arg(global = true, short, long)]
    tree: Option<String>,

    /// Codon alignment (FASTA or sequential PHYLIP)
    #[arg(global = true, short, long)]
    alignment: Option<String>,

    /// JSON config; explicit command-line flags take precedence
    #[arg(global = true, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Optimise the fitness of a single site
    Site(cmd::site::SiteArgs),
    /// Full estimation on a local thread pool
    Estimate(cmd::estimate::EstimateArgs),
    /// Optimise branch lengths only, holding fitness and mutation parameters fixed
    Branches(cmd::estimate::BranchesArgs),
    /// Full estimation with sites spread over remote workers
    Master(cmd::estimate::MasterArgs),
    /// Serve sites to a master
    Worker(cmd::worker::WorkerArgs),
    /// List the available genetic codes
    Codes,
}

/// File config overlaid by the flags given explicitly on the command line.
fn resolve_config(path: Option<&str>, cli: &Config, matches: Option<&ArgMatches>) -> SelResult<Config> {
    match (path, matches) {
        (Some(path), Some(matches)) => {
            info!("⚙️  Loading config from {}", path);
            let mut config = Config::load_from_file(path)?;
            config.merge_from_cli(cli, matches);
            Ok(config)
        }
        _ => Ok(cli.clone()),
    }
}

fn run(cli: Cli, matches: &ArgMatches) -> SelResult<()> {
    let inputs = cmd::Inputs {
        tree: cli.tree.clone(),
        alignment: cli.alignment.clone(),
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Site(args) => {
            let config = resolve_config(config_path, &args.config, matches.subcommand_matches("site"))?;
            cmd::site::run(&inputs, args, config)
        }
        Commands::Estimate(args) => {
            let config = resolve_config(config_path, &args.config, matches.subcommand_matches("estimate"))?;
            cmd::estimate::run_estimate(&inputs, args, config)
        }
        Commands::Branches(args) => {
            let config = resolve_config(config_path, &args.config, matches.subcommand_matches("branches"))?;
            cmd::estimate::run_branches(&inputs, args, config)
        }
        Commands::Master(args) => {
            let config = resolve_config(config_path, &args.config, matches.subcommand_matches("master"))?;
            cmd::estimate::run_master(&inputs, args, config)
        }
        Commands::Worker(args) => cmd::worker::run(args),
        Commands::Codes => {
            reports::print_genetic_codes();
            Ok(())
        }
    }
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = run(cli, &matches) {
        error!("❌ {}", e);
        process::exit(1);
    }
}
