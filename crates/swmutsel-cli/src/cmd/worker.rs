use clap::Args;
use std::net::SocketAddr;
use swmutsel_core::error::{SelError, SelResult};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    #[arg(long, default_value_t = 7000)]
    pub port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Site threads; 0 uses every core
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

pub fn run(args: WorkerArgs) -> SelResult<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| SelError::Config(format!("Invalid listen address: {}", e)))?;
    info!("🐝 Starting worker on {}", addr);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(swmutsel_worker::serve(addr, args.threads))?;
    Ok(())
}
