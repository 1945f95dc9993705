pub mod estimate;
pub mod site;
pub mod worker;

use swmutsel_core::api::AnalysisSession;
use swmutsel_core::config::Config;
use swmutsel_core::error::{SelError, SelResult};
use tracing::info;

/// Input files named by the global flags.
pub struct Inputs {
    pub tree: Option<String>,
    pub alignment: Option<String>,
}

impl Inputs {
    pub fn load(&self, config: &Config) -> SelResult<AnalysisSession> {
        let tree = self
            .tree
            .as_deref()
            .ok_or_else(|| SelError::Config("--tree is required for this command".to_string()))?;
        let alignment = self
            .alignment
            .as_deref()
            .ok_or_else(|| SelError::Config("--alignment is required for this command".to_string()))?;
        info!("📂 Loading tree {} and alignment {}", tree, alignment);
        AnalysisSession::from_files(tree, alignment, config)
    }
}
