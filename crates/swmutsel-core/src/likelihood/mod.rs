pub mod branch;
pub mod calculator;
pub mod site;
pub mod transition;

pub use self::branch::BranchCache;
pub use self::calculator::{LikelihoodCalculator, ScalingPolicy};
pub use self::site::SiteEvaluator;
