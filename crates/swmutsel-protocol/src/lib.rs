//! Wire types shared between the estimation coordinator and remote workers.

pub mod fitness;
pub mod params;
pub mod protocol;
pub mod site;
pub mod tree;

pub use fitness::{Fitness, FitnessStore};
pub use params::{EvaluationSettings, MutationParams};
pub use site::SitePattern;
pub use tree::{NodeSpec, TreeSpec};
