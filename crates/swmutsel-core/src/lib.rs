// Re-export wire types so they are accessible via swmutsel_core::*
pub use swmutsel_protocol::fitness;
pub use swmutsel_protocol::params;
pub use swmutsel_protocol::protocol;
pub use swmutsel_protocol::{
    EvaluationSettings, Fitness, FitnessStore, MutationParams, NodeSpec, SitePattern, TreeSpec,
};

pub mod alignment;
pub mod api;
pub mod code;
pub mod config;
pub mod consts;
pub mod error;
pub mod globals;
pub mod likelihood;
pub mod model;
pub mod optimizer;
pub mod results;
pub mod runner;
pub mod tree;
