//! Coordinator side of a distributed estimation: a `Runner` whose sites live
//! on remote workers.

pub mod balance;
pub mod runner;

pub use self::runner::{DistributedRunner, RemoteOptions};
