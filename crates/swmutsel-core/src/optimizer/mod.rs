pub mod estimation;
pub mod initialization;
pub mod simplex;
pub mod transform;

pub use self::estimation::{EstimationOptions, EstimationResult, Estimator, ProgressCallback, Stage};
