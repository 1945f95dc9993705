pub mod codon;
pub mod fixation;

pub use self::codon::CodonModel;
pub use self::fixation::fixation_kernel;
