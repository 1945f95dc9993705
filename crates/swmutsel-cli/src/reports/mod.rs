mod tables;

pub use self::tables::{
    estimation_summary as print_estimation_summary, genetic_codes as print_genetic_codes,
    site_fitness as print_site_fitness,
};
