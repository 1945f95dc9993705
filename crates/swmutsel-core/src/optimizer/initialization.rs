use crate::consts::{FITNESS_BOUND, RANDOM_START_RANGE};

/// Starting points for one site's fitness search, in the order tried.
///
/// `current` is the free-parameter vector already held for the site and
/// `observed[k]` tells whether free parameter `k` belongs to an amino acid seen
/// at the site. The observed/unobserved start is only offered when some
/// parameter is unobserved, i.e. outside the reduced state space.
pub fn fitness_starting_points(current: &[f64], observed: &[bool], rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
    let dim = current.len();
    let mut starts: Vec<Vec<f64>> = Vec::with_capacity(4);

    // 1. Zero vector
    starts.push(vec![0.0; dim]);

    // 2. Unobserved residues pushed to the lower bound
    if observed.iter().any(|o| !o) {
        starts.push(
            observed
                .iter()
                .map(|&o| if o { 0.0 } else { -FITNESS_BOUND })
                .collect(),
        );
    }

    // 3. Uniform random
    starts.push(
        (0..dim)
            .map(|_| RANDOM_START_RANGE * (2.0 * rng.f64() - 1.0))
            .collect(),
    );

    // 4. Where the previous round ended up
    if current.iter().all(|v| v.abs() <= FITNESS_BOUND) && !starts.iter().any(|s| s.as_slice() == current) {
        starts.push(current.to_vec());
    }

    starts
}

pub fn site_rng(seed: Option<u64>, site: usize) -> fastrand::Rng {
    match seed {
        Some(s) => fastrand::Rng::with_seed(s.wrapping_add(site as u64)),
        None => fastrand::Rng::new(),
    }
}
