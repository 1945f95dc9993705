//! Mapping between mutation parameters and the unconstrained vector searched
//! by the simplex. Nucleotide frequencies use the additive log-ratio with `G`
//! as the reference, so any real vector decodes to a valid simplex point.

use crate::params::MutationParams;

const REFERENCE: usize = 3;

pub fn alr(pi: &[f64; 4]) -> [f64; 3] {
    let reference = pi[REFERENCE];
    [(pi[0] / reference).ln(), (pi[1] / reference).ln(), (pi[2] / reference).ln()]
}

pub fn alr_inverse(x: &[f64; 3]) -> [f64; 4] {
    let top = x.iter().cloned().fold(0.0, f64::max);
    let weights = [(x[0] - top).exp(), (x[1] - top).exp(), (x[2] - top).exp(), (-top).exp()];
    let total: f64 = weights.iter().sum();
    [
        weights[0] / total,
        weights[1] / total,
        weights[2] / total,
        weights[3] / total,
    ]
}

/// Which mutation parameters the search moves. `tau`, `kappa` and the
/// frequencies always move; `mu` only on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEncoding {
    pub optimise_mu: bool,
}

impl MutationEncoding {
    pub fn dimension(&self) -> usize {
        if self.optimise_mu {
            6
        } else {
            5
        }
    }

    /// `[tau, kappa, alr_T, alr_C, alr_A, (mu)]`
    pub fn encode(&self, params: &MutationParams) -> Vec<f64> {
        let mut x = vec![params.tau, params.kappa];
        x.extend_from_slice(&alr(&params.pi));
        if self.optimise_mu {
            x.push(params.mu);
        }
        x
    }

    /// `None` when the point lies outside the feasible region.
    pub fn decode(&self, x: &[f64], template: &MutationParams) -> Option<MutationParams> {
        if x.len() != self.dimension() || x.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let (tau, kappa) = (x[0], x[1]);
        if tau < 0.0 || kappa <= 0.0 {
            return None;
        }
        let mu = if self.optimise_mu { x[5] } else { template.mu };
        if mu <= 0.0 {
            return None;
        }
        let pi = alr_inverse(&[x[2], x[3], x[4]]);
        if pi.iter().any(|p| *p <= 0.0) {
            return None;
        }
        Some(MutationParams {
            tau,
            kappa,
            pi,
            mu,
            gamma: template.gamma,
        })
    }
}
