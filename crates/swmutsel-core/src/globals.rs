use crate::code::GeneticCode;
use crate::consts::{CODON_COUNT, CODON_MATRIX_SIZE, PI_SUM_TOLERANCE};
use crate::error::{SelError, SelResult};
use crate::params::MutationParams;
use std::sync::Arc;

/// Neutral mutation process shared by every codon model in an iteration.
///
/// Built once from `(tau, kappa, pi, mu, gamma)` and read-only afterwards, so a
/// single `Arc<MutationGlobals>` is handed to all sites and threads.
#[derive(Debug, Clone)]
pub struct MutationGlobals {
    code: Arc<GeneticCode>,
    params: MutationParams,
    codon_pi_product: [f64; CODON_COUNT],
    codon_equilibrium: [f64; CODON_COUNT],
    neutral_mu: Vec<f64>,
    nu: f64,
}

impl MutationGlobals {
    pub fn new(code: Arc<GeneticCode>, params: MutationParams) -> SelResult<Self> {
        let params = validate(params)?;

        let mut codon_pi_product = [0.0; CODON_COUNT];
        let mut codon_equilibrium = [0.0; CODON_COUNT];
        for (codon, slot) in codon_pi_product.iter_mut().enumerate() {
            *slot = GeneticCode::nucleotides_of(codon)
                .iter()
                .map(|&n| params.pi[n as usize])
                .product();
        }

        let sense_total: f64 = code.sense_codons().iter().map(|&c| codon_pi_product[c]).sum();
        for &c in code.sense_codons() {
            codon_equilibrium[c] = codon_pi_product[c] / sense_total;
        }

        let mut neutral_mu = vec![0.0; CODON_MATRIX_SIZE];
        let mut weighted_rate = 0.0;
        for &i in code.sense_codons() {
            let from = GeneticCode::nucleotides_of(i);
            for &j in code.sense_codons() {
                if i == j {
                    continue;
                }
                let rate = unscaled_rate(&params, from, GeneticCode::nucleotides_of(j));
                neutral_mu[i * CODON_COUNT + j] = rate;
                weighted_rate += codon_equilibrium[i] * rate;
            }
        }

        if !(weighted_rate.is_finite() && weighted_rate > 0.0) {
            return Err(SelError::InvalidParameter(format!(
                "Neutral substitution rate is degenerate ({})",
                weighted_rate
            )));
        }

        Ok(Self {
            code,
            params,
            codon_pi_product,
            codon_equilibrium,
            neutral_mu,
            nu: 1.0 / weighted_rate,
        })
    }

    /// Unscaled neutral rate from codon `i` to codon `j`.
    #[inline]
    pub fn neutral_rate(&self, i: usize, j: usize) -> f64 {
        self.neutral_mu[i * CODON_COUNT + j]
    }

    /// Neutral equilibrium frequency of a codon (0 for stops).
    #[inline]
    pub fn codon_equilibrium(&self, codon: usize) -> f64 {
        self.codon_equilibrium[codon]
    }

    /// Product of the three nucleotide frequencies of a codon.
    #[inline]
    pub fn codon_pi_product(&self, codon: usize) -> f64 {
        self.codon_pi_product[codon]
    }

    /// Normaliser that fixes the expected neutral substitution rate at 1.
    #[inline]
    pub fn nu(&self) -> f64 {
        self.nu
    }

    #[inline]
    pub fn mu(&self) -> f64 {
        self.params.mu
    }

    pub fn params(&self) -> &MutationParams {
        &self.params
    }

    pub fn code(&self) -> &Arc<GeneticCode> {
        &self.code
    }
}

fn unscaled_rate(params: &MutationParams, from: [u8; 3], to: [u8; 3]) -> f64 {
    let mut changes = 0;
    let mut rate = 1.0;
    for k in 0..3 {
        if from[k] == to[k] {
            continue;
        }
        changes += 1;
        rate *= params.pi[to[k] as usize];
        if GeneticCode::is_transition(from[k], to[k]) {
            rate *= params.kappa;
        }
    }
    rate * params.tau.powi(changes - 1)
}

fn validate(mut params: MutationParams) -> SelResult<MutationParams> {
    let scalars = [
        ("tau", params.tau),
        ("kappa", params.kappa),
        ("mu", params.mu),
        ("gamma", params.gamma),
    ];
    for (name, value) in scalars {
        if !value.is_finite() {
            return Err(SelError::InvalidParameter(format!("{} is not finite ({})", name, value)));
        }
    }
    if params.tau < 0.0 {
        return Err(SelError::InvalidParameter(format!("tau must be >= 0 ({})", params.tau)));
    }
    if params.kappa <= 0.0 {
        return Err(SelError::InvalidParameter(format!("kappa must be > 0 ({})", params.kappa)));
    }
    if params.mu <= 0.0 {
        return Err(SelError::InvalidParameter(format!("mu must be > 0 ({})", params.mu)));
    }
    if params.pi.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(SelError::InvalidParameter(format!(
            "pi entries must be positive ({:?})",
            params.pi
        )));
    }

    let total: f64 = params.pi.iter().sum();
    if (total - 1.0).abs() > PI_SUM_TOLERANCE {
        return Err(SelError::InvalidParameter(format!(
            "pi must sum to 1 ({:?} sums to {})",
            params.pi, total
        )));
    }
    params.pi.iter_mut().for_each(|p| *p /= total);
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::GeneticCodeKind;
    use proptest::prelude::*;

    fn globals(params: MutationParams) -> MutationGlobals {
        MutationGlobals::new(Arc::new(GeneticCode::standard()), params).unwrap()
    }

    #[test]
    fn test_expected_neutral_rate_is_one() {
        let g = globals(MutationParams {
            tau: 0.1,
            kappa: 3.5,
            pi: [0.1, 0.2, 0.3, 0.4],
            ..Default::default()
        });
        let code = g.code().clone();
        let mut total = 0.0;
        for &i in code.sense_codons() {
            for &j in code.sense_codons() {
                total += g.codon_equilibrium(i) * g.nu() * g.neutral_rate(i, j);
            }
        }
        assert!((total - 1.0).abs() < 1e-12, "expected rate was {}", total);
    }

    #[test]
    fn test_multiple_hits_vanish_without_tau() {
        let g = globals(MutationParams {
            tau: 0.0,
            ..Default::default()
        });
        // TTT -> TCC differs at two positions
        let ttt = GeneticCode::codon_from_str(b"TTT").unwrap();
        let tcc = GeneticCode::codon_from_str(b"TCC").unwrap();
        let ttc = GeneticCode::codon_from_str(b"TTC").unwrap();
        assert_eq!(g.neutral_rate(ttt, tcc), 0.0);
        // single transition T->C at the third position: kappa * pi_C
        assert!((g.neutral_rate(ttt, ttc) - 2.0 * 0.25).abs() < 1e-15);
    }

    #[test]
    fn test_stop_codons_are_excluded() {
        let g = globals(MutationParams::default());
        let taa = GeneticCode::codon_from_str(b"TAA").unwrap();
        let tac = GeneticCode::codon_from_str(b"TAC").unwrap();
        assert_eq!(g.codon_equilibrium(taa), 0.0);
        assert_eq!(g.neutral_rate(tac, taa), 0.0);
        assert_eq!(g.neutral_rate(taa, tac), 0.0);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let code = Arc::new(GeneticCode::standard());
        let bad = [
            MutationParams { kappa: -1.0, ..Default::default() },
            MutationParams { tau: f64::NAN, ..Default::default() },
            MutationParams { pi: [0.5, 0.5, 0.5, 0.5], ..Default::default() },
            MutationParams { pi: [0.0, 0.5, 0.25, 0.25], ..Default::default() },
            MutationParams { mu: 0.0, ..Default::default() },
        ];
        for params in bad {
            assert!(MutationGlobals::new(code.clone(), params).is_err());
        }
    }

    #[test]
    fn test_minor_pi_drift_is_renormalised() {
        let g = globals(MutationParams {
            pi: [0.2502, 0.25, 0.25, 0.25],
            ..Default::default()
        });
        let total: f64 = g.params().pi.iter().sum();
        assert!((total - 1.0).abs() < 1e-15);
    }

    proptest! {
        #[test]
        fn prop_codon_equilibrium_sums_to_one(
            weights in prop::array::uniform4(0.05f64..1.0),
            kappa in 0.1f64..20.0,
            tau in 0.0f64..1.0,
            mitochondrial in any::<bool>(),
        ) {
            let total: f64 = weights.iter().sum();
            let pi = weights.map(|w| w / total);
            let kind = if mitochondrial {
                GeneticCodeKind::VertebrateMitochondrial
            } else {
                GeneticCodeKind::Standard
            };
            let g = MutationGlobals::new(
                Arc::new(GeneticCode::new(kind)),
                MutationParams { tau, kappa, pi, ..Default::default() },
            )
            .unwrap();
            let sum: f64 = (0..CODON_COUNT).map(|c| g.codon_equilibrium(c)).sum();
            prop_assert!((sum - 1.0).abs() < 1e-12, "equilibrium sums to {}", sum);
        }
    }
}
