use crate::consts::{CODON_COUNT, CODON_MATRIX_SIZE};
use crate::error::{SelError, SelResult};
use crate::fitness::Fitness;
use crate::globals::MutationGlobals;
use crate::model::fixation::fixation_kernel;
use nalgebra::DMatrix;
use std::sync::Arc;

const MAX_EIGEN_ITERATIONS: usize = 10_000;

/// Mutation-selection codon model for one site (and one clade).
///
/// The state space is restricted to the codons of `amino_acids`, so the rate
/// matrix is `matrix_size x matrix_size` rather than 64 x 64. A model is always
/// current: changing fitness or globals goes through [`CodonModel::update_model`]
/// or [`CodonModel::with_globals`], which return a freshly decomposed snapshot.
#[derive(Debug, Clone)]
pub struct CodonModel {
    globals: Arc<MutationGlobals>,
    fitness: Fitness,
    amino_acids: Vec<u8>,
    site_codons: Vec<usize>,
    positions: [Option<usize>; CODON_COUNT],
    codon_pi: Vec<f64>,
    q: Vec<f64>,
    /// Eigenvalues of Q, already multiplied by mu.
    eigenvalues: Vec<f64>,
    u: Vec<f64>,
    u_inv: Vec<f64>,
}

impl CodonModel {
    pub fn new(globals: Arc<MutationGlobals>, fitness: Fitness, amino_acids: Vec<u8>) -> SelResult<Self> {
        if amino_acids.is_empty() {
            return Err(SelError::InvalidParameter(
                "codon model needs at least one amino acid".to_string(),
            ));
        }
        if fitness.len() != amino_acids.len() {
            return Err(SelError::InvalidParameter(format!(
                "fitness has {} values for {} amino acids",
                fitness.len(),
                amino_acids.len()
            )));
        }
        if let Some(bad) = fitness.values.iter().find(|f| !f.is_finite()) {
            return Err(SelError::InvalidParameter(format!("fitness value {} is not finite", bad)));
        }

        let code = globals.code().clone();
        let mut site_codons = Vec::new();
        let mut codon_fitness = Vec::new();
        let mut positions = [None; CODON_COUNT];
        for (k, &aa) in amino_acids.iter().enumerate() {
            for &codon in code.codons_of(aa) {
                if positions[codon].is_some() {
                    return Err(SelError::InvalidParameter(format!(
                        "amino acid {} listed twice",
                        aa
                    )));
                }
                positions[codon] = Some(site_codons.len());
                site_codons.push(codon);
                codon_fitness.push(fitness.values[k]);
            }
        }

        let n = site_codons.len();
        let codon_pi = equilibrium(&globals, &site_codons, &codon_fitness);
        let q = rate_matrix(&globals, &site_codons, &codon_fitness);
        let (eigenvalues, u, u_inv) = decompose(&q, &codon_pi, globals.mu())?;
        debug_assert_eq!(eigenvalues.len(), n);

        Ok(Self {
            globals,
            fitness,
            amino_acids,
            site_codons,
            positions,
            codon_pi,
            q,
            eigenvalues,
            u,
            u_inv,
        })
    }

    /// Snapshot of this model under new fitness values.
    pub fn update_model(&self, fitness: Fitness) -> SelResult<Self> {
        Self::new(self.globals.clone(), fitness, self.amino_acids.clone())
    }

    /// Snapshot of this model under new mutation globals.
    pub fn with_globals(&self, globals: Arc<MutationGlobals>) -> SelResult<Self> {
        Self::new(globals, self.fitness.clone(), self.amino_acids.clone())
    }

    #[inline]
    pub fn matrix_size(&self) -> usize {
        self.site_codons.len()
    }

    pub fn site_codons(&self) -> &[usize] {
        &self.site_codons
    }

    pub fn amino_acids(&self) -> &[u8] {
        &self.amino_acids
    }

    pub fn fitness(&self) -> &Fitness {
        &self.fitness
    }

    pub fn globals(&self) -> &Arc<MutationGlobals> {
        &self.globals
    }

    /// Equilibrium frequencies in `site_codons` order.
    pub fn codon_pi(&self) -> &[f64] {
        &self.codon_pi
    }

    /// Generator matrix, row-major in `site_codons` order.
    pub fn rate_matrix(&self) -> &[f64] {
        &self.q
    }

    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    #[inline]
    pub fn contains(&self, codon: usize) -> bool {
        self.positions[codon].is_some()
    }

    /// Equilibrium frequency addressed by codon index; 0 outside the state space.
    #[inline]
    pub fn equilibrium(&self, codon: usize) -> f64 {
        self.positions[codon].map_or(0.0, |p| self.codon_pi[p])
    }

    /// Writes `P(t) = U exp(Lambda t) U^-1` into the 64x64 slot layout of `out`.
    ///
    /// Entries outside the state space are zeroed; negative round-off is clamped to 0.
    pub fn probability_matrix(&self, t: f64, out: &mut [f64]) {
        assert_eq!(
            out.len(),
            CODON_MATRIX_SIZE,
            "probability matrix buffer must hold 64x64 entries"
        );
        out.fill(0.0);

        let n = self.matrix_size();
        let exp_lt: Vec<f64> = self.eigenvalues.iter().map(|l| (l * t).exp()).collect();
        let mut row = vec![0.0; n];

        for (i, &ci) in self.site_codons.iter().enumerate() {
            for k in 0..n {
                row[k] = self.u[i * n + k] * exp_lt[k];
            }
            let base = ci * CODON_COUNT;
            for (j, &cj) in self.site_codons.iter().enumerate() {
                let mut p = 0.0;
                for k in 0..n {
                    p += row[k] * self.u_inv[k * n + j];
                }
                out[base + cj] = p.max(0.0);
            }
        }
    }
}

fn equilibrium(globals: &MutationGlobals, site_codons: &[usize], codon_fitness: &[f64]) -> Vec<f64> {
    let top = codon_fitness.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut pi: Vec<f64> = site_codons
        .iter()
        .zip(codon_fitness)
        .map(|(&c, &f)| globals.codon_pi_product(c) * (f - top).exp())
        .collect();
    let total: f64 = pi.iter().sum();
    pi.iter_mut().for_each(|p| *p /= total);
    pi
}

fn rate_matrix(globals: &MutationGlobals, site_codons: &[usize], codon_fitness: &[f64]) -> Vec<f64> {
    let n = site_codons.len();
    let nu = globals.nu();
    let mut q = vec![0.0; n * n];

    for i in 0..n {
        let mut row_sum = 0.0;
        for j in 0..n {
            if i == j {
                continue;
            }
            let neutral = globals.neutral_rate(site_codons[i], site_codons[j]);
            if neutral == 0.0 {
                continue;
            }
            let rate = nu * neutral * fixation_kernel(codon_fitness[j] - codon_fitness[i]);
            q[i * n + j] = rate;
            row_sum += rate;
        }
        q[i * n + i] = -row_sum;
    }
    q
}

/// Eigendecomposition through the symmetric similarity transform
/// `B = Pi^1/2 Q Pi^-1/2`, valid because the process is reversible.
#[allow(clippy::type_complexity)]
fn decompose(q: &[f64], pi: &[f64], mu: f64) -> SelResult<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let n = pi.len();
    let sqrt_pi: Vec<f64> = pi.iter().map(|p| p.sqrt()).collect();

    let mut b = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        b[(i, i)] = q[i * n + i];
        for j in (i + 1)..n {
            let upper = q[i * n + j] * sqrt_pi[i] / sqrt_pi[j];
            let lower = q[j * n + i] * sqrt_pi[j] / sqrt_pi[i];
            let v = 0.5 * (upper + lower);
            b[(i, j)] = v;
            b[(j, i)] = v;
        }
    }

    let eigen = b
        .try_symmetric_eigen(f64::EPSILON, MAX_EIGEN_ITERATIONS)
        .ok_or(SelError::EigenDecomposition { matrix_size: n })?;

    let eigenvalues: Vec<f64> = eigen.eigenvalues.iter().map(|l| l * mu).collect();
    if eigenvalues.iter().any(|l| !l.is_finite()) {
        return Err(SelError::EigenDecomposition { matrix_size: n });
    }

    let r = &eigen.eigenvectors;
    let mut u = vec![0.0; n * n];
    let mut u_inv = vec![0.0; n * n];
    for i in 0..n {
        for k in 0..n {
            u[i * n + k] = r[(i, k)] / sqrt_pi[i];
            u_inv[k * n + i] = r[(i, k)] * sqrt_pi[i];
        }
    }

    Ok((eigenvalues, u, u_inv))
}
