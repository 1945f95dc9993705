use crate::consts::{CODON_COUNT, CODON_MATRIX_SIZE};
use crate::error::{SelError, SelResult};
use crate::model::CodonModel;

/// Scratch space for one transition-matrix computation. Owned by a single
/// evaluation and never shared between threads.
#[derive(Debug, Clone)]
pub struct TransitionBuffers {
    pub matrix: Vec<f64>,
    upper: Vec<f64>,
    lower: Vec<f64>,
}

impl Default for TransitionBuffers {
    fn default() -> Self {
        Self {
            matrix: vec![0.0; CODON_MATRIX_SIZE],
            upper: vec![0.0; CODON_MATRIX_SIZE],
            lower: vec![0.0; CODON_MATRIX_SIZE],
        }
    }
}

/// One end of a branch: the clade label and the model active in that clade.
#[derive(Debug, Clone, Copy)]
pub struct CladeEnd<'m> {
    pub label: &'m str,
    pub clade: usize,
    pub model: &'m CodonModel,
}

/// Fills `buffers.matrix` with the transition matrix of a branch of length `t`.
///
/// Within one clade this is `P(t)` of that clade's model. Across a clade
/// boundary the branch is split: the parent's model runs for `split * t`, the
/// child's for the remainder, and the two matrices are multiplied over the
/// codons both models share.
pub fn branch_transition(
    parent: CladeEnd<'_>,
    child: CladeEnd<'_>,
    split: f64,
    t: f64,
    buffers: &mut TransitionBuffers,
) -> SelResult<()> {
    if parent.clade == child.clade {
        parent.model.probability_matrix(t, &mut buffers.matrix);
        return Ok(());
    }

    let shared: Vec<usize> = parent
        .model
        .site_codons()
        .iter()
        .copied()
        .filter(|&c| child.model.contains(c))
        .collect();
    if shared.is_empty() {
        return Err(SelError::DisjointCladeStates {
            parent: parent.label.to_string(),
            child: child.label.to_string(),
        });
    }

    parent.model.probability_matrix(split * t, &mut buffers.upper);
    child.model.probability_matrix((1.0 - split) * t, &mut buffers.lower);

    let out = &mut buffers.matrix;
    out.fill(0.0);
    for &i in parent.model.site_codons() {
        let row = i * CODON_COUNT;
        for &k in &shared {
            let p_ik = buffers.upper[row + k];
            if p_ik == 0.0 {
                continue;
            }
            let lower_row = k * CODON_COUNT;
            for &j in child.model.site_codons() {
                out[row + j] += p_ik * buffers.lower[lower_row + j];
            }
        }
    }
    Ok(())
}
