use super::branch::BranchCache;
use super::transition::{branch_transition, CladeEnd, TransitionBuffers};
use crate::consts::{CODON_COUNT, DEFAULT_SCALING_STEP, DEFAULT_SCALING_THRESHOLD};
use crate::error::{SelError, SelResult};
use crate::fitness::Fitness;
use crate::model::CodonModel;
use crate::tree::{NodeId, Tree};
use crate::SitePattern;
use tracing::warn;

pub type Conditional = [f64; CODON_COUNT];

/// How often conditional vectors are checked for underflow, and the level
/// that triggers a rescale. Both only affect numerics, never the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingPolicy {
    /// Check every `step`-th internal node in postorder.
    pub step: usize,
    pub threshold: f64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            step: DEFAULT_SCALING_STEP,
            threshold: DEFAULT_SCALING_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
struct CladeModel {
    label: String,
    model: CodonModel,
}

pub(crate) struct Partials {
    pub conditionals: Vec<Conditional>,
    pub log_scale: f64,
}

/// Felsenstein pruning for one site on one tree.
///
/// The first registered model belongs to the root clade; later ones are matched
/// against node names by prefix, the longest matching label winning.
#[derive(Debug, Clone)]
pub struct LikelihoodCalculator<'t> {
    tree: &'t Tree,
    tip_states: Vec<Option<usize>>,
    clades: Vec<CladeModel>,
    node_clade: Vec<usize>,
    state_codons: Vec<usize>,
    scaling: ScalingPolicy,
    clade_split: f64,
}

impl<'t> LikelihoodCalculator<'t> {
    pub fn new(tree: &'t Tree, pattern: &SitePattern) -> SelResult<Self> {
        let mut tip_states = vec![None; tree.len()];
        for tip in tree.tips() {
            let name = &tree.node(tip).name;
            let state = pattern
                .state(name)
                .ok_or_else(|| SelError::TaxonMismatch(name.clone()))?;
            tip_states[tip] = state.map(usize::from);
        }

        Ok(Self {
            tree,
            tip_states,
            clades: Vec::new(),
            node_clade: vec![0; tree.len()],
            state_codons: Vec::new(),
            scaling: ScalingPolicy::default(),
            clade_split: 0.5,
        })
    }

    pub fn with_scaling(mut self, scaling: ScalingPolicy) -> Self {
        self.scaling = ScalingPolicy {
            step: scaling.step.max(1),
            ..scaling
        };
        self
    }

    pub fn with_clade_split(mut self, split: f64) -> Self {
        self.clade_split = split.clamp(0.0, 1.0);
        self
    }

    /// Registers the model of a clade. The first call registers the root clade.
    pub fn add_clade_model(&mut self, label: impl Into<String>, model: CodonModel) {
        self.clades.push(CladeModel {
            label: label.into(),
            model,
        });

        let mut codons: Vec<usize> = self
            .clades
            .iter()
            .flat_map(|c| c.model.site_codons().iter().copied())
            .collect();
        codons.sort_unstable();
        codons.dedup();
        self.state_codons = codons;

        for id in 0..self.tree.len() {
            self.node_clade[id] = self.match_clade(&self.tree.node(id).name);
        }
    }

    fn match_clade(&self, name: &str) -> usize {
        let mut best = (0, 0);
        for (k, clade) in self.clades.iter().enumerate().skip(1) {
            let len = clade.label.len();
            if len > best.1 && name.starts_with(&clade.label) {
                best = (k, len);
            }
        }
        best.0
    }

    pub fn clade_count(&self) -> usize {
        self.clades.len()
    }

    pub fn clade_of(&self, node: NodeId) -> usize {
        self.node_clade[node]
    }

    pub fn model(&self, clade: usize) -> &CodonModel {
        &self.clades[clade].model
    }

    /// Free parameters across all clades; each clade anchors its first entry.
    pub fn parameter_count(&self) -> usize {
        self.clades
            .iter()
            .map(|c| c.model.amino_acids().len().saturating_sub(1))
            .sum()
    }

    /// Binds new fitness vectors, one per clade in registration order, and
    /// refreshes every model.
    pub fn set_parameters(&mut self, fitness: Vec<Fitness>) -> SelResult<()> {
        if fitness.len() != self.clades.len() {
            return Err(SelError::InvalidParameter(format!(
                "{} fitness vectors for {} clade models",
                fitness.len(),
                self.clades.len()
            )));
        }
        for (clade, f) in self.clades.iter_mut().zip(fitness) {
            clade.model = clade.model.update_model(f)?;
        }
        Ok(())
    }

    pub fn parameters(&self) -> Vec<Fitness> {
        self.clades.iter().map(|c| c.model.fitness().clone()).collect()
    }

    /// Log-likelihood at an unconstrained parameter vector; the anchors are
    /// re-inserted before the models are rebuilt.
    pub fn evaluate(&mut self, params: &[f64]) -> SelResult<f64> {
        if params.len() != self.parameter_count() {
            return Err(SelError::InvalidParameter(format!(
                "expected {} free parameters, got {}",
                self.parameter_count(),
                params.len()
            )));
        }
        let mut offset = 0;
        let mut fitness = Vec::with_capacity(self.clades.len());
        for clade in &self.clades {
            let free = clade.model.amino_acids().len().saturating_sub(1);
            fitness.push(Fitness::from_free(&params[offset..offset + free]));
            offset += free;
        }
        self.set_parameters(fitness)?;
        self.log_likelihood()
    }

    pub fn log_likelihood(&self) -> SelResult<f64> {
        let partials = self.prune(None)?;
        let root = self.tree.root();
        let root_model = &self.clades[self.node_clade[root]].model;
        let conditional = &partials.conditionals[root];
        let sum: f64 = self
            .state_codons
            .iter()
            .map(|&c| conditional[c] * root_model.equilibrium(c))
            .sum();
        finish_log_likelihood(sum, partials.log_scale)
    }

    /// Caches everything except the branch above `target`, which must be a
    /// child of the root, so that branch can be re-evaluated in isolation.
    pub fn branch_cache(&self, target: NodeId) -> SelResult<BranchCache> {
        let root = self.tree.root();
        if self.tree.node(target).parent != Some(root) {
            return Err(SelError::Tree(format!("node {} is not a child of the root", target)));
        }
        let partials = self.prune(Some(target))?;
        let root_clade = self.node_clade[root];
        let target_clade = self.node_clade[target];
        Ok(BranchCache::new(
            target,
            (
                self.clades[root_clade].label.clone(),
                root_clade,
                self.clades[root_clade].model.clone(),
            ),
            (
                self.clades[target_clade].label.clone(),
                target_clade,
                self.clades[target_clade].model.clone(),
            ),
            self.state_codons.clone(),
            partials.conditionals[target],
            partials.conditionals[root],
            partials.log_scale,
            self.clade_split,
        ))
    }

    fn clade_end(&self, node: NodeId) -> CladeEnd<'_> {
        let clade = self.node_clade[node];
        CladeEnd {
            label: &self.clades[clade].label,
            clade,
            model: &self.clades[clade].model,
        }
    }

    /// Postorder pass. When `excluded` is a child of the root its message is
    /// left out of the root vector.
    pub(crate) fn prune(&self, excluded: Option<NodeId>) -> SelResult<Partials> {
        if self.clades.is_empty() {
            return Err(SelError::InvalidParameter(
                "no codon model registered".to_string(),
            ));
        }

        let root = self.tree.root();
        let mut conditionals = vec![[0.0; CODON_COUNT]; self.tree.len()];
        let mut buffers = TransitionBuffers::default();
        let mut log_scale = 0.0;
        let mut internal_seen = 0usize;

        for &id in self.tree.postorder() {
            let node = self.tree.node(id);
            let mut acc = [0.0; CODON_COUNT];

            if node.is_tip() {
                match self.tip_states[id] {
                    Some(codon) => acc[codon] = 1.0,
                    None => self.state_codons.iter().for_each(|&c| acc[c] = 1.0),
                }
                conditionals[id] = acc;
                continue;
            }

            self.state_codons.iter().for_each(|&c| acc[c] = 1.0);
            for &child in &node.children {
                if id == root && excluded == Some(child) {
                    continue;
                }
                branch_transition(
                    self.clade_end(id),
                    self.clade_end(child),
                    self.clade_split,
                    self.tree.branch_length(child),
                    &mut buffers,
                )?;
                let below = &conditionals[child];
                for &i in &self.state_codons {
                    let row = &buffers.matrix[i * CODON_COUNT..(i + 1) * CODON_COUNT];
                    let message: f64 = self.state_codons.iter().map(|&j| row[j] * below[j]).sum();
                    acc[i] *= message;
                }
            }

            internal_seen += 1;
            if internal_seen % self.scaling.step == 0 {
                let max = self.state_codons.iter().map(|&c| acc[c]).fold(0.0, f64::max);
                if max > 0.0 && max < self.scaling.threshold {
                    self.state_codons.iter().for_each(|&c| acc[c] /= max);
                    log_scale += max.ln();
                }
            }
            conditionals[id] = acc;
        }

        Ok(Partials {
            conditionals,
            log_scale,
        })
    }
}

/// Turns the equilibrium-weighted root sum into a log-likelihood.
pub(crate) fn finish_log_likelihood(sum: f64, log_scale: f64) -> SelResult<f64> {
    let sum = if sum < 0.0 {
        warn!("Negative root likelihood {:e} clamped to zero", sum);
        0.0
    } else {
        sum
    };
    if sum == 0.0 || !sum.is_finite() {
        return Err(SelError::ZeroLikelihood);
    }
    Ok(sum.ln() + log_scale)
}
