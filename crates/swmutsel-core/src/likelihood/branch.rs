use super::calculator::{finish_log_likelihood, Conditional};
use super::transition::{branch_transition, CladeEnd, TransitionBuffers};
use crate::consts::CODON_COUNT;
use crate::error::SelResult;
use crate::model::CodonModel;
use crate::tree::NodeId;

/// Site likelihood as a function of a single root branch.
///
/// Holds the conditional vector below `target` and the root vector built from
/// every other child, so a new branch length costs one transition matrix.
#[derive(Debug, Clone)]
pub struct BranchCache {
    target: NodeId,
    root_label: String,
    root_clade: usize,
    root_model: CodonModel,
    target_label: String,
    target_clade: usize,
    target_model: CodonModel,
    codons: Vec<usize>,
    below: Conditional,
    rest: Conditional,
    log_scale: f64,
    clade_split: f64,
}

impl BranchCache {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        target: NodeId,
        root: (String, usize, CodonModel),
        child: (String, usize, CodonModel),
        codons: Vec<usize>,
        below: Conditional,
        rest: Conditional,
        log_scale: f64,
        clade_split: f64,
    ) -> Self {
        Self {
            target,
            root_label: root.0,
            root_clade: root.1,
            root_model: root.2,
            target_label: child.0,
            target_clade: child.1,
            target_model: child.2,
            codons,
            below,
            rest,
            log_scale,
            clade_split,
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn log_likelihood(&self, branch_length: f64) -> SelResult<f64> {
        let mut buffers = TransitionBuffers::default();
        branch_transition(
            CladeEnd {
                label: &self.root_label,
                clade: self.root_clade,
                model: &self.root_model,
            },
            CladeEnd {
                label: &self.target_label,
                clade: self.target_clade,
                model: &self.target_model,
            },
            self.clade_split,
            branch_length,
            &mut buffers,
        )?;

        let mut sum = 0.0;
        for &i in &self.codons {
            if self.rest[i] == 0.0 {
                continue;
            }
            let row = &buffers.matrix[i * CODON_COUNT..(i + 1) * CODON_COUNT];
            let message: f64 = self.codons.iter().map(|&j| row[j] * self.below[j]).sum();
            sum += self.root_model.equilibrium(i) * self.rest[i] * message;
        }
        finish_log_likelihood(sum, self.log_scale)
    }
}

#[cfg(test)]
mod tests {
    use crate::code::{amino_acid_index, GeneticCode};
    use crate::fitness::Fitness;
    use crate::globals::MutationGlobals;
    use crate::likelihood::LikelihoodCalculator;
    use crate::model::CodonModel;
    use crate::params::MutationParams;
    use crate::tree::newick::parse_newick;
    use crate::SitePattern;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn test_cache_matches_full_pruning() {
        let globals = Arc::new(
            MutationGlobals::new(Arc::new(GeneticCode::standard()), MutationParams::default()).unwrap(),
        );
        let mut tree = parse_newick("((A:0.1,B:0.2)X:0.05,C:0.3,(D:0.1,E:0.4)Y:0.2);", "t").unwrap();
        let states: BTreeMap<String, Option<u8>> = [
            ("A", b"GCC"),
            ("B", b"GCT"),
            ("C", b"AGC"),
            ("D", b"TCT"),
            ("E", b"GCA"),
        ]
        .iter()
        .map(|(n, c)| (n.to_string(), GeneticCode::codon_from_str(*c).map(|x| x as u8)))
        .collect();
        let site = SitePattern::new(0, states);
        let aas: Vec<u8> = b"AS".iter().map(|&l| amino_acid_index(l).unwrap()).collect();
        let model = CodonModel::new(globals, Fitness::new(vec![0.0, -1.2]), aas).unwrap();

        let y = tree.find("Y").unwrap();
        let cache = {
            let mut calc = LikelihoodCalculator::new(&tree, &site).unwrap();
            calc.add_clade_model("", model.clone());
            let full = calc.log_likelihood().unwrap();
            let cache = calc.branch_cache(y).unwrap();
            assert!((cache.log_likelihood(0.2).unwrap() - full).abs() < 1e-10);
            cache
        };

        tree.set_branch_length(y, 0.9).unwrap();
        let mut calc = LikelihoodCalculator::new(&tree, &site).unwrap();
        calc.add_clade_model("", model);
        let full = calc.log_likelihood().unwrap();
        assert!((cache.log_likelihood(0.9).unwrap() - full).abs() < 1e-10);

        let a = tree.find("A").unwrap();
        assert!(calc.branch_cache(a).is_err());
    }
}
