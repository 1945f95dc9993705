use super::{NodeId, Tree};
use crate::error::{SelError, SelResult};
use std::collections::HashSet;

impl Tree {
    /// Copy of the tree rooted at `new_root`.
    ///
    /// Every edge on the path from the old root is inverted; the length of an
    /// inverted edge moves to its new child. Node ids are unchanged.
    pub fn rerooted(&self, new_root: NodeId) -> SelResult<Tree> {
        if new_root >= self.len() {
            return Err(SelError::Tree(format!("node {} does not exist", new_root)));
        }
        if new_root == self.root() {
            return Ok(self.clone());
        }
        if self.node(new_root).is_tip() {
            return Err(SelError::Tree(format!(
                "cannot root at tip '{}'",
                self.node(new_root).name
            )));
        }

        let mut path = vec![new_root];
        let mut current = new_root;
        while let Some(parent) = self.node(current).parent {
            path.push(parent);
            current = parent;
        }

        let mut nodes = self.nodes().to_vec();
        let lengths: Vec<f64> = path.iter().map(|&id| self.branch_length(id)).collect();

        nodes[new_root].parent = None;
        nodes[new_root].branch_length = 0.0;
        for i in 1..path.len() {
            let (below, above) = (path[i - 1], path[i]);
            nodes[above].children.retain(|&c| c != below);
            nodes[below].children.push(above);
            nodes[above].parent = Some(below);
            nodes[above].branch_length = lengths[i - 1];
        }

        Tree::new(nodes, new_root)
    }
}

/// One step of the branch-length stage: root the tree at `root` and optimise
/// the branch between `root` and `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchVisit {
    pub root: NodeId,
    pub target: NodeId,
}

/// Lazy sequence of [`BranchVisit`]s covering each undirected branch exactly once.
///
/// Internal nodes are taken in preorder of the tree the schedule was built
/// from, and each one claims the incident branches not yet visited. Only the
/// topology is captured, so branch lengths may change while the schedule runs.
#[derive(Debug, Clone)]
pub struct BranchSchedule {
    roots: Vec<NodeId>,
    neighbours: Vec<Vec<NodeId>>,
    next_root: usize,
    pending: Vec<BranchVisit>,
    visited: HashSet<(NodeId, NodeId)>,
}

impl BranchSchedule {
    pub fn new(tree: &Tree) -> Self {
        Self {
            roots: tree.internal_preorder(),
            neighbours: (0..tree.len()).map(|id| tree.neighbours(id)).collect(),
            next_root: 0,
            pending: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Starts the sequence over from the first internal node.
    pub fn restart(&mut self) {
        self.next_root = 0;
        self.pending.clear();
        self.visited.clear();
    }
}

impl Iterator for BranchSchedule {
    type Item = BranchVisit;

    fn next(&mut self) -> Option<BranchVisit> {
        loop {
            if !self.pending.is_empty() {
                return Some(self.pending.remove(0));
            }
            let root = *self.roots.get(self.next_root)?;
            self.next_root += 1;
            for &target in &self.neighbours[root] {
                let key = (root.min(target), root.max(target));
                if self.visited.insert(key) {
                    self.pending.push(BranchVisit { root, target });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::newick::parse_newick;

    fn sample() -> Tree {
        parse_newick("((A:0.1,B:0.2)X:0.05,(C:0.3,D:0.4)Y:0.07,E:0.5);", "test").unwrap()
    }

    fn sorted_lengths(tree: &Tree) -> Vec<f64> {
        let mut lengths: Vec<f64> = tree.branches().iter().map(|(_, l)| *l).collect();
        lengths.sort_by(|a, b| a.partial_cmp(b).unwrap());
        lengths
    }

    #[test]
    fn test_reroot_moves_root_and_keeps_lengths() {
        let tree = sample();
        let y = tree.find("Y").unwrap();
        let rerooted = tree.rerooted(y).unwrap();

        assert_eq!(rerooted.root(), y);
        assert!(rerooted.node(y).parent.is_none());
        assert_eq!(sorted_lengths(&tree), sorted_lengths(&rerooted));

        // Old root now hangs below Y on the branch Y used to have.
        let old_root = tree.root();
        assert_eq!(rerooted.node(old_root).parent, Some(y));
        assert!((rerooted.branch_length(old_root) - 0.07).abs() < 1e-15);

        let mut tips = rerooted.tip_names();
        tips.sort();
        assert_eq!(tips, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_reroot_round_trip_restores_tree() {
        let tree = sample();
        let x = tree.find("X").unwrap();
        let back = tree.rerooted(x).unwrap().rerooted(tree.root()).unwrap();
        assert_eq!(back.root(), tree.root());
        for id in 0..tree.len() {
            assert_eq!(back.node(id).parent, tree.node(id).parent);
            assert_eq!(back.branch_length(id), tree.branch_length(id));
        }
    }

    #[test]
    fn test_reroot_at_tip_rejected() {
        let tree = sample();
        let a = tree.find("A").unwrap();
        assert!(tree.rerooted(a).is_err());
    }

    #[test]
    fn test_schedule_visits_every_branch_once() {
        let tree = sample();
        let visits: Vec<BranchVisit> = BranchSchedule::new(&tree).collect();
        assert_eq!(visits.len(), tree.len() - 1);

        let mut seen = HashSet::new();
        for visit in &visits {
            assert!(!tree.node(visit.root).is_tip());
            assert!(tree.neighbours(visit.root).contains(&visit.target));
            assert!(seen.insert((visit.root.min(visit.target), visit.root.max(visit.target))));
        }
    }

    #[test]
    fn test_schedule_restarts() {
        let tree = sample();
        let mut schedule = BranchSchedule::new(&tree);
        let first: Vec<_> = schedule.by_ref().collect();
        assert!(schedule.next().is_none());
        schedule.restart();
        let second: Vec<_> = schedule.collect();
        assert_eq!(first, second);
    }
}
