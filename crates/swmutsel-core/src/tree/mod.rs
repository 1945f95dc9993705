pub mod newick;
pub mod reroot;

pub use self::reroot::{BranchSchedule, BranchVisit};

use crate::error::{SelError, SelResult};
use swmutsel_protocol::tree::{NodeSpec, TreeSpec};
use std::collections::HashSet;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Length of the branch to the parent.
    pub branch_length: f64,
}

impl TreeNode {
    #[inline]
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena tree with stable node ids. Topology only changes through re-rooting,
/// which keeps every node id but flips parent/child relations along a path.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    root: NodeId,
    postorder: Vec<NodeId>,
}

impl Tree {
    pub fn new(nodes: Vec<TreeNode>, root: NodeId) -> SelResult<Self> {
        if root >= nodes.len() {
            return Err(SelError::Tree(format!("root {} out of range", root)));
        }
        if nodes[root].parent.is_some() {
            return Err(SelError::Tree("root node has a parent".to_string()));
        }
        for (id, node) in nodes.iter().enumerate() {
            for &child in &node.children {
                match nodes.get(child) {
                    Some(c) if c.parent == Some(id) => {}
                    _ => {
                        return Err(SelError::Tree(format!(
                            "node {} lists {} as a child but the link is not mirrored",
                            id, child
                        )))
                    }
                }
            }
            if node.is_tip() && node.name.is_empty() {
                return Err(SelError::Tree(format!("tip {} has no name", id)));
            }
            if !node.branch_length.is_finite() || node.branch_length < 0.0 {
                return Err(SelError::Tree(format!(
                    "node {} has invalid branch length {}",
                    id, node.branch_length
                )));
            }
        }

        let postorder = compute_postorder(&nodes, root);
        if postorder.len() != nodes.len() {
            return Err(SelError::Tree(format!(
                "{} of {} nodes are unreachable from the root",
                nodes.len() - postorder.len(),
                nodes.len()
            )));
        }

        let mut seen = HashSet::new();
        for node in nodes.iter().filter(|n| n.is_tip()) {
            if !seen.insert(node.name.as_str()) {
                return Err(SelError::Tree(format!("duplicate tip name '{}'", node.name)));
            }
        }

        Ok(Self {
            nodes,
            root,
            postorder,
        })
    }

    pub fn from_spec(spec: &TreeSpec) -> SelResult<Self> {
        let nodes = spec
            .nodes
            .iter()
            .map(|n| TreeNode {
                name: n.name.clone(),
                parent: n.parent,
                children: n.children.clone(),
                branch_length: n.branch_length,
            })
            .collect();
        Self::new(nodes, spec.root)
    }

    pub fn to_spec(&self) -> TreeSpec {
        TreeSpec {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSpec {
                    name: n.name.clone(),
                    parent: n.parent,
                    children: n.children.clone(),
                    branch_length: n.branch_length,
                })
                .collect(),
            root: self.root,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children before parents, root last.
    pub fn postorder(&self) -> &[NodeId] {
        &self.postorder
    }

    pub fn tips(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(|&id| self.nodes[id].is_tip())
    }

    pub fn tip_names(&self) -> Vec<&str> {
        self.tips().map(|id| self.nodes[id].name.as_str()).collect()
    }

    /// Internal nodes, parents before children.
    pub fn internal_preorder(&self) -> Vec<NodeId> {
        self.postorder
            .iter()
            .rev()
            .copied()
            .filter(|&id| !self.nodes[id].is_tip())
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    #[inline]
    pub fn branch_length(&self, id: NodeId) -> f64 {
        self.nodes[id].branch_length
    }

    pub fn set_branch_length(&mut self, id: NodeId, length: f64) -> SelResult<()> {
        if id == self.root || id >= self.nodes.len() {
            return Err(SelError::Tree(format!("node {} has no parent branch", id)));
        }
        if !length.is_finite() || length < 0.0 {
            return Err(SelError::Tree(format!("invalid branch length {}", length)));
        }
        self.nodes[id].branch_length = length;
        Ok(())
    }

    /// Neighbours in the unrooted sense: children plus parent.
    pub fn neighbours(&self, id: NodeId) -> Vec<NodeId> {
        let node = &self.nodes[id];
        let mut out = node.children.clone();
        if let Some(p) = node.parent {
            out.push(p);
        }
        out
    }

    /// Every branch as `(child, length)`, in postorder.
    pub fn branches(&self) -> Vec<(NodeId, f64)> {
        self.postorder
            .iter()
            .filter(|&&id| id != self.root)
            .map(|&id| (id, self.nodes[id].branch_length))
            .collect()
    }

    pub fn total_length(&self) -> f64 {
        self.branches().iter().map(|(_, l)| l).sum()
    }
}

fn compute_postorder(nodes: &[TreeNode], root: NodeId) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack = vec![(root, false)];
    let mut visited = vec![false; nodes.len()];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        if visited[id] {
            continue;
        }
        visited[id] = true;
        stack.push((id, true));
        for &child in nodes[id].children.iter().rev() {
            stack.push((child, false));
        }
    }
    order
}
