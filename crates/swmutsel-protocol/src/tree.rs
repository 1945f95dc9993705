use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Length of the branch to the parent; ignored at the root.
    pub branch_length: f64,
}

/// Arena representation of a tree. Node ids are positions in `nodes` and stay
/// stable across re-rooting, so they can address branches on remote workers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TreeSpec {
    pub nodes: Vec<NodeSpec>,
    pub root: usize,
}
