use super::{edge::Edge, node::CommitNode};
use gitlog_core::{CommitHash, CommitParents, LogBlock};
use std::collections::HashMap;

/// Directed Acyclic Graph of the commit history loaded so far
#[derive(Debug, Clone, Default)]
pub struct Dag {
    /// All nodes indexed by commit hash
    pub nodes: HashMap<CommitHash, CommitNode>,
    /// Commit hashes in traversal order
    pub order: Vec<CommitHash>,
    /// All edges in the graph
    pub edges: Vec<Edge>,
    /// Quick lookup: commit hash -> children hashes
    pub children: HashMap<CommitHash, Vec<CommitHash>>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit; returns false if it was already present
    pub fn add_commit(&mut self, commit: &CommitParents) -> bool {
        if self.nodes.contains_key(&commit.hash) {
            return false;
        }

        let node = CommitNode::new(commit, self.order.len());
        for (i, parent) in node.parents.iter().enumerate() {
            let edge = if i == 0 {
                Edge::new(node.hash.clone(), parent.clone())
            } else {
                Edge::merge(node.hash.clone(), parent.clone())
            };
            self.edges.push(edge);

            self.children
                .entry(parent.clone())
                .or_default()
                .push(node.hash.clone());
        }

        self.order.push(node.hash.clone());
        self.nodes.insert(node.hash.clone(), node);
        true
    }

    /// Append every commit of a block, returning how many were new
    pub fn extend(&mut self, block: &LogBlock) -> usize {
        block.iter().filter(|commit| self.add_commit(commit)).count()
    }

    pub fn get(&self, hash: &CommitHash) -> Option<&CommitNode> {
        self.nodes.get(hash)
    }

    /// Nodes in traversal order
    pub fn iter(&self) -> impl Iterator<Item = &CommitNode> {
        self.order.iter().filter_map(|hash| self.nodes.get(hash))
    }

    /// Get all root commits (no parents)
    pub fn roots(&self) -> Vec<&CommitNode> {
        self.iter().filter(|node| node.is_root()).collect()
    }

    /// Get all leaf commits (no children)
    pub fn leaves(&self) -> Vec<&CommitNode> {
        self.iter()
            .filter(|node| !self.children.contains_key(&node.hash))
            .collect()
    }

    /// Get children of a commit
    pub fn get_children(&self, hash: &CommitHash) -> Vec<&CommitNode> {
        self.children
            .get(hash)
            .map(|child_ids| {
                child_ids
                    .iter()
                    .filter_map(|id| self.nodes.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the loaded parents of a commit
    pub fn get_parents(&self, hash: &CommitHash) -> Vec<&CommitNode> {
        self.nodes
            .get(hash)
            .map(|node| {
                node.parents
                    .iter()
                    .filter_map(|id| self.nodes.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parents referenced by loaded commits but not loaded yet
    pub fn unresolved_parents(&self) -> Vec<&CommitHash> {
        self.children
            .keys()
            .filter(|hash| !self.nodes.contains_key(*hash))
            .collect()
    }

    /// Count of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Count of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if DAG contains orphan branches
    pub fn has_orphan_branches(&self) -> bool {
        self.roots().len() > 1
    }

    /// Get statistics about the DAG
    pub fn stats(&self) -> DagStats {
        DagStats {
            total_commits: self.nodes.len(),
            total_edges: self.edges.len(),
            merge_commits: self.nodes.values().filter(|n| n.is_merge()).count(),
            root_commits: self.roots().len(),
            leaf_commits: self.leaves().len(),
            unresolved_parents: self.unresolved_parents().len(),
            has_orphans: self.has_orphan_branches(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagStats {
    pub total_commits: usize,
    pub total_edges: usize,
    pub merge_commits: usize,
    pub root_commits: usize,
    pub leaf_commits: usize,
    pub unresolved_parents: usize,
    pub has_orphans: bool,
}
