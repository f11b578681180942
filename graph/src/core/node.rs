use gitlog_core::{CommitHash, CommitParents};
use smallvec::SmallVec;

/// A commit node in the DAG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitNode {
    /// Interned commit hash
    pub hash: CommitHash,
    /// Parent hashes, first parent first
    pub parents: SmallVec<[CommitHash; 2]>,
    /// Position in traversal order (0 = newest)
    pub row: usize,
}

impl CommitNode {
    pub fn new(commit: &CommitParents, row: usize) -> Self {
        Self {
            hash: commit.hash.clone(),
            parents: commit.parents.iter().cloned().collect(),
            row,
        }
    }

    /// Check if this is a root commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Check if this is a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}
