use gitlog_core::CommitHash;

/// An edge connecting two commits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source commit (child)
    pub from: CommitHash,
    /// Target commit (parent)
    pub to: CommitHash,
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    /// Edge to the first parent
    Mainline,
    /// Edge from a merge commit to one of its other parents
    Merge,
}

impl Edge {
    pub fn new(from: CommitHash, to: CommitHash) -> Self {
        Self {
            from,
            to,
            edge_type: EdgeType::Mainline,
        }
    }

    pub fn merge(from: CommitHash, to: CommitHash) -> Self {
        Self {
            from,
            to,
            edge_type: EdgeType::Merge,
        }
    }
}
