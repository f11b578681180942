use crate::hash::CommitHash;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A commit and its ordered parents; the first parent is the mainline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitParents {
    pub hash: CommitHash,
    pub parents: Vec<CommitHash>,
}

impl CommitParents {
    pub fn new(hash: CommitHash, parents: Vec<CommitHash>) -> Self {
        CommitParents { hash, parents }
    }

    /// Check if this is a root commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Check if this is a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn first_parent(&self) -> Option<&CommitHash> {
        self.parents.first()
    }

    /// Render as one line of block query output
    pub fn to_log_line(&self, timestamp: i64) -> String {
        let parents: Vec<&str> = self.parents.iter().map(CommitHash::as_str).collect();
        format!("{}|-{}|-{}", timestamp, self.hash, parents.join(" "))
    }
}

/// One page of history in traversal order (newest first)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBlock {
    pub commits: Vec<CommitParents>,
    /// Commit time of the oldest entry, `None` for an empty block
    pub oldest_timestamp: Option<i64>,
    /// False when the process failed and the parsed prefix was kept anyway
    pub complete: bool,
}

impl LogBlock {
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommitParents> {
        self.commits.iter()
    }
}

impl IntoIterator for LogBlock {
    type Item = CommitParents;
    type IntoIter = std::vec::IntoIter<CommitParents>;

    fn into_iter(self) -> Self::IntoIter {
        self.commits.into_iter()
    }
}

/// Author or committer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: DateTime<Utc>,
}

/// Full metadata of one commit, loaded on demand for visible rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitDetail {
    pub hash: CommitHash,
    pub parents: Vec<CommitHash>,
    pub author: Signature,
    pub committer: Signature,
    /// First line of the message
    pub subject: String,
    pub message: String,
}

impl CommitDetail {
    pub fn timestamp(&self) -> i64 {
        self.committer.time.timestamp()
    }
}
