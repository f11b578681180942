use crate::core::CommitNode;
use gitlog_core::{CommitHash, Ref, RefKind};
use std::collections::HashMap;

/// Ref names attached to one commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoration {
    pub is_head: bool,
    pub branches: Vec<String>,
    pub remotes: Vec<String>,
    pub tags: Vec<String>,
}

impl Decoration {
    pub fn is_empty(&self) -> bool {
        !self.is_head && self.branches.is_empty() && self.remotes.is_empty() && self.tags.is_empty()
    }

    /// Names in `git log --decorate` order: head, branches, remotes, tags
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        if self.is_head {
            labels.push("HEAD".to_string());
        }
        labels.extend(self.branches.iter().cloned());
        labels.extend(self.remotes.iter().cloned());
        labels.extend(self.tags.iter().map(|tag| format!("tag: {}", tag)));
        labels
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefDecorator {
    head: Option<CommitHash>,
    decorations: HashMap<CommitHash, Decoration>,
}

impl RefDecorator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_refs(refs: &[Ref]) -> Self {
        let mut decorator = Self::new();
        for r in refs {
            decorator.add_ref(r);
        }
        decorator
    }

    pub fn add_ref(&mut self, r: &Ref) {
        if r.is_head {
            self.head = Some(r.hash.clone());
        }

        let decoration = self.decorations.entry(r.hash.clone()).or_default();
        decoration.is_head |= r.is_head;
        match r.kind {
            RefKind::LocalBranch => decoration.branches.push(r.name.clone()),
            RefKind::RemoteBranch => decoration.remotes.push(r.name.clone()),
            RefKind::Tag => decoration.tags.push(r.name.clone()),
            RefKind::Head => {}
        }
    }

    /// Commit HEAD points at, if the listing reported it
    pub fn head(&self) -> Option<&CommitHash> {
        self.head.as_ref()
    }

    pub fn get(&self, hash: &CommitHash) -> Option<&Decoration> {
        self.decorations.get(hash)
    }

    pub fn decorate(&self, commit: &CommitNode) -> Decoration {
        self.decorations.get(&commit.hash).cloned().unwrap_or_default()
    }

    /// Number of decorated commits
    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }
}
