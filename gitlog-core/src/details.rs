use crate::commit::{CommitDetail, Signature};
use crate::error::Result;
use crate::hash::{CommitHash, HashRegistry};
use chrono::DateTime;
use git2::Repository as Git2Repository;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Loads full metadata for a batch of commits
pub trait DetailReader {
    /// Details in the order of `hashes`; an unknown hash fails the batch
    fn read_details(&self, root: &Path, hashes: &[CommitHash]) -> Result<Vec<CommitDetail>>;
}

/// Reads commit metadata straight from the object database with libgit2
#[derive(Debug, Clone)]
pub struct Git2DetailReader {
    registry: Arc<HashRegistry>,
}

impl Git2DetailReader {
    pub fn new(registry: Arc<HashRegistry>) -> Self {
        Git2DetailReader { registry }
    }

    fn commit_to_detail(&self, hash: &CommitHash, commit: &git2::Commit) -> Result<CommitDetail> {
        let parents = commit
            .parent_ids()
            .map(|oid| self.registry.intern(&oid.to_string()))
            .collect::<Result<Vec<_>>>()?;

        // Abbreviated requests are answered with the full id
        let full_id = commit.id().to_string();
        let hash = if hash.as_str() == full_id {
            hash.clone()
        } else {
            self.registry.intern(&full_id)?
        };

        Ok(CommitDetail {
            hash,
            parents,
            author: signature(&commit.author()),
            committer: signature(&commit.committer()),
            subject: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
        })
    }
}

impl DetailReader for Git2DetailReader {
    fn read_details(&self, root: &Path, hashes: &[CommitHash]) -> Result<Vec<CommitDetail>> {
        let repo = Git2Repository::open(root)?;
        hashes
            .iter()
            .map(|hash| {
                let commit = repo.find_commit_by_prefix(hash.as_str())?;
                self.commit_to_detail(hash, &commit)
            })
            .collect()
    }
}

fn signature(sig: &git2::Signature) -> Signature {
    Signature {
        name: sig.name().unwrap_or("").to_string(),
        email: sig.email().unwrap_or("").to_string(),
        time: DateTime::from_timestamp(sig.when().seconds(), 0).unwrap_or_default(),
    }
}

/// Hands hash lists to a [`DetailReader`] in as few calls as possible
pub struct CommitDetailFetcher {
    reader: Box<dyn DetailReader + Send>,
    batch_size: usize,
}

impl CommitDetailFetcher {
    pub fn new(reader: Box<dyn DetailReader + Send>, batch_size: usize) -> Self {
        CommitDetailFetcher {
            reader,
            batch_size: batch_size.max(1),
        }
    }

    pub fn fetch(&self, root: &Path, hashes: &[CommitHash]) -> Result<Vec<CommitDetail>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let mut details = Vec::with_capacity(hashes.len());
        for chunk in hashes.chunks(self.batch_size) {
            details.extend(self.reader.read_details(root, chunk)?);
        }
        debug!(
            "details loading took {}ms for {} hashes",
            started.elapsed().as_millis(),
            hashes.len()
        );
        Ok(details)
    }
}
