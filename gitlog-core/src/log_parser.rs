use crate::commit::{CommitParents, LogBlock};
use crate::config::MalformedLines;
use crate::error::{LogError, Result};
use crate::hash::{CommitHash, HashRegistry};
use crate::query::FIELD_SEPARATOR;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// One parsed line of block output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: i64,
    pub commit: CommitParents,
}

/// Parses `timestamp|-hash|-parents` lines
#[derive(Debug, Clone)]
pub struct LogParser {
    registry: Arc<HashRegistry>,
}

impl LogParser {
    pub fn new(registry: Arc<HashRegistry>) -> Self {
        LogParser { registry }
    }

    pub fn parse_line(&self, line: &str) -> Result<LogLine> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != 3 {
            return Err(LogError::malformed_line(
                line,
                format!("expected 3 fields, found {}", fields.len()),
            ));
        }

        let timestamp = fields[0]
            .trim()
            .parse::<i64>()
            .map_err(|_| LogError::malformed_line(line, "invalid timestamp"))?;
        let hash = self.intern(line, fields[1].trim())?;

        let mut parents: Vec<CommitHash> = Vec::new();
        for text in fields[2].split_whitespace() {
            let parent = self.intern(line, text)?;
            if parent == hash {
                return Err(LogError::malformed_line(line, "commit lists itself as parent"));
            }
            if parents.contains(&parent) {
                return Err(LogError::malformed_line(line, "duplicate parent"));
            }
            parents.push(parent);
        }

        Ok(LogLine {
            timestamp,
            commit: CommitParents::new(hash, parents),
        })
    }

    fn intern(&self, line: &str, text: &str) -> Result<CommitHash> {
        self.registry.intern(text).map_err(|_| {
            LogError::malformed_line(line, format!("invalid hash {:?}", text))
        })
    }
}

/// Accumulates one block of parsed lines.
///
/// Tracks the oldest timestamp and the hashes sitting exactly at it, which
/// together form the cursor of the next paginated query.
#[derive(Debug)]
pub struct BlockParser {
    parser: LogParser,
    policy: MalformedLines,
    exclude: HashSet<CommitHash>,
    limit: Option<usize>,
    newest_allowed: Option<i64>,
    commits: Vec<CommitParents>,
    oldest: Option<i64>,
    at_oldest: Vec<CommitHash>,
    skipped: usize,
}

impl BlockParser {
    pub fn new(parser: LogParser, policy: MalformedLines) -> Self {
        BlockParser {
            parser,
            policy,
            exclude: HashSet::new(),
            limit: None,
            newest_allowed: None,
            commits: Vec::new(),
            oldest: None,
            at_oldest: Vec::new(),
            skipped: 0,
        }
    }

    /// Drop commits already delivered by a previous block
    pub fn excluding(mut self, exclude: HashSet<CommitHash>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Keep at most `limit` commits; later lines are read but ignored
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Ignore commits newer than `timestamp`, the cursor of a paginated query
    pub fn bounded_by(mut self, timestamp: i64) -> Self {
        self.newest_allowed = Some(timestamp);
        self
    }

    /// Feed one output line
    pub fn push(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() || self.is_full() {
            return Ok(());
        }

        let parsed = match self.parser.parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) if self.policy == MalformedLines::Skip => {
                warn!("skipping log line: {}", e);
                self.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if self.exclude.contains(&parsed.commit.hash) {
            return Ok(());
        }
        if self.newest_allowed.is_some_and(|bound| parsed.timestamp > bound) {
            debug!(
                timestamp = parsed.timestamp,
                "dropping commit {} newer than the cursor", parsed.commit.hash
            );
            return Ok(());
        }

        match self.oldest {
            Some(oldest) if parsed.timestamp > oldest => {}
            Some(oldest) if parsed.timestamp == oldest => {
                self.at_oldest.push(parsed.commit.hash.clone());
            }
            _ => {
                self.oldest = Some(parsed.timestamp);
                self.at_oldest = vec![parsed.commit.hash.clone()];
            }
        }
        self.commits.push(parsed.commit);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.commits.len() >= limit)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.oldest
    }

    /// Hashes of this block whose timestamp equals the oldest one
    pub fn at_oldest(&self) -> &[CommitHash] {
        &self.at_oldest
    }

    pub fn into_block(self, complete: bool) -> LogBlock {
        LogBlock {
            commits: self.commits,
            oldest_timestamp: self.oldest,
            complete,
        }
    }
}
