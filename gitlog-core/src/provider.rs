//! Paginated access to repository history.
//!
//! A [`LogProvider`] serves one traversal session: every call to
//! [`LogProvider::read_next_block`] returns the next older block of commits,
//! starting from the newest one.

use crate::commit::{CommitDetail, LogBlock};
use crate::config::{LogConfig, PartialOutput};
use crate::details::{CommitDetailFetcher, DetailReader, Git2DetailReader};
use crate::error::{LogError, Result};
use crate::hash::{CommitHash, HashRegistry};
use crate::log_parser::{BlockParser, LogParser};
use crate::process::{CommandRunner, KillHandle, ProcessRunner, QueryOutput};
use crate::query::{QueryBuilder, QuerySpec};
use crate::refs::{Ref, RefParser};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Idle,
    Fetching,
    /// The last block came back short; further reads return empty blocks
    Exhausted,
    Failed,
}

/// Where the next block starts.
///
/// Git's `--before` bound is inclusive, so the commits already delivered at
/// exactly `timestamp` are remembered and filtered out of the next block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub timestamp: i64,
    pub boundary: HashSet<CommitHash>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    active: Mutex<Option<KillHandle>>,
}

/// Aborts the read in progress on a [`LogProvider`] from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        if let Some(killer) = self.active().as_ref() {
            killer.kill();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<KillHandle>> {
        self.state.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self) {
        self.state.cancelled.store(false, Ordering::SeqCst);
    }

    fn arm(&self, killer: Option<KillHandle>) {
        let mut active = self.active();
        if self.is_cancelled() {
            if let Some(killer) = &killer {
                killer.kill();
            }
        }
        *active = killer;
    }

    fn disarm(&self) {
        self.active().take();
    }
}

/// Incremental history reader for one repository session
pub struct LogProvider<R = ProcessRunner> {
    config: LogConfig,
    runner: R,
    queries: QueryBuilder,
    registry: Arc<HashRegistry>,
    details: CommitDetailFetcher,
    cursor: Option<Cursor>,
    state: ProviderState,
    cancel: CancelHandle,
}

impl LogProvider<ProcessRunner> {
    /// Provider that runs the configured git executable in `root`
    pub fn open<P: AsRef<Path>>(root: P, config: LogConfig) -> Result<Self> {
        let runner = ProcessRunner::from_config(&config);
        let registry = Arc::new(HashRegistry::new(config.hash_format));
        Self::with_runner(root, config, runner, registry)
    }
}

impl<R: CommandRunner> LogProvider<R> {
    pub fn with_runner<P: AsRef<Path>>(
        root: P,
        config: LogConfig,
        runner: R,
        registry: Arc<HashRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let queries = QueryBuilder::new(config.git_executable.clone(), root);
        let details = CommitDetailFetcher::new(
            Box::new(Git2DetailReader::new(registry.clone())),
            config.detail_batch_size,
        );
        info!(root = %queries.root().display(), "opened log session");

        Ok(LogProvider {
            config,
            runner,
            queries,
            registry,
            details,
            cursor: None,
            state: ProviderState::Idle,
            cancel: CancelHandle::default(),
        })
    }

    /// Replace the libgit2 detail reader
    pub fn with_detail_reader(mut self, reader: Box<dyn DetailReader + Send>) -> Self {
        self.details = CommitDetailFetcher::new(reader, self.config.detail_batch_size);
        self
    }

    pub fn root(&self) -> &Path {
        self.queries.root()
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn registry(&self) -> &Arc<HashRegistry> {
        &self.registry
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Start over from the newest commit
    pub fn reset(&mut self) {
        self.cursor = None;
        self.state = ProviderState::Idle;
    }

    /// Read the next older block of at most `block_size` commits.
    ///
    /// `status` receives human readable progress text. On failure the cursor
    /// is left untouched, so calling again retries the same block.
    pub fn read_next_block(&mut self, status: &mut dyn FnMut(&str)) -> Result<LogBlock> {
        let max_count = self.config.block_size;
        let (query, boundary, bound) = match &self.cursor {
            None => (self.queries.initial_block(max_count), HashSet::new(), None),
            Some(cursor) => (
                self.queries
                    .block_before(cursor.timestamp, max_count + cursor.boundary.len()),
                cursor.boundary.clone(),
                Some(cursor.timestamp),
            ),
        };

        self.state = ProviderState::Fetching;
        status("Loading commits...");

        let mut parser = BlockParser::new(
            LogParser::new(self.registry.clone()),
            self.config.malformed_lines,
        )
        .excluding(boundary)
        .with_limit(max_count);
        if let Some(bound) = bound {
            parser = parser.bounded_by(bound);
        }
        let interval = self.config.progress_interval.max(1);
        let mut lines = 0usize;

        let keep_partial = self.config.partial_output == PartialOutput::Keep;
        let outcome = self.run_query(&query, keep_partial, &mut |line| {
            parser.push(line)?;
            lines += 1;
            if lines % interval == 0 {
                status(&format!("Read {} commits", lines));
            }
            Ok(())
        });

        let complete = match outcome {
            Ok(complete) => complete,
            Err(e) => {
                warn!("reading log block failed: {}", e);
                self.state = ProviderState::Failed;
                return Err(e);
            }
        };

        if let Some(oldest) = parser.oldest_timestamp() {
            let mut boundary: HashSet<CommitHash> = parser.at_oldest().iter().cloned().collect();
            if let Some(previous) = self.cursor.take() {
                if previous.timestamp == oldest {
                    boundary.extend(previous.boundary);
                }
            }
            self.cursor = Some(Cursor {
                timestamp: oldest,
                boundary,
            });
        }

        let skipped = parser.skipped();
        let block = parser.into_block(complete);
        self.state = if block.len() + skipped < max_count {
            ProviderState::Exhausted
        } else {
            ProviderState::Idle
        };
        debug!(
            commits = block.len(),
            oldest = ?block.oldest_timestamp,
            "read log block"
        );
        status(&format!("Loaded {} commits", block.len()));
        Ok(block)
    }

    /// Every branch, remote branch and tag tip.
    ///
    /// Always fails on a non-zero exit; a partial ref set is never returned.
    pub fn read_all_refs(&self) -> Result<Vec<Ref>> {
        let parser = RefParser::new(self.registry.clone());
        let mut refs = Vec::new();

        self.run_query(&self.queries.ref_listing(), false, &mut |line| {
            if !line.trim().is_empty() {
                refs.extend(parser.parse_line(line)?);
            }
            Ok(())
        })?;

        debug!(count = refs.len(), "read refs");
        Ok(refs)
    }

    /// Full metadata for `hashes`, fetched in one batch
    pub fn read_commit_details(&self, hashes: &[CommitHash]) -> Result<Vec<CommitDetail>> {
        self.details.fetch(self.root(), hashes)
    }

    /// Run `query`, feeding each stdout line to `on_line`.
    ///
    /// Returns whether the output is complete; `false` only when git failed
    /// and `keep_partial` is set.
    fn run_query(
        &self,
        query: &QuerySpec,
        keep_partial: bool,
        on_line: &mut dyn FnMut(&str) -> Result<()>,
    ) -> Result<bool> {
        self.cancel.reset();
        let mut output = self.runner.run(query)?;
        self.cancel.arm(output.kill_handle());

        let outcome = drain(output.as_mut(), on_line);
        self.cancel.disarm();
        drop(output);

        if self.cancel.is_cancelled() {
            return Err(LogError::Cancelled);
        }
        match outcome {
            Ok(()) => Ok(true),
            Err(LogError::ProcessExit { code, stderr }) if keep_partial => {
                warn!(?code, "git failed, keeping partial output: {}", stderr.trim());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn drain(output: &mut dyn QueryOutput, on_line: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
    while let Some(line) = output.next_line() {
        on_line(&line?)?;
    }
    output.finish()
}
