use crate::core::Dag;
use crate::decor::RefDecorator;
use anyhow::{Context, Result};
use gitlog_core::{CommandRunner, LogConfig, LogProvider, ProcessRunner, ProviderState};
use std::path::Path;
use tracing::{debug, warn};

/// How much history to pull into the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLimit {
    Blocks(usize),
    All,
}

impl LoadLimit {
    /// Whether another block may be read after `blocks_read`
    pub fn allows(self, blocks_read: usize) -> bool {
        match self {
            LoadLimit::Blocks(max) => blocks_read < max,
            LoadLimit::All => true,
        }
    }
}

/// Builds a [`Dag`] from the blocks served by a [`LogProvider`]
pub struct HistoryLoader<R: CommandRunner = ProcessRunner> {
    provider: LogProvider<R>,
}

impl HistoryLoader<ProcessRunner> {
    pub fn open<P: AsRef<Path>>(repo_path: P, config: LogConfig) -> Result<Self> {
        let repo_path = repo_path.as_ref();
        let provider = LogProvider::open(repo_path, config)
            .with_context(|| format!("Failed to open repository at {}", repo_path.display()))?;
        Ok(Self { provider })
    }
}

impl<R: CommandRunner> HistoryLoader<R> {
    pub fn new(provider: LogProvider<R>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &LogProvider<R> {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut LogProvider<R> {
        &mut self.provider
    }

    /// Load history from the newest commit into a fresh DAG
    pub fn into_dag(&mut self, limit: LoadLimit, status: &mut dyn FnMut(&str)) -> Result<Dag> {
        self.provider.reset();
        let mut dag = Dag::new();
        self.load_into(&mut dag, limit, status)?;
        Ok(dag)
    }

    /// Continue the traversal, appending blocks to `dag`. Returns the number
    /// of blocks read.
    pub fn load_into(
        &mut self,
        dag: &mut Dag,
        limit: LoadLimit,
        status: &mut dyn FnMut(&str),
    ) -> Result<usize> {
        let mut blocks = 0;
        while limit.allows(blocks) && self.provider.state() != ProviderState::Exhausted {
            let block = self
                .provider
                .read_next_block(status)
                .with_context(|| format!("Failed to read history block {}", blocks + 1))?;
            if block.is_empty() {
                break;
            }

            blocks += 1;
            let added = dag.extend(&block);
            debug!(block = blocks, commits = block.len(), added, "extended graph");

            if !block.complete {
                warn!("history block {} is incomplete, stopping", blocks);
                break;
            }
        }
        Ok(blocks)
    }

    /// Decorations for every ref tip in the repository
    pub fn decorator(&self) -> Result<RefDecorator> {
        let refs = self
            .provider
            .read_all_refs()
            .context("Failed to read refs")?;
        Ok(RefDecorator::from_refs(&refs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitlog_core::{
        HashFormat, HashRegistry, LogError, PartialOutput, QueryKind, QueryOutput, QuerySpec,
    };
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Date-ordered log lines served according to the query kind
    struct FakeLog {
        lines: Vec<(i64, String)>,
        refs: Vec<String>,
        fail_after: Option<usize>,
        queries: Arc<Mutex<usize>>,
    }

    struct Served {
        lines: std::vec::IntoIter<String>,
        fail: bool,
    }

    impl QueryOutput for Served {
        fn next_line(&mut self) -> Option<gitlog_core::Result<String>> {
            self.lines.next().map(Ok)
        }

        fn finish(&mut self) -> gitlog_core::Result<()> {
            if self.fail {
                return Err(LogError::ProcessExit {
                    code: Some(128),
                    stderr: "fatal: broken pipe".to_string(),
                });
            }
            Ok(())
        }
    }

    impl CommandRunner for FakeLog {
        fn run(&self, query: &QuerySpec) -> gitlog_core::Result<Box<dyn QueryOutput>> {
            *self.queries.lock().unwrap() += 1;
            let (lines, fail): (Vec<String>, bool) = match query.kind {
                QueryKind::InitialBlock { max_count } => (
                    self.lines.iter().take(max_count).map(|(_, l)| l.clone()).collect(),
                    false,
                ),
                QueryKind::BlockBefore { before, max_count } => {
                    let lines: Vec<String> = self
                        .lines
                        .iter()
                        .filter(|(ts, _)| *ts <= before)
                        .take(max_count)
                        .map(|(_, l)| l.clone())
                        .collect();
                    let fail = self.fail_after.is_some();
                    let lines = match self.fail_after {
                        Some(n) => lines.into_iter().take(n).collect(),
                        None => lines,
                    };
                    (lines, fail)
                }
                QueryKind::RefListing => (self.refs.clone(), false),
            };
            Ok(Box::new(Served {
                lines: lines.into_iter(),
                fail,
            }))
        }
    }

    fn line(ts: i64, hash: &str, parents: &[&str]) -> (i64, String) {
        (ts, format!("{}|-{}|-{}", ts, hash, parents.join(" ")))
    }

    /// dddd merges bbbb and cccc, both children of aaaa
    fn merge_history() -> FakeLog {
        FakeLog {
            lines: vec![
                line(400, "dddd", &["bbbb", "cccc"]),
                line(300, "cccc", &["aaaa"]),
                line(200, "bbbb", &["aaaa"]),
                line(100, "aaaa", &[]),
            ],
            refs: vec![
                "dddd (HEAD -> refs/heads/main)".to_string(),
                "cccc (refs/heads/feature, tag: refs/tags/v1)".to_string(),
            ],
            fail_after: None,
            queries: Arc::new(Mutex::new(0)),
        }
    }

    fn loader(history: FakeLog, config: LogConfig) -> HistoryLoader<FakeLog> {
        let registry = Arc::new(HashRegistry::new(HashFormat::Relaxed));
        let config = LogConfig {
            hash_format: HashFormat::Relaxed,
            ..config
        };
        HistoryLoader::new(LogProvider::with_runner("/repo", config, history, registry).unwrap())
    }

    fn small_blocks() -> LogConfig {
        LogConfig {
            block_size: 2,
            ..LogConfig::default()
        }
    }

    #[test]
    fn test_merge_commit() {
        let mut loader = loader(merge_history(), small_blocks());
        let dag = loader.into_dag(LoadLimit::All, &mut |_| {}).unwrap();

        assert_eq!(dag.node_count(), 4);
        assert_eq!(dag.edge_count(), 4);

        let stats = dag.stats();
        assert_eq!(stats.merge_commits, 1);
        assert_eq!(stats.root_commits, 1);
        assert_eq!(stats.unresolved_parents, 0);
        let order: Vec<&str> = dag.iter().map(|n| n.hash.as_str()).collect();
        assert_eq!(order, vec!["dddd", "cccc", "bbbb", "aaaa"]);
    }

    #[test]
    fn block_limit_stops_early_and_resumes() {
        let history = merge_history();
        let queries = history.queries.clone();
        let mut loader = loader(history, small_blocks());

        let mut dag = loader.into_dag(LoadLimit::Blocks(1), &mut |_| {}).unwrap();
        assert_eq!(dag.node_count(), 2);
        assert_eq!(dag.unresolved_parents().len(), 2);
        assert_eq!(*queries.lock().unwrap(), 1);

        let blocks = loader.load_into(&mut dag, LoadLimit::All, &mut |_| {}).unwrap();
        assert_eq!(blocks, 1);
        assert_eq!(dag.node_count(), 4);
        assert_eq!(loader.provider().state(), ProviderState::Exhausted);
    }

    #[test]
    fn status_messages_reach_the_caller() {
        let mut loader = loader(merge_history(), LogConfig::default());
        let mut messages = Vec::new();
        loader
            .into_dag(LoadLimit::All, &mut |msg| messages.push(msg.to_string()))
            .unwrap();

        assert_eq!(messages, vec!["Loading commits...", "Loaded 4 commits"]);
    }

    #[test]
    fn failure_carries_context() {
        let mut history = merge_history();
        history.fail_after = Some(1);
        let mut loader = loader(history, small_blocks());

        let err = loader.into_dag(LoadLimit::All, &mut |_| {}).unwrap_err();
        assert_eq!(err.to_string(), "Failed to read history block 2");
        assert!(matches!(
            err.downcast_ref::<LogError>(),
            Some(LogError::ProcessExit { code: Some(128), .. })
        ));
    }

    #[test]
    fn incomplete_block_is_kept_and_loading_stops() {
        let mut history = merge_history();
        history.fail_after = Some(2);
        let config = LogConfig {
            partial_output: PartialOutput::Keep,
            ..small_blocks()
        };
        let mut loader = loader(history, config);

        let dag = loader.into_dag(LoadLimit::All, &mut |_| {}).unwrap();
        assert_eq!(dag.node_count(), 3);
    }

    #[test]
    fn decorator_reads_refs() {
        let loader = loader(merge_history(), LogConfig::default());
        let decorator = loader.decorator().unwrap();
        let registry = loader.provider().registry();

        assert_eq!(decorator.head(), Some(&registry.intern("dddd").unwrap()));
        let feature = decorator.get(&registry.intern("cccc").unwrap()).unwrap();
        assert_eq!(feature.branches, vec!["feature"]);
        assert_eq!(feature.tags, vec!["v1"]);
    }

    mod git {
        use super::super::*;
        use git2::{Commit, Oid, Repository, Signature, Time};
        use tempfile::TempDir;

        fn git_available() -> bool {
            std::process::Command::new("git")
                .arg("--version")
                .output()
                .map(|out| out.status.success())
                .unwrap_or(false)
        }

        fn create_test_repo() -> Result<(TempDir, Repository)> {
            let dir = TempDir::new()?;
            let repo = Repository::init(dir.path())?;
            Ok((dir, repo))
        }

        fn commit_to_repo(
            repo: &Repository,
            message: &str,
            parents: &[&Commit],
            seconds: i64,
            update_ref: Option<&str>,
        ) -> Result<Oid> {
            let sig = Signature::new("Test User", "test@example.com", &Time::new(seconds, 0))?;
            let tree_id = {
                let mut index = repo.index()?;
                index.write_tree()?
            };
            let tree = repo.find_tree(tree_id)?;
            Ok(repo.commit(update_ref, &sig, &sig, message, &tree, parents)?)
        }

        #[test]
        fn test_single_commit_dag() -> Result<()> {
            if !git_available() {
                return Ok(());
            }
            let (dir, repo) = create_test_repo()?;
            commit_to_repo(&repo, "Initial commit", &[], 1_700_000_000, Some("HEAD"))?;

            let mut loader = HistoryLoader::open(dir.path(), LogConfig::default())?;
            let dag = loader.into_dag(LoadLimit::All, &mut |_| {})?;

            assert_eq!(dag.node_count(), 1);
            assert_eq!(dag.edge_count(), 0);
            assert_eq!(dag.roots().len(), 1);
            Ok(())
        }

        #[test]
        fn test_linear_history() -> Result<()> {
            if !git_available() {
                return Ok(());
            }
            let (dir, repo) = create_test_repo()?;
            let oid1 = commit_to_repo(&repo, "First commit", &[], 1_700_000_000, Some("HEAD"))?;
            let commit1 = repo.find_commit(oid1)?;
            let oid2 = commit_to_repo(&repo, "Second commit", &[&commit1], 1_700_000_100, Some("HEAD"))?;
            let commit2 = repo.find_commit(oid2)?;
            commit_to_repo(&repo, "Third commit", &[&commit2], 1_700_000_200, Some("HEAD"))?;

            let config = LogConfig {
                block_size: 1,
                ..LogConfig::default()
            };
            let mut loader = HistoryLoader::open(dir.path(), config)?;
            let dag = loader.into_dag(LoadLimit::All, &mut |_| {})?;

            assert_eq!(dag.node_count(), 3);
            assert_eq!(dag.edge_count(), 2);
            assert_eq!(dag.roots().len(), 1);
            assert_eq!(dag.roots()[0].hash.as_str(), oid1.to_string());
            Ok(())
        }
    }
}
