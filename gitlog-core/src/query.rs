//! Command lines for the three history queries.
//!
//! Nothing here runs a process; a [`QuerySpec`] is handed to a
//! [`CommandRunner`](crate::process::CommandRunner).

use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between the fields of a block line
pub const FIELD_SEPARATOR: &str = "|-";

// HEAD, branches, remote branches and tags; no index, no stash
const ALL_REFS: [&str; 4] = ["HEAD", "--branches", "--remotes", "--tags"];
const BLOCK_FORMAT: &str = "--format=%ct|-%H|-%P";
// User config must not add lines (signature checks) to the parsed output
const CONFIG_OVERRIDES: [&str; 2] = ["-c", "log.showSignature=false"];

/// Expected shape of the query output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `timestamp|-hash|-parents` per line
    CommitBlock,
    /// `hash (decorations)` per line
    RefListing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    InitialBlock { max_count: usize },
    /// Commits with a commit time at or before `before`
    BlockBefore { before: i64, max_count: usize },
    RefListing,
}

impl QueryKind {
    pub fn output_format(self) -> OutputFormat {
        match self {
            QueryKind::InitialBlock { .. } | QueryKind::BlockBefore { .. } => {
                OutputFormat::CommitBlock
            }
            QueryKind::RefListing => OutputFormat::RefListing,
        }
    }
}

/// A fully specified invocation of the git executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub kind: QueryKind,
}

impl QuerySpec {
    pub fn output_format(&self) -> OutputFormat {
        self.kind.output_format()
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Builds queries against one repository root
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    program: PathBuf,
    root: PathBuf,
}

impl QueryBuilder {
    pub fn new<P: AsRef<Path>>(program: impl Into<PathBuf>, root: P) -> Self {
        QueryBuilder {
            program: program.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The newest `max_count` commits
    pub fn initial_block(&self, max_count: usize) -> QuerySpec {
        self.block(QueryKind::InitialBlock { max_count }, None, max_count)
    }

    /// Up to `max_count` commits no newer than `before`
    pub fn block_before(&self, before: i64, max_count: usize) -> QuerySpec {
        self.block(
            QueryKind::BlockBefore { before, max_count },
            Some(before),
            max_count,
        )
    }

    /// One line per ref tip with its full decoration
    pub fn ref_listing(&self) -> QuerySpec {
        let mut args = log_command();
        args.extend(ALL_REFS.iter().map(|s| s.to_string()));
        args.extend(
            ["--no-walk", "--no-color", "--format=%H%d", "--decorate=full"]
                .iter()
                .map(|s| s.to_string()),
        );
        self.spec(args, QueryKind::RefListing)
    }

    fn block(&self, kind: QueryKind, before: Option<i64>, max_count: usize) -> QuerySpec {
        let mut args = log_command();
        if let Some(before) = before {
            args.push(before_bound(before));
        }
        args.extend(ALL_REFS.iter().map(|s| s.to_string()));
        args.extend(
            [
                "--date-order",
                "--sparse",
                "--full-history",
                "--encoding=UTF-8",
                "--no-color",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(format!("--max-count={}", max_count));
        args.push(BLOCK_FORMAT.to_string());
        self.spec(args, kind)
    }

    fn spec(&self, args: Vec<String>, kind: QueryKind) -> QuerySpec {
        QuerySpec {
            program: self.program.clone(),
            args,
            work_dir: self.root.clone(),
            kind,
        }
    }
}

fn log_command() -> Vec<String> {
    let mut args: Vec<String> = CONFIG_OVERRIDES.iter().map(|s| s.to_string()).collect();
    args.push("log".to_string());
    args
}

/// `--before` bound as an explicit epoch time.
///
/// git reads a bare number of eight digits or fewer as a date, not as seconds,
/// so the `@<seconds>` form is required.
fn before_bound(before: i64) -> String {
    format!("--before=@{} +0000", before)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> QueryBuilder {
        QueryBuilder::new("git", "/repo")
    }

    #[test]
    fn initial_block_query() {
        let spec = builder().initial_block(1000);

        assert_eq!(spec.work_dir, PathBuf::from("/repo"));
        assert_eq!(spec.output_format(), OutputFormat::CommitBlock);
        assert_eq!(spec.args[..3], ["-c", "log.showSignature=false", "log"]);
        for arg in ["HEAD", "--branches", "--remotes", "--tags", "--date-order", "--full-history"] {
            assert!(spec.args.iter().any(|a| a == arg), "missing {}", arg);
        }
        assert!(spec.args.contains(&"--max-count=1000".to_string()));
        assert!(spec.args.contains(&"--format=%ct|-%H|-%P".to_string()));
        assert!(!spec.args.iter().any(|a| a.starts_with("--before")));
    }

    #[test]
    fn paginated_query_carries_cursor() {
        let spec = builder().block_before(1700000000, 50);

        assert_eq!(
            spec.kind,
            QueryKind::BlockBefore { before: 1700000000, max_count: 50 }
        );
        assert!(spec.args.contains(&"--before=@1700000000 +0000".to_string()));
        assert!(spec.args.contains(&"--max-count=50".to_string()));
        assert!(spec.args.contains(&"--date-order".to_string()));
    }

    #[test]
    fn small_timestamps_use_epoch_form() {
        let spec = builder().block_before(3000, 1);

        assert!(spec.args.contains(&"--before=@3000 +0000".to_string()));
        assert!(!spec.args.contains(&"--before=3000".to_string()));
    }

    #[test]
    fn signature_display_is_disabled() {
        for spec in [builder().initial_block(1), builder().block_before(1, 1), builder().ref_listing()] {
            let pos = spec.args.iter().position(|a| a == "log").unwrap();
            assert_eq!(spec.args[pos - 1], "log.showSignature=false");
        }
    }

    #[test]
    fn ref_listing_does_not_walk() {
        let spec = builder().ref_listing();

        assert_eq!(spec.output_format(), OutputFormat::RefListing);
        assert!(spec.args.contains(&"--no-walk".to_string()));
        assert!(spec.args.contains(&"--decorate=full".to_string()));
        assert!(spec.args.contains(&"--format=%H%d".to_string()));
        assert!(!spec.args.iter().any(|a| a.starts_with("--max-count")));
    }

    #[test]
    fn display_renders_command_line() {
        let spec = QueryBuilder::new("/usr/bin/git", "/repo").ref_listing();
        let line = spec.to_string();

        assert!(line.starts_with("/usr/bin/git -c log.showSignature=false log HEAD --branches"));
    }
}
