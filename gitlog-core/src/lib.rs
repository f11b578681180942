//! Incremental commit-log ingestion.
//!
//! Runs `git log` in a repository, parses its output into commit topology and
//! refs, and pages through history one block at a time.

pub mod commit;
pub mod config;
pub mod details;
pub mod error;
pub mod hash;
pub mod log_parser;
pub mod process;
pub mod provider;
pub mod query;
pub mod refs;

pub use commit::{CommitDetail, CommitParents, LogBlock, Signature};
pub use config::{LogConfig, MalformedLines, PartialOutput};
pub use details::{CommitDetailFetcher, DetailReader, Git2DetailReader};
pub use error::{LogError, Result};
pub use hash::{CommitHash, HashFormat, HashRegistry};
pub use log_parser::{BlockParser, LogLine, LogParser};
pub use process::{CommandRunner, KillHandle, ProcessOutput, ProcessRunner, QueryOutput};
pub use provider::{CancelHandle, Cursor, LogProvider, ProviderState};
pub use query::{OutputFormat, QueryBuilder, QueryKind, QuerySpec};
pub use refs::{Ref, RefKind, RefParser};
