use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gitlog_core::{
    CommitHash, HashFormat, HashRegistry, LogConfig, LogProvider, ProviderState, Ref, RefKind,
};
use graph::{HistoryLoader, LoadLimit};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitlog")]
#[command(about = "Incremental git history reader", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Git executable to run
    #[arg(long, global = true)]
    git: Option<PathBuf>,
    /// Commits per history block
    #[arg(long, global = true)]
    block_size: Option<usize>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print commit topology, newest first
    Log {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Stop after this many commits
        #[arg(short, long)]
        count: Option<usize>,
        /// Number of blocks to read
        #[arg(short, long, default_value = "1", conflicts_with = "all")]
        blocks: usize,
        /// Read the whole history
        #[arg(long)]
        all: bool,
    },
    /// List branches, remote branches and tags
    Refs {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show commit details
    Show {
        /// Path to the repository
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Commit hashes
        #[arg(required = true)]
        hashes: Vec<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the whole history and print graph statistics
    Stats {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let config = load_config(&cli.global)?;
    debug!(?config, "effective configuration");

    match cli.command {
        Commands::Log {
            path,
            count,
            blocks,
            all,
        } => {
            let limit = if all {
                LoadLimit::All
            } else {
                LoadLimit::Blocks(blocks)
            };
            print_log(&path, config, limit, count)?;
        }
        Commands::Refs { path, json } => {
            let provider = open_provider(&path, config)?;
            let refs = provider.read_all_refs().context("Failed to read refs")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&refs)?);
            } else {
                print_refs(&refs);
            }
        }
        Commands::Show { path, hashes, json } => {
            let provider = open_provider(&path, config)?;
            let hashes = parse_hashes(&hashes)?;
            let details = provider
                .read_commit_details(&hashes)
                .context("Failed to read commit details")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                for detail in details {
                    println!("commit {}", detail.hash);
                    println!("Author: {} <{}>", detail.author.name, detail.author.email);
                    println!("Date:   {}", detail.author.time.with_timezone(&chrono::Local).format("%a %b %e %H:%M:%S %Y %z"));
                    println!();
                    for line in detail.message.lines() {
                        println!("    {}", line);
                    }
                    println!();
                }
            }
        }
        Commands::Stats { path } => {
            let mut loader = HistoryLoader::open(&path, config)?;
            let dag = loader.into_dag(LoadLimit::All, &mut report_status)?;
            let decorator = loader.decorator()?;
            let stats = dag.stats();

            println!("Commits:            {}", stats.total_commits);
            println!("Edges:              {}", stats.total_edges);
            println!("Merge commits:      {}", stats.merge_commits);
            println!("Root commits:       {}", stats.root_commits);
            println!("Leaf commits:       {}", stats.leaf_commits);
            println!("Unresolved parents: {}", stats.unresolved_parents);
            println!("Decorated commits:  {}", decorator.len());
            if let Some(head) = decorator.head() {
                println!("HEAD:               {}", head.short(8));
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn load_config(args: &GlobalArgs) -> Result<LogConfig> {
    let mut config = match &args.config {
        Some(path) => LogConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LogConfig::default(),
    };
    if let Some(git) = &args.git {
        config.git_executable = git.clone();
    }
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    Ok(config)
}

fn open_provider(path: &Path, config: LogConfig) -> Result<LogProvider> {
    LogProvider::open(path, config)
        .with_context(|| format!("Failed to open repository at {}", path.display()))
}

/// Command line hashes may be abbreviated; the detail reader expands them
fn parse_hashes(hashes: &[String]) -> Result<Vec<CommitHash>> {
    let registry = HashRegistry::new(HashFormat::Relaxed);
    hashes
        .iter()
        .map(|h| {
            registry
                .intern(h)
                .with_context(|| format!("Invalid commit hash {:?}", h))
        })
        .collect()
}

fn report_status(message: &str) {
    eprintln!("{}", message);
}

fn print_log(path: &Path, config: LogConfig, limit: LoadLimit, count: Option<usize>) -> Result<()> {
    let mut provider = open_provider(path, config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut printed = 0usize;
    let mut blocks = 0usize;

    let wants_more = |printed: usize| count.map_or(true, |max| printed < max);

    while limit.allows(blocks) && provider.state() != ProviderState::Exhausted && wants_more(printed) {
        let block = provider
            .read_next_block(&mut report_status)
            .with_context(|| format!("Failed to read history block {}", blocks + 1))?;
        if block.is_empty() {
            break;
        }
        blocks += 1;

        for commit in block.iter() {
            if !wants_more(printed) {
                return Ok(());
            }
            let parents: Vec<&str> = commit.parents.iter().map(CommitHash::as_str).collect();
            writeln!(out, "{} {}", commit.hash, parents.join(" "))?;
            printed += 1;
        }
        if !block.complete {
            eprintln!("warning: history is incomplete");
            break;
        }
    }

    Ok(())
}

fn print_refs(refs: &[Ref]) {
    let groups = [
        ("HEAD", RefKind::Head),
        ("Local branches", RefKind::LocalBranch),
        ("Remote branches", RefKind::RemoteBranch),
        ("Tags", RefKind::Tag),
    ];

    for (title, kind) in groups {
        let mut group: Vec<&Ref> = refs.iter().filter(|r| r.kind == kind).collect();
        if group.is_empty() {
            continue;
        }
        group.sort_by(|a, b| a.name.cmp(&b.name));

        println!("{}:", title);
        for r in group {
            let marker = if r.is_head { "* " } else { "  " };
            println!("{}{} {}", marker, r.hash.short(8), r.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_overrides_apply_after_subcommand() {
        let cli = Cli::try_parse_from(["gitlog", "log", "repo", "--all", "--block-size", "50", "--git", "/usr/bin/git"])
            .unwrap();
        let config = load_config(&cli.global).unwrap();

        assert_eq!(config.block_size, 50);
        assert_eq!(config.git_executable, PathBuf::from("/usr/bin/git"));
        assert!(matches!(cli.command, Commands::Log { all: true, .. }));
    }

    #[test]
    fn abbreviated_hashes_are_accepted() {
        let hashes = parse_hashes(&["abc1234".to_string(), "0".repeat(40)]).unwrap();
        assert_eq!(hashes[0].as_str(), "abc1234");
        assert_eq!(hashes[1].as_str().len(), 40);

        let err = parse_hashes(&["xyz".to_string()]).unwrap_err();
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn blocks_and_all_conflict() {
        assert!(Cli::try_parse_from(["gitlog", "log", "--blocks", "2", "--all"]).is_err());
    }

    #[test]
    fn show_requires_a_hash() {
        assert!(Cli::try_parse_from(["gitlog", "show"]).is_err());
        let cli = Cli::try_parse_from(["gitlog", "show", "abc1234", "--path", "repo"]).unwrap();
        match cli.command {
            Commands::Show { path, hashes, json } => {
                assert_eq!(path, PathBuf::from("repo"));
                assert_eq!(hashes, vec!["abc1234"]);
                assert!(!json);
            }
            _ => panic!("expected show"),
        }
    }
}
