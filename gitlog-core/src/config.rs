use crate::error::{LogError, Result};
use crate::hash::HashFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// What to do with already parsed output when git exits with an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialOutput {
    /// Fail the read; nothing is returned
    #[default]
    Discard,
    /// Return the parsed prefix, flagged as incomplete
    Keep,
}

/// What to do with a block line that cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedLines {
    #[default]
    Abort,
    Skip,
}

/// Log ingestion settings, loadable from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub git_executable: PathBuf,
    /// `maxCount` of every block query
    pub block_size: usize,
    pub hash_format: HashFormat,
    pub partial_output: PartialOutput,
    pub malformed_lines: MalformedLines,
    /// Environment variables forwarded to git; everything else is cleared
    pub inherit_env: Vec<String>,
    /// Upper bound of hashes per detail request
    pub detail_batch_size: usize,
    /// Lines between two status updates
    pub progress_interval: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            git_executable: PathBuf::from("git"),
            block_size: 1000,
            hash_format: HashFormat::Sha1,
            partial_output: PartialOutput::Discard,
            malformed_lines: MalformedLines::Abort,
            inherit_env: ["PATH", "HOME", "SYSTEMROOT", "TMPDIR"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            detail_batch_size: 500,
            progress_interval: 500,
        }
    }
}

impl LogConfig {
    /// Load configuration from a TOML file; absent keys keep their defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: LogConfig =
            toml::from_str(content).map_err(|e| LogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(LogError::Config("block_size must be positive".to_string()));
        }
        if self.detail_batch_size == 0 {
            return Err(LogError::Config(
                "detail_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
