use crate::error::{LogError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Object id width accepted by a [`HashRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFormat {
    /// 40 hex digits
    #[default]
    Sha1,
    /// 64 hex digits
    Sha256,
    /// Anything from an abbreviated id (4 digits) up to a full SHA-256 id
    Relaxed,
}

impl HashFormat {
    pub fn accepts(self, text: &str) -> bool {
        let len_ok = match self {
            HashFormat::Sha1 => text.len() == 40,
            HashFormat::Sha256 => text.len() == 64,
            HashFormat::Relaxed => (4..=64).contains(&text.len()),
        };
        len_ok && text.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// An interned commit id.
///
/// Equality and hashing go through the text, so hashes from different
/// registries still compare correctly. Hashes from the same registry share one
/// allocation, which [`CommitHash::ptr_eq`] exposes for identity checks.
#[derive(Clone, PartialOrd, Ord)]
pub struct CommitHash(Arc<str>);

impl CommitHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters, for display
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    pub fn ptr_eq(&self, other: &CommitHash) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for CommitHash {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for CommitHash {}

impl std::hash::Hash for CommitHash {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl AsRef<str> for CommitHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitHash({})", self.0)
    }
}

impl Serialize for CommitHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Interning table for commit ids of one repository session.
///
/// Shared between parsers through an `Arc`; lookup-or-insert runs under the
/// write lock so two threads interning the same text get the same instance.
#[derive(Debug, Default)]
pub struct HashRegistry {
    format: HashFormat,
    hashes: RwLock<HashSet<Arc<str>>>,
}

impl HashRegistry {
    pub fn new(format: HashFormat) -> Self {
        Self {
            format,
            hashes: RwLock::new(HashSet::new()),
        }
    }

    pub fn format(&self) -> HashFormat {
        self.format
    }

    /// Intern `text`, returning the shared instance
    pub fn intern(&self, text: &str) -> Result<CommitHash> {
        if !self.format.accepts(text) {
            return Err(LogError::MalformedHash {
                text: text.to_string(),
            });
        }

        if let Some(existing) = self.get(text) {
            return Ok(existing);
        }

        let mut hashes = self.hashes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = hashes.get(text) {
            return Ok(CommitHash(existing.clone()));
        }
        let shared: Arc<str> = Arc::from(text);
        hashes.insert(shared.clone());
        Ok(CommitHash(shared))
    }

    /// Look up an already interned hash without inserting
    pub fn get(&self, text: &str) -> Option<CommitHash> {
        let hashes = self.hashes.read().unwrap_or_else(PoisonError::into_inner);
        hashes.get(text).map(|shared| CommitHash(shared.clone()))
    }

    pub fn len(&self) -> usize {
        self.hashes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
