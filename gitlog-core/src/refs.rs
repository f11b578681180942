use crate::error::{LogError, Result};
use crate::hash::{CommitHash, HashRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

const HEAD: &str = "HEAD";
const HEAD_ARROW: &str = "HEAD -> ";
const TAG_MARKER: &str = "tag: ";
// Ref names may contain commas but never spaces
const DECORATION_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    LocalBranch,
    RemoteBranch,
    Tag,
    /// Detached HEAD
    Head,
}

impl RefKind {
    fn prefix(self) -> &'static str {
        match self {
            RefKind::LocalBranch => "refs/heads/",
            RefKind::RemoteBranch => "refs/remotes/",
            RefKind::Tag => "refs/tags/",
            RefKind::Head => "",
        }
    }
}

/// A named pointer to a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ref {
    /// Short name, e.g. `main`, `origin/main`, `v1.0`
    pub name: String,
    pub kind: RefKind,
    pub hash: CommitHash,
    /// HEAD points at this ref (or this is the detached HEAD itself)
    pub is_head: bool,
}

impl Ref {
    pub fn full_name(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.name)
    }
}

/// Parses `hash (decoration, ...)` lines of the ref listing
#[derive(Debug, Clone)]
pub struct RefParser {
    registry: Arc<HashRegistry>,
}

impl RefParser {
    pub fn new(registry: Arc<HashRegistry>) -> Self {
        RefParser { registry }
    }

    pub fn parse_line(&self, line: &str) -> Result<Vec<Ref>> {
        let line = line.trim();
        let (hash_text, rest) = match line.split_once(' ') {
            Some((hash, rest)) => (hash, rest.trim()),
            None => (line, ""),
        };
        let hash = self
            .registry
            .intern(hash_text)
            .map_err(|_| LogError::MalformedRefLine {
                line: line.to_string(),
            })?;

        if rest.is_empty() {
            return Ok(Vec::new());
        }
        let Some(decorations) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) else {
            debug!("ignoring decoration group {:?}", rest);
            return Ok(Vec::new());
        };

        let refs = decorations
            .split(DECORATION_SEPARATOR)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .filter_map(|token| decode(token, &hash))
            .collect();
        Ok(refs)
    }
}

fn decode(token: &str, hash: &CommitHash) -> Option<Ref> {
    if token == HEAD {
        return Some(Ref {
            name: HEAD.to_string(),
            kind: RefKind::Head,
            hash: hash.clone(),
            is_head: true,
        });
    }

    let (is_head, token) = match token.strip_prefix(HEAD_ARROW) {
        Some(target) => (true, target),
        None => (false, token),
    };
    let token = token.strip_prefix(TAG_MARKER).unwrap_or(token);

    for kind in [RefKind::LocalBranch, RefKind::RemoteBranch, RefKind::Tag] {
        if let Some(name) = token.strip_prefix(kind.prefix()) {
            if name.is_empty() {
                break;
            }
            return Some(Ref {
                name: name.to_string(),
                kind,
                hash: hash.clone(),
                is_head,
            });
        }
    }

    debug!("ignoring decoration {:?}", token);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashFormat;

    fn parser() -> RefParser {
        RefParser::new(Arc::new(HashRegistry::new(HashFormat::Relaxed)))
    }

    #[test]
    fn head_marks_the_annotated_branch() {
        let refs = parser()
            .parse_line("abc123 (HEAD -> refs/heads/main, refs/tags/v1)")
            .unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "main");
        assert_eq!(refs[0].kind, RefKind::LocalBranch);
        assert!(refs[0].is_head);
        assert_eq!(refs[1].name, "v1");
        assert_eq!(refs[1].kind, RefKind::Tag);
        assert!(!refs[1].is_head);
        assert!(refs.iter().all(|r| r.hash.as_str() == "abc123"));
        assert!(refs[0].hash.ptr_eq(&refs[1].hash));
    }

    #[test]
    fn git_tag_marker_and_remotes() {
        let refs = parser()
            .parse_line("abc123 (tag: refs/tags/v2.0, refs/remotes/origin/main, refs/remotes/origin/HEAD)")
            .unwrap();

        let names: Vec<(&str, RefKind)> = refs.iter().map(|r| (r.name.as_str(), r.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("v2.0", RefKind::Tag),
                ("origin/main", RefKind::RemoteBranch),
                ("origin/HEAD", RefKind::RemoteBranch),
            ]
        );
        assert_eq!(refs[1].full_name(), "refs/remotes/origin/main");
    }

    #[test]
    fn detached_head() {
        let refs = parser().parse_line("abc123 (HEAD, refs/heads/topic)").unwrap();

        assert_eq!(refs[0].kind, RefKind::Head);
        assert!(refs[0].is_head);
        assert_eq!(refs[0].full_name(), "HEAD");
        assert_eq!(refs[1].name, "topic");
        assert!(!refs[1].is_head);
    }

    #[test]
    fn missing_decoration_yields_nothing() {
        assert!(parser().parse_line("abc123").unwrap().is_empty());
        assert!(parser().parse_line("abc123 ").unwrap().is_empty());
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let refs = parser()
            .parse_line("abc123 (grafted, refs/notes/commits, refs/heads/, refs/heads/dev)")
            .unwrap();

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "dev");
    }

    #[test]
    fn commas_inside_ref_names_are_kept() {
        let refs = parser()
            .parse_line("abc123 (HEAD -> refs/heads/fix,typo, tag: refs/tags/v1,rc)")
            .unwrap();

        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["fix,typo", "v1,rc"]);
        assert!(refs[0].is_head);
    }

    #[test]
    fn unbalanced_group_is_ignored() {
        assert!(parser().parse_line("abc123 (refs/heads/main").unwrap().is_empty());
    }

    #[test]
    fn bad_hash_fails_the_line() {
        assert!(matches!(
            parser().parse_line("zz (refs/heads/main)"),
            Err(LogError::MalformedRefLine { .. })
        ));
    }
}
