use git2::Oid;
use std::collections::BTreeSet;
use std::fmt;

/// A full ref name such as `refs/heads/main` or `refs/remotes/origin/topic`.
///
/// Ordered and hashable so it can key the layout engine's track table; the
/// namespace predicates mirror the three ref classes the renderer cares
/// about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(String);

impl RefName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with("refs/tags/")
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with("refs/remotes/")
    }

    /// `refs/remotes/<r>/HEAD` pointers are never labeled or drawn.
    pub fn is_remote_head(&self) -> bool {
        self.is_remote() && self.0.ends_with("/HEAD")
    }

    /// Display form without the namespace prefix: `main`, `origin/topic`,
    /// `v1.0`.
    pub fn short(&self) -> &str {
        self.0
            .strip_prefix("refs/heads/")
            .or_else(|| self.0.strip_prefix("refs/remotes/"))
            .or_else(|| self.0.strip_prefix("refs/tags/"))
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RefName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// One commit as the layout and the renderers see it.
///
/// `references` is the reflog-derived labeling: every ref whose reflog (or
/// current tip) has pointed at this commit. A `BTreeSet` keeps the label set
/// deterministically ordered for rendering and track updates.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: Oid,
    pub parents: Vec<Oid>,
    pub author_name: String,
    pub author_email: String,
    pub author_when: i64,
    pub author_offset_minutes: i32,
    pub committer_name: String,
    pub committer_email: String,
    pub committer_when: i64,
    pub committer_offset_minutes: i32,
    pub message: String,
    pub references: BTreeSet<RefName>,
}

impl CommitInfo {
    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message
            .split_once('\n')
            .map(|(first, _)| first)
            .unwrap_or(&self.message)
    }
}
