use crate::error::Result;
use crate::model::{CommitInfo, RefName};
use crate::reflog;
use crate::repo::resolve_git_dir;
use git2::{Oid, Repository};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Current ref tips, keyed by the commit they point at.
///
/// `heads` carries local branches (and, under `--all`, remote branches);
/// `tags` carries tag refs with annotated tags dereferenced to their target
/// commit.
#[derive(Debug, Default)]
pub struct RefMaps {
    pub heads: FxHashMap<Oid, Vec<RefName>>,
    pub tags: FxHashMap<Oid, Vec<RefName>>,
}

fn commit_info(repo: &Repository, id: Oid) -> Option<CommitInfo> {
    let commit = match repo.find_commit(id) {
        Ok(commit) => commit,
        Err(err) => {
            debug!(%id, error = %err, "skipping unreadable commit object");
            return None;
        }
    };
    let author = commit.author();
    let committer = commit.committer();
    Some(CommitInfo {
        id,
        parents: commit.parent_ids().collect(),
        author_name: author.name().unwrap_or_default().to_string(),
        author_email: author.email().unwrap_or_default().to_string(),
        author_when: author.when().seconds(),
        author_offset_minutes: author.when().offset_minutes(),
        committer_name: committer.name().unwrap_or_default().to_string(),
        committer_email: committer.email().unwrap_or_default().to_string(),
        committer_when: committer.when().seconds(),
        committer_offset_minutes: committer.when().offset_minutes(),
        message: commit.message().unwrap_or_default().to_string(),
        references: BTreeSet::new(),
    })
}

/// Walk roots: local branch tips, tag targets, and (with `all`) remote
/// tips. Annotated tags are dereferenced to their target commit.
fn walk_roots(repo: &Repository, all: bool) -> Result<Vec<Oid>> {
    let mut roots = Vec::new();
    for reference in repo.references()? {
        let Ok(reference) = reference else { continue };
        let Some(name) = reference.name() else {
            continue;
        };
        let name = RefName::from(name);
        if name.is_branch() || (all && name.is_remote()) {
            if let Some(target) = reference.target() {
                roots.push(target);
            }
        } else if name.is_tag() {
            if let Ok(commit) = reference.peel_to_commit() {
                roots.push(commit.id());
            }
        }
    }
    Ok(roots)
}

/// Collect the commit graph and apply reflog labeling.
///
/// Walks parents transitively from every walk root, recording a `CommitInfo`
/// per reachable commit and a `children` multimap. Commit objects that
/// cannot be read (shallow history) are skipped and the walk continues from
/// the remaining frontier. Afterwards each qualifying ref labels every
/// commit its reflog has pointed at, plus its current tip.
pub fn collect_commits(
    repo_path: &Path,
    repo: &Repository,
    all: bool,
) -> Result<(FxHashMap<Oid, CommitInfo>, FxHashMap<Oid, FxHashSet<Oid>>)> {
    let mut commits: FxHashMap<Oid, CommitInfo> = FxHashMap::default();
    let mut children: FxHashMap<Oid, FxHashSet<Oid>> = FxHashMap::default();

    let mut to_process = walk_roots(repo, all)?;
    while let Some(current) = to_process.pop() {
        if commits.contains_key(&current) {
            continue;
        }
        let Some(info) = commit_info(repo, current) else {
            continue;
        };
        for &parent in &info.parents {
            children.entry(parent).or_default().insert(current);
            to_process.push(parent);
        }
        commits.insert(current, info);
    }

    label_commits(repo_path, repo, all, &mut commits);

    info!("collected {} commits", commits.len());
    info!("collected {} child relationships", children.len());
    Ok((commits, children))
}

/// Apply reflog labeling in place: local branch reflogs always, untracked
/// remote reflogs (excluding `*/HEAD`) when `all` is set.
fn label_commits(
    repo_path: &Path,
    repo: &Repository,
    all: bool,
    commits: &mut FxHashMap<Oid, CommitInfo>,
) {
    let git_dir = match resolve_git_dir(repo_path) {
        Ok(dir) => dir,
        Err(err) => {
            warn!(error = %err, "could not resolve git dir for reflogs");
            return;
        }
    };
    let tracked_remotes = if all {
        reflog::tracked_remote_refs(&git_dir)
    } else {
        BTreeSet::new()
    };

    let Ok(references) = repo.references() else {
        return;
    };
    for reference in references {
        let Ok(reference) = reference else { continue };
        let Some(name) = reference.name() else {
            continue;
        };
        let name = RefName::from(name);

        let qualifies = name.is_branch()
            || (all
                && name.is_remote()
                && !name.is_remote_head()
                && !tracked_remotes.contains(name.as_str()));
        if !qualifies {
            continue;
        }

        let mut labeled = reflog::read_reflog_new_hashes(&git_dir, name.as_str());
        // The tip also counts even when the reflog is missing or stale.
        if let Some(tip) = reference.target() {
            labeled.push(tip);
        }
        for hash in labeled {
            if let Some(info) = commits.get_mut(&hash) {
                info.references.insert(name.clone());
            }
        }
    }
}

/// Current head and tag tips for rendering and for the layout engine's
/// head-untracking bookkeeping.
pub fn collect_refs(repo: &Repository, all: bool) -> Result<RefMaps> {
    let mut maps = RefMaps::default();
    for reference in repo.references()? {
        let Ok(reference) = reference else { continue };
        let Some(name) = reference.name() else {
            continue;
        };
        let name = RefName::from(name);

        if name.is_branch() || (all && name.is_remote()) {
            if let Some(target) = reference.target() {
                maps.heads.entry(target).or_default().push(name);
            }
        } else if name.is_tag() {
            if let Ok(commit) = reference.peel_to_commit() {
                maps.tags.entry(commit.id()).or_default().push(name);
            }
        }
    }

    info!("collected {} heads", maps.heads.len());
    info!("collected {} tags", maps.tags.len());
    Ok(maps)
}
