use git2::Oid;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// Read the reflog for `ref_name` under `git_dir` and return every distinct
/// "new" target hash in file order.
///
/// Reflog lines look like `<old> <new> <author> <ts> <tz>\t<message>`; only
/// the second whitespace-separated field matters here. Zero hashes (ref
/// deletion markers) are discarded and duplicates within one ref are
/// deduplicated. A missing reflog file is normal and yields an empty list.
pub fn read_reflog_new_hashes(git_dir: &Path, ref_name: &str) -> Vec<Oid> {
    let path = git_dir.join("logs").join(ref_name);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable reflog, treating as empty");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    let mut seen = BTreeSet::new();
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let Some(new_hex) = fields.nth(1) else {
            continue;
        };
        if new_hex.len() != 40 {
            continue;
        }
        let Ok(oid) = Oid::from_str(new_hex) else {
            continue;
        };
        if oid.is_zero() {
            continue;
        }
        if seen.insert(oid) {
            out.push(oid);
        }
    }
    out
}

#[derive(Debug, Default)]
struct BranchConfig {
    remote: Option<String>,
    merge: Option<String>,
}

/// Walk the INI-like git config and hand each `section`/`key`/`value` triple
/// to `visit`. Subsection names keep their quotes stripped, so a
/// `[branch "main"]` header yields the section `branch main`.
fn for_each_config_entry(contents: &str, mut visit: impl FnMut(&str, &str, &str)) {
    let mut section = String::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = header.trim().replace('"', "");
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        visit(&section, key.trim(), value.trim());
    }
}

/// The set of remote refs tracked by local branches, e.g.
/// `refs/remotes/origin/main` when `branch.main.remote = origin` and
/// `branch.main.merge = refs/heads/main`.
///
/// Tracked remotes are excluded from remote reflog labeling under `--all`:
/// their history is already colored by the local branch.
pub fn tracked_remote_refs(git_dir: &Path) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let contents = match std::fs::read_to_string(git_dir.join("config")) {
        Ok(contents) => contents,
        Err(_) => return out,
    };

    let mut branches: Vec<(String, BranchConfig)> = Vec::new();
    for_each_config_entry(&contents, |section, key, value| {
        let Some(branch) = section.strip_prefix("branch ") else {
            return;
        };
        let idx = match branches.iter().position(|(name, _)| name == branch) {
            Some(idx) => idx,
            None => {
                branches.push((branch.to_string(), BranchConfig::default()));
                branches.len() - 1
            }
        };
        match key {
            "remote" => branches[idx].1.remote = Some(value.to_string()),
            "merge" => branches[idx].1.merge = Some(value.to_string()),
            _ => {}
        }
    });

    for (_, cfg) in branches {
        let (Some(remote), Some(merge)) = (cfg.remote, cfg.merge) else {
            continue;
        };
        let Some(name) = merge.strip_prefix("refs/heads/") else {
            continue;
        };
        if !name.is_empty() {
            out.insert(format!("refs/remotes/{remote}/{name}"));
        }
    }
    out
}

/// Derive a GitHub `owner/repo` slug from `remote.origin.url`, if the remote
/// points at GitHub. Used only to turn `org#123` references in commit
/// messages into links.
pub fn github_slug(git_dir: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(git_dir.join("config")).ok()?;
    let mut url = None;
    for_each_config_entry(&contents, |section, key, value| {
        if section == "remote origin" && key == "url" && url.is_none() {
            url = Some(value.to_string());
        }
    });
    slug_from_url(&url?)
}

fn slug_from_url(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("git@github.com:"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let rest = rest.trim_end_matches('/');
    let mut parts = rest.splitn(2, '/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}
