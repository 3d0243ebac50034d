use crate::error::{Error, Result};
use git2::Repository;
use std::path::{Path, PathBuf};

/// Open the repository containing `path`, walking parent directories the way
/// `git` itself does. `path` may be the repository root or any subdirectory.
pub fn open_repository(path: &Path) -> Result<Repository> {
    Repository::discover(path).map_err(|source| Error::OpenRepository {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the `.git` directory for `start`.
///
/// Handles the three layouts in the wild:
/// - standard repositories where `.git` is a directory
/// - worktrees/submodules where `.git` is a file containing `gitdir: <path>`
/// - being invoked from any subdirectory (walks parents)
pub fn resolve_git_dir(start: &Path) -> Result<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let dotgit = dir.join(".git");
        if let Ok(meta) = std::fs::metadata(&dotgit) {
            if meta.is_dir() {
                return Ok(dotgit);
            }
            let contents = std::fs::read_to_string(&dotgit).map_err(|source| Error::Io {
                path: dotgit.clone(),
                source,
            })?;
            let trimmed = contents.trim();
            let Some(target) = trimmed.strip_prefix("gitdir:") else {
                return Err(Error::InvalidGitFile { path: dotgit });
            };
            let target = target.trim();
            if target.is_empty() {
                return Err(Error::InvalidGitFile { path: dotgit });
            }
            let target = PathBuf::from(target);
            return Ok(if target.is_absolute() {
                target
            } else {
                dir.join(target)
            });
        }

        if !dir.pop() {
            break;
        }
    }

    Err(Error::GitDirNotFound {
        path: start.to_path_buf(),
    })
}
