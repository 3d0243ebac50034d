use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open repository at {}", path.display())]
    OpenRepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("could not find a .git directory starting at {}", path.display())]
    GitDirNotFound { path: PathBuf },

    #[error("unrecognized .git file format at {}", path.display())]
    InvalidGitFile { path: PathBuf },

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
