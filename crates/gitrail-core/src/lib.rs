#![forbid(unsafe_code)]

//! Repository boundary for the railway renderer.
//!
//! This crate reads a local git repository and produces the semantic model
//! the layout engine consumes: the commit graph (with a `children` multimap),
//! the reflog-derived ref labeling of every commit, and the current head/tag
//! maps. It never writes to the repository and never touches the network.

pub mod collect;
pub mod error;
pub mod model;
pub mod reflog;
pub mod repo;

pub use collect::{collect_commits, collect_refs, RefMaps};
pub use error::{Error, Result};
pub use model::{CommitInfo, RefName};
pub use repo::{open_repository, resolve_git_dir};
