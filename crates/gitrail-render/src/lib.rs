#![forbid(unsafe_code)]

//! Railway layout and rendering.
//!
//! [`layout::arrange`] assigns every commit a lattice position: `x` is the
//! track the commit's rail runs on, `y` is the emission order of a
//! chrono-topological sort. [`svg`] draws the positioned graph as colored
//! rails and stops; [`html`] wraps the SVG in a self-contained page with
//! per-commit metadata; [`locations`] persists positions as JSON.

pub mod html;
pub mod layout;
pub mod locations;
pub mod model;
pub mod svg;

pub use layout::arrange;
pub use model::{Position, RailwayLayout};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid layout model: {message}")]
    InvalidModel { message: String },

    #[error("unknown embedded resource: {name}")]
    MissingResource { name: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
