//! Persisting lattice positions as `{hash-hex: [x, y]}` JSON.

use crate::model::{Position, RailwayLayout};
use crate::Result;
use git2::Oid;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;

/// Pretty JSON with hex-sorted keys, so output is byte-stable for a fixed
/// layout.
pub fn to_json(layout: &RailwayLayout) -> Result<String> {
    let map: BTreeMap<String, [i64; 2]> = layout
        .positions
        .iter()
        .map(|(id, pos)| (id.to_string(), [pos.x, pos.y]))
        .collect();
    Ok(serde_json::to_string_pretty(&map)?)
}

pub fn write_file(layout: &RailwayLayout, path: &Path) -> Result<()> {
    std::fs::write(path, to_json(layout)?)?;
    Ok(())
}

/// Inverse of [`to_json`]; entries with malformed hashes are rejected.
pub fn from_json(text: &str) -> Result<FxHashMap<Oid, Position>> {
    let map: BTreeMap<String, [i64; 2]> = serde_json::from_str(text)?;
    let mut positions = FxHashMap::default();
    for (hex, [x, y]) in map {
        let id = Oid::from_str(&hex).map_err(|_| crate::Error::InvalidModel {
            message: format!("invalid commit hash in locations: {hex}"),
        })?;
        positions.insert(id, Position::new(x, y));
    }
    Ok(positions)
}
