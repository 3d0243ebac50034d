//! The railway layout engine.
//!
//! Commits are emitted in chrono-topological order (`y` = emission index)
//! and assigned a track (`x`) so that commits sharing a ref flow along a
//! common track, diverging branches claim free tracks, and a branch's track
//! is released as soon as its tip has been emitted.
//!
//! The single source of truth for "which tracks are live" is the track table
//! `refs_levels`: a ref enters it when a commit it labels is placed, and
//! leaves it in the placement step that emits the ref's tip commit.

use crate::model::{Position, RailwayLayout};
use git2::Oid;
use gitrail_core::{CommitInfo, RefName};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Topological order that prefers earlier committer timestamps.
///
/// The candidate list holds every commit sorted ascending by
/// `(committer_when, id)`; each round emits the first candidate with no
/// remaining parents and decrements its children's counts. Parents missing
/// from `commits` (shallow history) never block emission. If no candidate is
/// ready (a cycle, which a well-formed DAG cannot produce), the remainder is
/// flushed in timestamp order rather than failing.
fn chrono_topo_sort(
    commits: &FxHashMap<Oid, CommitInfo>,
    children: &FxHashMap<Oid, FxHashSet<Oid>>,
) -> Vec<Oid> {
    let mut pending: Vec<Oid> = commits.keys().copied().collect();
    pending.sort_by_key(|id| (commits[id].committer_when, *id));

    let mut remaining: FxHashMap<Oid, usize> = commits
        .iter()
        .map(|(id, info)| {
            let present: FxHashSet<Oid> = info
                .parents
                .iter()
                .copied()
                .filter(|p| commits.contains_key(p))
                .collect();
            (*id, present.len())
        })
        .collect();

    let mut result = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        match pending.iter().position(|id| remaining[id] == 0) {
            Some(i) => {
                let id = pending.remove(i);
                if let Some(kids) = children.get(&id) {
                    for child in kids {
                        if let Some(count) = remaining.get_mut(child) {
                            *count = count.saturating_sub(1);
                        }
                    }
                }
                result.push(id);
            }
            None => {
                result.extend(pending.drain(..));
            }
        }
    }
    result
}

struct Arranger<'a> {
    commits: &'a FxHashMap<Oid, CommitInfo>,
    children: &'a FxHashMap<Oid, FxHashSet<Oid>>,
    heads: &'a FxHashMap<Oid, Vec<RefName>>,
    /// Track table: active ref -> track index.
    refs_levels: BTreeMap<RefName, i64>,
    /// Head tips placed in the current step, untracked after their own
    /// refs-level update.
    seen_heads: FxHashSet<Oid>,
    /// Pending children of head tips that carry at least one local branch.
    head_children: FxHashMap<Oid, FxHashSet<Oid>>,
    /// Transpose of `head_children`.
    children_head: FxHashMap<Oid, FxHashSet<Oid>>,
    positions: FxHashMap<Oid, Position>,
}

impl<'a> Arranger<'a> {
    fn new(
        commits: &'a FxHashMap<Oid, CommitInfo>,
        children: &'a FxHashMap<Oid, FxHashSet<Oid>>,
        heads: &'a FxHashMap<Oid, Vec<RefName>>,
    ) -> Self {
        let mut head_children: FxHashMap<Oid, FxHashSet<Oid>> = FxHashMap::default();
        for (&tip, refs) in heads {
            if refs.iter().any(RefName::is_branch) {
                head_children.insert(tip, children.get(&tip).cloned().unwrap_or_default());
            }
        }
        let mut children_head: FxHashMap<Oid, FxHashSet<Oid>> = FxHashMap::default();
        for (&tip, kids) in &head_children {
            for &kid in kids {
                children_head.entry(kid).or_default().insert(tip);
            }
        }

        Self {
            commits,
            children,
            heads,
            refs_levels: BTreeMap::new(),
            seen_heads: FxHashSet::default(),
            head_children,
            children_head,
            positions: FxHashMap::default(),
        }
    }

    /// Smallest track index usable for a new rail.
    ///
    /// Only gaps between occupied tracks are considered; with no gap the next
    /// track above the maximum is returned. An empty table yields `0` for a
    /// commit that introduces refs and `1` for an unlabeled one, which keeps
    /// unlabeled strays off the primary track.
    fn gap(&self, refs: bool) -> i64 {
        if self.refs_levels.is_empty() {
            return if refs { 0 } else { 1 };
        }
        let levels: Vec<i64> = self
            .refs_levels
            .values()
            .copied()
            .collect::<BTreeSet<i64>>()
            .into_iter()
            .collect();
        for pair in levels.windows(2) {
            if pair[1] - pair[0] > 1 {
                return pair[0] + 1;
            }
        }
        levels[levels.len() - 1] + 1
    }

    /// Refs grouped by the track they currently occupy, ascending.
    fn level_refs(&self) -> BTreeMap<i64, BTreeSet<&RefName>> {
        let mut by_level: BTreeMap<i64, BTreeSet<&RefName>> = BTreeMap::new();
        for (r, &level) in &self.refs_levels {
            by_level.entry(level).or_default().insert(r);
        }
        by_level
    }

    /// Track for a commit with no refs: follow the lowest placed parent, or
    /// break off to a gap when that parent still has unplaced children (its
    /// own track is still busy) or no parent is placed at all.
    fn place_unlabeled(&self, info: &CommitInfo, order: &[Oid], i: usize) -> i64 {
        let mut placed: Vec<(Oid, i64)> = info
            .parents
            .iter()
            .filter_map(|p| self.positions.get(p).map(|pos| (*p, pos.x)))
            .collect();
        placed.sort_by_key(|&(_, x)| x);

        let Some(&(parent, parent_x)) = placed.first() else {
            return self.gap(false);
        };
        let parent_has_future_children = self
            .children
            .get(&parent)
            .is_some_and(|kids| order[i + 2..].iter().any(|h| kids.contains(h)));
        if parent_has_future_children {
            self.gap(false)
        } else {
            parent_x
        }
    }

    /// Track for a commit whose ref set intersects the active refs.
    ///
    /// Each parent proposes a candidate and the minimum wins:
    /// - a parent whose tracked refs all continue on this commit is absorbed
    ///   (reuse its track);
    /// - a parent that carries strictly more shared refs than any single
    ///   track does is a divergence point: move to the lowest track among
    ///   this commit's refs, or to a fresh gap when that would collide with
    ///   a parent that still has other children;
    /// - if all of this commit's tracked refs are already co-located on one
    ///   track, reuse the smallest such track;
    /// - otherwise claim a fresh gap.
    fn place_tracked(&self, info: &CommitInfo) -> i64 {
        let current: BTreeSet<&RefName> = info
            .references
            .iter()
            .filter(|r| self.refs_levels.contains_key(*r))
            .collect();
        let level_refs = self.level_refs();

        let mut candidates: Vec<i64> = Vec::new();
        for p in &info.parents {
            let Some(parent_info) = self.commits.get(p) else {
                continue;
            };
            let parent_tracked: BTreeSet<&RefName> = parent_info
                .references
                .iter()
                .filter(|r| self.refs_levels.contains_key(*r))
                .collect();

            let x_for_parent: Option<i64> = if parent_tracked.is_subset(&current) {
                self.positions.get(p).map(|pos| pos.x)
            } else {
                let diverged = level_refs.values().any(|at_level| {
                    let current_at_level: BTreeSet<&RefName> =
                        at_level.intersection(&current).copied().collect();
                    current_at_level.is_subset(&parent_tracked)
                        && !parent_tracked.is_subset(&current_at_level)
                });

                if diverged {
                    let mut x = current
                        .iter()
                        .filter_map(|r| self.refs_levels.get(*r).copied())
                        .min()
                        .unwrap_or_else(|| self.gap(true));
                    if let Some(pos) = self.positions.get(p) {
                        let child_count = self.children.get(p).map_or(0, |kids| kids.len());
                        if x == pos.x && child_count != 1 {
                            x = self.gap(true);
                        }
                    }
                    Some(x)
                } else if let Some((&level, _)) = level_refs.iter().find(|(_, at_level)| {
                    at_level.intersection(&current).copied().collect::<BTreeSet<_>>() == current
                }) {
                    Some(level)
                } else {
                    Some(self.gap(true))
                }
            };

            candidates.push(x_for_parent.unwrap_or_else(|| self.gap(true)));
        }

        candidates
            .into_iter()
            .min()
            .unwrap_or_else(|| self.gap(true))
    }

    fn place(&mut self, id: Oid, order: &[Oid], i: usize) {
        let commits = self.commits;
        let info = &commits[&id];

        let x = if info.references.is_empty() {
            self.place_unlabeled(info, order, i)
        } else if info
            .references
            .iter()
            .all(|r| !self.refs_levels.contains_key(r))
        {
            // Strictly new refs: claim a fresh track.
            self.gap(true)
        } else {
            self.place_tracked(info)
        };
        let x = x.max(0);

        self.positions
            .insert(id, Position::new(x, self.positions.len() as i64));
        for r in &info.references {
            self.refs_levels.insert(r.clone(), x);
        }

        if self.heads.contains_key(&id) {
            self.seen_heads.insert(id);
        } else if let Some(tips) = self.children_head.get(&id).cloned() {
            for tip in tips {
                if let Some(pending) = self.head_children.get_mut(&tip) {
                    pending.remove(&id);
                }
            }
        }

        // Untrack after the tip's own refs were recorded, freeing its track
        // for subsequent emissions.
        for tip in std::mem::take(&mut self.seen_heads) {
            if let Some(refs) = self.heads.get(&tip) {
                for r in refs {
                    self.refs_levels.remove(r);
                }
            }
        }
    }
}

/// Assign every commit a lattice position.
///
/// Deterministic for a fixed input: sort ties break on commit id, set walks
/// are over ordered containers, and all choices are by minimum.
pub fn arrange(
    commits: &FxHashMap<Oid, CommitInfo>,
    children: &FxHashMap<Oid, FxHashSet<Oid>>,
    heads: &FxHashMap<Oid, Vec<RefName>>,
) -> RailwayLayout {
    let order = chrono_topo_sort(commits, children);
    let mut layout = RailwayLayout::default();
    let Some(&first) = order.first() else {
        info!("arranged 0 commits");
        return layout;
    };

    let mut arranger = Arranger::new(commits, children, heads);
    arranger.positions.insert(first, Position::new(0, 0));
    for r in &commits[&first].references {
        arranger.refs_levels.insert(r.clone(), 0);
    }

    for i in 0..order.len() - 1 {
        arranger.place(order[i + 1], &order, i);
    }

    info!("arranged {} commits", arranger.positions.len());
    layout.positions = arranger.positions;
    layout
}
