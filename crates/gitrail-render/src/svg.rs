//! The railway SVG renderer.
//!
//! Rails run between a commit's stop and each parent's stop, colored by the
//! refs the edge carries; a rail with several refs splits its stroke into
//! side-by-side strands. Track changes bend through two cubic segments, and
//! a rail whose intermediate track is occupied by another stop is rerouted
//! around it ("middle" rails).

use crate::model::{Position, RailwayLayout};
use git2::Oid;
use gitrail_core::{CommitInfo, RefName};
use rustc_hash::{FxHashMap, FxHashSet};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::Write as _;

const SCALE: f64 = 1.5;
const STEP_X: i64 = 24;
const STEP_Y: i64 = 30;
const PADDING_X: i64 = 50;
const PADDING_Y: i64 = 8;
const STOP_RADIUS: i64 = 5;
const RAIL_WIDTH: f64 = 6.0;
const MAX_RAIL_COLORS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

const GRAY: Rgb = Rgb {
    r: 128,
    g: 128,
    b: 128,
};

const STOP_FILL: Rgb = Rgb {
    r: 219,
    g: 219,
    b: 219,
};

impl Rgb {
    fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_rgb(p, q, h + 1.0 / 3.0),
            hue_to_rgb(p, q, h),
            hue_to_rgb(p, q, h - 1.0 / 3.0),
        )
    };
    Rgb {
        r: (r * 255.0) as u8,
        g: (g * 255.0) as u8,
        b: (b * 255.0) as u8,
    }
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

struct SvgRailway {
    out: String,
    colors: FxHashMap<String, Rgb>,
}

impl SvgRailway {
    fn new() -> Self {
        Self {
            out: String::new(),
            colors: FxHashMap::default(),
        }
    }

    /// Stable per-ref color: hash bytes pick a hue plus a mid-range
    /// saturation (0.5..0.8) and lightness (0.6..0.8).
    fn ref_color(&mut self, ref_name: &str) -> Rgb {
        if let Some(&color) = self.colors.get(ref_name) {
            return color;
        }
        let digest = Sha256::digest(ref_name.as_bytes());
        let h = digest[0] as f64 / 255.0;
        let s = 0.5 + (digest[1] as f64 / 255.0) * 0.3;
        let l = 0.6 + (digest[2] as f64 / 255.0) * 0.2;
        let color = hsl_to_rgb(h, s, l);
        self.colors.insert(ref_name.to_string(), color);
        color
    }

    /// One S-bend: two cubic segments spanning `dx` tracks and `dy` rows.
    fn add_s(path: &mut String, dx: f64, dy: f64) {
        let step_x = STEP_X as f64;
        let step_y = STEP_Y as f64;

        let cp1y = step_y * (1.0 / 5.0) * dy;
        let cp2x = -step_x * (1.0 / 4.0) * dx;
        let cp2y = step_y * (2.0 / 5.0) * dy;
        let end1x = -step_x * (1.0 / 2.0) * dx;
        let end1y = step_y * (1.0 / 2.0) * dy;

        let cp3x = -step_x * (1.0 / 4.0) * dx;
        let cp3y = step_y * (1.0 / 10.0) * dy;
        let cp4x = -step_x * (1.0 / 2.0) * dx;
        let cp4y = step_y * (3.0 / 10.0) * dy;

        let _ = write!(
            path,
            "c {:.1} {cp1y:.1} {cp2x:.1} {cp2y:.1} {end1x:.1} {end1y:.1} ",
            0.0
        );
        let _ = write!(
            path,
            "c {cp3x:.1} {cp3y:.1} {cp4x:.1} {cp4y:.1} {end1x:.1} {end1y:.1} "
        );
    }

    /// Draw the rail from the stop at `(x, y)` down to the parent stop at
    /// `(px, py)` (display coordinates, parent below). `middle` routes the
    /// bends around a stop sitting on the intermediate track.
    fn rail(&mut self, x: i64, y: i64, px: i64, py: i64, colors: &[Rgb], middle: bool) {
        let colors = if colors.is_empty() { &[GRAY][..] } else { colors };
        let n = colors.len();
        let w = RAIL_WIDTH / n as f64;
        let base_offset = -((n - 1) as f64) / 2.0 * w;
        let dx = x - px;

        for (i, color) in colors.iter().enumerate() {
            let ox = base_offset + i as f64 * w;
            let mut path = String::new();

            if middle {
                let start_x = (PADDING_X + x * STEP_X) as f64 + ox;
                let start_y = PADDING_Y + y * STEP_Y;
                let _ = write!(path, "M {start_x:.1} {start_y} ");
                if dx != 0 {
                    let mut dl = dx as f64;
                    let mut dr = dx as f64;
                    if dx & 1 == 0 {
                        dl -= 1.0;
                        dr += 1.0;
                    }
                    Self::add_s(&mut path, dl / 2.0, 1.0);
                    let _ = write!(path, "V {} ", PADDING_Y + (py - 1) * STEP_Y);
                    Self::add_s(&mut path, dr / 2.0, 1.0);
                } else {
                    Self::add_s(&mut path, -0.5, 1.0);
                    let _ = write!(path, "V {} ", PADDING_Y + (py - 1) * STEP_Y);
                    Self::add_s(&mut path, 0.5, 1.0);
                }
            } else if dx > 0 {
                let start_x = (PADDING_X + x * STEP_X) as f64 + ox;
                let start_y = PADDING_Y + y * STEP_Y;
                let _ = write!(path, "M {start_x:.1} {start_y} ");
                let _ = write!(path, "V {} ", PADDING_Y + (py - 1) * STEP_Y);
                Self::add_s(&mut path, dx as f64, 1.0);
            } else if dx < 0 {
                let start_x = (PADDING_X + px * STEP_X) as f64 + ox;
                let start_y = PADDING_Y + py * STEP_Y;
                let _ = write!(path, "M {start_x:.1} {start_y} ");
                let _ = write!(path, "V {} ", PADDING_Y + (y + 1) * STEP_Y);
                Self::add_s(&mut path, -dx as f64, -1.0);
            } else {
                let start_x = (PADDING_X + x * STEP_X) as f64 + ox;
                let start_y = PADDING_Y + y * STEP_Y;
                let _ = write!(path, "M {start_x:.1} {start_y} ");
                let _ = write!(path, "V {}", PADDING_Y + py * STEP_Y);
            }

            let _ = writeln!(
                self.out,
                r#"<path d="{path}" fill="none" stroke="{}" stroke-width="{w:.1}" />"#,
                color.hex()
            );
        }
    }

    fn stop(&mut self, commit: &DrawCommit<'_>) {
        let cx = PADDING_X + commit.x * STEP_X;
        let cy = PADDING_Y + commit.y * STEP_Y;
        let _ = writeln!(
            self.out,
            r#"<circle cx="{cx}" cy="{cy}" r="{STOP_RADIUS}" class="stop" fill="{}" id="{}" />"#,
            STOP_FILL.hex(),
            commit.hash
        );
        self.stop_labels(commit);
    }

    fn stop_labels(&mut self, commit: &DrawCommit<'_>) {
        let text_y = PADDING_Y + commit.y * STEP_Y + 2;
        let short_hash = &commit.hash[..7.min(commit.hash.len())];
        let _ = writeln!(
            self.out,
            r##"<text x="8" y="{text_y}" fill="#c9bcbc" font-family="Ubuntu Mono" font-size="50%">{short_hash}</text>"##
        );

        let label_x = PADDING_X + commit.x * STEP_X + PADDING_Y;
        let mut offset = 0;
        for head in &commit.heads {
            let color = self.ref_color(head);
            let _ = writeln!(
                self.out,
                r#"<text x="{}" y="{text_y}"><tspan fill="{}" font-family="Ubuntu Mono" font-size="60%" font-weight="bold">{} </tspan></text>"#,
                label_x + offset,
                color.hex(),
                escape_xml(head)
            );
            offset += head.len() as i64 * 6 + 10;
        }
        for tag in &commit.tags {
            let _ = writeln!(
                self.out,
                r##"<text x="{}" y="{text_y}"><tspan fill="#dad682" font-family="Ubuntu Mono" font-size="60%" font-weight="bold">&#127991; {} </tspan></text>"##,
                label_x + offset,
                escape_xml(tag)
            );
            offset += tag.len() as i64 * 6 + 20;
        }
    }
}

struct DrawCommit<'a> {
    id: Oid,
    hash: String,
    x: i64,
    y: i64,
    refs: &'a BTreeSet<RefName>,
    parents: &'a [Oid],
    heads: Vec<String>,
    tags: Vec<String>,
}

/// Refs carried by the rail from `commit` to one of its parents.
///
/// A commit with several refs shares only the refs common with the parent,
/// dropping refs that some parent carries alone (those belong to that
/// parent's own rail). Without common refs, a merge's extra parents fall
/// back to the parent refs not already used by the parent's other children.
fn rail_refs(
    commit: &DrawCommit<'_>,
    parent_refs: &BTreeSet<RefName>,
    singletons: &BTreeSet<&RefName>,
    commits: &FxHashMap<Oid, CommitInfo>,
    children: &FxHashMap<Oid, FxHashSet<Oid>>,
    parent: Oid,
) -> Vec<String> {
    let common: BTreeSet<&RefName> = commit.refs.intersection(parent_refs).collect();

    if commit.refs.len() > 1 && !common.is_empty() {
        return common
            .iter()
            .filter(|r| parent_refs.len() == 1 || !singletons.contains(*r))
            .map(|r| r.as_str().to_string())
            .collect();
    }

    let refs_to_use: BTreeSet<&RefName> = if !common.is_empty() || commit.parents.len() <= 1 {
        commit.refs.iter().collect()
    } else {
        let mut used: BTreeSet<&RefName> = BTreeSet::new();
        if let Some(kids) = children.get(&parent) {
            for kid in kids {
                if let Some(info) = commits.get(kid) {
                    used.extend(info.references.iter());
                }
            }
        }
        parent_refs.iter().filter(|r| !used.contains(*r)).collect()
    };
    refs_to_use
        .into_iter()
        .map(|r| r.as_str().to_string())
        .collect()
}

/// Whether another stop sits on the rail's intermediate track strictly
/// between parent and child in emission order.
fn needs_middle_reroute(
    positions: &FxHashMap<Oid, Position>,
    commit: Oid,
    parent: Oid,
) -> bool {
    let (Some(cpos), Some(ppos)) = (positions.get(&commit), positions.get(&parent)) else {
        return false;
    };
    let intermediate_x = ppos.x.max(cpos.x);
    positions.iter().any(|(&other, pos)| {
        other != commit
            && other != parent
            && pos.x == intermediate_x
            && ppos.y < pos.y
            && pos.y < cpos.y
    })
}

/// Render the positioned commit graph as an SVG document.
pub fn render_railway(
    commits: &FxHashMap<Oid, CommitInfo>,
    layout: &RailwayLayout,
    heads: &FxHashMap<Oid, Vec<RefName>>,
    tags: &FxHashMap<Oid, Vec<RefName>>,
    children: &FxHashMap<Oid, FxHashSet<Oid>>,
) -> String {
    let (max_x, max_y) = layout.extents();

    let mut draw_commits: Vec<DrawCommit<'_>> = commits
        .iter()
        .filter_map(|(&id, info)| {
            let pos = layout.positions.get(&id)?;
            let heads = heads
                .get(&id)
                .map(|refs| refs.iter().map(|r| r.short().to_string()).collect())
                .unwrap_or_default();
            let tags = tags
                .get(&id)
                .map(|refs| refs.iter().map(|r| r.short().to_string()).collect())
                .unwrap_or_default();
            Some(DrawCommit {
                id,
                hash: id.to_string(),
                x: pos.x,
                y: max_y - pos.y,
                refs: &info.references,
                parents: &info.parents,
                heads,
                tags,
            })
        })
        .collect();
    draw_commits.sort_by_key(|c| (c.y, c.x));

    let width = PADDING_X * 2 + (max_x + 1) * STEP_X;
    let height = PADDING_Y * 2 + (max_y + 1) * STEP_Y;

    let mut railway = SvgRailway::new();
    let _ = writeln!(
        railway.out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" id="railway_svg" width="{:.0}" height="{:.0}" viewBox="0 0 {width} {height}">"#,
        width as f64 * SCALE,
        height as f64 * SCALE
    );

    for commit in &draw_commits {
        let singletons: BTreeSet<&RefName> = commit
            .parents
            .iter()
            .filter_map(|p| commits.get(p))
            .filter(|info| info.references.len() == 1)
            .filter_map(|info| info.references.iter().next())
            .collect();

        for &parent in commit.parents {
            let Some(parent_info) = commits.get(&parent) else {
                // Unknown parent (shallow history): a short gray stub.
                railway.rail(commit.x, commit.y, commit.x, commit.y - 1, &[GRAY], false);
                continue;
            };
            let parent_pos = layout
                .positions
                .get(&parent)
                .map(|pos| Position::new(pos.x, max_y - pos.y));
            let middle = needs_middle_reroute(&layout.positions, commit.id, parent);

            let mut ordered = rail_refs(
                commit,
                &parent_info.references,
                &singletons,
                commits,
                children,
                parent,
            );
            if ordered.is_empty() {
                if !commit.refs.is_empty() && !parent_info.references.is_empty() {
                    ordered = commit.refs.iter().map(|r| r.as_str().to_string()).collect();
                } else {
                    match parent_pos {
                        Some(ppos) => {
                            railway.rail(commit.x, commit.y, ppos.x, ppos.y, &[GRAY], middle)
                        }
                        None => {
                            railway.rail(commit.x, commit.y, commit.x, commit.y - 1, &[GRAY], false)
                        }
                    }
                    continue;
                }
            }

            let colors: Vec<Rgb> = ordered
                .iter()
                .take(MAX_RAIL_COLORS)
                .map(|r| railway.ref_color(r))
                .collect();
            match parent_pos {
                Some(ppos) => railway.rail(commit.x, commit.y, ppos.x, ppos.y, &colors, middle),
                None => railway.rail(commit.x, commit.y, commit.x, commit.y - 1, &colors, false),
            }
        }
    }

    for commit in &draw_commits {
        railway.stop(commit);
    }

    railway.out.push_str("</svg>\n");
    railway.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn oid(n: u8) -> Oid {
        Oid::from_bytes(&[n; 20]).unwrap()
    }

    fn commit(n: u8, parents: &[u8], refs: &[&str]) -> CommitInfo {
        CommitInfo {
            id: oid(n),
            parents: parents.iter().map(|&p| oid(p)).collect(),
            author_name: "tester".into(),
            author_email: "tester@example.com".into(),
            author_when: i64::from(n),
            author_offset_minutes: 0,
            committer_name: "tester".into(),
            committer_email: "tester@example.com".into(),
            committer_when: i64::from(n),
            committer_offset_minutes: 0,
            message: format!("commit {n}"),
            references: refs.iter().map(|&r| RefName::from(r)).collect(),
        }
    }

    fn linear_fixture() -> (
        FxHashMap<Oid, CommitInfo>,
        RailwayLayout,
        FxHashMap<Oid, Vec<RefName>>,
        FxHashMap<Oid, Vec<RefName>>,
        FxHashMap<Oid, FxHashSet<Oid>>,
    ) {
        let mut commits = FxHashMap::default();
        commits.insert(oid(1), commit(1, &[], &["refs/heads/main"]));
        commits.insert(oid(2), commit(2, &[1], &["refs/heads/main"]));

        let mut layout = RailwayLayout::default();
        layout.positions.insert(oid(1), Position::new(0, 0));
        layout.positions.insert(oid(2), Position::new(0, 1));

        let mut heads: FxHashMap<Oid, Vec<RefName>> = FxHashMap::default();
        heads.insert(oid(2), vec![RefName::from("refs/heads/main")]);

        let mut tags: FxHashMap<Oid, Vec<RefName>> = FxHashMap::default();
        tags.insert(oid(1), vec![RefName::from("refs/tags/v0.1")]);

        let mut children: FxHashMap<Oid, FxHashSet<Oid>> = FxHashMap::default();
        children.entry(oid(1)).or_default().insert(oid(2));

        (commits, layout, heads, tags, children)
    }

    #[test]
    fn renders_stops_and_rails() {
        let (commits, layout, heads, tags, children) = linear_fixture();
        let svg = render_railway(&commits, &layout, &heads, &tags, &children);

        assert!(svg.starts_with("<svg "));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"id="railway_svg""#));
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains("<path "));
        assert!(svg.contains("main"));
        assert!(svg.contains("v0.1"));
    }

    #[test]
    fn empty_layout_renders_empty_document() {
        let commits = FxHashMap::default();
        let layout = RailwayLayout::default();
        let svg = render_railway(
            &commits,
            &layout,
            &FxHashMap::default(),
            &FxHashMap::default(),
            &FxHashMap::default(),
        );
        assert!(svg.contains("<svg "));
        assert!(!svg.contains("<circle"));
        assert!(!svg.contains("<path "));
    }

    #[test]
    fn ref_colors_are_deterministic() {
        let mut railway = SvgRailway::new();
        let first = railway.ref_color("refs/heads/main");
        let second = railway.ref_color("refs/heads/main");
        assert_eq!(first, second);
        assert_ne!(first, railway.ref_color("refs/heads/topic"));
    }

    #[test]
    fn escapes_markup_in_labels() {
        assert_eq!(escape_xml("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn middle_reroute_detects_intervening_stop() {
        let mut positions: FxHashMap<Oid, Position> = FxHashMap::default();
        // Display coordinates: parent below (larger y), child above.
        positions.insert(oid(1), Position::new(0, 0)); // parent
        positions.insert(oid(2), Position::new(0, 1)); // intervening stop
        positions.insert(oid(3), Position::new(0, 2)); // child
        assert!(needs_middle_reroute(&positions, oid(3), oid(1)));

        positions.remove(&oid(2));
        assert!(!needs_middle_reroute(&positions, oid(3), oid(1)));
    }

    #[test]
    fn rail_refs_prefer_common_refs() {
        let mut commits = FxHashMap::default();
        commits.insert(oid(1), commit(1, &[], &["refs/heads/main", "refs/heads/dev"]));
        commits.insert(
            oid(2),
            commit(2, &[1], &["refs/heads/main", "refs/heads/topic"]),
        );
        let children: FxHashMap<Oid, FxHashSet<Oid>> = FxHashMap::default();

        let refs: BTreeSet<RefName> = [
            RefName::from("refs/heads/main"),
            RefName::from("refs/heads/topic"),
        ]
        .into_iter()
        .collect();
        let parents = [oid(1)];
        let draw = DrawCommit {
            id: oid(2),
            hash: oid(2).to_string(),
            x: 0,
            y: 0,
            refs: &refs,
            parents: &parents,
            heads: Vec::new(),
            tags: Vec::new(),
        };

        let singletons = BTreeSet::new();
        let ordered = rail_refs(
            &draw,
            &commits[&oid(1)].references,
            &singletons,
            &commits,
            &children,
            oid(1),
        );
        assert_eq!(ordered, vec!["refs/heads/main".to_string()]);
    }
}
