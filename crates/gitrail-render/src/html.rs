//! Self-contained HTML page around the railway SVG.
//!
//! The page embeds the SVG, a stylesheet, a small script, and a JSON map of
//! per-commit metadata keyed by full hash. Template resources are compiled
//! in; `((% key %))` markers take runtime values and `{{ name }}` markers
//! inline another resource (recursively, so the template can pull in the
//! stylesheet and script).

use crate::svg::escape_xml;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use git2::Oid;
use gitrail_core::CommitInfo;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitMessage {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub message_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
    pub title: String,
    pub body: String,
    pub is_breaking: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitData {
    pub hash: String,
    pub author: String,
    pub committer: String,
    pub message: CommitMessage,
    pub authored_date: String,
    pub committed_date: String,
    pub authored_date_delta: String,
    pub committed_date_delta: String,
}

fn issue_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)#(\d+)").unwrap())
}

/// Relative date like "2 days ago".
fn pretty_date(when: DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(when);
    let minutes = diff.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = diff.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = diff.num_days();
    if days < 30 {
        return plural(days, "day");
    }
    if days < 365 {
        return plural(days / 30, "month");
    }
    plural(days / 365, "year")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Turn `word#123` references into GitHub issue links when `word` is the
/// slug's owner; other matches are left as plain text.
fn issue_link(text: &str, slug: Option<&str>) -> String {
    let Some(slug) = slug else {
        return text.to_string();
    };
    issue_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let org = &caps[1];
            let num = &caps[2];
            if slug.starts_with(&format!("{org}/")) {
                format!(
                    r##"<a target="_blank" href="https://github.com/{slug}/issues/{num}">{org}#{num}</a>"##
                )
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Split a conventional-commit summary into `(type, scope, title)`.
///
/// Summaries that do not match `type: title` or `type(scope): title` (or
/// whose prefix contains spaces) come back with an empty type and the whole
/// summary as the title.
fn parse_commit_message(summary: &str) -> (String, String, String) {
    let Some((prefix, title)) = summary.split_once(": ") else {
        return (String::new(), String::new(), summary.to_string());
    };
    let prefix = prefix.trim();
    let title = title.trim().to_string();

    if let Some((message_type, rest)) = prefix.split_once('(') {
        let message_type = message_type.trim();
        if let Some(scope) = rest.strip_suffix(')') {
            if message_type.contains(' ') {
                return (String::new(), String::new(), summary.to_string());
            }
            return (
                message_type.to_string(),
                scope.trim().to_string(),
                title,
            );
        }
    }

    if prefix.contains(' ') {
        return (String::new(), String::new(), summary.to_string());
    }
    (prefix.to_string(), String::new(), title)
}

fn rfc3339(when: i64, offset_minutes: i32) -> String {
    let with_offset = FixedOffset::east_opt(offset_minutes * 60)
        .and_then(|offset| offset.timestamp_opt(when, 0).single());
    match with_offset {
        Some(dt) => dt.to_rfc3339(),
        None => Utc
            .timestamp_opt(when, 0)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default(),
    }
}

fn delta(when: i64) -> String {
    Utc.timestamp_opt(when, 0)
        .single()
        .map(pretty_date)
        .unwrap_or_default()
}

fn message_body(message: &str) -> String {
    let mut lines = message.lines();
    let _summary = lines.next();
    let rest: Vec<&str> = lines.skip_while(|line| line.trim().is_empty()).collect();
    rest.join("\n")
        .trim()
        .replace(" \r\n", " ")
        .replace(" \n", " ")
}

/// Per-commit metadata for the HTML page, keyed by full hash.
pub fn generate_commit_data(
    commits: &FxHashMap<Oid, CommitInfo>,
    github_slug: Option<&str>,
) -> BTreeMap<String, CommitData> {
    let mut out = BTreeMap::new();
    for (id, info) in commits {
        let summary = info.summary();
        let (message_type, scope, title) = parse_commit_message(summary);
        let title = issue_link(&title, github_slug);
        let body = issue_link(&message_body(&info.message), github_slug);

        let author = format!(
            r#"<a href="mailto:{}">{}</a>"#,
            escape_xml(&info.author_email),
            escape_xml(&info.author_name)
        );
        let committer = format!(
            r#"<a href="mailto:{}">{}</a>"#,
            escape_xml(&info.committer_email),
            escape_xml(&info.committer_name)
        );

        let hash = id.to_string();
        out.insert(
            hash.clone(),
            CommitData {
                hash: hash[..7.min(hash.len())].to_string(),
                author,
                committer,
                message: CommitMessage {
                    message_type,
                    scope,
                    title,
                    body,
                    is_breaking: info.message.contains("BREAKING CHANGE:"),
                },
                authored_date: rfc3339(info.author_when, info.author_offset_minutes),
                committed_date: rfc3339(info.committer_when, info.committer_offset_minutes),
                authored_date_delta: delta(info.author_when),
                committed_date_delta: delta(info.committer_when),
            },
        );
    }
    out
}

fn resource(name: &str) -> Result<&'static str> {
    match name {
        "html_template.html" => Ok(include_str!("../resources/html_template.html")),
        "style.css" => Ok(include_str!("../resources/style.css")),
        "script.js" => Ok(include_str!("../resources/script.js")),
        _ => Err(Error::MissingResource {
            name: name.to_string(),
        }),
    }
}

fn replace_placeholders(text: &str, placeholders: &[(&str, &str)]) -> String {
    let mut out = text.to_string();
    for (key, value) in placeholders {
        out = out.replace(&format!("((% {key} %))"), value);
    }
    out
}

/// Inline every `{{ name }}` marker with the named resource, recursively.
fn replace_references(text: &str) -> Result<String> {
    let mut out = text.to_string();
    let mut begin = 0;
    while let Some(start) = out[begin..].find("{{") {
        let start = begin + start;
        let Some(end) = out[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + end;

        let name = out[start + 2..end].trim().to_string();
        let contents = replace_references(resource(&name)?)?;
        out.replace_range(start..end + 2, &contents);
        begin = start + contents.len();
    }
    Ok(out)
}

/// Make sure the root `<svg>` element carries `id="railway_svg"` so the
/// page script can find it.
pub fn ensure_svg_id(svg: &str) -> String {
    if svg.contains(r#"id="railway_svg""#) || svg.contains("id='railway_svg'") {
        return svg.to_string();
    }
    let Some(tag_start) = svg.find("<svg") else {
        return svg.to_string();
    };
    let Some(tag_len) = svg[tag_start..].find('>') else {
        return svg.to_string();
    };
    let tag_end = tag_start + tag_len;
    if svg[tag_start..tag_end].contains("id=") {
        return svg.to_string();
    }
    format!(
        "{} id=\"railway_svg\"{}",
        &svg[..tag_end],
        &svg[tag_end..]
    )
}

/// Write the complete HTML page.
pub fn write_html(
    out: &mut impl Write,
    svg: &str,
    commit_data: &BTreeMap<String, CommitData>,
    title: &str,
) -> Result<()> {
    let template = resource("html_template.html")?;
    let template = replace_references(template)?;

    let svg = ensure_svg_id(svg);
    let data_json = serde_json::to_string(commit_data)?;
    let page = replace_placeholders(
        &template,
        &[
            ("title", escape_xml(title).as_str()),
            ("svg", svg.as_str()),
            ("data", data_json.as_str()),
        ],
    );

    out.write_all(page.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn parses_conventional_commit_summaries() {
        assert_eq!(
            parse_commit_message("feat(layout): add gap reuse"),
            (
                "feat".to_string(),
                "layout".to_string(),
                "add gap reuse".to_string()
            )
        );
        assert_eq!(
            parse_commit_message("fix: crash on empty repo"),
            (
                "fix".to_string(),
                String::new(),
                "crash on empty repo".to_string()
            )
        );
        assert_eq!(
            parse_commit_message("plain summary"),
            (String::new(), String::new(), "plain summary".to_string())
        );
        assert_eq!(
            parse_commit_message("not a type: title"),
            (String::new(), String::new(), "not a type: title".to_string())
        );
    }

    #[test]
    fn relative_dates() {
        let now = Utc::now();
        assert_eq!(pretty_date(now), "just now");
        assert_eq!(
            pretty_date(now - chrono::Duration::minutes(1)),
            "1 minute ago"
        );
        assert_eq!(pretty_date(now - chrono::Duration::hours(3)), "3 hours ago");
        assert_eq!(pretty_date(now - chrono::Duration::days(2)), "2 days ago");
        assert_eq!(
            pretty_date(now - chrono::Duration::days(400)),
            "1 year ago"
        );
    }

    #[test]
    fn issue_links_need_a_matching_slug() {
        assert_eq!(
            issue_link("see octo#12", Some("octo/rails")),
            r##"see <a target="_blank" href="https://github.com/octo/rails/issues/12">octo#12</a>"##
        );
        assert_eq!(issue_link("see other#12", Some("octo/rails")), "see other#12");
        assert_eq!(issue_link("see octo#12", None), "see octo#12");
    }

    #[test]
    fn body_extraction_skips_blank_lines() {
        assert_eq!(message_body("summary\n\n\nbody line\nmore"), "body line\nmore");
        assert_eq!(message_body("summary only"), "");
    }

    #[test]
    fn placeholders_and_references() {
        let replaced = replace_placeholders("<h1>((% title %))</h1>", &[("title", "railway")]);
        assert_eq!(replaced, "<h1>railway</h1>");

        let inlined = replace_references("a {{ style.css }} b").unwrap();
        assert!(inlined.contains("stop"));
        assert!(replace_references("{{ nope.css }}").is_err());
    }

    #[test]
    fn svg_id_is_injected_once() {
        let plain = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1 1"><g/></svg>"#;
        let with_id = ensure_svg_id(plain);
        assert_eq!(with_id.matches("railway_svg").count(), 1);
        assert_eq!(ensure_svg_id(&with_id), with_id);
    }

    #[test]
    fn page_embeds_svg_and_data() {
        let mut commits: FxHashMap<Oid, CommitInfo> = FxHashMap::default();
        let id = Oid::from_bytes(&[7; 20]).unwrap();
        commits.insert(
            id,
            CommitInfo {
                id,
                parents: Vec::new(),
                author_name: "Ada".into(),
                author_email: "ada@example.com".into(),
                author_when: 1_700_000_000,
                author_offset_minutes: 0,
                committer_name: "Ada".into(),
                committer_email: "ada@example.com".into(),
                committer_when: 1_700_000_000,
                committer_offset_minutes: 60,
                message: "feat: rails\n\nBREAKING CHANGE: gauge".into(),
                references: BTreeSet::new(),
            },
        );

        let data = generate_commit_data(&commits, None);
        let entry = &data[&id.to_string()];
        assert_eq!(entry.hash.len(), 7);
        assert_eq!(entry.message.message_type, "feat");
        assert!(entry.message.is_breaking);
        assert!(entry.committed_date.ends_with("+01:00"));

        let mut page = Vec::new();
        write_html(&mut page, "<svg viewBox=\"0 0 1 1\"></svg>", &data, "repo").unwrap();
        let page = String::from_utf8(page).unwrap();
        assert!(page.contains("railway_svg"));
        assert!(page.contains("<title>repo</title>"));
        assert!(page.contains("feat"));
        assert!(!page.contains("((%"));
        assert!(!page.contains("{{"));
    }
}
