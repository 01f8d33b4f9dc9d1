//! TOC (Table of Contents) builder.
//!
//! Scans the assembled body for section headings (`==` … `======`), assigns
//! each a stable anchor, and nests them into a hierarchical [`Toc`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use sheetsmith_markup::VerbatimState;
use sheetsmith_shared::{Toc, TocEntry};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(={1,6})[ \t]+(\S.*?)[ \t]*$").expect("valid regex"));

// `[[id]]`, `[[id,reftext]]` or `[#id]` / `[#id.role]`.
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?:\[([A-Za-z_][\w\-.]*)(?:,[^\]]*)?\]|#([A-Za-z_][\w\-]*)[^\]]*)\]$")
        .expect("valid regex")
});

/// A section heading found in the assembled body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Index of the heading line in the scanned lines.
    pub line: usize,
    /// Section level (0 = document title, 1 = `==`).
    pub level: u8,
    pub title: String,
    pub anchor: String,
}

/// Parse a heading line into `(level, title)`.
pub fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let caps = HEADING_RE.captures(line)?;
    let level = caps.get(1)?.as_str().len() as u8 - 1;
    Some((level, caps.get(2)?.as_str()))
}

/// Find every heading outside verbatim blocks.
///
/// An anchor line directly above a heading sets its id explicitly; other
/// headings get a generated id, de-duplicated with a numeric suffix.
pub fn scan_headings(lines: &[String]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut verbatim = VerbatimState::default();
    let mut explicit: Option<String> = None;

    for (idx, line) in lines.iter().enumerate() {
        let was_inside = verbatim.inside();
        if verbatim.update(line) || was_inside {
            explicit = None;
            continue;
        }

        if let Some(caps) = ANCHOR_RE.captures(line) {
            explicit = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string());
            continue;
        }

        if let Some((level, title)) = parse_heading(line) {
            let anchor = match explicit.take() {
                Some(id) => id,
                None => unique_id(section_id(title), &used),
            };
            used.insert(anchor.clone());
            headings.push(Heading {
                line: idx,
                level,
                title: title.to_string(),
                anchor,
            });
            continue;
        }

        if !line.is_empty() && !line.starts_with('[') {
            explicit = None;
        }
    }

    headings
}

/// Build a TOC from headings, keeping levels `1..=max_level`.
#[instrument(skip_all, fields(headings = headings.len(), max_level = max_level))]
pub fn build_toc(headings: &[Heading], max_level: u8) -> Toc {
    let mut sections: Vec<TocEntry> = Vec::new();

    for heading in headings
        .iter()
        .filter(|h| h.level >= 1 && h.level <= max_level)
    {
        insert(
            &mut sections,
            TocEntry {
                title: heading.title.clone(),
                anchor: heading.anchor.clone(),
                level: heading.level,
                children: vec![],
            },
        );
    }

    let toc = Toc { sections };
    debug!(entries = toc.len(), "TOC built from headings");
    toc
}

/// Generate a section id from a title (`Dependency Injection` →
/// `_dependency_injection`).
pub fn section_id(title: &str) -> String {
    let mut id = String::from("_");
    for c in title.chars() {
        if c.is_alphanumeric() {
            id.extend(c.to_lowercase());
        } else if !id.ends_with('_') {
            id.push('_');
        }
    }
    while id.len() > 1 && id.ends_with('_') {
        id.pop();
    }
    id
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Nest an entry under the last entry of a shallower level.
fn insert(entries: &mut Vec<TocEntry>, entry: TocEntry) {
    let nests = entries.last().is_some_and(|last| last.level < entry.level);
    if !nests {
        entries.push(entry);
    } else if let Some(last) = entries.last_mut() {
        insert(&mut last.children, entry);
    }
}

fn unique_id(base: String, used: &HashSet<String>) -> String {
    if !used.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<String> {
        src.lines().map(String::from).collect()
    }

    #[test]
    fn section_ids_follow_title() {
        assert_eq!(section_id("Dependency Injection"), "_dependency_injection");
        assert_eq!(section_id("REST Endpoints (JAX-RS)"), "_rest_endpoints_jax_rs");
        assert_eq!(section_id("Fault Tolerance 3.2"), "_fault_tolerance_3_2");
        assert_eq!(section_id("!!!"), "_");
    }

    #[test]
    fn scan_skips_listings_and_dedupes() {
        let src = "= Title\n== Setup\n----\n== not a heading\n----\n== Setup\n=== Details";
        let headings = scan_headings(&lines(src));
        let anchors: Vec<_> = headings.iter().map(|h| h.anchor.as_str()).collect();
        assert_eq!(anchors, vec!["_title", "_setup", "_setup_2", "_details"]);
        assert_eq!(headings[0].level, 0);
        assert_eq!(headings[3].line, 6);
    }

    #[test]
    fn explicit_anchor_wins() {
        let src = "[[cdi]]\n== Dependency Injection\n[#rest.wide]\n== REST";
        let headings = scan_headings(&lines(src));
        assert_eq!(headings[0].anchor, "cdi");
        assert_eq!(headings[1].anchor, "rest");
    }

    #[test]
    fn build_toc_hierarchical() {
        let src = "= Sheet\n== Core\n=== Injection\n==== Deep\n=== Config\n== Persistence";
        let headings = scan_headings(&lines(src));

        let toc = build_toc(&headings, 2);
        assert_eq!(toc.sections.len(), 2);
        assert_eq!(toc.sections[0].title, "Core");
        assert_eq!(toc.sections[0].children.len(), 2);
        assert!(toc.sections[0].children[0].children.is_empty());

        let deep = build_toc(&headings, 3);
        assert_eq!(deep.sections[0].children[0].children.len(), 1);
        assert_eq!(deep.len(), 5);
    }

    #[test]
    fn skipped_levels_nest_under_nearest_parent() {
        let headings = scan_headings(&lines("== A\n==== B\n== C"));
        let toc = build_toc(&headings, 5);
        assert_eq!(toc.sections.len(), 2);
        assert_eq!(toc.sections[0].children[0].title, "B");
    }
}
