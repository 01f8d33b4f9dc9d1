//! Tag region extraction.
//!
//! A tag region is the span between `tag::name[]` and `end::name[]`. Regions
//! nest; an end marker must close the innermost open region. Marker lines
//! themselves never survive extraction.

use tracing::{debug, instrument};

use sheetsmith_shared::{Block, BlockKind, Directive, Document, Result, SheetsmithError, TagBoundary};

/// A tag name or a prefix pattern (`update_*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPattern {
    name: String,
    prefix: bool,
}

impl TagPattern {
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.trim();
        match pattern.strip_suffix('*') {
            Some(prefix) => Self {
                name: prefix.to_string(),
                prefix: true,
            },
            None => Self {
                name: pattern.to_string(),
                prefix: false,
            },
        }
    }

    pub fn matches(&self, tag: &str) -> bool {
        if self.prefix {
            tag.starts_with(&self.name)
        } else {
            tag == self.name
        }
    }
}

impl std::fmt::Display for TagPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix {
            write!(f, "{}*", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// The active tag-inclusion set.
///
/// With an empty `only` list every untagged line is kept. Exclusion always
/// wins over inclusion. The `only` list selects text lines; directives
/// outside the selected regions (includes, conditionals, attribute entries)
/// are kept so that a selection can span included documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    only: Vec<TagPattern>,
    exclude: Vec<TagPattern>,
}

impl TagFilter {
    /// Keep everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, J, S, T>(only: I, exclude: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            only: only.into_iter().map(|s| TagPattern::new(s.as_ref())).collect(),
            exclude: exclude
                .into_iter()
                .map(|s| TagPattern::new(s.as_ref()))
                .collect(),
        }
    }

    /// Build a filter from an include directive's selection, where entries
    /// prefixed with `!` exclude.
    pub fn from_selection(selection: &[String]) -> Self {
        let (excluded, only): (Vec<&String>, Vec<&String>) =
            selection.iter().partition(|s| s.starts_with('!'));
        Self::new(
            only,
            excluded.into_iter().map(|s| s.trim_start_matches('!')),
        )
    }

    /// Narrow this (global) filter by an include's own selection.
    ///
    /// The include's `only` list replaces the global one; exclusions add up.
    pub fn narrowed_by(&self, selection: &TagFilter) -> TagFilter {
        let only = if selection.only.is_empty() {
            self.only.clone()
        } else {
            selection.only.clone()
        };
        let mut exclude = self.exclude.clone();
        exclude.extend(selection.exclude.iter().cloned());
        TagFilter { only, exclude }
    }

    pub fn is_all(&self) -> bool {
        self.only.is_empty() && self.exclude.is_empty()
    }

    fn excludes(&self, open: &[(&str, usize)]) -> bool {
        open.iter()
            .any(|(tag, _)| self.exclude.iter().any(|p| p.matches(tag)))
    }

    fn selects(&self, open: &[(&str, usize)]) -> bool {
        self.only.is_empty()
            || open
                .iter()
                .any(|(tag, _)| self.only.iter().any(|p| p.matches(tag)))
    }
}

/// Remove filtered tag regions and all marker lines from a document.
///
/// Returns [`SheetsmithError::UnmatchedTag`] for an end marker that does not
/// close the innermost open region, and [`SheetsmithError::UnclosedTag`] for a
/// region still open at end of file.
#[instrument(skip_all, fields(path = %doc.path.display()))]
pub fn extract(doc: &Document, filter: &TagFilter) -> Result<Document> {
    let mut kept = Vec::with_capacity(doc.blocks.len());
    let mut dropped = 0usize;

    walk(doc, |block, open| {
        let keep = !filter.excludes(open)
            && (!matches!(block.kind, BlockKind::Text(_)) || filter.selects(open));
        if keep {
            kept.push(block.clone());
        } else {
            dropped += 1;
        }
    })?;

    if dropped > 0 {
        debug!(dropped, "removed tagged lines");
    }

    Ok(Document {
        path: doc.path.clone(),
        blocks: kept,
    })
}

/// Verify every tag region in the document is properly closed.
pub fn check_balanced(doc: &Document) -> Result<()> {
    walk(doc, |_, _| {})
}

/// A tag region found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRegion {
    pub name: String,
    /// Line of the `tag::` marker.
    pub start_line: usize,
    /// Line of the `end::` marker.
    pub end_line: usize,
    /// Non-marker lines enclosed, including nested regions.
    pub lines: usize,
}

/// List every tag region in start order.
pub fn list_tags(doc: &Document) -> Result<Vec<TagRegion>> {
    let mut regions: Vec<TagRegion> = Vec::new();
    let mut open_regions: Vec<usize> = Vec::new();

    for block in &doc.blocks {
        match &block.kind {
            BlockKind::Directive(Directive::Tag(marker)) => match marker.boundary {
                TagBoundary::Start => {
                    open_regions.push(regions.len());
                    regions.push(TagRegion {
                        name: marker.name.clone(),
                        start_line: block.line,
                        end_line: 0,
                        lines: 0,
                    });
                }
                TagBoundary::End => match open_regions.pop() {
                    Some(idx) if regions[idx].name == marker.name => {
                        regions[idx].end_line = block.line;
                    }
                    _ => return Err(unmatched(doc, &marker.name, block.line)),
                },
            },
            _ => {
                for &idx in &open_regions {
                    regions[idx].lines += 1;
                }
            }
        }
    }

    if let Some(&idx) = open_regions.first() {
        let region = &regions[idx];
        return Err(SheetsmithError::UnclosedTag {
            tag: region.name.clone(),
            path: doc.path.clone(),
            line: region.start_line,
        });
    }

    Ok(regions)
}

/// Walk non-marker blocks with the stack of open tags at that point.
fn walk<'d, F>(doc: &'d Document, mut visit: F) -> Result<()>
where
    F: FnMut(&'d Block, &[(&'d str, usize)]),
{
    let mut open: Vec<(&str, usize)> = Vec::new();

    for block in &doc.blocks {
        match &block.kind {
            BlockKind::Directive(Directive::Tag(marker)) => match marker.boundary {
                TagBoundary::Start => open.push((marker.name.as_str(), block.line)),
                TagBoundary::End => match open.last() {
                    Some((name, _)) if *name == marker.name => {
                        open.pop();
                    }
                    _ => return Err(unmatched(doc, &marker.name, block.line)),
                },
            },
            _ => visit(block, &open),
        }
    }

    if let Some((name, line)) = open.first() {
        return Err(SheetsmithError::UnclosedTag {
            tag: (*name).to_string(),
            path: doc.path.clone(),
            line: *line,
        });
    }
    Ok(())
}

fn unmatched(doc: &Document, tag: &str, line: usize) -> SheetsmithError {
    SheetsmithError::UnmatchedTag {
        tag: tag.to_string(),
        path: doc.path.clone(),
        line,
    }
}
