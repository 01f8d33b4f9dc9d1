//! Source document model.
//!
//! A [`Document`] is the parsed, immutable form of one source file: an ordered
//! list of text lines and preprocessor directives, each tagged with its 1-based
//! source line number for error reporting.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// A loaded source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Canonical path of the source file.
    pub path: PathBuf,
    /// Blocks in source order.
    pub blocks: Vec<Block>,
}

/// One line of a document, either plain text or a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// 1-based line number in the source file.
    pub line: usize,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// A line of text, without its trailing newline.
    Text(String),
    Directive(Directive),
}

/// A preprocessor directive occupying a whole line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `include::target[attrs]`
    Include(IncludeDirective),
    /// `tag::name[]` or `end::name[]`
    Tag(TagMarker),
    /// `ifdef::`, `ifndef::` or `endif::`
    Conditional(Conditional),
    /// `:name: value` or `:name!:`
    AttributeEntry(AttributeEntry),
}

/// An inclusion reference to another document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Target path as written, possibly containing `{attr}` references.
    pub target: String,
    /// Tag selection from `tag=` / `tags=` (entries prefixed with `!` exclude).
    pub tags: Vec<String>,
    /// Heading level adjustment from `leveloffset=`.
    pub level_offset: Option<LevelOffset>,
    /// `opts=optional`: a missing target is skipped instead of failing.
    pub optional: bool,
}

/// Heading level adjustment applied to an included document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOffset {
    /// `leveloffset=+1` / `leveloffset=-1`
    Relative(i8),
    /// `leveloffset=2`
    Absolute(u8),
}

impl LevelOffset {
    /// Combine an outer offset with a nested one.
    ///
    /// Relative offsets accumulate; an absolute offset replaces whatever was
    /// in effect.
    pub fn then(current: i8, next: Option<LevelOffset>) -> i8 {
        match next {
            None => current,
            Some(LevelOffset::Relative(n)) => current.saturating_add(n),
            Some(LevelOffset::Absolute(n)) => i8::try_from(n).unwrap_or(i8::MAX),
        }
    }
}

/// A tag region boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMarker {
    pub name: String,
    pub boundary: TagBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBoundary {
    Start,
    End,
}

/// A conditional block marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional {
    pub kind: ConditionalKind,
    /// Attribute names tested by the condition (empty is allowed for `endif::[]`).
    pub names: Vec<String>,
    /// How multiple names combine.
    pub mode: MatchMode,
    /// Content of the single-line form `ifdef::name[content]`.
    pub inline: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    IfDef,
    IfNDef,
    EndIf,
}

/// `a,b` matches if any name is set; `a+b` only if all are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Any,
    All,
}

/// A document attribute entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntry {
    pub name: String,
    /// `None` unsets the attribute (`:name!:`).
    pub value: Option<String>,
}

impl Document {
    /// All include directives in source order, with their line numbers.
    pub fn includes(&self) -> impl Iterator<Item = (usize, &IncludeDirective)> {
        self.blocks.iter().filter_map(|b| match &b.kind {
            BlockKind::Directive(Directive::Include(inc)) => Some((b.line, inc)),
            _ => None,
        })
    }

    /// Distinct tag names appearing in this document.
    pub fn tag_names(&self) -> BTreeSet<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match &b.kind {
                BlockKind::Directive(Directive::Tag(marker)) => Some(marker.name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of plain text lines.
    pub fn text_line_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b.kind, BlockKind::Text(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: usize, s: &str) -> Block {
        Block {
            line,
            kind: BlockKind::Text(s.into()),
        }
    }

    fn tag(line: usize, name: &str, boundary: TagBoundary) -> Block {
        Block {
            line,
            kind: BlockKind::Directive(Directive::Tag(TagMarker {
                name: name.into(),
                boundary,
            })),
        }
    }

    #[test]
    fn tag_names_are_deduplicated() {
        let doc = Document {
            path: "a.adoc".into(),
            blocks: vec![
                tag(1, "b", TagBoundary::Start),
                text(2, "x"),
                tag(3, "b", TagBoundary::End),
                tag(4, "a", TagBoundary::Start),
                tag(5, "a", TagBoundary::End),
            ],
        };
        let names: Vec<_> = doc.tag_names().into_iter().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(doc.text_line_count(), 1);
    }

    #[test]
    fn level_offsets_compose() {
        assert_eq!(LevelOffset::then(1, Some(LevelOffset::Relative(1))), 2);
        assert_eq!(LevelOffset::then(1, Some(LevelOffset::Relative(-2))), -1);
        assert_eq!(LevelOffset::then(3, Some(LevelOffset::Absolute(1))), 1);
        assert_eq!(LevelOffset::then(2, None), 2);
    }

    #[test]
    fn large_absolute_offset_saturates() {
        assert_eq!(LevelOffset::then(0, Some(LevelOffset::Absolute(200))), i8::MAX);
        assert_eq!(LevelOffset::then(0, Some(LevelOffset::Absolute(127))), 127);
    }
}
