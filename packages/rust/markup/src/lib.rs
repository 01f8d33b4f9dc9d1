//! Line-level parsing of AsciiDoc-flavoured source documents.
//!
//! Turns raw source text into a [`Document`]: every line becomes either plain
//! text or one of the preprocessor directives (`include::`, `tag::`/`end::`,
//! `ifdef::`/`ifndef::`/`endif::`, attribute entries). The submodules operate
//! on the parsed form:
//! - [`tags`]: tag region filtering and listing
//! - [`attributes`]: attribute substitution and conditional evaluation
//! - [`normalize`]: whitespace cleanup of rendered text

pub mod attributes;
mod cleanup;
pub mod tags;
mod verbatim;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use sheetsmith_shared::{
    AttributeEntry, Block, BlockKind, Conditional, ConditionalKind, Directive, Document,
    IncludeDirective, LevelOffset, MatchMode, Result, SheetsmithError, TagBoundary, TagMarker,
};

pub use cleanup::normalize;
pub use verbatim::VerbatimState;

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^include::([^\[]*)\[(.*)\]\s*$").expect("valid regex"));

// Tag markers usually sit inside a comment of the host language.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?://+|#+|--|;+|<!--|/\*+|\*)\s*)?(tag|end)::([A-Za-z0-9_.\-]+)\[\]\s*(?:-->|\*/)?\s*$",
    )
    .expect("valid regex")
});

static CONDITIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(ifdef|ifndef|endif)::([A-Za-z0-9_,+\-]*)\[(.*)\]\s*$").expect("valid regex")
});

static ATTRIBUTE_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:(!?)([A-Za-z0-9_][A-Za-z0-9_\-]*)(!?):(?:[ \t]+(.*?))?[ \t]*$")
        .expect("valid regex")
});

static ESCAPED_DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\(?:include|ifdef|ifndef|endif)::").expect("valid regex"));

/// Parse source text into a [`Document`].
///
/// Directive syntax errors (empty include target, bad `leveloffset`, `endif`
/// with content) are reported with the path and line number.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn parse(path: impl AsRef<Path>, source: &str) -> Result<Document> {
    let path = path.as_ref();
    let mut blocks = Vec::new();
    let mut verbatim = VerbatimState::default();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let kind = classify(line, verbatim.inside())
            .map_err(|msg| SheetsmithError::parse(format!("{}:{line_no}: {msg}", path.display())))?;

        if let BlockKind::Text(text) = &kind {
            verbatim.update(text);
        }
        blocks.push(Block {
            line: line_no,
            kind,
        });
    }

    let doc = Document {
        path: path.to_path_buf(),
        blocks,
    };
    debug!(
        blocks = doc.blocks.len(),
        includes = doc.includes().count(),
        tags = doc.tag_names().len(),
        "parsed document"
    );
    Ok(doc)
}

/// Read and parse a file.
pub fn parse_file(path: &Path) -> Result<(Document, String)> {
    let source = std::fs::read_to_string(path).map_err(|e| SheetsmithError::io(path, e))?;
    let doc = parse(path, &source)?;
    Ok((doc, source))
}

/// Classify a single line.
fn classify(line: &str, in_verbatim: bool) -> std::result::Result<BlockKind, String> {
    if ESCAPED_DIRECTIVE_RE.is_match(line) {
        return Ok(BlockKind::Text(line[1..].to_string()));
    }

    if let Some(caps) = INCLUDE_RE.captures(line) {
        let include = parse_include(&caps[1], &caps[2])?;
        return Ok(BlockKind::Directive(Directive::Include(include)));
    }

    if let Some(caps) = TAG_RE.captures(line) {
        let boundary = match &caps[1] {
            "tag" => TagBoundary::Start,
            _ => TagBoundary::End,
        };
        return Ok(BlockKind::Directive(Directive::Tag(TagMarker {
            name: caps[2].to_string(),
            boundary,
        })));
    }

    if let Some(caps) = CONDITIONAL_RE.captures(line) {
        let cond = parse_conditional(&caps[1], &caps[2], &caps[3])?;
        return Ok(BlockKind::Directive(Directive::Conditional(cond)));
    }

    if !in_verbatim {
        if let Some(caps) = ATTRIBUTE_ENTRY_RE.captures(line) {
            let unset = !caps[1].is_empty() || !caps[3].is_empty();
            let value = if unset {
                None
            } else {
                Some(caps.get(4).map_or("", |m| m.as_str()).to_string())
            };
            return Ok(BlockKind::Directive(Directive::AttributeEntry(AttributeEntry {
                name: caps[2].to_string(),
                value,
            })));
        }
    }

    Ok(BlockKind::Text(line.to_string()))
}

// ---------------------------------------------------------------------------
// Include directives
// ---------------------------------------------------------------------------

fn parse_include(target: &str, attrlist: &str) -> std::result::Result<IncludeDirective, String> {
    let target = target.trim();
    if target.is_empty() {
        return Err("include directive has an empty target".into());
    }

    let mut include = IncludeDirective {
        target: target.to_string(),
        tags: Vec::new(),
        level_offset: None,
        optional: false,
    };

    for (key, value) in parse_attrlist(attrlist) {
        match key.as_deref() {
            Some("tag") => include.tags.push(value),
            Some("tags") => include.tags.extend(
                value
                    .split([';', ','])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from),
            ),
            Some("leveloffset") => include.level_offset = Some(parse_level_offset(&value)?),
            Some("opts") => include.optional = value.split(',').any(|o| o.trim() == "optional"),
            Some(other) => debug!(key = other, "ignoring unsupported include attribute"),
            None => {}
        }
    }

    Ok(include)
}

fn parse_level_offset(value: &str) -> std::result::Result<LevelOffset, String> {
    let invalid = || format!("invalid leveloffset `{value}`");
    if let Some(n) = value.strip_prefix('+') {
        return n.parse::<i8>().map(LevelOffset::Relative).map_err(|_| invalid());
    }
    if value.starts_with('-') {
        return value.parse::<i8>().map(LevelOffset::Relative).map_err(|_| invalid());
    }
    value.parse::<u8>().map(LevelOffset::Absolute).map_err(|_| invalid())
}

/// Split an attribute list (`a=1,b="x,y",positional`) into key/value pairs.
///
/// Commas inside double or single quotes do not split; surrounding quotes
/// are removed from values.
pub fn parse_attrlist(attrlist: &str) -> Vec<(Option<String>, String)> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in attrlist.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, ',') => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((k, v)) => (Some(k.trim().to_string()), unquote(v.trim()).to_string()),
            None => (None, unquote(&item).to_string()),
        })
        .collect()
}

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

// ---------------------------------------------------------------------------
// Conditionals
// ---------------------------------------------------------------------------

fn parse_conditional(
    kind: &str,
    names: &str,
    content: &str,
) -> std::result::Result<Conditional, String> {
    let kind = match kind {
        "ifdef" => ConditionalKind::IfDef,
        "ifndef" => ConditionalKind::IfNDef,
        _ => ConditionalKind::EndIf,
    };

    let (mode, names): (MatchMode, Vec<String>) = if names.contains('+') {
        (MatchMode::All, split_names(names, '+'))
    } else {
        (MatchMode::Any, split_names(names, ','))
    };

    if kind != ConditionalKind::EndIf && names.is_empty() {
        return Err("conditional directive requires at least one attribute name".into());
    }
    if kind == ConditionalKind::EndIf && !content.is_empty() {
        return Err("endif directive cannot have content".into());
    }

    Ok(Conditional {
        kind,
        names,
        mode,
        inline: (!content.is_empty()).then(|| content.to_string()),
    })
}

fn split_names(names: &str, sep: char) -> Vec<String> {
    names
        .split(sep)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

/// Resolve an include target path relative to the including document.
pub fn resolve_target(including: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match including.parent() {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(doc: &Document, idx: usize) -> &Directive {
        match &doc.blocks[idx].kind {
            BlockKind::Directive(d) => d,
            BlockKind::Text(t) => panic!("expected directive, got text {t:?}"),
        }
    }

    #[test]
    fn parses_include_with_attributes() {
        let doc = parse(
            "index.adoc",
            "include::core/injection.adoc[leveloffset=+1,tags=\"basic;!update_2\",opts=optional]",
        )
        .unwrap();

        let Directive::Include(inc) = directive(&doc, 0) else {
            panic!("expected include");
        };
        assert_eq!(inc.target, "core/injection.adoc");
        assert_eq!(inc.tags, vec!["basic".to_string(), "!update_2".to_string()]);
        assert_eq!(inc.level_offset, Some(LevelOffset::Relative(1)));
        assert!(inc.optional);
    }

    #[test]
    fn parses_tag_markers_in_comments() {
        let src = "// tag::update_1[]\n# end::update_1[]\n<!-- tag::html[] -->\n/* end::html[] */\ntag::bare[]";
        let doc = parse("a.adoc", src).unwrap();

        let expected = [
            ("update_1", TagBoundary::Start),
            ("update_1", TagBoundary::End),
            ("html", TagBoundary::Start),
            ("html", TagBoundary::End),
            ("bare", TagBoundary::Start),
        ];
        for (idx, (name, boundary)) in expected.iter().enumerate() {
            let Directive::Tag(marker) = directive(&doc, idx) else {
                panic!("expected tag marker at {idx}");
            };
            assert_eq!(marker.name, *name);
            assert_eq!(marker.boundary, *boundary);
        }
    }

    #[test]
    fn parses_conditionals() {
        let doc = parse(
            "a.adoc",
            "ifdef::backend-html5,pdf[]\nifndef::a+b[]\nifdef::draft[Draft copy]\nendif::[]",
        )
        .unwrap();

        let Directive::Conditional(c) = directive(&doc, 0) else { panic!() };
        assert_eq!(c.kind, ConditionalKind::IfDef);
        assert_eq!(c.mode, MatchMode::Any);
        assert_eq!(c.names, vec!["backend-html5".to_string(), "pdf".to_string()]);

        let Directive::Conditional(c) = directive(&doc, 1) else { panic!() };
        assert_eq!(c.kind, ConditionalKind::IfNDef);
        assert_eq!(c.mode, MatchMode::All);

        let Directive::Conditional(c) = directive(&doc, 2) else { panic!() };
        assert_eq!(c.inline.as_deref(), Some("Draft copy"));

        let Directive::Conditional(c) = directive(&doc, 3) else { panic!() };
        assert_eq!(c.kind, ConditionalKind::EndIf);
        assert!(c.names.is_empty());
    }

    #[test]
    fn parses_attribute_entries() {
        let doc = parse("a.adoc", ":version: 3.2.0\n:icons!:\n:!toc:\n:empty:").unwrap();

        let Directive::AttributeEntry(e) = directive(&doc, 0) else { panic!() };
        assert_eq!(e.name, "version");
        assert_eq!(e.value.as_deref(), Some("3.2.0"));

        let Directive::AttributeEntry(e) = directive(&doc, 1) else { panic!() };
        assert_eq!(e.value, None);

        let Directive::AttributeEntry(e) = directive(&doc, 2) else { panic!() };
        assert_eq!(e.name, "toc");
        assert_eq!(e.value, None);

        let Directive::AttributeEntry(e) = directive(&doc, 3) else { panic!() };
        assert_eq!(e.value.as_deref(), Some(""));
    }

    #[test]
    fn attribute_entries_inside_listing_are_text() {
        let doc = parse("a.adoc", "----\n:key: value\n----").unwrap();
        assert!(matches!(&doc.blocks[1].kind, BlockKind::Text(t) if t == ":key: value"));
    }

    #[test]
    fn escaped_directive_is_literal_text() {
        let doc = parse("a.adoc", "\\include::other.adoc[]").unwrap();
        assert!(matches!(&doc.blocks[0].kind, BlockKind::Text(t) if t == "include::other.adoc[]"));
    }

    #[test]
    fn line_numbers_are_one_based() {
        let doc = parse("a.adoc", "first\nsecond\r\nthird").unwrap();
        let lines: Vec<_> = doc.blocks.iter().map(|b| b.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert!(matches!(&doc.blocks[1].kind, BlockKind::Text(t) if t == "second"));
    }

    #[test]
    fn syntax_errors_carry_location() {
        let err = parse("a.adoc", "text\ninclude::[]").unwrap_err();
        assert!(err.to_string().contains("a.adoc:2"));

        let err = parse("a.adoc", "include::x.adoc[leveloffset=abc]").unwrap_err();
        assert!(err.to_string().contains("leveloffset"));

        let err = parse("a.adoc", "endif::x[oops]").unwrap_err();
        assert!(err.to_string().contains("endif"));
    }

    #[test]
    fn attrlist_respects_quotes() {
        let items = parse_attrlist(r#"source, java, subs="attributes,quotes", title='a, b'"#);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], (None, "source".to_string()));
        assert_eq!(
            items[2],
            (Some("subs".to_string()), "attributes,quotes".to_string())
        );
        assert_eq!(items[3], (Some("title".to_string()), "a, b".to_string()));
    }

    #[test]
    fn targets_resolve_relative_to_includer() {
        let resolved = resolve_target(Path::new("/docs/core/index.adoc"), "../shared/a.adoc");
        assert_eq!(resolved, PathBuf::from("/docs/core/../shared/a.adoc"));
        let resolved = resolve_target(Path::new("/docs/index.adoc"), "/abs/b.adoc");
        assert_eq!(resolved, PathBuf::from("/abs/b.adoc"));
    }
}
