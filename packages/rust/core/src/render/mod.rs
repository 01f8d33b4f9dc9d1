//! Renderer.
//!
//! Flattens a [`DocumentSet`] into one body: include directives are resolved
//! against the attribute state at that point, loaded into the set, and
//! replaced by the (tag-filtered, level-shifted) content of their targets.
//! Conditionals are evaluated, attribute entries update the running attribute
//! state, and `{name}` references are substituted. The body is then cleaned
//! up and handed to the emitter for the requested output format.

mod asciidoc;
mod html;

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use sheetsmith_markup::attributes::EscapeMode;
use sheetsmith_markup::{VerbatimState, attributes, normalize, parse_attrlist, tags};
use sheetsmith_markup::tags::TagFilter;
use sheetsmith_shared::{
    AttributeEntry, Attributes, BlockKind, Conditional, ConditionalKind, Directive,
    LevelOffset, MissingAttributePolicy, OutputFormat, PageBreaks, RenderConfig, Result,
    SheetsmithError, Toc,
};

use crate::loader::{DocumentSet, IncludeStack};
use crate::toc::{self, Heading};

/// Title used when neither the config nor the root document provides one.
pub const UNTITLED: &str = "Untitled";

/// A rendered document.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub title: String,
    /// Final output text in the requested format.
    pub text: String,
    pub toc: Toc,
    /// Section headings of the assembled body.
    pub headings: Vec<Heading>,
    /// Attribute state at the end of the document.
    pub attributes: Attributes,
}

/// Header values shared by both emitters.
#[derive(Debug, Clone)]
pub(crate) struct DocumentMeta {
    pub title: String,
    pub author: Option<String>,
    pub version: Option<String>,
}

/// Render a document set, loading include targets on the active path into
/// `set` as they are reached.
#[instrument(skip_all, fields(root = %set.root().document.path.display(), format = config.format.as_str()))]
pub fn render(set: &mut DocumentSet, config: &RenderConfig) -> Result<Rendered> {
    let body = flatten(set, config)?;

    let normalized = normalize(&body.lines.join("\n"));
    let lines: Vec<String> = normalized.lines().map(String::from).collect();
    let headings = toc::scan_headings(&lines);
    let toc = toc::build_toc(&headings, config.toc_levels);

    let meta = DocumentMeta {
        title: config
            .title
            .clone()
            .or(body.title)
            .unwrap_or_else(|| UNTITLED.to_string()),
        author: body.attributes.get("author").map(String::from),
        version: body
            .attributes
            .get("revnumber")
            .or_else(|| body.attributes.get("version"))
            .map(String::from),
    };

    let text = match config.format {
        OutputFormat::Asciidoc => asciidoc::emit(&meta, &lines, &body.attributes, config),
        OutputFormat::Html => html::emit(&meta, &lines, &headings, &toc, config),
    };

    info!(
        title = %meta.title,
        documents = set.len(),
        lines = lines.len(),
        bytes = text.len(),
        toc_entries = toc.len(),
        "document rendered"
    );

    Ok(Rendered {
        title: meta.title,
        text,
        toc,
        headings,
        attributes: body.attributes,
    })
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

struct Body {
    lines: Vec<String>,
    title: Option<String>,
    attributes: Attributes,
}

fn flatten(set: &mut DocumentSet, config: &RenderConfig) -> Result<Body> {
    let global = TagFilter::new(&config.only_tags, &config.exclude_tags);
    let escapes = match config.format {
        OutputFormat::Asciidoc => EscapeMode::Preserve,
        OutputFormat::Html => EscapeMode::Resolve,
    };
    let mut flattener = Flattener {
        set,
        stack: IncludeStack::new(config.max_include_depth),
        global: global.clone(),
        policy: config.missing_attribute,
        escapes,
        page_breaks: config.page_breaks,
        attrs: config.invocation_attributes(),
        lines: Vec::new(),
        title: None,
        verbatim: VerbatimState::default(),
        block_subs: false,
        pending_subs: None,
        chapters: 0,
    };
    flattener.flatten(0, &global, 0)?;
    debug!(lines = flattener.lines.len(), "body flattened");

    Ok(Body {
        lines: flattener.lines,
        title: flattener.title,
        attributes: flattener.attrs,
    })
}

/// An open `ifdef`/`ifndef` block.
struct Frame {
    names: Vec<String>,
    line: usize,
    active: bool,
}

struct Flattener<'a> {
    set: &'a mut DocumentSet,
    stack: IncludeStack,
    global: TagFilter,
    policy: MissingAttributePolicy,
    escapes: EscapeMode,
    page_breaks: PageBreaks,
    attrs: Attributes,
    lines: Vec<String>,
    title: Option<String>,
    /// Verbatim state of the output stream; blocks may span includes.
    verbatim: VerbatimState,
    /// Whether the open verbatim block substitutes attributes.
    block_subs: bool,
    /// `subs` request from a block attribute line awaiting its block.
    pending_subs: Option<bool>,
    chapters: usize,
}

impl Flattener<'_> {
    fn flatten(&mut self, idx: usize, filter: &TagFilter, offset: i8) -> Result<()> {
        let doc = tags::extract(&self.set.get(idx).document, filter)?;
        let path = doc.path.as_path();
        self.stack.enter(path)?;
        let mut frames: Vec<Frame> = Vec::new();

        for block in &doc.blocks {
            let active = frames.iter().all(|f| f.active);
            match &block.kind {
                BlockKind::Directive(Directive::Conditional(cond)) => {
                    self.conditional(cond, &mut frames, active, offset, path, block.line)?;
                }
                _ if !active => {}
                BlockKind::Directive(Directive::AttributeEntry(entry)) => {
                    self.attribute_entry(entry, path, block.line)?;
                }
                BlockKind::Directive(Directive::Include(include)) => {
                    let resolved =
                        self.substitute_with(&include.target, EscapeMode::Resolve, path, block.line)?;
                    let Some(target) =
                        self.set.include(path, block.line, &resolved, include.optional)?
                    else {
                        continue;
                    };
                    debug!(target = %resolved, depth = self.stack.depth(), "splicing include");
                    let narrowed = self
                        .global
                        .narrowed_by(&TagFilter::from_selection(&include.tags));
                    let offset = LevelOffset::then(offset, include.level_offset);
                    self.flatten(target, &narrowed, offset)?;
                }
                BlockKind::Directive(Directive::Tag(_)) => {}
                BlockKind::Text(text) => self.text(text, offset, path, block.line)?,
            }
        }

        if let Some(frame) = frames.first() {
            return Err(SheetsmithError::UnbalancedConditional {
                name: frame.names.join(","),
                path: path.to_path_buf(),
                line: frame.line,
            });
        }
        self.stack.leave();
        Ok(())
    }

    fn conditional(
        &mut self,
        cond: &Conditional,
        frames: &mut Vec<Frame>,
        active: bool,
        offset: i8,
        path: &Path,
        line: usize,
    ) -> Result<()> {
        let unbalanced = || SheetsmithError::UnbalancedConditional {
            name: cond.names.join(","),
            path: path.to_path_buf(),
            line,
        };

        if cond.kind == ConditionalKind::EndIf {
            let frame = frames.pop().ok_or_else(unbalanced)?;
            if !cond.names.is_empty() && cond.names != frame.names {
                return Err(unbalanced());
            }
            return Ok(());
        }

        let holds = active && attributes::condition_holds(cond, &self.attrs);
        match &cond.inline {
            Some(content) => {
                if holds {
                    self.text(content, offset, path, line)?;
                }
            }
            None => frames.push(Frame {
                names: cond.names.clone(),
                line,
                active: holds,
            }),
        }
        Ok(())
    }

    fn attribute_entry(&mut self, entry: &AttributeEntry, path: &Path, line: usize) -> Result<()> {
        let value = match &entry.value {
            Some(value) => Some(self.substitute(value, path, line)?),
            None => None,
        };
        let resolved = AttributeEntry {
            name: entry.name.clone(),
            value,
        };
        if !self.attrs.apply(&resolved) {
            debug!(name = %entry.name, "attribute set by invocation, entry ignored");
        }
        Ok(())
    }

    fn text(&mut self, text: &str, offset: i8, path: &Path, line: usize) -> Result<()> {
        let was_inside = self.verbatim.inside();
        if self.verbatim.update(text) {
            self.block_subs = !was_inside && self.pending_subs.take().unwrap_or(false);
            self.lines.push(text.to_string());
            return Ok(());
        }
        if was_inside {
            let out = if self.block_subs {
                self.substitute(text, path, line)?
            } else {
                text.to_string()
            };
            self.lines.push(out);
            return Ok(());
        }

        if is_comment(text) {
            self.lines.push(text.to_string());
            return Ok(());
        }

        if is_block_attribute_line(text) {
            self.pending_subs = Some(wants_attribute_subs(text));
        } else if !is_block_title(text) {
            self.pending_subs = None;
        }

        if let Some((level, title)) = toc::parse_heading(text) {
            return self.heading(level, title, offset, path, line);
        }

        let out = self.substitute(text, path, line)?;
        self.lines.push(out);
        Ok(())
    }

    fn heading(&mut self, level: u8, title: &str, offset: i8, path: &Path, line: usize) -> Result<()> {
        let level = (i16::from(level) + i16::from(offset)).clamp(0, 5) as u8;
        let title = self.substitute(title, path, line)?;

        if level == 0 && self.title.is_none() && self.lines.iter().all(|l| l.trim().is_empty()) {
            self.title = Some(title);
            return Ok(());
        }

        if level == 1 && self.page_breaks == PageBreaks::Chapters {
            if self.chapters > 0 {
                self.lines.extend([String::new(), "<<<".to_string(), String::new()]);
            }
            self.chapters += 1;
        }

        self.lines
            .push(format!("{} {}", "=".repeat(usize::from(level) + 1), title));
        Ok(())
    }

    /// Substitute attribute references under the configured missing-attribute
    /// policy.
    fn substitute(&self, text: &str, path: &Path, line: usize) -> Result<String> {
        self.substitute_with(text, self.escapes, path, line)
    }

    fn substitute_with(
        &self,
        text: &str,
        escapes: EscapeMode,
        path: &Path,
        line: usize,
    ) -> Result<String> {
        let out = attributes::substitute_with(text, &self.attrs, escapes);
        if let Some(name) = out.missing.first() {
            match self.policy {
                MissingAttributePolicy::Error => {
                    return Err(SheetsmithError::MissingAttribute {
                        name: name.clone(),
                        path: path.to_path_buf(),
                        line,
                    });
                }
                MissingAttributePolicy::Passthrough => {
                    for name in &out.missing {
                        warn!(
                            attribute = %name,
                            path = %path.display(),
                            line,
                            "unresolved attribute reference left as-is"
                        );
                    }
                }
            }
        }
        Ok(out.text)
    }
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// `// comment`, but not a `////` block delimiter.
pub(crate) fn is_comment(line: &str) -> bool {
    line.starts_with("//") && !line.starts_with("///")
}

/// `[source,java]`, `[NOTE]`, `[subs=attributes+]`; anchors (`[[id]]`) excluded.
pub(crate) fn is_block_attribute_line(line: &str) -> bool {
    line.len() > 2 && line.starts_with('[') && line.ends_with(']') && !line.starts_with("[[")
}

/// `.Title` preceding a block.
pub(crate) fn is_block_title(line: &str) -> bool {
    line.len() > 1
        && line.starts_with('.')
        && !line.starts_with("..")
        && !line[1..].starts_with(char::is_whitespace)
}

fn wants_attribute_subs(line: &str) -> bool {
    let inner = &line[1..line.len() - 1];
    parse_attrlist(inner).iter().any(|(key, value)| {
        key.as_deref() == Some("subs")
            && value
                .split(',')
                .any(|sub| sub.trim().trim_matches('+') == "attributes")
    })
}
