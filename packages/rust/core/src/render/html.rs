//! Print-ready HTML output.
//!
//! Converts the flattened body into a standalone HTML page with an optional
//! TOC nav, section anchors matching the TOC, and page-break markers honoured
//! by print stylesheets. Only the block and inline constructs common in
//! cheat-sheet sources are recognised; anything else becomes a paragraph.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use sheetsmith_markup::{VerbatimState, parse_attrlist};
use sheetsmith_shared::{RenderConfig, Toc, TocEntry};

use super::{DocumentMeta, is_block_attribute_line, is_block_title, is_comment};
use crate::toc::Heading;

const STYLE: &str = "\
body { font-family: sans-serif; line-height: 1.4; margin: 2em auto; max-width: 60em; }
pre { background: #f5f5f5; padding: 0.6em; overflow-x: auto; }
code { font-family: monospace; }
table { border-collapse: collapse; }
td, th { border: 1px solid #ccc; padding: 0.2em 0.5em; }
.admonition { border-left: 4px solid #888; padding-left: 0.8em; }
.title { font-weight: bold; }
@page { size: A4; margin: 1.5cm; }
@media print {
  nav.toc { page-break-after: always; }
  .page-break { page-break-after: always; break-after: page; }
  pre, table { page-break-inside: avoid; }
}";

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);").expect("valid regex")
});

static CODE_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

static STRONG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[\s(>])\*([^*\s](?:[^*]*[^*\s])?)\*").expect("valid regex")
});

static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[\s(>])_([^_\s](?:[^_]*[^_\s])?)_").expect("valid regex")
});

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:link:)?(https?://[^\s\[<]+)\[([^\]]*)\]").expect("valid regex")
});

static XREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;&lt;([A-Za-z_][\w\-]*)(?:,([^&]*))?&gt;&gt;").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\*+|-|\.+)[ \t]+(.*)$").expect("valid regex"));

static ADMONITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(NOTE|TIP|IMPORTANT|WARNING|CAUTION):[ \t]+(.*)$").expect("valid regex")
});

static ANCHOR_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\[([A-Za-z_][\w\-.]*)(?:,[^\]]*)?\]\]$").expect("valid regex"));

pub(crate) fn emit(
    meta: &DocumentMeta,
    lines: &[String],
    headings: &[Heading],
    toc: &Toc,
    config: &RenderConfig,
) -> String {
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<meta name=\"generator\" content=\"sheetsmith\">\n");
    if let Some(author) = &meta.author {
        out.push_str(&format!("<meta name=\"author\" content=\"{}\">\n", escape(author)));
    }
    if let Some(version) = &meta.version {
        out.push_str(&format!("<meta name=\"version\" content=\"{}\">\n", escape(version)));
    }
    out.push_str(&format!("<title>{}</title>\n", escape(&meta.title)));
    out.push_str(&format!("<style>\n{STYLE}\n</style>\n</head>\n<body>\n"));

    out.push_str(&format!("<header>\n<h1>{}</h1>\n", escape(&meta.title)));
    let details: Vec<String> = [meta.author.as_deref(), meta.version.as_deref()]
        .into_iter()
        .flatten()
        .map(escape)
        .collect();
    if !details.is_empty() {
        out.push_str(&format!("<p class=\"details\">{}</p>\n", details.join(" &#183; ")));
    }
    out.push_str("</header>\n");

    if config.toc && !toc.is_empty() {
        out.push_str("<nav class=\"toc\">\n<h2>Table of Contents</h2>\n");
        toc_list(&mut out, &toc.sections);
        out.push_str("</nav>\n");
    }

    out.push_str("<main>\n");
    let mut writer = BodyWriter::new(headings);
    writer.write(lines);
    out.push_str(&writer.out);
    out.push_str("</main>\n</body>\n</html>\n");
    out
}

fn toc_list(out: &mut String, entries: &[TocEntry]) {
    out.push_str("<ul>\n");
    for entry in entries {
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            entry.anchor,
            escape(&entry.title)
        ));
        if !entry.children.is_empty() {
            out.push('\n');
            toc_list(out, &entry.children);
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n");
}

// ---------------------------------------------------------------------------
// Body conversion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

struct BodyWriter<'h> {
    out: String,
    headings: HashMap<usize, &'h Heading>,
    paragraph: Vec<String>,
    admonition: Option<String>,
    list: Option<(ListKind, Vec<String>)>,
    /// Language from a `[source,lang]` line awaiting its listing.
    language: Option<String>,
    in_table: bool,
}

impl<'h> BodyWriter<'h> {
    fn new(headings: &'h [Heading]) -> Self {
        Self {
            out: String::new(),
            headings: headings.iter().map(|h| (h.line, h)).collect(),
            paragraph: Vec::new(),
            admonition: None,
            list: None,
            language: None,
            in_table: false,
        }
    }

    fn write(&mut self, lines: &[String]) {
        let mut idx = 0;
        while idx < lines.len() {
            let line = lines[idx].as_str();

            let mut verbatim = VerbatimState::default();
            if verbatim.update(line) {
                self.flush();
                let mut end = idx + 1;
                while end < lines.len() && !verbatim.update(&lines[end]) {
                    end += 1;
                }
                let content_end = end.min(lines.len());
                self.verbatim_block(line, &lines[idx + 1..content_end]);
                idx = end + 1;
                continue;
            }

            if let Some(heading) = self.headings.get(&idx).copied() {
                self.flush();
                let level = (heading.level + 1).min(6);
                self.out.push_str(&format!(
                    "<h{level} id=\"{}\">{}</h{level}>\n",
                    heading.anchor,
                    inline(&heading.title)
                ));
                idx += 1;
                continue;
            }

            self.line(line);
            idx += 1;
        }
        self.flush();
        if self.in_table {
            self.out.push_str("</table>\n");
        }
    }

    fn line(&mut self, line: &str) {
        if line.is_empty() {
            self.flush();
            return;
        }
        if is_comment(line) {
            return;
        }
        if line == "<<<" {
            self.flush();
            self.out.push_str("<div class=\"page-break\"></div>\n");
            return;
        }
        if line == "|===" {
            self.flush();
            self.out
                .push_str(if self.in_table { "</table>\n" } else { "<table>\n" });
            self.in_table = !self.in_table;
            return;
        }
        if self.in_table {
            let cells: Vec<&str> = line
                .split('|')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if !cells.is_empty() {
                self.out.push_str("<tr>");
                for cell in cells {
                    self.out.push_str(&format!("<td>{}</td>", inline(cell)));
                }
                self.out.push_str("</tr>\n");
            }
            return;
        }
        if let Some(caps) = ANCHOR_LINE_RE.captures(line) {
            self.flush();
            self.out.push_str(&format!("<a id=\"{}\"></a>\n", &caps[1]));
            return;
        }
        if is_block_attribute_line(line) {
            self.flush();
            let attrs = parse_attrlist(&line[1..line.len() - 1]);
            let positional: Vec<&str> = attrs
                .iter()
                .filter(|(key, _)| key.is_none())
                .map(|(_, value)| value.as_str())
                .collect();
            if positional.first() == Some(&"source") {
                self.language = positional.get(1).map(|lang| lang.to_string());
            }
            return;
        }
        if is_block_title(line) {
            self.flush();
            self.out
                .push_str(&format!("<div class=\"title\">{}</div>\n", inline(&line[1..])));
            return;
        }
        if let Some(caps) = LIST_ITEM_RE.captures(line) {
            self.flush_paragraph();
            let kind = if caps[1].starts_with('.') {
                ListKind::Ordered
            } else {
                ListKind::Unordered
            };
            if self.list.as_ref().is_some_and(|(open, _)| *open != kind) {
                self.flush_list();
            }
            let item = caps[2].to_string();
            match &mut self.list {
                Some((_, items)) => items.push(item),
                None => self.list = Some((kind, vec![item])),
            }
            return;
        }
        if let Some((_, items)) = &mut self.list {
            if let Some(last) = items.last_mut() {
                last.push(' ');
                last.push_str(line);
                return;
            }
        }
        if self.paragraph.is_empty() {
            if let Some(caps) = ADMONITION_RE.captures(line) {
                self.admonition = Some(caps[1].to_string());
                self.paragraph.push(caps[2].to_string());
                return;
            }
        }
        self.paragraph.push(line.to_string());
    }

    fn verbatim_block(&mut self, delimiter: &str, content: &[String]) {
        let language = self.language.take();
        if delimiter.starts_with("////") {
            return;
        }
        if delimiter.starts_with("++++") {
            for line in content {
                self.out.push_str(line);
                self.out.push('\n');
            }
            return;
        }

        let language = delimiter
            .strip_prefix("```")
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .map(String::from)
            .or(language);
        let code: Vec<String> = content.iter().map(|l| escape_verbatim(l)).collect();
        match language {
            Some(lang) => self.out.push_str(&format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                escape(&lang),
                code.join("\n")
            )),
            None => self
                .out
                .push_str(&format!("<pre>{}</pre>\n", code.join("\n"))),
        }
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.flush_list();
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = inline(&self.paragraph.join("\n"));
        self.paragraph.clear();
        match self.admonition.take() {
            Some(kind) => {
                let label = capitalize(&kind);
                self.out.push_str(&format!(
                    "<div class=\"admonition {}\"><p><strong>{label}:</strong> {text}</p></div>\n",
                    kind.to_lowercase()
                ));
            }
            None => self.out.push_str(&format!("<p>{text}</p>\n")),
        }
    }

    fn flush_list(&mut self) {
        let Some((kind, items)) = self.list.take() else {
            return;
        };
        self.out.push_str(&format!("<{}>\n", kind.tag()));
        for item in items {
            self.out.push_str(&format!("<li>{}</li>\n", inline(&item)));
        }
        self.out.push_str(&format!("</{}>\n", kind.tag()));
    }
}

// ---------------------------------------------------------------------------
// Inline formatting and escaping
// ---------------------------------------------------------------------------

/// Escape text and apply inline markup. Code spans are not formatted further.
fn inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in CODE_SPAN_RE.captures_iter(text) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&format_span(&text[last..whole.start()]));
        out.push_str(&format!("<code>{}</code>", escape_verbatim(code.as_str())));
        last = whole.end();
    }
    out.push_str(&format_span(&text[last..]));
    out
}

fn format_span(text: &str) -> String {
    let escaped = escape(text);
    let linked = LINK_RE.replace_all(&escaped, |caps: &regex::Captures| {
        let label = if caps[2].is_empty() { &caps[1] } else { &caps[2] };
        format!("<a href=\"{}\">{}</a>", &caps[1], label)
    });
    let xrefs = XREF_RE.replace_all(&linked, |caps: &regex::Captures| {
        let label = caps.get(2).map_or(&caps[1], |m| m.as_str());
        format!("<a href=\"#{}\">{}</a>", &caps[1], label.trim())
    });
    let strong = STRONG_RE.replace_all(&xrefs, "$1<strong>$2</strong>");
    EMPHASIS_RE
        .replace_all(&strong, "$1<em>$2</em>")
        .into_owned()
}

/// Escape markup characters, keeping existing character references
/// (`&#160;`, `&lt;`) produced by attribute substitution.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, c) in text.char_indices() {
        match c {
            '&' if ENTITY_RE.is_match(&text[idx..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape every markup character; verbatim content is shown as written.
fn escape_verbatim(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
