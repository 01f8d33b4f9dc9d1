//! Assembled AsciiDoc output: a single self-contained source document that
//! any AsciiDoc processor (or a PDF backend) can consume without resolving
//! includes.

use sheetsmith_shared::{Attributes, RenderConfig};

use super::DocumentMeta;

// Written by the header itself or meaningless once includes are resolved.
const HEADER_MANAGED: &[&str] = &["doctitle", "author", "revnumber", "toc", "toclevels"];

pub(crate) fn emit(
    meta: &DocumentMeta,
    lines: &[String],
    attrs: &Attributes,
    config: &RenderConfig,
) -> String {
    let mut out = format!("= {}\n", meta.title);

    if let Some(author) = &meta.author {
        out.push_str(&format!(":author: {author}\n"));
    }
    if let Some(version) = &meta.version {
        out.push_str(&format!(":revnumber: {version}\n"));
    }
    if config.toc {
        out.push_str(":toc:\n");
        out.push_str(&format!(":toclevels: {}\n", config.toc_levels));
    }
    for (name, value) in attrs.iter() {
        if HEADER_MANAGED.contains(&name) {
            continue;
        }
        if value.is_empty() {
            out.push_str(&format!(":{name}:\n"));
        } else {
            out.push_str(&format!(":{name}: {value}\n"));
        }
    }

    if !lines.is_empty() {
        out.push('\n');
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_metadata_and_attributes() {
        let meta = DocumentMeta {
            title: "Quarkus Cheat-Sheet".into(),
            author: Some("Alex".into()),
            version: Some("3.2.0".into()),
        };
        let attrs = Attributes::locked([
            ("revnumber", "3.2.0"),
            ("version", "3.2.0"),
            ("experimental", ""),
        ]);
        let config = RenderConfig::default();
        let lines = vec!["== Basics".to_string(), "text".to_string()];

        let out = emit(&meta, &lines, &attrs, &config);
        assert_eq!(
            out,
            "= Quarkus Cheat-Sheet\n:author: Alex\n:revnumber: 3.2.0\n:toc:\n:toclevels: 2\n:experimental:\n:version: 3.2.0\n\n== Basics\ntext\n"
        );
    }

    #[test]
    fn empty_body_emits_header_only() {
        let meta = DocumentMeta {
            title: "T".into(),
            author: None,
            version: None,
        };
        let config = RenderConfig {
            toc: false,
            ..RenderConfig::default()
        };
        assert_eq!(emit(&meta, &[], &Attributes::new(), &config), "= T\n");
    }
}
