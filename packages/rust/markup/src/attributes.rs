//! Attribute reference substitution and conditional evaluation.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use sheetsmith_shared::{Attributes, Conditional, ConditionalKind, MatchMode};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\)?\{([A-Za-z0-9_][A-Za-z0-9_\-]*)\}").expect("valid regex")
});

/// Result of substituting one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    /// Names referenced but not defined, in order of appearance. Their
    /// references are left in `text` verbatim.
    pub missing: Vec<String>,
}

/// How `\{name}` escapes are written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeMode {
    /// Drop the backslash; the output is final text.
    #[default]
    Resolve,
    /// Keep `\{name}` so the output stays escaped when processed again as
    /// AsciiDoc.
    Preserve,
}

/// Replace `{name}` references with attribute values.
///
/// `\{name}` is an escape and yields a literal `{name}`. Character
/// replacement attributes (`{sp}`, `{lt}`, …) resolve when not overridden.
pub fn substitute(text: &str, attrs: &Attributes) -> Substituted {
    substitute_with(text, attrs, EscapeMode::Resolve)
}

/// [`substitute`] with explicit handling of escaped references.
pub fn substitute_with(text: &str, attrs: &Attributes, escapes: EscapeMode) -> Substituted {
    if !text.contains('{') {
        return Substituted {
            text: text.to_string(),
            missing: Vec::new(),
        };
    }

    let mut missing = Vec::new();
    let replaced = REFERENCE_RE.replace_all(text, |caps: &Captures| {
        let name = &caps[2];
        if caps.get(1).is_some() {
            return match escapes {
                EscapeMode::Resolve => format!("{{{name}}}"),
                EscapeMode::Preserve => caps[0].to_string(),
            };
        }
        match attrs.get(name).or_else(|| intrinsic(name)) {
            Some(value) => value.to_string(),
            None => {
                missing.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    Substituted {
        text: replaced.into_owned(),
        missing,
    }
}

/// Built-in character replacement attributes.
fn intrinsic(name: &str) -> Option<&'static str> {
    Some(match name {
        "empty" | "blank" => "",
        "sp" => " ",
        "nbsp" => "&#160;",
        "zwsp" => "&#8203;",
        "lt" => "&lt;",
        "gt" => "&gt;",
        "amp" => "&amp;",
        "startsb" => "[",
        "endsb" => "]",
        "vbar" => "|",
        "caret" => "^",
        "asterisk" => "*",
        "tilde" => "~",
        "backslash" => "\\",
        "backtick" => "`",
        _ => return None,
    })
}

/// Evaluate an `ifdef`/`ifndef` condition. `endif` always holds.
///
/// `ifndef` is the negation of the matching `ifdef`: `ifndef::a,b[]` holds
/// when neither is set, `ifndef::a+b[]` when not both are.
pub fn condition_holds(cond: &Conditional, attrs: &Attributes) -> bool {
    let defined = match cond.mode {
        MatchMode::Any => cond.names.iter().any(|n| attrs.is_set(n)),
        MatchMode::All => cond.names.iter().all(|n| attrs.is_set(n)),
    };
    match cond.kind {
        ConditionalKind::IfDef => defined,
        ConditionalKind::IfNDef => !defined,
        ConditionalKind::EndIf => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Attributes {
        Attributes::locked([("version", "3.2.0"), ("project", "demo")])
    }

    #[test]
    fn version_renders_without_braces() {
        let out = substitute("Quarkus {version} cheat sheet", &attrs());
        assert_eq!(out.text, "Quarkus 3.2.0 cheat sheet");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn missing_references_pass_through_and_are_reported() {
        let out = substitute("{project} uses {undefined} and {other}", &attrs());
        assert_eq!(out.text, "demo uses {undefined} and {other}");
        assert_eq!(out.missing, vec!["undefined".to_string(), "other".to_string()]);
    }

    #[test]
    fn escaped_reference_is_literal() {
        let out = substitute(r"use \{version} to print {version}", &attrs());
        assert_eq!(out.text, "use {version} to print 3.2.0");
    }

    #[test]
    fn preserved_escape_keeps_backslash() {
        let out = substitute_with(
            r"use \{version} to print {version}",
            &attrs(),
            EscapeMode::Preserve,
        );
        assert_eq!(out.text, r"use \{version} to print 3.2.0");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn non_identifier_braces_are_untouched() {
        let out = substitute(r#"{"key": 1} and { spaced }"#, &attrs());
        assert_eq!(out.text, r#"{"key": 1} and { spaced }"#);
        assert!(out.missing.is_empty());
    }

    #[test]
    fn intrinsics_resolve_unless_overridden() {
        let out = substitute("a{sp}b{startsb}c{endsb}", &Attributes::new());
        assert_eq!(out.text, "a b[c]");

        let custom = Attributes::locked([("sp", "_")]);
        assert_eq!(substitute("a{sp}b", &custom).text, "a_b");
    }

    #[test]
    fn conditions() {
        let a = attrs();
        let cond = |kind, mode, names: &[&str]| Conditional {
            kind,
            names: names.iter().map(|s| s.to_string()).collect(),
            mode,
            inline: None,
        };

        assert!(condition_holds(&cond(ConditionalKind::IfDef, MatchMode::Any, &["nope", "version"]), &a));
        assert!(!condition_holds(&cond(ConditionalKind::IfDef, MatchMode::All, &["nope", "version"]), &a));
        assert!(condition_holds(&cond(ConditionalKind::IfDef, MatchMode::All, &["project", "version"]), &a));
        assert!(!condition_holds(&cond(ConditionalKind::IfNDef, MatchMode::Any, &["nope", "version"]), &a));
        assert!(condition_holds(&cond(ConditionalKind::IfNDef, MatchMode::Any, &["nope"]), &a));
        assert!(condition_holds(&cond(ConditionalKind::EndIf, MatchMode::Any, &[]), &a));
    }
}
