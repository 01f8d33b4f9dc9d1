//! Error types for sheetsmith.
//!
//! Library crates use [`SheetsmithError`] via `thiserror`.
//! App crates (cli) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sheetsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Directive or document syntax error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An `include::` target does not exist.
    #[error("include target {target:?} not found (included from {from:?}, line {line})")]
    MissingInclude {
        target: PathBuf,
        from: PathBuf,
        line: usize,
    },

    /// A document (transitively) includes itself.
    #[error("circular include: {}", format_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },

    /// Include nesting exceeded the configured maximum depth.
    #[error("include depth exceeds {max} at {path:?}")]
    IncludeDepth { path: PathBuf, max: usize },

    /// An `end::` marker with no matching open `tag::` marker.
    #[error("unmatched end tag `{tag}` in {path:?} at line {line}")]
    UnmatchedTag {
        tag: String,
        path: PathBuf,
        line: usize,
    },

    /// A `tag::` marker that is never closed.
    #[error("tag `{tag}` opened in {path:?} at line {line} is never closed")]
    UnclosedTag {
        tag: String,
        path: PathBuf,
        line: usize,
    },

    /// An `endif::` with no open conditional, or an `ifdef::` never closed.
    #[error("unbalanced conditional `{name}` in {path:?} at line {line}")]
    UnbalancedConditional {
        name: String,
        path: PathBuf,
        line: usize,
    },

    /// A `{name}` reference with no value, under the `error` policy.
    #[error("missing attribute `{name}` referenced in {path:?} at line {line}")]
    MissingAttribute {
        name: String,
        path: PathBuf,
        line: usize,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SheetsmithError>;

impl SheetsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SheetsmithError::config("unknown format `docx`");
        assert_eq!(err.to_string(), "config error: unknown format `docx`");

        let err = SheetsmithError::validation("schema_version 99 not supported");
        assert!(err.to_string().contains("schema_version 99"));
    }

    #[test]
    fn cycle_lists_full_chain() {
        let err = SheetsmithError::IncludeCycle {
            chain: vec!["a.adoc".into(), "b.adoc".into(), "a.adoc".into()],
        };
        assert_eq!(err.to_string(), "circular include: a.adoc -> b.adoc -> a.adoc");
    }

    #[test]
    fn tag_error_names_tag_and_document() {
        let err = SheetsmithError::UnmatchedTag {
            tag: "update_1".into(),
            path: "core.adoc".into(),
            line: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("update_1"));
        assert!(msg.contains("core.adoc"));
        assert!(msg.contains("12"));
    }
}
