//! Post-render cleanup pipeline for assembled text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! Lines inside verbatim blocks are left untouched by every pass.

use crate::verbatim::VerbatimState;

/// Run the full cleanup pipeline on rendered text.
pub fn normalize(text: &str) -> String {
    let mut result = trim_trailing_whitespace(text);
    result = collapse_blank_lines(&result);
    result = strip_leading_blank_lines(&result);
    ensure_trailing_newline(&result)
}

// ---------------------------------------------------------------------------
// Pass 1: Trailing whitespace
// ---------------------------------------------------------------------------

fn trim_trailing_whitespace(text: &str) -> String {
    let mut verbatim = VerbatimState::default();
    let mut lines = Vec::new();

    for line in text.lines() {
        let was_inside = verbatim.inside();
        let delimiter = verbatim.update(line);
        if was_inside && !delimiter {
            lines.push(line.to_string());
        } else {
            lines.push(line.trim_end().to_string());
        }
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Collapse runs of blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 2+ blank lines outside verbatim blocks into one.
fn collapse_blank_lines(text: &str) -> String {
    let mut verbatim = VerbatimState::default();
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;

    for line in text.lines() {
        let was_inside = verbatim.inside();
        verbatim.update(line);

        let blank = line.is_empty();
        if blank && previous_blank && !was_inside {
            continue;
        }
        previous_blank = blank && !was_inside;
        lines.push(line);
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Leading blank lines
// ---------------------------------------------------------------------------

fn strip_leading_blank_lines(text: &str) -> String {
    text.trim_start_matches('\n').to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end_matches('\n');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(normalize("a\n\n\n\nb"), "a\n\nb\n");
    }

    #[test]
    fn keeps_blank_runs_in_listings() {
        let text = "----\nx\n\n\ny\n----\n\n\nafter";
        assert_eq!(normalize(text), "----\nx\n\n\ny\n----\n\nafter\n");
    }

    #[test]
    fn trims_trailing_whitespace_outside_listings() {
        assert_eq!(normalize("a  \n----\ncode  \n----  \n"), "a\n----\ncode  \n----\n");
    }

    #[test]
    fn strips_leading_blank_lines_and_fixes_final_newline() {
        assert_eq!(normalize("\n\ntext\n\n\n"), "text\n");
        assert_eq!(normalize(""), "");
    }
}
