//! Tracking of verbatim blocks: listing (`----`), literal (`....`), fenced
//! (`` ``` ``), passthrough (`++++`) and comment (`////`) blocks.
//!
//! Attribute entries are not recognised and attribute references are not
//! substituted inside verbatim blocks.

/// Open/closed state of the current verbatim block.
#[derive(Debug, Clone, Default)]
pub struct VerbatimState {
    open: Option<String>,
}

impl VerbatimState {
    /// Whether the last observed line left us inside a verbatim block.
    pub fn inside(&self) -> bool {
        self.open.is_some()
    }

    /// Feed the next text line. Returns `true` if the line is a delimiter
    /// that opened or closed a block.
    pub fn update(&mut self, line: &str) -> bool {
        match &self.open {
            Some(delim) => {
                let closes = line.trim_end() == delim.as_str();
                if closes {
                    self.open = None;
                }
                closes
            }
            None => match opening_delimiter(line) {
                Some(delim) => {
                    self.open = Some(delim);
                    true
                }
                None => false,
            },
        }
    }
}

fn opening_delimiter(line: &str) -> Option<String> {
    let line = line.trim_end();
    if line.starts_with("```") {
        return Some("```".to_string());
    }
    let repeated = |c: char| line.len() >= 4 && line.chars().all(|x| x == c);
    if ['-', '.', '+', '/'].into_iter().any(repeated) {
        return Some(line.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_block_requires_matching_length() {
        let mut state = VerbatimState::default();
        assert!(state.update("-----"));
        assert!(state.inside());
        assert!(!state.update("----"));
        assert!(state.inside());
        assert!(state.update("-----"));
        assert!(!state.inside());
    }

    #[test]
    fn fenced_block_with_language() {
        let mut state = VerbatimState::default();
        assert!(state.update("```java"));
        assert!(state.inside());
        assert!(!state.update("  int x = 1;"));
        assert!(state.update("```"));
        assert!(!state.inside());
    }

    #[test]
    fn comment_and_passthrough_blocks() {
        let mut state = VerbatimState::default();
        assert!(state.update("////"));
        assert!(!state.update("----"));
        assert!(state.update("////"));
        assert!(state.update("++++"));
        assert!(state.inside());
    }

    #[test]
    fn short_dash_runs_are_text() {
        let mut state = VerbatimState::default();
        assert!(!state.update("---"));
        assert!(!state.update("-- open block"));
        assert!(!state.inside());
    }
}
