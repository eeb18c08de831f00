//! Brace-delimited bodies shared by `func` and block declarations

use super::comment::{BLOCK_COMMENT_START, LINE_COMMENT};

/// What stopped a body scan
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum BodyStep<'t> {
    /// The line ended inside the body
    LineEnd,
    /// A block comment starts; the text after `/*` follows
    Comment(&'t str),
    /// The closing brace was found; the text after it follows
    Closed(&'t str),
}

/// Collects body lines until the brace that closes the body
#[derive(Debug, Clone, Default)]
pub(crate) struct BodyScanner {
    depth: usize,
    line: String,
    lines: Vec<String>,
}

impl BodyScanner {
    /// Called once the opening brace was consumed
    pub fn open(&mut self) {
        self.depth = 1;
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn scan<'t>(&mut self, text: &'t str) -> BodyStep<'t> {
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in text.char_indices() {
            if in_string {
                self.line.push(c);
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            let tail = &text[i..];
            if tail.starts_with(LINE_COMMENT) {
                break;
            }
            if tail.starts_with(BLOCK_COMMENT_START) {
                self.line.push(' ');
                return BodyStep::Comment(&tail[BLOCK_COMMENT_START.len()..]);
            }
            match c {
                '"' => in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.flush();
                        return BodyStep::Closed(&text[i + 1..]);
                    }
                }
                _ => {}
            }
            self.line.push(c);
        }
        self.flush();
        BodyStep::LineEnd
    }

    fn flush(&mut self) {
        let line = self.line.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
        self.line.clear();
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
