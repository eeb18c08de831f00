//! Resumable `{ ... }` command blocks, as used by `namespace Name { ... }`

use crate::diagnostics::CalcError;
use crate::lexer::Span;

use super::Progress;
use super::body::{BodyScanner, BodyStep};
use super::comment::{BLOCK_COMMENT_START, CommentStack, LINE_COMMENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Expecting `{`
    Open,
    Body,
    Done,
}

#[derive(Debug, Clone)]
pub struct BlockParser {
    state: BlockState,
    body: BodyScanner,
    comments: CommentStack<BlockState>,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockParser {
    pub fn new() -> Self {
        Self {
            state: BlockState::Open,
            body: BodyScanner::default(),
            comments: CommentStack::new(),
        }
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Consume one line; completes with the block's command lines
    pub fn feed(&mut self, line: &str) -> Progress<Vec<String>> {
        let mut rest = line;
        loop {
            if self.comments.is_open() {
                match self.comments.scan(rest) {
                    Some((resume, after)) => {
                        self.state = resume;
                        rest = after;
                    }
                    None => return Progress::NeedMore,
                }
            }

            match self.state {
                BlockState::Body => match self.body.scan(rest) {
                    BodyStep::LineEnd => return Progress::NeedMore,
                    BodyStep::Comment(after) => {
                        self.comments.open(BLOCK_COMMENT_START, BlockState::Body);
                        rest = after;
                    }
                    BodyStep::Closed(after) => {
                        self.state = BlockState::Done;
                        return Progress::Complete {
                            value: std::mem::take(&mut self.body).into_lines(),
                            rest: after.to_string(),
                        };
                    }
                },
                BlockState::Open | BlockState::Done => {
                    rest = rest.trim_start();
                    if rest.is_empty() || rest.starts_with(LINE_COMMENT) {
                        return Progress::NeedMore;
                    }
                    if let Some(after) = rest.strip_prefix(BLOCK_COMMENT_START) {
                        self.comments.open(BLOCK_COMMENT_START, self.state);
                        rest = after;
                        continue;
                    }
                    match rest.strip_prefix('{') {
                        Some(after) if self.state == BlockState::Open => {
                            self.state = BlockState::Body;
                            self.body.open();
                            rest = after;
                        }
                        _ => {
                            let offset = line.len() - rest.len();
                            let found = rest.split_whitespace().next().unwrap_or_default();
                            self.state = BlockState::Done;
                            return Progress::Failed {
                                error: CalcError::UnexpectedToken {
                                    expected: "`{`".into(),
                                    found: found.to_string(),
                                    span: Span::new(offset, offset + found.len()).into(),
                                },
                                rest: rest.to_string(),
                            };
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_over_several_lines() {
        let mut parser = BlockParser::new();
        assert_eq!(parser.feed(""), Progress::NeedMore);
        assert_eq!(parser.feed("{ const g = 9.81 m/s2"), Progress::NeedMore);
        assert_eq!(parser.state(), BlockState::Body);
        assert_eq!(parser.feed("  var h = 2 m }  "), Progress::Complete {
            value: vec!["const g = 9.81 m/s2".to_string(), "var h = 2 m".to_string()],
            rest: "  ".to_string(),
        });
    }

    #[test]
    fn test_missing_open_brace() {
        let mut parser = BlockParser::new();
        assert!(matches!(parser.feed("x = 1"), Progress::Failed { .. }));
    }
}
