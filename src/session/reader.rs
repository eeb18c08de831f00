//! Line sources and the command reader
//!
//! A [`CommandReader`] pulls lines from a [`LineInput`] and hands them to
//! the calculator one at a time. Declarations that are still open at the
//! end of a line are carried in a [`LineState`] until a later line closes
//! them.

use std::path::Path;

use tracing::debug;

use crate::decl::{BlockParser, CommentStack, FunctionDecl, FunctionParser, Progress};
use crate::diagnostics::CalcError;

use super::Calculator;

/// Declaration waiting for more lines
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    Function(FunctionParser),
    Block { name: String, parser: BlockParser },
}

/// A finished multi-line declaration
#[derive(Debug, Clone)]
pub(crate) enum Construct {
    Function(FunctionDecl),
    Block { name: String, lines: Vec<String> },
}

impl Pending {
    pub(crate) fn feed(&mut self, line: &str) -> Progress<Construct> {
        match self {
            Pending::Function(parser) => parser.feed(line).map(Construct::Function),
            Pending::Block { name, parser } => {
                let name = name.clone();
                parser.feed(line).map(|lines| Construct::Block { name, lines })
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Pending::Function(parser) => format!("function `{}`", parser.name()),
            Pending::Block { name, .. } => format!("namespace `{}`", name),
        }
    }
}

/// What a line left open for the next one
#[derive(Debug, Default)]
pub struct LineState {
    pub(crate) pending: Option<Pending>,
    /// Block comments opened outside any declaration
    pub(crate) comments: CommentStack<()>,
}

impl LineState {
    /// The next line continues an earlier one
    pub fn is_pending(&self) -> bool {
        self.pending.is_some() || self.comments.is_open()
    }

    /// Description of what is still open, if anything
    pub fn unterminated(&self) -> Option<String> {
        match &self.pending {
            Some(pending) => Some(pending.describe()),
            None if self.comments.is_open() => Some("comment".to_string()),
            None => None,
        }
    }
}

/// Source of command lines
pub trait LineInput {
    /// Next line, or `None` at the end of input. `continuation` is set when
    /// the line continues an unfinished declaration.
    fn next_line(&mut self, continuation: bool) -> Option<String>;
}

/// Lines from text already in memory or from a file
pub struct LinesInput {
    lines: Box<dyn Iterator<Item = String>>,
}

impl LinesInput {
    pub fn new(lines: impl IntoIterator<Item = String> + 'static) -> Self {
        Self {
            lines: Box::new(lines.into_iter()),
        }
    }

    pub fn from_text(text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        Self::new(lines)
    }

    pub fn from_file(path: &Path) -> Result<Self, CalcError> {
        Ok(Self::from_text(&read_source(path)?))
    }
}

/// Read a script; a missing file is reported as such
pub(crate) fn read_source(path: &Path) -> Result<String, CalcError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CalcError::MissingScript {
            path: path.display().to_string(),
        },
        _ => CalcError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        },
    })
}

impl LineInput for LinesInput {
    fn next_line(&mut self, _continuation: bool) -> Option<String> {
        self.lines.next()
    }
}

/// Result of running one input line
#[derive(Debug)]
pub struct LineOutcome {
    /// 1-based
    pub line_number: usize,
    pub output: Vec<String>,
    pub error: Option<CalcError>,
}

pub struct CommandReader<I: LineInput> {
    input: I,
    state: LineState,
    line_number: usize,
}

impl<I: LineInput> CommandReader<I> {
    pub fn new(input: I) -> Self {
        Self {
            input,
            state: LineState::default(),
            line_number: 0,
        }
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Run every line of the input; returns the number of lines that failed
    pub fn run(&mut self, calc: &mut Calculator, mut on_line: impl FnMut(LineOutcome)) -> usize {
        let mut failures = 0;
        while let Some(line) = self.input.next_line(self.state.is_pending()) {
            self.line_number += 1;
            let result = calc.process_line(&mut self.state, &line);
            let error = result.err();
            failures += usize::from(error.is_some());
            on_line(LineOutcome {
                line_number: self.line_number,
                output: calc.take_output(),
                error,
            });
        }

        if let Some(construct) = self.state.unterminated() {
            debug!(construct = %construct, "input ended inside a declaration");
            self.state = LineState::default();
            failures += 1;
            on_line(LineOutcome {
                line_number: self.line_number,
                output: Vec::new(),
                error: Some(CalcError::UnterminatedConstruct { construct }),
            });
        }
        failures
    }
}
