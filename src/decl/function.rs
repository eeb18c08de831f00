//! Resumable `func` declaration parser
//!
//! ```text
//! func name ( [param ("," param)*] ) { body }
//! param := identifier ["[" unit "]"]
//! ```
//!
//! A declaration may span any number of lines. The parser keeps its state
//! between calls to [`FunctionParser::feed`]; the line source supplies the
//! next line whenever the result is [`Progress::NeedMore`].

use tracing::debug;

use crate::diagnostics::CalcError;
use crate::lexer::{Cursor, Span, TokenKind};

use super::Progress;
use super::body::{BodyScanner, BodyStep};
use super::comment::{BLOCK_COMMENT_START, CommentStack, LINE_COMMENT};

/// Where the parser is in a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionState {
    /// Expecting `(`
    ParameterList,
    /// Expecting the first parameter or `)`
    Parameters,
    /// Expecting a parameter after `,`
    Parameter,
    /// After a parameter: `[unit]`, `,` or `)`
    ParametersOptional,
    /// Expecting `{`
    BlockOpen,
    /// Inside the body
    Body,
    Done,
}

/// Parameter as written; the unit is resolved when the function is bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDecl {
    pub name: String,
    pub unit: Option<String>,
}

/// Parsed `func` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<ParameterDecl>,
    pub body: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionParser {
    name: String,
    state: FunctionState,
    parameters: Vec<ParameterDecl>,
    body: BodyScanner,
    comments: CommentStack<FunctionState>,
}

impl FunctionParser {
    /// Start parsing the declaration of `name`; the text after the name is
    /// the first thing to feed
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: FunctionState::ParameterList,
            parameters: Vec::new(),
            body: BodyScanner::default(),
            comments: CommentStack::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> FunctionState {
        self.state
    }

    pub fn in_comment(&self) -> bool {
        self.comments.is_open()
    }

    /// Consume one line (or the rest of one)
    pub fn feed(&mut self, line: &str) -> Progress<FunctionDecl> {
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

            if self.state == FunctionState::Body {
                match self.body.scan(rest) {
                    BodyStep::LineEnd => return Progress::NeedMore,
                    BodyStep::Comment(after) => {
                        self.comments.open(BLOCK_COMMENT_START, FunctionState::Body);
                        rest = after;
                        continue;
                    }
                    BodyStep::Closed(after) => {
                        self.state = FunctionState::Done;
                        let decl = FunctionDecl {
                            name: self.name.clone(),
                            parameters: std::mem::take(&mut self.parameters),
                            body: std::mem::take(&mut self.body).into_lines(),
                        };
                        debug!(name = %decl.name, lines = decl.body.len(), "function declared");
                        return Progress::Complete {
                            value: decl,
                            rest: after.to_string(),
                        };
                    }
                }
            }

            rest = rest.trim_start();
            if rest.is_empty() || rest.starts_with(LINE_COMMENT) {
                return Progress::NeedMore;
            }
            if let Some(after) = rest.strip_prefix(BLOCK_COMMENT_START) {
                self.comments.open(BLOCK_COMMENT_START, self.state);
                rest = after;
                continue;
            }

            match self.header_step(line, rest) {
                Ok(after) => rest = after,
                Err(error) => {
                    self.state = FunctionState::Done;
                    return Progress::Failed {
                        error,
                        rest: rest.to_string(),
                    };
                }
            }
        }
    }

    /// Consume one header token from `rest` (a suffix of `line`)
    fn header_step<'t>(&mut self, line: &str, rest: &'t str) -> Result<&'t str, CalcError> {
        let offset = line.len() - rest.len();
        let unexpected = |expected: &str| {
            let found = rest.split_whitespace().next().unwrap_or_default();
            CalcError::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
                span: Span::new(offset, offset + found.len()).into(),
            }
        };
        let mut chars = rest.chars();
        let first = chars.next();

        match (self.state, first) {
            (FunctionState::ParameterList, Some('(')) => {
                self.state = FunctionState::Parameters;
                Ok(chars.as_str())
            }
            (FunctionState::ParameterList, _) => Err(unexpected("`(`")),

            (FunctionState::Parameters, Some(')')) => {
                self.state = FunctionState::BlockOpen;
                Ok(chars.as_str())
            }
            (FunctionState::Parameters | FunctionState::Parameter, _) => {
                let mut cursor = Cursor::new(rest);
                match cursor.peek() {
                    Ok(Some(token)) if token.kind == TokenKind::Ident => {
                        cursor.bump(&token);
                        self.add_parameter(token.text)?;
                        self.state = FunctionState::ParametersOptional;
                        Ok(cursor.rest())
                    }
                    _ => Err(unexpected("a parameter name")),
                }
            }

            (FunctionState::ParametersOptional, Some('[')) => {
                let inner = chars.as_str();
                let Some(close) = inner.find(']') else {
                    return Err(CalcError::MissingCloser {
                        closer: "]".into(),
                        span: Span::at(line.len()).into(),
                    });
                };
                let unit = inner[..close].trim();
                match self.parameters.last_mut() {
                    Some(parameter) if parameter.unit.is_none() && !unit.is_empty() => {
                        parameter.unit = Some(unit.to_string());
                        Ok(&inner[close + 1..])
                    }
                    _ => Err(unexpected("`,` or `)`")),
                }
            }
            (FunctionState::ParametersOptional, Some(',')) => {
                self.state = FunctionState::Parameter;
                Ok(chars.as_str())
            }
            (FunctionState::ParametersOptional, Some(')')) => {
                self.state = FunctionState::BlockOpen;
                Ok(chars.as_str())
            }
            (FunctionState::ParametersOptional, _) => Err(unexpected("`,` or `)`")),

            (FunctionState::BlockOpen, Some('{')) => {
                self.state = FunctionState::Body;
                self.body.open();
                Ok(chars.as_str())
            }
            (FunctionState::BlockOpen, _) => Err(unexpected("`{`")),

            (FunctionState::Body | FunctionState::Done, _) => Err(unexpected("the end of the declaration")),
        }
    }

    fn add_parameter(&mut self, name: &str) -> Result<(), CalcError> {
        if self
            .parameters
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
        {
            return Err(CalcError::KindClash {
                name: name.to_string(),
                existing: "parameter".into(),
                requested: "parameter".into(),
            });
        }
        self.parameters.push(ParameterDecl {
            name: name.to_string(),
            unit: None,
        });
        Ok(())
    }
}
