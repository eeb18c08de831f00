//! Declarations that may span several input lines
//!
//! Each parser is a value that is fed one line at a time and reports
//! whether it needs more input. The caller keeps the parser between lines,
//! so nothing about an unfinished declaration lives in the environment.

mod block;
mod body;
mod comment;
mod function;

pub use block::{BlockParser, BlockState};
pub use comment::{CommentStack, strip_comments};
pub use function::{FunctionDecl, FunctionParser, FunctionState, ParameterDecl};

use crate::diagnostics::CalcError;

/// Result of feeding a line to a declaration parser
#[derive(Debug, Clone, PartialEq)]
pub enum Progress<T> {
    /// The line ended inside the construct
    NeedMore,
    /// The construct is finished; `rest` is the text after it
    Complete { value: T, rest: String },
    Failed { error: CalcError, rest: String },
}

impl<T> Progress<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Progress::NeedMore)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Progress<U> {
        match self {
            Progress::NeedMore => Progress::NeedMore,
            Progress::Complete { value, rest } => Progress::Complete {
                value: f(value),
                rest,
            },
            Progress::Failed { error, rest } => Progress::Failed { error, rest },
        }
    }
}
