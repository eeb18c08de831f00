//! Calculator sessions
//!
//! A [`Calculator`] ties the unit registry and the scopes together, runs
//! commands and implements [`crate::eval::EvalContext`] for the evaluator.
//! [`CommandReader`] feeds it lines from scripts or the terminal.

mod calculator;
mod commands;
mod reader;
mod repl;

pub use calculator::{Calculator, MAX_CALL_DEPTH, SCRIPT_EXTENSION};
pub use reader::{CommandReader, LineInput, LineOutcome, LineState, LinesInput};
pub use repl::{CONTINUATION_PROMPT, Repl};
