//! Interactive front end

use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::history::{DefaultHistory, History};
use rustyline::{Config, Editor};
use tracing::warn;

use crate::diagnostics::CalcError;

use super::Calculator;
use super::reader::{CommandReader, LineInput};

/// Prompt shown while a declaration is still open
pub const CONTINUATION_PROMPT: &str = "... ";

/// Line input from the terminal
struct EditorInput {
    editor: Editor<(), DefaultHistory>,
    prompt: String,
}

impl LineInput for EditorInput {
    fn next_line(&mut self, continuation: bool) -> Option<String> {
        let prompt = if continuation {
            CONTINUATION_PROMPT
        } else {
            self.prompt.as_str()
        };
        loop {
            match self.editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                            warn!(%err, "could not record history entry");
                        }
                    }
                    return Some(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => return None,
                Err(err) => {
                    warn!(%err, "terminal input failed");
                    return None;
                }
            }
        }
    }
}

/// Write the history file; failures are logged, not fatal
fn save_history(history: &mut DefaultHistory, path: &Path) -> bool {
    match history.save(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, path = %path.display(), "could not save history");
            false
        }
    }
}

pub struct Repl {
    reader: CommandReader<EditorInput>,
    history: Option<PathBuf>,
}

impl Repl {
    pub fn new(prompt: &str, history: Option<PathBuf>) -> Result<Self, CalcError> {
        let config = Config::builder().history_ignore_space(true).build();
        let mut editor: Editor<(), DefaultHistory> =
            Editor::with_config(config).map_err(|e| CalcError::Io {
                path: "terminal".into(),
                reason: e.to_string(),
            })?;
        if let Some(ref path) = history {
            // absent on the first run
            let _ = editor.load_history(path);
        }
        Ok(Self {
            reader: CommandReader::new(EditorInput {
                editor,
                prompt: prompt.to_string(),
            }),
            history,
        })
    }

    /// Read commands until end of input; returns the number of failed lines
    pub fn run(&mut self, calc: &mut Calculator) -> usize {
        println!(
            "pcalc {} - type `help` for commands, Ctrl-D to quit",
            env!("CARGO_PKG_VERSION")
        );
        let failures = self.reader.run(calc, |outcome| {
            for line in outcome.output {
                println!("{}", line);
            }
            if let Some(error) = outcome.error {
                eprintln!("{:?}", miette::Report::new(error));
            }
        });

        if let Some(ref path) = self.history {
            save_history(self.reader.input_mut().editor.history_mut(), path);
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_history_reports_failure() {
        let mut history = DefaultHistory::new();
        history.add("1 m + 2 m").unwrap();

        let missing = std::env::temp_dir()
            .join(format!("physcalc_no_such_dir_{}", std::process::id()))
            .join("history.txt");
        assert!(!save_history(&mut history, &missing));

        let path = std::env::temp_dir().join(format!("physcalc_history_{}.txt", std::process::id()));
        assert!(save_history(&mut history, &path));
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }
}
