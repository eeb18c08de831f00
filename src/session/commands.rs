//! Command dispatch
//!
//! ```text
//! line    := command (";" command)*
//! command := print expr ("," expr)*
//!          | (set | var | const) name "=" expr ["[" unit "]"]
//!          | name "=" expr ["[" unit "]"]
//!          | unit [System "."] name ["=" expr]
//!          | system name
//!          | func name "(" params ")" "{" body "}"
//!          | namespace name "{" commands "}"
//!          | list | clear | help
//!          | remove name
//!          | read file | save file
//!          | expr ["[" unit "]"]
//! ```
//!
//! Keywords are case-insensitive. A keyword followed by `=` is an ordinary
//! assignment, so `unit = 3` binds a variable named `unit`.

use tracing::debug;

use crate::decl::{FunctionDecl, FunctionParser, Progress, strip_comments};
use crate::diagnostics::{CalcError, Reporter};
use crate::env::{Function, NamedItem, Parameter, UserFunction};
use crate::eval::{
    Operand, parse_expression, parse_optional_converted_expression, parse_physical_unit,
    parse_qualified_identifier, unescape,
};
use crate::lexer::{Cursor, Span, TokenKind};
use crate::units::{Unit, UnitDefinition};

use super::Calculator;
use super::reader::{Construct, LineState, Pending};

const HELP: &[&str] = &[
    "print expr, ...          print values",
    "var x = expr [unit]      declare a variable in the current scope",
    "set x = expr, x = expr   assign a variable",
    "const c = expr           declare a constant",
    "unit [Sys.]name [= expr] declare a unit",
    "system name              declare a unit system",
    "func f(a [unit], b) { }  declare a function",
    "namespace n { }          declare or reopen a namespace",
    "list                     show every binding",
    "remove name              remove a binding",
    "clear                    remove every binding of the current scope",
    "read file                run a script",
    "save file                write every binding to a file",
    "expr [unit | System]     evaluate and print",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assign {
    Set,
    Var,
    Const,
}

/// Turn a parse result and its reporter into a `Result`
fn settle<T>(value: Option<T>, reporter: Reporter) -> Result<T, CalcError> {
    match value {
        Some(value) if !reporter.has_errors() => Ok(value),
        _ => Err(reporter.into_error().unwrap_or(CalcError::EmptyExpression)),
    }
}

fn identifier(text: &str) -> Result<(String, &str), CalcError> {
    let mut reporter = Reporter::new();
    let (name, rest) = parse_qualified_identifier(text, &mut reporter);
    settle(name, reporter).map(|name| (name, rest))
}

fn expect<'t>(text: &'t str, kind: TokenKind) -> Result<&'t str, CalcError> {
    let mut cursor = Cursor::new(text);
    if cursor.eat(kind).is_some() {
        return Ok(cursor.rest());
    }
    let (found, span) = match cursor.peek()? {
        Some(token) => (token.text.to_string(), token.span),
        None => ("end of line".to_string(), cursor.here()),
    };
    Err(CalcError::UnexpectedToken {
        expected: format!("`{}`", kind.as_str()),
        found,
        span: span.into(),
    })
}

/// A file name: a string literal or the bare text up to `;`
fn file_argument(text: &str) -> Result<(String, &str), CalcError> {
    let mut cursor = Cursor::new(text);
    if let Some(token) = cursor.eat(TokenKind::StringLit) {
        return Ok((unescape(token.text), cursor.rest()));
    }
    let end = text.find(';').unwrap_or(text.len());
    let name = text[..end].trim();
    if name.is_empty() {
        return Err(CalcError::UnexpectedToken {
            expected: "a file name".into(),
            found: "end of line".into(),
            span: Span::at(end).into(),
        });
    }
    Ok((name.to_string(), &text[end..]))
}

/// Text after the `;` that ends the current command, skipping strings
fn skip_command(text: &str) -> &str {
    let mut in_string = false;
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_string => {
                chars.next();
            }
            '"' => in_string = !in_string,
            ';' if !in_string => return &text[i + 1..],
            _ => {}
        }
    }
    ""
}

/// A keyword that takes no arguments must end its command
fn ends_command(next: Option<TokenKind>) -> bool {
    matches!(next, None | Some(TokenKind::Semi))
}

impl Calculator {
    /// Run one line of input. Declarations left open are kept in `state`
    /// for the next line.
    pub(crate) fn process_line(&mut self, state: &mut LineState, line: &str) -> Result<(), CalcError> {
        let mut reporter = Reporter::new();
        let mut text = line.to_string();

        if let Some(mut pending) = state.pending.take() {
            if state.comments.is_open() {
                match state.comments.scan(&text) {
                    Some(((), after)) => text = after.to_string(),
                    None => {
                        state.pending = Some(pending);
                        return Ok(());
                    }
                }
            }
            match pending.feed(&text) {
                Progress::NeedMore => {
                    state.pending = Some(pending);
                    return Ok(());
                }
                Progress::Complete { value, rest } => {
                    if let Err(error) = self.finish_construct(value) {
                        reporter.error(error);
                    }
                    text = rest;
                }
                Progress::Failed { error, rest } => {
                    reporter.error(error);
                    text = skip_command(&rest).to_string();
                }
            }
        }

        let stripped = strip_comments(&text, &mut state.comments);
        self.run_commands(state, &stripped, &mut reporter);
        reporter.finish(())
    }

    fn run_commands(&mut self, state: &mut LineState, text: &str, reporter: &mut Reporter) {
        let mut rest = text.to_string();
        loop {
            let command = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
            if command.is_empty() {
                return;
            }
            match self.command(state, command) {
                Ok(None) => return,
                Ok(Some(after)) => {
                    let after = after.trim_start();
                    if after.is_empty() {
                        return;
                    }
                    if let Some(next) = after.strip_prefix(';') {
                        rest = next.to_string();
                        continue;
                    }
                    let offset = command.len().saturating_sub(after.len());
                    let found = after.split_whitespace().next().unwrap_or_default();
                    reporter.error(CalcError::UnexpectedToken {
                        expected: "`;` or the end of the line".into(),
                        found: found.to_string(),
                        span: Span::new(offset, offset + found.len()).into(),
                    });
                    rest = skip_command(after).to_string();
                }
                Err(error) => {
                    reporter.error(error);
                    rest = skip_command(command).to_string();
                }
            }
        }
    }

    /// Run one command; returns the text after it, or `None` when a
    /// declaration continues on the next line
    fn command(&mut self, state: &mut LineState, text: &str) -> Result<Option<String>, CalcError> {
        let mut cursor = Cursor::new(text);
        let Some(first) = cursor.peek()? else {
            return Ok(Some(String::new()));
        };
        if first.kind != TokenKind::Ident {
            return self.expression_command(text);
        }

        let mut probe = cursor;
        if let Some(name) = probe.eat_dotted_name()? {
            if probe.eat(TokenKind::Eq).is_some() {
                return self.assign(&name, probe.rest(), Assign::Set);
            }
        }

        cursor.bump(&first);
        let args = cursor.rest();
        let next = cursor.peek_kind();
        match first.text.to_ascii_lowercase().as_str() {
            "print" => self.print(args),
            "set" => self.assign_command(args, Assign::Set),
            "var" => self.assign_command(args, Assign::Var),
            "const" => self.assign_command(args, Assign::Const),
            "unit" => self.unit_command(args),
            "system" => self.system_command(args),
            "func" => {
                let (name, rest) = identifier(args)?;
                self.begin(state, Pending::Function(FunctionParser::new(name)), rest)
            }
            "namespace" => {
                let (name, rest) = identifier(args)?;
                let pending = Pending::Block {
                    name,
                    parser: Default::default(),
                };
                self.begin(state, pending, rest)
            }
            "remove" => self.remove_command(args),
            "read" => {
                let (path, rest) = file_argument(args)?;
                self.call_script(&path, false)?;
                Ok(Some(rest.to_string()))
            }
            "save" => self.save_command(args),
            "list" if ends_command(next) => {
                let listing = self.listing();
                self.output.extend(listing);
                Ok(Some(args.to_string()))
            }
            "clear" if ends_command(next) => {
                self.scopes.clear();
                Ok(Some(args.to_string()))
            }
            "help" if ends_command(next) => {
                self.output.extend(HELP.iter().map(|line| line.to_string()));
                Ok(Some(args.to_string()))
            }
            _ => self.expression_command(text),
        }
    }

    /// Evaluate with an optional conversion suffix
    fn converted<'t>(&mut self, text: &'t str, follow: &[TokenKind]) -> Result<(Operand, &'t str), CalcError> {
        let mut reporter = Reporter::new();
        let (value, rest) = parse_optional_converted_expression(self, text, &mut reporter, follow);
        settle(value, reporter).map(|value| (value, rest))
    }

    fn expression_command(&mut self, text: &str) -> Result<Option<String>, CalcError> {
        let (value, rest) = self.converted(text, &[])?;
        if self.depth == 0 {
            self.output.push(value.format(self.config.precision));
        }
        self.last_value = Some(value);
        Ok(Some(rest.to_string()))
    }

    fn print(&mut self, args: &str) -> Result<Option<String>, CalcError> {
        if ends_command(Cursor::new(args).peek_kind()) {
            self.output.push(String::new());
            return Ok(Some(args.to_string()));
        }
        let mut parts = Vec::new();
        let mut rest = args;
        loop {
            let (value, after) = self.converted(rest, &[TokenKind::Comma])?;
            parts.push(value.format(self.config.precision));
            let mut cursor = Cursor::new(after);
            if cursor.eat(TokenKind::Comma).is_none() {
                self.output.push(parts.join(" "));
                return Ok(Some(after.to_string()));
            }
            rest = cursor.rest();
        }
    }

    fn assign_command(&mut self, args: &str, mode: Assign) -> Result<Option<String>, CalcError> {
        let (name, rest) = identifier(args)?;
        let rest = expect(rest, TokenKind::Eq)?;
        self.assign(&name, rest, mode)
    }

    fn assign(&mut self, name: &str, text: &str, mode: Assign) -> Result<Option<String>, CalcError> {
        let (value, rest) = self.converted(text, &[])?;
        match mode {
            Assign::Set => {
                self.scopes.variable_set(name, value)?;
            }
            Assign::Var => self.scopes.variable_declare(name, value)?,
            Assign::Const => self.scopes.constant_set(name, value)?,
        }
        Ok(Some(rest.to_string()))
    }

    /// `unit [System.]name [= expr]`.
    ///
    /// Units belong to their system in the registry, not to the scope that
    /// declared them: a unit declared in a function body or a `read` script
    /// stays usable after the call returns, through registry lookup. Only the
    /// name binding is local. `remove` deletes both.
    fn unit_command(&mut self, args: &str) -> Result<Option<String>, CalcError> {
        let (name, rest) = identifier(args)?;
        let (target, symbol) = match name.rsplit_once('.') {
            Some((system, symbol)) => (Some(self.system_named(system)?), symbol),
            None => (self.registry.system_defining(&name), name.as_str()),
        };

        let mut cursor = Cursor::new(rest);
        let (definition, rest) = if cursor.eat(TokenKind::Eq).is_some() {
            let mut reporter = Reporter::new();
            let (value, rest) = parse_expression(self, cursor.rest(), &mut reporter, &[]);
            let definition = match settle(value, reporter)? {
                Operand::Quantity(q) => UnitDefinition::Convertible {
                    primary: q.unit,
                    scale: q.value,
                    offset: 0.0,
                },
                Operand::Unit(unit) => UnitDefinition::Convertible {
                    primary: unit,
                    scale: 1.0,
                    offset: 0.0,
                },
                other => {
                    return Err(CalcError::InvalidOperand {
                        op: "unit".into(),
                        operand: other.describe(),
                    });
                }
            };
            (definition, rest)
        } else {
            (UnitDefinition::Base, rest)
        };

        let before = self.system_heads();
        let unit = self.registry.define_unit(target, symbol, symbol, definition)?;
        self.sync_systems(&before);
        self.scopes.unit_set(symbol, unit)?;
        Ok(Some(rest.to_string()))
    }

    fn system_command(&mut self, args: &str) -> Result<Option<String>, CalcError> {
        let (name, rest) = identifier(args)?;
        let id = self.registry.define_system(&name);
        self.scopes.system_set(&name, id)?;
        Ok(Some(rest.to_string()))
    }

    fn remove_command(&mut self, args: &str) -> Result<Option<String>, CalcError> {
        let (name, rest) = identifier(args)?;
        let symbol = name.rsplit('.').next().unwrap_or(&name);
        match self.scopes.remove(&name) {
            Ok(NamedItem::Unit(_)) => {
                self.registry.remove_unit(symbol);
            }
            Ok(_) => {}
            Err(CalcError::UnknownIdentifier { .. }) if self.registry.remove_unit(symbol) => {}
            Err(error) => return Err(error),
        }
        debug!(name = %name, "removed");
        Ok(Some(rest.to_string()))
    }

    fn save_command(&mut self, args: &str) -> Result<Option<String>, CalcError> {
        let (path, rest) = file_argument(args)?;
        let mut text = self
            .scopes
            .listing_of(self.scopes.root(), self.config.precision)
            .join("\n");
        text.push('\n');
        std::fs::write(&path, text).map_err(|e| CalcError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path, "saved bindings");
        Ok(Some(rest.to_string()))
    }

    /// Feed the rest of the line to a new declaration parser
    fn begin(&mut self, state: &mut LineState, mut pending: Pending, text: &str) -> Result<Option<String>, CalcError> {
        match pending.feed(text) {
            Progress::NeedMore => {
                state.pending = Some(pending);
                Ok(None)
            }
            Progress::Complete { value, rest } => {
                self.finish_construct(value)?;
                Ok(Some(rest))
            }
            Progress::Failed { error, .. } => Err(error),
        }
    }

    fn finish_construct(&mut self, construct: Construct) -> Result<(), CalcError> {
        match construct {
            Construct::Function(decl) => self.bind_function(decl),
            Construct::Block { name, lines } => self.run_block(&name, &lines),
        }
    }

    fn bind_function(&mut self, decl: FunctionDecl) -> Result<(), CalcError> {
        let mut parameters = Vec::with_capacity(decl.parameters.len());
        for parameter in decl.parameters {
            let unit = match &parameter.unit {
                Some(text) => Some(self.parameter_unit(text)?),
                None => None,
            };
            parameters.push(Parameter {
                name: parameter.name,
                unit,
            });
        }
        self.scopes.function_set(
            &decl.name,
            Function::User(UserFunction {
                name: decl.name.clone(),
                parameters,
                body: decl.body,
            }),
        )
    }

    fn parameter_unit(&self, text: &str) -> Result<Unit, CalcError> {
        let mut reporter = Reporter::new();
        let (unit, rest) = parse_physical_unit(self, text, &mut reporter);
        match unit {
            Some(unit) if rest.trim().is_empty() => Ok(unit),
            _ => Err(CalcError::UnknownUnit {
                name: text.to_string(),
            }),
        }
    }

    /// Run the lines of a `namespace` block inside the namespace
    fn run_block(&mut self, name: &str, lines: &[String]) -> Result<(), CalcError> {
        let scope = self.scopes.namespace(name)?;
        let previous = self.scopes.set_current(scope);
        let saved = self.last_value.take();

        let result = self.run_lines(lines, false);

        self.last_value = saved;
        self.scopes.set_current(previous);
        result.map(|_| ())
    }
}
