//! The calculator session: unit registry, scopes and configuration

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::CalculatorConfig;
use crate::diagnostics::{CalcError, Reporter};
use crate::env::{Function, ItemKind, NamedItem, Resolved, ScopeKind, Scopes, UserFunction, install_natives};
use crate::eval::{EvalContext, Operand, parse_optional_converted_expression};
use crate::lexer::{Cursor, TokenKind};
use crate::units::{SystemId, Unit, UnitRegistry};

use super::reader::{CommandReader, LineState, LinesInput, read_source};

/// Nested function calls and script reads allowed at once
pub const MAX_CALL_DEPTH: usize = 64;

/// Extension tried when a script is named without one
pub const SCRIPT_EXTENSION: &str = "pc";

pub struct Calculator {
    pub(crate) registry: UnitRegistry,
    pub(crate) scopes: Scopes,
    pub(crate) config: CalculatorConfig,
    /// Lines printed by commands, until taken
    pub(crate) output: Vec<String>,
    /// Active function calls
    pub(crate) depth: usize,
    /// Value of the last bare expression, the result of a function body
    pub(crate) last_value: Option<Operand>,
    /// Multi-line state for [`Calculator::run_line`]
    line_state: LineState,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new(CalculatorConfig::default())
    }
}

impl Calculator {
    pub fn new(config: CalculatorConfig) -> Self {
        let registry = UnitRegistry::with_builtin_systems(config.imperial);
        let mut scopes = Scopes::new();
        install_natives(&mut scopes);
        for system in registry.systems() {
            scopes.set_builtin(&system.name, NamedItem::System(system.id));
        }
        Self {
            registry,
            scopes,
            config,
            output: Vec::new(),
            depth: 0,
            last_value: None,
            line_state: LineState::default(),
        }
    }

    /// A session that has run the configured startup scripts
    pub fn with_startup(config: CalculatorConfig) -> Result<Self, CalcError> {
        let scripts = config.startup_scripts.clone();
        let mut calc = Self::new(config);
        for script in &scripts {
            calc.run_file(script)?;
        }
        Ok(calc)
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn precision(&self) -> usize {
        self.config.precision
    }

    /// Lines printed since the last call
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Value of a variable or constant
    pub fn variable(&self, name: &str) -> Option<Operand> {
        self.scopes.variable_get(name)
    }

    /// Every binding visible from the current scope, as declarations
    pub fn listing(&self) -> Vec<String> {
        self.scopes.listing(self.config.precision, false)
    }

    /// Evaluate one expression, with an optional `[unit]` suffix
    pub fn evaluate(&mut self, expression: &str) -> Result<Operand, CalcError> {
        let mut reporter = Reporter::new();
        let (value, rest) = parse_optional_converted_expression(self, expression, &mut reporter, &[]);
        let value = match value {
            Some(value) if !reporter.has_errors() => value,
            _ => return Err(reporter.into_error().unwrap_or(CalcError::EmptyExpression)),
        };

        let mut cursor = Cursor::new(rest);
        cursor.eat(TokenKind::Semi);
        match cursor.peek()? {
            None => Ok(value),
            Some(token) => Err(CalcError::UnexpectedToken {
                expected: "the end of the expression".into(),
                found: token.text.to_string(),
                span: token.span.into(),
            }),
        }
    }

    /// Run one line of commands and return what it printed. A declaration
    /// left open continues on the next call.
    pub fn run_line(&mut self, line: &str) -> Result<Vec<String>, CalcError> {
        let mut state = std::mem::take(&mut self.line_state);
        let result = self.process_line(&mut state, line);
        self.line_state = state;
        // on failure the output stays buffered for take_output
        result.map(|()| self.take_output())
    }

    /// Run a script in the current scope
    pub fn run_script(&mut self, text: &str) -> Result<Vec<String>, CalcError> {
        let mut reader = CommandReader::new(LinesInput::from_text(text));
        self.run_reader(&mut reader)
    }

    /// Run a script file in the current scope
    pub fn run_file(&mut self, path: &Path) -> Result<Vec<String>, CalcError> {
        let mut reader = CommandReader::new(LinesInput::from_file(path)?);
        debug!(path = %path.display(), "running script");
        self.run_reader(&mut reader)
    }

    fn run_reader(&mut self, reader: &mut CommandReader<LinesInput>) -> Result<Vec<String>, CalcError> {
        let mut output = Vec::new();
        let mut errors = Reporter::new();
        reader.run(self, |outcome| {
            output.extend(outcome.output);
            if let Some(error) = outcome.error {
                warn!(line = outcome.line_number, %error, "script error");
                errors.error(error);
            }
        });
        errors.finish(output)
    }

    // ---- calls ---------------------------------------------------------

    /// Run `body` in a fresh function scope below the current one
    pub(crate) fn in_call_scope<T>(
        &mut self,
        name: &str,
        body: impl FnOnce(&mut Self) -> Result<T, CalcError>,
    ) -> Result<T, CalcError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(CalcError::RecursionLimit {
                limit: MAX_CALL_DEPTH,
            });
        }
        let scope = self.scopes.push(name, ScopeKind::Function);
        let saved = self.last_value.take();
        self.depth += 1;

        let result = body(self);

        self.depth -= 1;
        self.last_value = saved;
        self.scopes.pop(scope);
        result
    }

    /// Replay lines as commands; returns the value of the last bare
    /// expression
    pub(crate) fn run_lines<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        stop_on_error: bool,
    ) -> Result<Option<Operand>, CalcError> {
        self.last_value = None;
        let mut state = LineState::default();
        let mut errors = Reporter::new();
        for line in lines {
            if let Err(error) = self.process_line(&mut state, line.as_ref()) {
                if stop_on_error {
                    return Err(error);
                }
                warn!(%error, "script error");
                errors.error(error);
            }
        }
        if let Some(construct) = state.unterminated() {
            errors.error(CalcError::UnterminatedConstruct { construct });
        }
        errors.finish(self.last_value.take())
    }

    fn call_user(&mut self, function: &UserFunction, args: Vec<Operand>) -> Result<Operand, CalcError> {
        let mut bound = Vec::with_capacity(args.len());
        for (parameter, arg) in function.parameters.iter().zip(args) {
            let mismatch = |unit: &Unit| CalcError::ParameterUnit {
                function: function.name.clone(),
                parameter: parameter.name.clone(),
                unit: unit.to_string(),
            };
            let value = match (&parameter.unit, arg) {
                (None, arg) => arg,
                (Some(unit), Operand::Quantity(q)) => Operand::Quantity(
                    q.convert_to(&self.registry, unit)
                        .map_err(|_| mismatch(unit))?,
                ),
                (Some(unit), _) => return Err(mismatch(unit)),
            };
            bound.push((parameter.name.as_str(), value));
        }

        debug!(function = %function.name, args = bound.len(), "calling function");
        self.in_call_scope(&function.name, |calc| {
            for (name, value) in bound {
                calc.scopes.variable_declare(name, value)?;
            }
            calc.run_lines(&function.body, true)?
                .ok_or_else(|| CalcError::NoResult {
                    name: function.name.clone(),
                })
        })
    }

    /// Run a script file as a function without parameters
    pub(crate) fn call_script(&mut self, name: &str, stop_on_error: bool) -> Result<Option<Operand>, CalcError> {
        let path = script_path(name)?;
        let text = read_source(&path)?;
        debug!(script = %path.display(), "reading script");
        let lines: Vec<&str> = text.lines().collect();
        self.in_call_scope(name, |calc| calc.run_lines(&lines, stop_on_error))
    }

    // ---- unit systems --------------------------------------------------

    /// Current layers of every system, to pass to [`Calculator::sync_systems`]
    pub(crate) fn system_heads(&self) -> Vec<SystemId> {
        self.registry.systems().map(|s| s.id).collect()
    }

    /// Point system bindings at the layers that replaced them
    pub(crate) fn sync_systems(&mut self, before: &[SystemId]) {
        let after = self.system_heads();
        for old in before.iter().filter(|id| !after.contains(id)) {
            if let Some(new) = after.iter().find(|&&head| self.registry.is_ancestor(*old, head)) {
                debug!(old = %old, new = %new, "rebinding unit system");
                self.scopes.rebind_system(*old, *new);
            }
        }
    }

    /// The system a name refers to, through the environment or by name
    pub(crate) fn system_named(&self, name: &str) -> Result<SystemId, CalcError> {
        match self.scopes.find_qualified(name) {
            Some(Resolved::Item { binding, .. }) => match binding.item {
                NamedItem::System(id) => Ok(id),
                ref other => Err(CalcError::KindClash {
                    name: binding.name.clone(),
                    existing: other.kind().to_string(),
                    requested: ItemKind::System.to_string(),
                }),
            },
            _ => self
                .registry
                .system_by_name(name)
                .ok_or_else(|| CalcError::UnknownIdentifier {
                    name: name.to_string(),
                }),
        }
    }
}

/// `name` as given, or with the script extension added
fn script_path(name: &str) -> Result<PathBuf, CalcError> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Ok(path);
    }
    let with_extension = path.with_extension(SCRIPT_EXTENSION);
    if path.extension().is_none() && with_extension.is_file() {
        return Ok(with_extension);
    }
    Err(CalcError::MissingScript {
        path: name.to_string(),
    })
}

impl EvalContext for Calculator {
    fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    fn identifier_item(&self, name: &str) -> Option<ItemKind> {
        self.scopes
            .find_identifier(name)
            .map(|(_, binding)| binding.item.kind())
    }

    fn qualified_item(&self, name: &str) -> Option<ItemKind> {
        match self.scopes.find_qualified(name)? {
            Resolved::Item { binding, .. } => Some(binding.item.kind()),
            Resolved::SystemMember { system, member } => self
                .registry
                .lookup_in_system(system, member)
                .map(|_| ItemKind::Unit),
        }
    }

    fn variable_value(&self, name: &str) -> Option<Operand> {
        self.scopes.variable_get(name)
    }

    /// Units bound in the environment first, then the registry. Another
    /// kind of item hides a unit only when its name matches exactly, so a
    /// variable `M` does not hide the unit `m`.
    fn unit(&self, name: &str) -> Option<Unit> {
        match self.scopes.find_qualified(name) {
            Some(Resolved::Item { binding, .. }) => match &binding.item {
                NamedItem::Unit(unit) => Some(unit.clone()),
                _ if binding.name == name => None,
                _ => self.registry.lookup(name),
            },
            Some(Resolved::SystemMember { system, member }) => {
                self.registry.lookup_in_system(system, member)
            }
            None if name.contains('.') => None,
            None => self.registry.lookup(name),
        }
    }

    fn call_function(&mut self, name: &str, args: Vec<Operand>) -> Result<Operand, CalcError> {
        let function = self
            .scopes
            .function_find(name)
            .ok_or_else(|| CalcError::NotCallable {
                name: name.to_string(),
            })?;
        function.check_arity(args.len())?;
        match function.as_ref() {
            Function::Native(native) => (native.call)(&args, &self.registry),
            Function::User(user) => self.call_user(user, args),
        }
    }

    fn read_script(&mut self, name: &str) -> Result<Operand, CalcError> {
        self.call_script(name, true)?
            .ok_or_else(|| CalcError::NoResult {
                name: name.to_string(),
            })
    }
}
