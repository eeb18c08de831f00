//! Rendering bindings as declarations
//!
//! The listing is what `list` prints and `save` writes: every binding as a
//! command that declares it again, grouped by the scope it lives in.

use crate::quantity::format_value;
use crate::units::Unit;

use super::{Binding, Function, NamedItem, ScopeId, Scopes};

const INDENT: &str = "    ";

impl Scopes {
    /// Declarations visible from the current scope, innermost scope first
    pub fn listing(&self, precision: usize, include_builtin: bool) -> Vec<String> {
        let mut lines = Vec::new();
        for (id, env) in self.chain(self.current()) {
            if id == self.builtin() && !include_builtin {
                continue;
            }
            if env.is_empty() {
                continue;
            }
            lines.push(format!("// {} scope `{}`", kind_label(self, id), env.name));
            for binding in env.bindings() {
                self.render(binding, precision, "", &mut lines);
            }
        }
        lines
    }

    /// Declarations of a single scope, without header
    pub fn listing_of(&self, scope: ScopeId, precision: usize) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(env) = self.get(scope) {
            for binding in env.bindings() {
                self.render(binding, precision, "", &mut lines);
            }
        }
        lines
    }

    fn render(&self, binding: &Binding, precision: usize, indent: &str, lines: &mut Vec<String>) {
        let name = &binding.name;
        match &binding.item {
            NamedItem::Variable(value) => {
                lines.push(format!("{indent}var {} = {}", name, value.literal(precision)));
            }
            NamedItem::Constant(value) => {
                lines.push(format!("{indent}const {} = {}", name, value.literal(precision)));
            }
            NamedItem::Unit(unit) => {
                lines.push(format!("{indent}{}", unit_declaration(name, unit, precision)));
            }
            NamedItem::System(_) => lines.push(format!("{indent}system {}", name)),
            NamedItem::Function(function) => match function.as_ref() {
                Function::Native(native) => {
                    lines.push(format!("{indent}// native function {}", native.name));
                }
                Function::User(user) => {
                    let params: Vec<String> =
                        user.parameters.iter().map(|p| p.to_string()).collect();
                    lines.push(format!("{indent}func {}({}) {{", name, params.join(", ")));
                    for line in &user.body {
                        lines.push(format!("{indent}{INDENT}{}", line.trim()));
                    }
                    lines.push(format!("{indent}}}"));
                }
            },
            NamedItem::Namespace(child) => {
                lines.push(format!("{indent}namespace {} {{", name));
                if let Some(env) = self.get(*child) {
                    let nested = format!("{indent}{INDENT}");
                    for inner in env.bindings() {
                        self.render(inner, precision, &nested, lines);
                    }
                }
                lines.push(format!("{indent}}}"));
            }
        }
    }
}

fn kind_label(scopes: &Scopes, id: ScopeId) -> &'static str {
    match scopes.get(id).map(|env| env.kind) {
        Some(super::ScopeKind::Function) => "function",
        _ => "namespace",
    }
}

fn unit_declaration(name: &str, unit: &Unit, precision: usize) -> String {
    match unit {
        Unit::Base(_) => format!("unit {}", name),
        Unit::Convertible(c) => {
            let primary = if c.primary.is_dimensionless() {
                String::new()
            } else {
                format!(" {}", c.primary)
            };
            let mut line = format!(
                "unit {} = {}{}",
                name,
                format_value(c.scale, precision),
                primary
            );
            if c.offset != 0.0 {
                line.push_str(&format!(" // offset {}", format_value(c.offset, precision)));
            }
            line
        }
        other => format!("unit {} = {}", name, other),
    }
}
