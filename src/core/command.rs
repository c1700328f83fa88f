//! Backend-neutral SQL commands
//!
//! A [`Command`] is SQL text with positional placeholders plus the ordered
//! [`Parameter`]s bound to them.

use super::type_map::DbType;
use super::value::DatabaseValue;

/// A bound parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Informational only; binding is positional
    pub name: String,
    /// Domain type, `None` when the value came from predicate text
    pub db_type: Option<DbType>,
    pub value: DatabaseValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, db_type: Option<DbType>, value: DatabaseValue) -> Self {
        Self {
            name: name.into(),
            db_type,
            value,
        }
    }
}

/// SQL text and its parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    text: String,
    parameters: Vec<Parameter>,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(text: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            text: text.into(),
            parameters,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Parameter values in binding order
    pub fn values(&self) -> Vec<DatabaseValue> {
        self.parameters.iter().map(|p| p.value.clone()).collect()
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> &mut Self {
        self.parameters.push(parameter);
        self
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)?;
        if !self.parameters.is_empty() {
            let values: Vec<String> = self
                .parameters
                .iter()
                .map(|p| format!("{}={}", p.name, p.value))
                .collect();
            write!(f, " -- [{}]", values.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_parameters() {
        let mut command = Command::new("SELECT * FROM t WHERE a = ? AND b = ?");
        command
            .add_parameter(Parameter::new("a", None, "x".into()))
            .add_parameter(Parameter::new("b", Some(DbType::Int), 3.into()));

        assert_eq!(
            command.to_string(),
            "SELECT * FROM t WHERE a = ? AND b = ? -- [a='x', b=3]"
        );
        assert_eq!(command.values(), vec!["x".into(), DatabaseValue::Int(3)]);
    }

    #[test]
    fn test_literal_command() {
        let command = Command::new("DELETE FROM t");
        assert!(!command.has_parameters());
        assert_eq!(command.to_string(), "DELETE FROM t");
    }
}
