//! WHERE-clause mini-language
//!
//! ```text
//! clauses    := term (AGGREGATOR term)*
//! term       := identifier OPERATOR value
//!             | identifier RANGE_OPERATOR value_list
//! identifier := [table '.'] name | function-call expression
//! value      := 'quoted literal' | bare-token
//! value_list := '(' value (',' value)* ')'      -- after IN
//!             | value AND value                  -- after BETWEEN
//! ```
//!
//! Input is split on whitespace with single-quoted substrings kept whole,
//! then driven through a small state machine ([`State`]) that produces one
//! [`Clause`] per boolean term.

use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;
use std::fmt;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    /// `<>` or `!=`
    Ne,
    Lt,
    Gt,
    Ge,
    Le,
    Like,
    Is,
    IsNot,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Like => "LIKE",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.to_uppercase().as_str() {
            "=" => Some(Operator::Eq),
            "<>" | "!=" => Some(Operator::Ne),
            "<" => Some(Operator::Lt),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "<=" => Some(Operator::Le),
            "LIKE" => Some(Operator::Like),
            "IS" => Some(Operator::Is),
            _ => None,
        }
    }
}

/// Operators taking more than one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOperator {
    Between,
    In,
}

impl RangeOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            RangeOperator::Between => "BETWEEN",
            RangeOperator::In => "IN",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.to_uppercase().as_str() {
            "BETWEEN" => Some(RangeOperator::Between),
            "IN" => Some(RangeOperator::In),
            _ => None,
        }
    }
}

/// Boolean connective placed before every clause but the first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    And,
    Or,
}

impl Aggregator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Aggregator::And => "AND",
            Aggregator::Or => "OR",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.to_uppercase().as_str() {
            "AND" => Some(Aggregator::And),
            "OR" => Some(Aggregator::Or),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl fmt::Display for RangeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseOperator {
    Comparison(Operator),
    Range(RangeOperator),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseValue {
    Scalar(DatabaseValue),
    List(Vec<DatabaseValue>),
}

/// One boolean term of a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub table: Option<String>,
    pub identifier: String,
    pub operator: ClauseOperator,
    pub value: ClauseValue,
    /// `None` for the first clause of a sequence
    pub aggregator: Option<Aggregator>,
}

impl Clause {
    /// A single-value comparison
    pub fn compare(
        table: Option<&str>,
        identifier: &str,
        operator: Operator,
        value: impl Into<DatabaseValue>,
    ) -> Self {
        Self {
            table: table.map(str::to_string),
            identifier: identifier.to_string(),
            operator: ClauseOperator::Comparison(operator),
            value: ClauseValue::Scalar(value.into()),
            aggregator: None,
        }
    }

    #[must_use]
    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Function-call identifiers are passed through verbatim
    pub fn is_function_call(&self) -> bool {
        is_function_call(&self.identifier)
    }
}

// any parenthesis counts, so `COUNT(o.Id)` is never split on its dot
fn is_function_call(identifier: &str) -> bool {
    identifier.contains('(')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Operator(Operator),
    Range(RangeOperator),
    Aggregator(Aggregator),
    Identifier,
}

impl TokenKind {
    fn classify(token: &str) -> Self {
        if let Some(op) = Operator::from_token(token) {
            TokenKind::Operator(op)
        } else if let Some(op) = RangeOperator::from_token(token) {
            TokenKind::Range(op)
        } else if let Some(agg) = Aggregator::from_token(token) {
            TokenKind::Aggregator(agg)
        } else {
            TokenKind::Identifier
        }
    }
}

/// What the parser accepts next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Identifier,
    /// Inside a function-call identifier with this many open parentheses
    FunctionCall(usize),
    Operator,
    Value,
    Aggregator,
    RangeList,
}

#[derive(Debug, Default)]
struct Term {
    identifier: String,
    operator: Option<ClauseOperator>,
    values: Vec<DatabaseValue>,
    aggregator: Option<Aggregator>,
    between_joined: bool,
}

impl Term {
    fn after(aggregator: Aggregator) -> Self {
        Self {
            aggregator: Some(aggregator),
            ..Self::default()
        }
    }

    fn is_between(&self) -> bool {
        self.operator == Some(ClauseOperator::Range(RangeOperator::Between))
    }

    fn finish(self, token: &str, position: usize) -> Result<Clause> {
        let operator = self
            .operator
            .ok_or_else(|| DatabaseError::parse("term has no operator", token, position))?;

        let value = match operator {
            ClauseOperator::Comparison(_) => {
                let mut values = self.values;
                if values.len() != 1 {
                    return Err(DatabaseError::parse("expected a single value", token, position));
                }
                ClauseValue::Scalar(values.remove(0))
            }
            ClauseOperator::Range(RangeOperator::Between) => {
                if self.values.len() != 2 || !self.between_joined {
                    return Err(DatabaseError::parse(
                        "BETWEEN expects two values joined by AND",
                        token,
                        position,
                    ));
                }
                ClauseValue::List(self.values)
            }
            ClauseOperator::Range(RangeOperator::In) => {
                if self.values.is_empty() {
                    return Err(DatabaseError::parse("IN expects at least one value", token, position));
                }
                ClauseValue::List(self.values)
            }
        };

        let (table, identifier) = if is_function_call(&self.identifier) {
            (None, self.identifier)
        } else {
            match self.identifier.split_once('.') {
                Some((table, name)) => (Some(table.to_string()), name.to_string()),
                None => (None, self.identifier),
            }
        };

        Ok(Clause {
            table,
            identifier,
            operator,
            value,
            aggregator: self.aggregator,
        })
    }
}

/// Split predicate text into tokens, keeping quoted substrings whole
///
/// Quotes are escaped either by doubling (`''`) or with a backslash; escape
/// sequences are left in the token and resolved when the literal is read.
pub fn tokenize(text: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            current.push(c);
            loop {
                match chars.next() {
                    None => {
                        return Err(DatabaseError::parse(
                            "unterminated quoted literal",
                            current,
                            tokens.len(),
                        ))
                    }
                    Some('\\') => {
                        current.push('\\');
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    }
                    Some('\'') => {
                        current.push('\'');
                        if chars.peek() == Some(&'\'') {
                            chars.next();
                            current.push('\'');
                        } else {
                            break;
                        }
                    }
                    Some(other) => current.push(other),
                }
            }
        } else if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Parse predicate text into an ordered clause sequence
pub fn parse(text: &str) -> Result<Vec<Clause>> {
    let tokens = tokenize(text)?;
    let mut clauses = Vec::new();
    let mut state = State::Identifier;
    let mut term = Term::default();

    for (position, token) in tokens.iter().enumerate() {
        let kind = TokenKind::classify(token);
        state = match state {
            State::Identifier => {
                if kind != TokenKind::Identifier {
                    return Err(DatabaseError::parse("expected identifier", token.as_str(), position));
                }
                term.identifier = token.clone();
                open_call(paren_balance(token), token, position)?
            }
            State::FunctionCall(depth) => {
                term.identifier.push(' ');
                term.identifier.push_str(token);
                open_call(depth as isize + paren_balance(token), token, position)?
            }
            State::Operator => match kind {
                TokenKind::Operator(op) => {
                    term.operator = Some(ClauseOperator::Comparison(op));
                    State::Value
                }
                TokenKind::Range(op) => {
                    term.operator = Some(ClauseOperator::Range(op));
                    State::RangeList
                }
                _ => return Err(DatabaseError::parse("expected operator", token.as_str(), position)),
            },
            State::Value => {
                let is_negation = term.operator == Some(ClauseOperator::Comparison(Operator::Is))
                    && token.eq_ignore_ascii_case("NOT");
                if is_negation {
                    term.operator = Some(ClauseOperator::Comparison(Operator::IsNot));
                    State::Value
                } else if kind == TokenKind::Identifier {
                    term.values.push(literal(token, position)?);
                    State::Aggregator
                } else {
                    return Err(DatabaseError::parse("expected value", token.as_str(), position));
                }
            }
            State::Aggregator => match kind {
                TokenKind::Aggregator(agg) => {
                    clauses.push(std::mem::replace(&mut term, Term::after(agg)).finish(token, position)?);
                    State::Identifier
                }
                _ => {
                    return Err(DatabaseError::parse(
                        "expected AND or OR",
                        token.as_str(),
                        position,
                    ))
                }
            },
            State::RangeList => match kind {
                TokenKind::Aggregator(Aggregator::And)
                    if term.is_between() && term.values.len() == 1 && !term.between_joined =>
                {
                    term.between_joined = true;
                    State::RangeList
                }
                TokenKind::Aggregator(agg) => {
                    clauses.push(std::mem::replace(&mut term, Term::after(agg)).finish(token, position)?);
                    State::Identifier
                }
                _ => {
                    term.values.extend(list_elements(token, position)?);
                    State::RangeList
                }
            },
        };
    }

    let last = tokens.last().map(String::as_str).unwrap_or_default();
    match state {
        State::Aggregator | State::RangeList => clauses.push(term.finish(last, tokens.len())?),
        State::Identifier if tokens.is_empty() => {}
        _ => return Err(DatabaseError::parse("unexpected end of input", last, tokens.len())),
    }
    Ok(clauses)
}

fn open_call(depth: isize, token: &str, position: usize) -> Result<State> {
    match depth {
        0 => Ok(State::Operator),
        d if d > 0 => Ok(State::FunctionCall(d as usize)),
        _ => Err(DatabaseError::parse("unbalanced parenthesis", token, position)),
    }
}

/// Open minus close parentheses outside quoted text
fn paren_balance(token: &str) -> isize {
    let mut quoted = false;
    let mut balance = 0;
    for c in token.chars() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => balance += 1,
            ')' if !quoted => balance -= 1,
            _ => {}
        }
    }
    balance
}

/// Values of a range-list token: split on commas, parentheses dropped
fn list_elements(token: &str, position: usize) -> Result<Vec<DatabaseValue>> {
    let mut raw = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '\'' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => raw.push(std::mem::take(&mut current)),
            '(' | ')' if !quoted => {}
            _ => current.push(c),
        }
    }
    raw.push(current);

    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| literal(s, position))
        .collect()
}

/// Read a value token: quoted text is always a string, bare tokens are typed
/// only when typing keeps their exact spelling
fn literal(token: &str, position: usize) -> Result<DatabaseValue> {
    if token.starts_with('\'') {
        return unquote(token)
            .map(DatabaseValue::String)
            .ok_or_else(|| DatabaseError::parse("malformed quoted literal", token, position));
    }

    let upper = token.to_uppercase();
    match upper.as_str() {
        "NULL" => return Ok(DatabaseValue::Null),
        "TRUE" => return Ok(DatabaseValue::Bool(true)),
        "FALSE" => return Ok(DatabaseValue::Bool(false)),
        _ => {}
    }

    // numbers only when their canonical spelling is the token itself, so
    // `007` or `1.50` still reach a text column unchanged
    if let Ok(v) = token.parse::<i64>() {
        if v.to_string() == token {
            return Ok(DatabaseValue::Long(v));
        }
    }
    if let Ok(v) = token.parse::<f64>() {
        if v.is_finite() && v.to_string() == token {
            return Ok(DatabaseValue::Double(v));
        }
    }
    Ok(DatabaseValue::String(token.to_string()))
}

fn unquote(token: &str) -> Option<String> {
    let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '\'' => {
                // only a doubled quote may appear inside
                if chars.next() != Some('\'') {
                    return None;
                }
                out.push('\'');
            }
            _ => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::type_map::DbType;

    fn scalar(clause: &Clause) -> &DatabaseValue {
        match &clause.value {
            ClauseValue::Scalar(v) => v,
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_two_terms() {
        let clauses = parse("a = 1 AND b = 2").unwrap();
        assert_eq!(clauses.len(), 2);

        assert_eq!(clauses[0].identifier, "a");
        assert_eq!(clauses[0].operator, ClauseOperator::Comparison(Operator::Eq));
        assert_eq!(scalar(&clauses[0]), &DatabaseValue::Long(1));
        assert_eq!(clauses[0].aggregator, None);

        assert_eq!(clauses[1].identifier, "b");
        assert_eq!(scalar(&clauses[1]), &DatabaseValue::Long(2));
        assert_eq!(clauses[1].aggregator, Some(Aggregator::And));
    }

    #[test]
    fn test_between() {
        let clauses = parse("age BETWEEN 1 AND 10").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(
            clauses[0].operator,
            ClauseOperator::Range(RangeOperator::Between)
        );
        assert_eq!(
            clauses[0].value,
            ClauseValue::List(vec![DatabaseValue::Long(1), DatabaseValue::Long(10)])
        );
    }

    #[test]
    fn test_between_followed_by_term() {
        let clauses = parse("age between 1 and 10 or name = 'x'").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[1].aggregator, Some(Aggregator::Or));
        assert_eq!(scalar(&clauses[1]), &DatabaseValue::from("x"));
    }

    #[test]
    fn test_in_list() {
        let clauses = parse("Status IN ('open', 'it''s done', 3) AND x = 1").unwrap();
        assert_eq!(
            clauses[0].value,
            ClauseValue::List(vec![
                DatabaseValue::from("open"),
                DatabaseValue::from("it's done"),
                DatabaseValue::Long(3),
            ])
        );
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn test_quoted_literal_with_spaces_and_escapes() {
        let clauses = parse(r"Name = 'Ann O\'Hara' OR Name LIKE 'A%'").unwrap();
        assert_eq!(scalar(&clauses[0]), &DatabaseValue::from("Ann O'Hara"));
        assert_eq!(
            clauses[1].operator,
            ClauseOperator::Comparison(Operator::Like)
        );
    }

    #[test]
    fn test_quoted_keyword_is_a_value() {
        let clauses = parse("Mode = 'AND'").unwrap();
        assert_eq!(scalar(&clauses[0]), &DatabaseValue::from("AND"));
    }

    #[test]
    fn test_table_prefix() {
        let clauses = parse("Orders.Total >= 10.5").unwrap();
        assert_eq!(clauses[0].table.as_deref(), Some("Orders"));
        assert_eq!(clauses[0].identifier, "Total");
        assert_eq!(scalar(&clauses[0]), &DatabaseValue::Double(10.5));
    }

    #[test]
    fn test_function_call_identifier() {
        let clauses = parse("(LOWER( c.Name )) = 'ann' AND COUNT(o.Id) > 2").unwrap();
        assert_eq!(clauses[0].identifier, "(LOWER( c.Name ))");
        assert_eq!(clauses[0].table, None);
        assert!(clauses[0].is_function_call());
        assert_eq!(clauses[1].identifier, "COUNT(o.Id)");
        assert_eq!(clauses[1].table, None);
    }

    #[test]
    fn test_is_null_and_is_not_null() {
        let clauses = parse("a IS NULL AND b IS NOT NULL").unwrap();
        assert_eq!(clauses[0].operator, ClauseOperator::Comparison(Operator::Is));
        assert_eq!(scalar(&clauses[0]), &DatabaseValue::Null);
        assert_eq!(
            clauses[1].operator,
            ClauseOperator::Comparison(Operator::IsNot)
        );
    }

    #[test]
    fn test_not_equal_spellings() {
        let a = parse("x <> 1").unwrap();
        let b = parse("x != 1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_errors() {
        for bad in [
            "a 1",
            "= 1",
            "a =",
            "a = 1 AND",
            "a = 1 b = 2",
            "a = 'open",
            "a BETWEEN 1",
            "a BETWEEN 1 2",
            "a IN",
            "COUNT(x = 1",
            "a) = 1",
            "a = AND",
        ] {
            assert!(
                matches!(parse(bad), Err(DatabaseError::Parse { .. })),
                "expected parse error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_bare_numbers_keep_their_spelling() {
        let clauses = parse("Code = 007 OR Code = 1.50 OR Code = 1e3 OR Code = +15 OR Code = -4").unwrap();
        let values: Vec<&DatabaseValue> = clauses.iter().map(scalar).collect();
        assert_eq!(
            values,
            vec![
                &DatabaseValue::from("007"),
                &DatabaseValue::from("1.50"),
                &DatabaseValue::from("1e3"),
                &DatabaseValue::from("+15"),
                &DatabaseValue::Long(-4),
            ]
        );

        // integer columns still get a number through the field type
        assert_eq!(DbType::Int.coerce(values[0].clone()), DatabaseValue::Long(7));
        assert_eq!(DbType::Varchar.coerce(values[1].clone()), DatabaseValue::from("1.50"));
    }

    #[test]
    fn test_tokenize_keeps_quotes() {
        let tokens = tokenize("Name = 'a b' AND x = ''''").unwrap();
        assert_eq!(tokens, vec!["Name", "=", "'a b'", "AND", "x", "=", "''''"]);
        assert_eq!(literal("''''", 0).unwrap(), DatabaseValue::from("'"));
    }
}
