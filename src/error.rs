//! Error types for lexing, building and evaluating.
//!
//! Every user-facing error carries a [`Position`] so callers can print the
//! offending source line with a caret under the token that caused it.

use crate::lexer::Token;
use std::fmt;
use thiserror::Error;

/// Where an error happened in the session source.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// The offending text (a token, or the first unmatched character).
    pub text: String,
    /// Byte offset in the session source.
    pub index: usize,
    pub line: usize,
    pub column: usize,
    /// The full source line containing the offending text.
    pub source_line: String,
}

impl Position {
    pub fn at(source: &str, index: usize, line: usize, column: usize, text: &str) -> Self {
        let index = index.min(source.len());
        let start = source[..index].rfind('\n').map_or(0, |i| i + 1);
        let end = source[index..].find('\n').map_or(source.len(), |i| index + i);
        Self {
            text: text.to_string(),
            index,
            line,
            column,
            source_line: source[start..end].trim_end_matches('\r').to_string(),
        }
    }

    pub fn of(source: &str, token: &Token) -> Self {
        Self::at(source, token.index, token.line, token.column, &token.text)
    }

    /// The source line followed by a marker line pointing at the offending text.
    pub fn caret(&self) -> String {
        let offset = self.column.saturating_sub(1);
        let remaining = self.source_line.chars().count().saturating_sub(offset);
        let width = self.text.chars().count().clamp(1, remaining.max(1));
        format!(
            "{}\n{}{}",
            self.source_line,
            " ".repeat(offset),
            "^".repeat(width)
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// Input that cannot be shaped into a valid construct.
    Syntax,
    /// Unknown variable or function, or a call with the wrong number of arguments.
    Name,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({position})")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub position: Position,
}

impl SyntaxError {
    pub fn new(kind: SyntaxErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EvaluationErrorKind {
    /// An operand or exponent exceeded the configured limits.
    OutOfRange,
    DivisionByZero,
    /// The result is not a real number, e.g. `log(0)`.
    Domain,
}

/// A runtime arithmetic violation, positioned at the operator or call that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({position})")]
pub struct EvaluationError {
    pub kind: EvaluationErrorKind,
    pub message: String,
    pub position: Position,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MathError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// An invariant of the engine was violated. Not caused by user input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MathError {
    pub fn position(&self) -> Option<&Position> {
        match self {
            MathError::Syntax(err) => Some(&err.position),
            MathError::Evaluation(err) => Some(&err.position),
            MathError::Internal(_) => None,
        }
    }

    /// Name and arity errors are a kind of syntax error.
    pub fn is_syntax(&self) -> bool {
        matches!(self, MathError::Syntax(_))
    }

    pub fn is_name(&self) -> bool {
        matches!(self, MathError::Syntax(err) if err.kind == SyntaxErrorKind::Name)
    }

    pub fn is_division_by_zero(&self) -> bool {
        matches!(
            self,
            MathError::Evaluation(err) if err.kind == EvaluationErrorKind::DivisionByZero
        )
    }

    /// The message followed by the caret snippet, ready to show to a user.
    pub fn render(&self) -> String {
        match self.position() {
            Some(position) => format!("{}\n{}", self, position.caret()),
            None => self.to_string(),
        }
    }
}

/// Failures raised by native builtin callbacks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum BuiltinError {
    #[error("Division by 0")]
    DivisionByZero,

    #[error("expected {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::at("a = 1\n2 + foo * 3\n4", 10, 2, 5, "foo")
    }

    #[test]
    fn test_position_extracts_source_line() {
        let position = position();
        assert_eq!(position.source_line, "2 + foo * 3");
        assert_eq!(position.to_string(), "line 2, column 5");
    }

    #[test]
    fn test_caret_points_at_text() {
        assert_eq!(position().caret(), "2 + foo * 3\n    ^^^");
    }

    #[test]
    fn test_render_includes_message_and_caret() {
        let err: MathError =
            SyntaxError::new(SyntaxErrorKind::Name, "Variable 'foo' does not exist", position())
                .into();
        let rendered = err.render();
        assert!(rendered.starts_with("Variable 'foo' does not exist (line 2, column 5)"));
        assert!(rendered.ends_with("    ^^^"));
        assert!(err.is_syntax());
        assert!(err.is_name());
    }

    #[test]
    fn test_division_by_zero_detection() {
        let err: MathError = EvaluationError {
            kind: EvaluationErrorKind::DivisionByZero,
            message: "Division by 0".to_string(),
            position: position(),
            left: 1.0,
            right: 0.0,
        }
        .into();
        assert!(err.is_division_by_zero());
        assert!(!err.is_syntax());
        assert!(!MathError::Internal("x".into()).is_division_by_zero());
    }

    // If MathError ever stops being Send + Sync + 'static this will fail to compile.
    fn _assert_send_sync_static<T: Send + Sync + 'static>() {}
    #[test]
    fn math_error_is_send_sync_static() {
        _assert_send_sync_static::<MathError>();
    }
}
