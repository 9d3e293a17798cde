use crate::error::{EvaluationError, EvaluationErrorKind, MathError, Position};
use crate::lexer::{Token, TokenKind};
use crate::limits::Limits;
use std::fmt;

mod evaluator;
mod function;
mod function_result;
mod parser;
mod scope;
mod sequence;
mod symbols;

pub use function::*;
pub use function_result::*;
pub use parser::*;
pub use scope::*;
pub use sequence::*;
pub use symbols::*;

/// One element of an expression: a literal, a name, an operator, a
/// parenthesised group or a function call.
#[derive(Debug, Clone)]
pub enum Chunk {
    Literal(Token),
    Name(Token),
    Operator(Operator),
    Bracket(Bracket),
    Call(FunctionCall),
}

impl Chunk {
    /// The token used when reporting an error about this chunk.
    pub fn token(&self) -> &Token {
        match self {
            Chunk::Literal(token) | Chunk::Name(token) => token,
            Chunk::Operator(operator) => &operator.token,
            Chunk::Bracket(bracket) => &bracket.start,
            Chunk::Call(call) => &call.token,
        }
    }

    /// Every chunk except an operator produces a value.
    pub fn is_value(&self) -> bool {
        !matches!(self, Chunk::Operator(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Power,
    Divide,
    Multiply,
    Add,
    Subtract,
}

impl OperatorKind {
    /// The order of the reduction sweeps performed by `do_math`.
    pub const PRECEDENCE: [OperatorKind; 5] = [
        OperatorKind::Power,
        OperatorKind::Divide,
        OperatorKind::Multiply,
        OperatorKind::Add,
        OperatorKind::Subtract,
    ];

    pub fn symbol(self) -> char {
        match self {
            OperatorKind::Power => '^',
            OperatorKind::Divide => '/',
            OperatorKind::Multiply => '*',
            OperatorKind::Add => '+',
            OperatorKind::Subtract => '-',
        }
    }

    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            OperatorKind::Power => left.powf(right),
            OperatorKind::Divide => left / right,
            OperatorKind::Multiply => left * right,
            OperatorKind::Add => left + right,
            OperatorKind::Subtract => left - right,
        }
    }
}

impl TryFrom<&str> for OperatorKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "^" => Ok(OperatorKind::Power),
            "/" => Ok(OperatorKind::Divide),
            "*" => Ok(OperatorKind::Multiply),
            "+" => Ok(OperatorKind::Add),
            "-" => Ok(OperatorKind::Subtract),
            _ => Err(format!("Unknown operator: {}", value)),
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A binary arithmetic operator and the token it was written as.
#[derive(Debug, Clone)]
pub struct Operator {
    pub kind: OperatorKind,
    pub token: Token,
}

impl Operator {
    pub fn new(token: Token) -> Result<Self, String> {
        let kind = OperatorKind::try_from(token.text.as_str())?;
        Ok(Self { kind, token })
    }

    /// The `*` inserted between two adjacent values.
    pub fn implicit(at: &Token) -> Self {
        Self {
            kind: OperatorKind::Multiply,
            token: Token::synthetic(TokenKind::Operator, "*", at),
        }
    }

    /// Applies the operator, enforcing the operand and exponent limits.
    pub fn execute(
        &self,
        left: f64,
        right: f64,
        limits: &Limits,
        source: &str,
    ) -> Result<f64, MathError> {
        let fail = |kind: EvaluationErrorKind, message: String| -> MathError {
            EvaluationError {
                kind,
                message,
                position: Position::of(source, &self.token),
                left,
                right,
            }
            .into()
        };

        if left.abs() > limits.max_number {
            return Err(fail(
                EvaluationErrorKind::OutOfRange,
                "Number (left) is larger than the permissible values".to_string(),
            ));
        }
        if right.abs() > limits.max_number {
            return Err(fail(
                EvaluationErrorKind::OutOfRange,
                "Number (right) is larger than the permissible values".to_string(),
            ));
        }

        match self.kind {
            OperatorKind::Power if right > limits.max_exponent => {
                return Err(fail(
                    EvaluationErrorKind::OutOfRange,
                    format!(
                        "Exponents are restricted to {} (got {})",
                        limits.max_exponent, right
                    ),
                ))
            }
            OperatorKind::Divide if right == 0.0 => {
                return Err(fail(
                    EvaluationErrorKind::DivisionByZero,
                    "Division by 0".to_string(),
                ))
            }
            _ => {}
        }

        let value = self.kind.apply(left, right);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(fail(
                EvaluationErrorKind::Domain,
                format!("Math domain error ({} {} {})", left, self.kind, right),
            ))
        }
    }
}

/// A parenthesised group, already built into its own chunk list.
#[derive(Debug, Clone)]
pub struct Bracket {
    /// The opening parenthesis.
    pub start: Token,
    pub chunks: Vec<Chunk>,
}

impl Bracket {
    pub fn new(start: Token, chunks: Vec<Chunk>) -> Self {
        Self { start, chunks }
    }
}

/// One evaluable statement: an input line, a bracket body or a function body.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    pub chunks: Vec<Chunk>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk, inserting `*` between two adjacent values.
    pub fn add_chunk(&mut self, chunk: Chunk) {
        if let Some(last) = self.chunks.last() {
            if last.is_value() && chunk.is_value() {
                self.chunks
                    .push(Chunk::Operator(Operator::implicit(chunk.token())));
            }
        }
        self.chunks.push(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn last_chunk(&self) -> Option<&Chunk> {
        self.chunks.last()
    }
}

/// Rewrites a leading `-` followed by a number into a single negative literal.
pub(crate) fn fold_negative_literal(chunks: &mut Vec<Chunk>) {
    let folded = match chunks.as_slice() {
        [Chunk::Operator(minus), Chunk::Literal(number), ..]
            if minus.kind == OperatorKind::Subtract =>
        {
            Some(number.negated(&minus.token))
        }
        _ => None,
    };

    if let Some(literal) = folded {
        chunks[0] = Chunk::Literal(literal);
        chunks.remove(1);
    }
}

/// Which operation a call performs on its target. Only sequences distinguish
/// between them; every other callable is invoked with `Call`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallKind {
    /// `f(x)`, and `S(n)`: the n-th term.
    Call,
    /// `S?(t)`: the index of term t.
    IndexOfTerm,
    /// `S!(n)`: the sum of the first n terms.
    PartialSum,
    /// `S!!(s)`: the number of terms summing to s.
    IndexOfPartialSum,
}

impl CallKind {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::FunctionCall => Some(CallKind::Call),
            TokenKind::SequenceIndexCall => Some(CallKind::IndexOfTerm),
            TokenKind::SequenceSumCall => Some(CallKind::PartialSum),
            TokenKind::SequenceSumIndexCall => Some(CallKind::IndexOfPartialSum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    /// The whole call as written, used for error positions.
    pub token: Token,
    pub name: String,
    pub kind: CallKind,
    pub args: Vec<Expression>,
}

/// A top-level unit produced by the builder.
#[derive(Debug, Clone)]
pub enum Statement {
    Expression(Expression),
    /// Always a [`Function::Plottable`].
    Plot(Function),
}
