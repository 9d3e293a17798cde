use crate::error::{MathError, Position, SyntaxError, SyntaxErrorKind};
use log::trace;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::ops::Range;

/// Numeric literals longer than this are rejected as too large or too precise.
pub const MAX_NUMBER_LENGTH: usize = 8;

#[derive(Parser)]
#[grammar = "./tokens.pest"]
struct TokenGrammar;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `name(a, b) = body`
    Function,
    /// `y = body`
    PlotFunction,
    /// `S = t1, t2[, t3]`
    Sequence,
    /// `name(args)`
    FunctionCall,
    /// `S?(term)`
    SequenceIndexCall,
    /// `S!(index)`
    SequenceSumCall,
    /// `S!!(sum)`
    SequenceSumIndexCall,
    Name,
    Number,
    Operator,
    /// Statement separator: a newline at top level, a comma inside an argument list.
    Newline,
    LeftParen,
    RightParen,
    Equals,
}

/// A sub-match of a structured token, e.g. the body of a function definition.
#[derive(Debug, Clone)]
pub struct Capture {
    /// Byte offset of the capture in the session source.
    pub offset: usize,
    pub text: String,
}

impl Capture {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.text.len()
    }
}

/// A lexed token. Two tokens are equal when they start at the same source offset.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Parsed value of a `Number` token, `0.0` for every other kind.
    pub value: f64,
    /// Byte offset in the session source.
    pub index: usize,
    pub line: usize,
    pub column: usize,
    pub captures: Vec<Capture>,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Token {
    /// A token that does not come from the source text, placed at `at`.
    pub fn synthetic(kind: TokenKind, text: &str, at: &Token) -> Self {
        Self {
            kind,
            text: text.to_string(),
            value: 0.0,
            index: at.index,
            line: at.line,
            column: at.column,
            captures: Vec::new(),
        }
    }

    /// The negative literal obtained by folding a leading `-` into this number.
    pub fn negated(&self, minus: &Token) -> Self {
        Self {
            kind: TokenKind::Number,
            text: format!("-{}", self.text),
            value: -self.value,
            index: minus.index,
            line: minus.line,
            column: minus.column,
            captures: Vec::new(),
        }
    }

    pub fn capture(&self, index: usize) -> Option<&Capture> {
        self.captures.get(index)
    }
}

/// Which set of token rules the lexer applies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LexerMode {
    /// Top-level lines: definitions, sequences, calls and newlines.
    Statement,
    /// The inside of a call's parentheses: commas separate arguments and
    /// definitions are rejected.
    Arguments,
}

impl LexerMode {
    fn rule(self) -> Rule {
        match self {
            LexerMode::Statement => Rule::statement_token,
            LexerMode::Arguments => Rule::argument_token,
        }
    }
}

/// Lazily tokenizes a byte range of the session source.
///
/// Positions are always reported against the full source, so a function body
/// or an argument list tokenized on its own still points at the right column.
/// The lexer stops after the first error.
#[derive(Debug, Clone)]
pub struct Lexer<'s> {
    source: &'s str,
    mode: LexerMode,
    end: usize,
    pos: usize,
    line: usize,
    line_start: usize,
    failed: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str, mode: LexerMode) -> Self {
        Self::with_range(source, mode, 0..source.len())
    }

    pub fn with_range(source: &'s str, mode: LexerMode, range: Range<usize>) -> Self {
        let prefix = &source[..range.start];
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map_or(0, |i| i + 1);
        Self {
            source,
            mode,
            end: range.end,
            pos: range.start,
            line,
            line_start,
            failed: false,
        }
    }

    /// Collects every token of the range, failing on the first lexical error.
    pub fn tokenize(self) -> Result<Vec<Token>, MathError> {
        self.collect()
    }

    fn skip_blanks(&mut self) {
        let rest = &self.source[self.pos..self.end];
        let trimmed = rest.trim_start_matches([' ', '\t']);
        self.pos += rest.len() - trimmed.len();
    }

    fn column(&self, index: usize) -> usize {
        self.source[self.line_start..index].chars().count() + 1
    }

    fn error(&self, index: usize, text: &str, message: String) -> MathError {
        let position = Position::at(self.source, index, self.line, self.column(index), text);
        SyntaxError::new(SyntaxErrorKind::Syntax, message, position).into()
    }

    fn build_token(&mut self, pair: Pair<'_, Rule>) -> Result<Token, MathError> {
        let span = pair.as_span();
        let index = self.pos + span.start();
        let end = self.pos + span.end();
        let text = pair.as_str().to_string();

        let kind = match pair.as_rule() {
            Rule::function_def => TokenKind::Function,
            Rule::plot_def => TokenKind::PlotFunction,
            Rule::sequence_def => TokenKind::Sequence,
            Rule::function_call => TokenKind::FunctionCall,
            Rule::sequence_index_call => TokenKind::SequenceIndexCall,
            Rule::sequence_sum_call => TokenKind::SequenceSumCall,
            Rule::sequence_sum_index_call => TokenKind::SequenceSumIndexCall,
            Rule::name => TokenKind::Name,
            Rule::number => TokenKind::Number,
            Rule::operator => TokenKind::Operator,
            Rule::newline | Rule::comma => TokenKind::Newline,
            Rule::open => TokenKind::LeftParen,
            Rule::close => TokenKind::RightParen,
            Rule::equals => TokenKind::Equals,
            rule => {
                return Err(MathError::Internal(format!(
                    "lexer produced unexpected rule {:?}",
                    rule
                )))
            }
        };

        if self.mode == LexerMode::Arguments {
            match kind {
                TokenKind::Function => {
                    return Err(self.error(index, &text, "Functions are not allowed here".into()))
                }
                TokenKind::Sequence => {
                    return Err(self.error(index, &text, "Sequences are not allowed here".into()))
                }
                _ => {}
            }
        }

        let captures = pair
            .into_inner()
            .map(|inner| Capture {
                offset: self.pos + inner.as_span().start(),
                text: inner.as_str().to_string(),
            })
            .collect();

        let mut token = Token {
            kind,
            text,
            value: 0.0,
            index,
            line: self.line,
            column: self.column(index),
            captures,
        };

        match kind {
            TokenKind::Number => token.value = self.parse_number(&token)?,
            TokenKind::Newline if self.mode == LexerMode::Statement => {
                self.line += token.text.matches('\n').count();
                self.line_start = end;
            }
            _ => {}
        }

        self.pos = end;
        trace!("token {:?} {:?} at {}:{}", token.kind, token.text, token.line, token.column);
        Ok(token)
    }

    fn parse_number(&self, token: &Token) -> Result<f64, MathError> {
        if token.text.len() > MAX_NUMBER_LENGTH {
            return Err(self.error(
                token.index,
                &token.text,
                "Number is too large or too precise".into(),
            ));
        }

        match token.text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(self.error(
                token.index,
                &token.text,
                format!("Invalid number: '{}'", token.text),
            )),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, MathError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        self.skip_blanks();
        if self.pos >= self.end {
            return None;
        }

        let rest = &self.source[self.pos..self.end];
        let matched = TokenGrammar::parse(self.mode.rule(), rest)
            .ok()
            .and_then(|mut pairs| pairs.next())
            .and_then(|entry| entry.into_inner().next());

        let result = match matched {
            Some(pair) => self.build_token(pair),
            None => {
                let offending: String = rest.chars().take(1).collect();
                Err(self.error(
                    self.pos,
                    &offending,
                    format!("Invalid syntax: {}", offending),
                ))
            }
        };

        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str, mode: LexerMode) -> Vec<TokenKind> {
        Lexer::new(source, mode)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_arithmetic_tokens() {
        let tokens = Lexer::new("2 + x*3.5", LexerMode::Statement).tokenize().unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["2", "+", "x", "*", "3.5"]);
        assert_eq!(tokens[4].value, 3.5);
        assert_eq!(tokens[2].column, 5);
    }

    #[test]
    fn test_definition_shapes() {
        assert_eq!(kinds("f(x, y) = x*y", LexerMode::Statement), vec![TokenKind::Function]);
        assert_eq!(kinds("y = 1/x", LexerMode::Statement), vec![TokenKind::PlotFunction]);
        assert_eq!(kinds("S = 2,4,8", LexerMode::Statement), vec![TokenKind::Sequence]);
        assert_eq!(kinds("s=2, 4", LexerMode::Statement), vec![TokenKind::Sequence]);
    }

    #[test]
    fn test_call_shapes() {
        assert_eq!(kinds("sin(2)", LexerMode::Statement), vec![TokenKind::FunctionCall]);
        assert_eq!(kinds("S?(16)", LexerMode::Statement), vec![TokenKind::SequenceIndexCall]);
        assert_eq!(kinds("S!(3)", LexerMode::Statement), vec![TokenKind::SequenceSumCall]);
        assert_eq!(
            kinds("S !! (14)", LexerMode::Statement),
            vec![TokenKind::SequenceSumIndexCall]
        );
    }

    #[test]
    fn test_captures_keep_absolute_offsets() {
        let source = "1\nf(a, b) = a + b";
        let tokens = Lexer::new(source, LexerMode::Statement).tokenize().unwrap();
        let function = &tokens[2];
        assert_eq!(function.kind, TokenKind::Function);
        assert_eq!(function.line, 2);
        assert_eq!(function.capture(0).unwrap().text, "f");
        assert_eq!(function.capture(1).unwrap().text, "a, b");
        let body = function.capture(2).unwrap();
        assert_eq!(body.text, "a + b");
        assert_eq!(&source[body.range()], "a + b");
    }

    #[test]
    fn test_call_arguments_stop_at_matching_paren() {
        let tokens = Lexer::new("f(2, (3)) + g(4)", LexerMode::Statement).tokenize().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].capture(1).unwrap().text, "2, (3)");
        assert_eq!(tokens[2].capture(0).unwrap().text, "g");
    }

    #[test]
    fn test_newlines_advance_line_counter() {
        let tokens = Lexer::new("1\n\n2\n3", LexerMode::Statement).tokenize().unwrap();
        let lines: Vec<usize> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.line)
            .collect();
        assert_eq!(lines, vec![1, 3, 4]);
    }

    #[test]
    fn test_argument_mode_commas_separate() {
        assert_eq!(
            kinds("1, x", LexerMode::Arguments),
            vec![TokenKind::Number, TokenKind::Newline, TokenKind::Name]
        );
    }

    #[test]
    fn test_argument_mode_rejects_definitions() {
        let err = Lexer::new("f(x) = 2", LexerMode::Arguments).tokenize().unwrap_err();
        assert!(err.to_string().contains("Functions are not allowed here"));

        let err = Lexer::new("S = 1, 2", LexerMode::Arguments).tokenize().unwrap_err();
        assert!(err.to_string().contains("Sequences are not allowed here"));
    }

    #[test]
    fn test_number_too_long() {
        let err = Lexer::new("123456789", LexerMode::Statement).tokenize().unwrap_err();
        assert!(err.to_string().contains("too large or too precise"));
        assert!(Lexer::new("12345678", LexerMode::Statement).tokenize().is_ok());
    }

    #[test]
    fn test_invalid_number() {
        let err = Lexer::new("1.2.3", LexerMode::Statement).tokenize().unwrap_err();
        assert!(err.to_string().contains("Invalid number: '1.2.3'"));
    }

    #[test]
    fn test_unmatched_character_is_positioned() {
        let err = Lexer::new("2 +\n3 @ 4", LexerMode::Statement).tokenize().unwrap_err();
        let position = err.position().unwrap();
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 3);
        assert_eq!(position.text, "@");
        assert_eq!(position.source_line, "3 @ 4");
    }

    #[test]
    fn test_lexer_is_lazy_and_restartable() {
        let lexer = Lexer::new("1 + 2", LexerMode::Statement);
        let first: Vec<Token> = lexer.clone().take(1).collect::<Result<_, _>>().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(lexer.tokenize().unwrap().len(), 3);
    }

    #[test]
    fn test_token_equality_is_positional() {
        let a = Lexer::new("2 2", LexerMode::Statement).tokenize().unwrap();
        assert_ne!(a[0], a[1]);
        let b = Lexer::new("2 5", LexerMode::Statement).tokenize().unwrap();
        assert_eq!(a[0], b[0]);
    }

    #[test]
    fn test_pi_is_a_name() {
        assert_eq!(kinds("2π", LexerMode::Statement), vec![TokenKind::Number, TokenKind::Name]);
    }
}
