use crate::ast::{validate_chunks, CallKind, Parser, Scope};
use crate::error::{EvaluationErrorKind, MathError};
use crate::lexer::{Capture, Token};
use log::debug;

#[derive(Debug, Copy, Clone, PartialEq)]
struct Progression {
    first_term: f64,
    ratio: f64,
}

/// The geometric sequence defined by `S = t1, t2[, t3]`.
///
/// The terms are only evaluated during validation; until then the sequence
/// cannot be queried.
#[derive(Debug, Clone)]
pub struct GeoSequence {
    token: Token,
    progression: Option<Progression>,
}

impl GeoSequence {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            progression: None,
        }
    }

    /// The definition token.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The raw term texts as written.
    pub fn terms(&self) -> &[Capture] {
        &self.token.captures
    }

    pub fn first_term(&self) -> Option<f64> {
        self.progression.map(|p| p.first_term)
    }

    pub fn ratio(&self) -> Option<f64> {
        self.progression.map(|p| p.ratio)
    }

    pub fn is_validated(&self) -> bool {
        self.progression.is_some()
    }

    /// Evaluates the terms and derives the ratio. A third term must continue
    /// the progression exactly.
    pub fn validate(&mut self, parser: &mut Parser) -> Result<(), MathError> {
        let given = self
            .token
            .captures
            .iter()
            .take_while(|term| !term.text.trim().is_empty())
            .count();
        if given < 2 {
            return Err(parser.syntax_error(
                &self.token,
                format!("Expected 2-3 sequence values, got {}", given),
            ));
        }

        let mut values = Vec::with_capacity(given);
        for term in self.token.captures.iter().take(given.min(3)) {
            values.push(self.evaluate_term(parser, term)?);
        }

        let (first, second) = (values[0], values[1]);
        let ratio = self.divide(parser, second, first)?;
        if let Some(&third) = values.get(2) {
            if self.divide(parser, third, second)? != ratio {
                return Err(parser.syntax_error(
                    &self.token,
                    format!(
                        "Invalid sequence ({}/{} != {}/{})",
                        second, first, third, second
                    ),
                ));
            }
        }

        debug!("Sequence validated: first term {}, ratio {}", first, ratio);
        self.progression = Some(Progression {
            first_term: first,
            ratio,
        });
        Ok(())
    }

    fn evaluate_term(&self, parser: &mut Parser, term: &Capture) -> Result<f64, MathError> {
        let mut expressions = parser.parse_arguments(term)?;
        let expression = match (expressions.pop(), expressions.is_empty()) {
            (Some(expression), true) => expression,
            _ => {
                return Err(parser.syntax_error(
                    &self.token,
                    format!("Invalid sequence value '{}'", term.text.trim()),
                ))
            }
        };
        validate_chunks(parser, &expression.chunks, &[], false)?;
        parser.do_math(&expression.chunks, &Scope::new())
    }

    fn divide(&self, parser: &Parser, numerator: f64, denominator: f64) -> Result<f64, MathError> {
        if denominator == 0.0 {
            return Err(parser.evaluation_error(
                EvaluationErrorKind::DivisionByZero,
                &self.token,
                "Division by 0",
                numerator,
                denominator,
            ));
        }
        Ok(numerator / denominator)
    }

    /// Answers one of the four sequence queries for `value`:
    /// the term at an index, the index of a term, the sum of the first n
    /// terms, or the number of terms reaching a sum.
    pub fn execute(
        &self,
        kind: CallKind,
        token: &Token,
        parser: &Parser,
        value: f64,
    ) -> Result<f64, MathError> {
        let Progression { first_term, ratio } = self.progression.ok_or_else(|| {
            parser.name_error(token, "The sequence is used before it is defined")
        })?;
        let max_exponent = parser.limits().max_exponent;

        let exponent_error = |exponent: f64| {
            parser.evaluation_error(
                EvaluationErrorKind::OutOfRange,
                token,
                format!("Exponents are restricted to {} (got {})", max_exponent, exponent),
                first_term,
                ratio,
            )
        };
        let zero_division = || {
            parser.evaluation_error(
                EvaluationErrorKind::DivisionByZero,
                token,
                "Division by 0",
                first_term,
                ratio,
            )
        };

        let result = match kind {
            CallKind::Call => {
                let exponent = value - 1.0;
                if exponent > max_exponent {
                    return Err(exponent_error(exponent));
                }
                first_term * ratio.powf(exponent)
            }
            CallKind::IndexOfTerm => {
                let denominator = ratio.ln();
                if denominator == 0.0 {
                    return Err(zero_division());
                }
                (value / first_term).ln() / denominator + 1.0
            }
            CallKind::PartialSum => {
                if value > max_exponent {
                    return Err(exponent_error(value));
                }
                if ratio == 1.0 {
                    return Err(zero_division());
                }
                first_term * (ratio.powf(value) - 1.0) / (ratio - 1.0)
            }
            CallKind::IndexOfPartialSum => {
                let denominator = ratio.ln();
                if denominator == 0.0 {
                    return Err(zero_division());
                }
                (1.0 + value * (ratio - 1.0) / first_term).ln() / denominator
            }
        };

        if result.is_finite() {
            Ok(result)
        } else {
            Err(parser.evaluation_error(
                EvaluationErrorKind::Domain,
                token,
                format!("Math domain error in sequence query ({})", value),
                first_term,
                ratio,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;

    fn session(input: &str) -> Result<Parser, MathError> {
        let mut parser = Parser::new(input);
        parser.parse()?;
        Ok(parser)
    }

    fn query(parser: &Parser, kind: CallKind, value: f64) -> Result<f64, MathError> {
        let sequence = parser.sequence().unwrap();
        sequence.execute(kind, sequence.token(), parser, value)
    }

    #[test]
    fn test_sequence_values() {
        let parser = session("S = 2, 4, 8").unwrap();
        let sequence = parser.sequence().unwrap();
        assert_eq!(sequence.first_term(), Some(2.0));
        assert_eq!(sequence.ratio(), Some(2.0));
        assert_eq!(sequence.terms().len(), 3);
    }

    #[test]
    fn test_sequence_queries() {
        let parser = session("S = 2, 4, 8").unwrap();
        assert_eq!(query(&parser, CallKind::Call, 4.0).unwrap(), 16.0);
        assert!((query(&parser, CallKind::IndexOfTerm, 16.0).unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(query(&parser, CallKind::PartialSum, 3.0).unwrap(), 14.0);
        assert!((query(&parser, CallKind::IndexOfPartialSum, 14.0).unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_calls_through_the_parser() {
        let mut parser = Parser::new("S = 3, 6\nS(3)\ns!(2)\nS?(12)");
        let outputs = parser.run().unwrap();
        let numbers: Vec<f64> = outputs.iter().filter_map(|o| o.as_number()).collect();
        assert_eq!(numbers.len(), 3);
        assert_eq!(numbers[0], 12.0);
        assert_eq!(numbers[1], 9.0);
        assert!((numbers[2] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_terms_may_be_expressions() {
        let parser = session("S = 1+1, 2*2").unwrap();
        assert_eq!(parser.sequence().unwrap().ratio(), Some(2.0));
    }

    #[test]
    fn test_inconsistent_third_term() {
        let err = session("S = 2, 4, 9").err().unwrap();
        assert!(err.is_syntax());
        assert!(err.to_string().contains("Invalid sequence (4/2 != 9/4)"));
    }

    #[test]
    fn test_missing_terms() {
        let err = session("S = 2,").err().unwrap();
        assert!(err.to_string().contains("Expected 2-3 sequence values, got 1"));
    }

    #[test]
    fn test_zero_first_term() {
        let err = session("S = 0, 4").err().unwrap();
        assert!(err.is_division_by_zero());
    }

    #[test]
    fn test_constant_ratio_rejects_index_queries() {
        let parser = session("S = 3, 3").unwrap();
        assert_eq!(query(&parser, CallKind::Call, 10.0).unwrap(), 3.0);
        assert!(query(&parser, CallKind::IndexOfTerm, 3.0)
            .unwrap_err()
            .is_division_by_zero());
        assert!(query(&parser, CallKind::PartialSum, 3.0)
            .unwrap_err()
            .is_division_by_zero());
    }

    #[test]
    fn test_term_index_exponent_limit() {
        let parser = session("S = 1, 2").unwrap();
        assert!(query(&parser, CallKind::Call, 51.0).is_ok());
        let err = query(&parser, CallKind::Call, 52.0).unwrap_err();
        assert!(err.to_string().contains("Exponents are restricted to 50 (got 51)"));
        assert!(query(&parser, CallKind::PartialSum, 51.0).is_err());
    }

    #[test]
    fn test_only_one_sequence_per_session() {
        let err = session("S = 1, 2\ns = 2, 4").err().unwrap();
        assert!(err.to_string().contains("A sequence has already been defined"));
    }

    #[test]
    fn test_term_cannot_query_the_sequence() {
        let err = session("S = 1, S(1)").err().unwrap();
        assert!(err.is_name());
    }

    #[test]
    fn test_sequence_is_not_a_statement() {
        let mut parser = Parser::new("S = 1, 2");
        let statements = parser.parse().unwrap();
        assert!(statements
            .iter()
            .all(|s| !matches!(s, Statement::Plot(_))));
        assert!(parser.sequence().unwrap().is_validated());
    }
}
