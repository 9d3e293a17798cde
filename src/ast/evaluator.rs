use crate::ast::{Chunk, Operator, OperatorKind, Parser, Scope};
use crate::error::MathError;
use log::debug;

/// A chunk after its value has been resolved.
#[derive(Debug)]
enum Item<'c> {
    Value(f64),
    Operator(&'c Operator),
}

impl Parser {
    /// Evaluates a chunk list to a single number.
    ///
    /// Every non-operator chunk is resolved first (names through `scope` and
    /// the session constants, brackets and calls recursively). The remaining
    /// operators are then folded left to right in one sweep per operator, in
    /// the order `^ / * + -`.
    pub fn do_math(&self, chunks: &[Chunk], scope: &Scope) -> Result<f64, MathError> {
        debug!("----START---- {} chunks", chunks.len());
        let result = match chunks {
            [] => Err(MathError::Internal(
                "cannot evaluate an empty expression".to_string(),
            )),
            [chunk] => self.resolve(chunk, scope),
            _ => self.reduce(chunks, scope),
        };
        debug!("----END---- {:?}", result);
        result
    }

    fn resolve(&self, chunk: &Chunk, scope: &Scope) -> Result<f64, MathError> {
        match chunk {
            Chunk::Literal(token) => Ok(token.value),
            Chunk::Name(token) => self.get_var(&token.text, scope).ok_or_else(|| {
                self.name_error(token, format!("Variable '{}' does not exist", token.text))
            }),
            Chunk::Bracket(bracket) => self.do_math(&bracket.chunks, scope),
            Chunk::Call(call) => call.execute(self, scope),
            Chunk::Operator(operator) => Err(MathError::Internal(format!(
                "operator '{}' has no value",
                operator.kind
            ))),
        }
    }

    fn reduce(&self, chunks: &[Chunk], scope: &Scope) -> Result<f64, MathError> {
        let mut items = self.descend(chunks, scope)?;

        for kind in OperatorKind::PRECEDENCE {
            if items.len() == 1 {
                break;
            }
            items = self.sweep(items, kind)?;
            debug!("{} sweep: {:?}", kind, items);
        }

        match items.as_slice() {
            [Item::Value(value)] => Ok(*value),
            _ => Err(MathError::Internal(format!(
                "expression reduced to {} items",
                items.len()
            ))),
        }
    }

    /// Resolves every value and applies unary signs: a `+` or `-` without a
    /// value on its left belongs to the value that follows it.
    fn descend<'c>(&self, chunks: &'c [Chunk], scope: &Scope) -> Result<Vec<Item<'c>>, MathError> {
        let mut items = Vec::with_capacity(chunks.len());
        let mut sign: Option<&Operator> = None;

        for chunk in chunks {
            match chunk {
                Chunk::Operator(operator) => {
                    if matches!(items.last(), Some(Item::Value(_))) {
                        items.push(Item::Operator(operator));
                    } else if sign.is_none()
                        && matches!(operator.kind, OperatorKind::Add | OperatorKind::Subtract)
                    {
                        sign = Some(operator);
                    } else {
                        return Err(self.syntax_error(&operator.token, "Unexpected operator"));
                    }
                }
                value => {
                    let mut resolved = self.resolve(value, scope)?;
                    if sign.take().is_some_and(|s| s.kind == OperatorKind::Subtract) {
                        resolved = -resolved;
                    }
                    items.push(Item::Value(resolved));
                }
            }
        }

        if let Some(sign) = sign {
            return Err(self.syntax_error(
                &sign.token,
                format!("Expected a value after '{}'", sign.kind),
            ));
        }
        Ok(items)
    }

    fn sweep<'c>(&self, items: Vec<Item<'c>>, kind: OperatorKind) -> Result<Vec<Item<'c>>, MathError> {
        let mut reduced = Vec::with_capacity(items.len());
        let mut items = items.into_iter();

        while let Some(item) = items.next() {
            match item {
                Item::Operator(operator) if operator.kind == kind => {
                    let left = match reduced.pop() {
                        Some(Item::Value(value)) => value,
                        _ => return Err(self.syntax_error(&operator.token, "Unexpected operator")),
                    };
                    let right = match items.next() {
                        Some(Item::Value(value)) => value,
                        _ => {
                            return Err(self.syntax_error(
                                &operator.token,
                                format!("Expected a value after '{}'", operator.kind),
                            ))
                        }
                    };
                    let value = operator.execute(left, right, self.limits(), self.source())?;
                    reduced.push(Item::Value(value));
                }
                other => reduced.push(other),
            }
        }

        Ok(reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationErrorKind;
    use crate::render::Output;
    use rand::Rng;

    fn evaluate(input: &str) -> Result<Vec<Output>, MathError> {
        Parser::new(input).run()
    }

    fn number(input: &str) -> f64 {
        let outputs = evaluate(input).unwrap();
        assert_eq!(outputs.len(), 1, "expected one result for {:?}", input);
        outputs[0].as_number().unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(number("2+3*4"), 14.0);
        assert_eq!(number("(2+3)*4"), 20.0);
        assert_eq!(number("2^3*2"), 16.0);
        assert_eq!(number("8/2/2"), 2.0);
        assert_eq!(number("10 - 4"), 6.0);
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(number("2 3"), 6.0);
        assert_eq!(number("2(3)"), 6.0);
        assert_eq!(number("(2)(3)"), 6.0);
        assert_eq!(number("2pi"), 2.0 * std::f64::consts::PI);
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(number("2 - -3"), 5.0);
        assert_eq!(number("-3 * 2"), -6.0);
        assert_eq!(number("2 * -3"), -6.0);
        assert_eq!(number("-pi"), -std::f64::consts::PI);
        assert_eq!(number("-(1 + 1)"), -2.0);
    }

    #[test]
    fn test_single_values() {
        assert_eq!(number("42"), 42.0);
        assert_eq!(number("E"), std::f64::consts::E);
        assert_eq!(number("(((7)))"), 7.0);
    }

    #[test]
    fn test_exponent_limit() {
        assert_eq!(number("2^50"), 2f64.powi(50));
        let err = evaluate("2^51").unwrap_err();
        match err {
            MathError::Evaluation(err) => {
                assert_eq!(err.kind, EvaluationErrorKind::OutOfRange);
                assert_eq!(err.left, 2.0);
                assert_eq!(err.right, 51.0);
                assert_eq!(err.position.text, "^");
            }
            other => panic!("expected an evaluation error, got {:?}", other),
        }
    }

    #[test]
    fn test_operand_limit() {
        let err = evaluate("99999999 * 99999999 * 2").unwrap_err();
        assert!(err.to_string().contains("Number (left) is larger than the permissible values"));
    }

    #[test]
    fn test_division_by_zero() {
        let err = evaluate("1 / (2 - 2)").unwrap_err();
        assert!(err.is_division_by_zero());
        assert_eq!(err.position().unwrap().column, 3);
    }

    #[test]
    fn test_unknown_variable_at_evaluation() {
        let err = evaluate("2 + q").unwrap_err();
        assert!(err.is_name());
        assert!(err.to_string().contains("Variable 'q' does not exist"));
        assert_eq!(err.position().unwrap().column, 5);
    }

    #[test]
    fn test_user_functions() {
        assert_eq!(number("f(x) = x*2\nf(5)"), 10.0);
        assert_eq!(number("f(a, b) = a - b\nf(10, 4)"), 6.0);
        assert_eq!(number("g(x) = x + 1\nf(x) = g(x) * 2\nf(g(1))"), 6.0);
        assert_eq!(number("f(x) = x\nf(1 + 2) * 2"), 6.0);
        assert_eq!(number("k() = 7\nk()"), 7.0);
    }

    #[test]
    fn test_function_arguments_use_callers_scope() {
        assert_eq!(number("g(y) = y * 10\nf(x) = g(x + 1)\nf(2)"), 30.0);
    }

    #[test]
    fn test_builtins() {
        assert!((number("sin(rad(90))") - 1.0).abs() < 1e-12);
        assert!((number("cos(0)") - 1.0).abs() < 1e-12);
        assert!((number("atan(1, 1)") - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert!((number("log(E)") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_builtin_division_by_zero_is_positioned() {
        let err = evaluate("1 + atan(1,0)").unwrap_err();
        assert!(err.is_division_by_zero());
        let position = err.position().unwrap();
        assert_eq!(position.column, 5);
        assert_eq!(position.text, "atan(1,0)");
    }

    #[test]
    fn test_plot_with_nulls() {
        let outputs = evaluate("y = 1/x").unwrap();
        let Output::Plot(plot) = &outputs[0] else {
            panic!("expected a plot");
        };
        assert_eq!(plot.number, 1);
        assert_eq!(plot.points.keys().copied().collect::<Vec<_>>(), (-5..=5).collect::<Vec<_>>());
        assert_eq!(plot.points[&0], None);
        assert_eq!(plot.points[&1], Some(1.0));
    }

    #[test]
    fn test_plot_propagates_other_errors() {
        let err = evaluate("y = x^60").unwrap_err();
        assert!(!err.is_division_by_zero());
    }

    #[test]
    fn test_sessions_are_independent() {
        assert_eq!(number("f(x) = x + 1\nf(1)"), 2.0);
        let err = evaluate("f(1)").unwrap_err();
        assert!(err.to_string().contains("Function 'f' not found"));
    }

    #[test]
    fn test_repeated_sessions_agree() {
        let input = "S = 2, 4, 8\nf(x) = S(x) + 1\nf(3)\ny = x / 2";
        assert_eq!(evaluate(input).unwrap(), evaluate(input).unwrap());
    }

    #[test]
    fn test_user_function_arity() {
        let err = evaluate("f(x) = x*2\nf(5, 6)").unwrap_err();
        assert!(err.is_name());
        assert!(err.to_string().contains("Too many arguments passed to f"));
    }

    #[test]
    fn test_sweeps_associate_left_to_right() {
        assert_eq!(number("2 - 3 + 4"), -5.0);
        assert_eq!(number("2^3^2"), 64.0);
    }

    #[test]
    fn test_mixed_outputs_keep_order() {
        let outputs = evaluate("1\ny = x\n2 + 2").unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].as_number(), Some(1.0));
        assert!(matches!(outputs[1], Output::Plot(_)));
        assert_eq!(outputs[2].as_number(), Some(4.0));
    }

    #[test]
    fn test_random_sums_and_products() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let a: i32 = rng.random_range(1..1000);
            let b: i32 = rng.random_range(1..1000);
            let c: i32 = rng.random_range(1..1000);
            let input = format!("{} + {} * {}", a, b, c);
            assert_eq!(number(&input), (a + b * c) as f64, "input: {}", input);
            let input = format!("({} + {}) {}", a, b, c);
            assert_eq!(number(&input), ((a + b) * c) as f64, "input: {}", input);
        }
    }
}
