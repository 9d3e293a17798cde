use crate::ast::{CallKind, Chunk, FunctionCall, FunctionResult, Parser, PlotPoints, Scope, Symbol};
use crate::error::{BuiltinError, EvaluationErrorKind, MathError};
use crate::lexer::Token;
use log::debug;
use std::fmt;

/// Native implementation of a builtin; receives the arguments in parameter order.
pub type BuiltinCallback = fn(&[f64]) -> Result<f64, BuiltinError>;

const SEQUENCE_PARAMS: &[&str] = &["value"];

/// A function written in the input: `name(params) = body`, or the plot `y = body`.
#[derive(Debug, Clone)]
pub struct UserFunction {
    /// The definition token.
    pub token: Token,
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Chunk>,
}

impl UserFunction {
    /// Samples the body at every x of the plot range. A sample that divides by
    /// zero is recorded as `None`; any other error aborts the plot.
    pub fn plots(&self, parser: &Parser) -> Result<PlotPoints, MathError> {
        let variable = self.params.first().map_or("x", String::as_str);
        let mut points = PlotPoints::new();

        for x in parser.limits().plot_range.clone() {
            let scope = Scope::with_values([(variable, x as f64)]);
            let y = match parser.do_math(&self.body, &scope) {
                Ok(y) => Some(y),
                Err(err) if err.is_division_by_zero() => None,
                Err(err) => return Err(err),
            };
            points.insert(x, y);
        }

        debug!("Plotted {}: {:?}", self.name, points);
        Ok(points)
    }
}

#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub params: &'static [&'static str],
    callback: BuiltinCallback,
}

impl BuiltinFunction {
    pub fn new(
        name: &'static str,
        params: &'static [&'static str],
        callback: BuiltinCallback,
    ) -> Self {
        Self {
            name,
            params,
            callback,
        }
    }

    pub fn call(&self, args: &[f64]) -> Result<f64, BuiltinError> {
        (self.callback)(args)
    }

    fn execute(&self, token: &Token, parser: &Parser, scope: &Scope) -> Result<f64, MathError> {
        let args = self
            .params
            .iter()
            .map(|param| scope.get_number(param))
            .collect::<Result<Vec<f64>, String>>()
            .map_err(MathError::Internal)?;
        let left = args.first().copied().unwrap_or(f64::NAN);
        let right = args.get(1).copied().unwrap_or(f64::NAN);

        match self.call(&args) {
            Ok(value) if value.is_finite() => Ok(value),
            Ok(_) => Err(parser.evaluation_error(
                EvaluationErrorKind::Domain,
                token,
                format!("Math domain error in {}", self.name),
                left,
                right,
            )),
            Err(BuiltinError::DivisionByZero) => Err(parser.evaluation_error(
                EvaluationErrorKind::DivisionByZero,
                token,
                "Division by 0",
                left,
                right,
            )),
            Err(err @ BuiltinError::Arity { .. }) => {
                Err(parser.name_error(token, format!("{}: {}", self.name, err)))
            }
        }
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Everything that can be called.
#[derive(Debug, Clone)]
pub enum Function {
    User(UserFunction),
    /// The `y = …` plot; executing it samples the body instead of evaluating once.
    Plottable(UserFunction),
    /// `S`/`s`, forwarding to the session's sequence.
    Sequence,
    Builtin(BuiltinFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::User(function) | Function::Plottable(function) => &function.name,
            Function::Sequence => "S",
            Function::Builtin(builtin) => builtin.name,
        }
    }

    pub fn params(&self) -> Vec<&str> {
        match self {
            Function::User(function) | Function::Plottable(function) => {
                function.params.iter().map(String::as_str).collect()
            }
            Function::Sequence => SEQUENCE_PARAMS.to_vec(),
            Function::Builtin(builtin) => builtin.params.to_vec(),
        }
    }

    /// Checks that the body only refers to parameters and known symbols, and
    /// that every call in it is well formed.
    pub fn validate(&self, parser: &Parser) -> Result<(), MathError> {
        match self {
            Function::User(function) | Function::Plottable(function) => {
                validate_chunks(parser, &function.body, &function.params, true)
            }
            Function::Sequence | Function::Builtin(_) => Ok(()),
        }
    }

    /// Runs the function with its arguments already bound in `scope`.
    pub fn execute(
        &self,
        token: &Token,
        kind: CallKind,
        parser: &Parser,
        scope: &Scope,
    ) -> Result<FunctionResult, MathError> {
        match self {
            Function::User(function) => parser
                .do_math(&function.body, scope)
                .map(FunctionResult::Number),
            Function::Plottable(function) => function.plots(parser).map(FunctionResult::Points),
            Function::Sequence => {
                let value = scope.get_number("value").map_err(MathError::Internal)?;
                let sequence = parser.sequence().ok_or_else(|| {
                    parser.name_error(token, "The sequence is used before it is defined")
                })?;
                sequence
                    .execute(kind, token, parser, value)
                    .map(FunctionResult::Number)
            }
            Function::Builtin(builtin) => builtin
                .execute(token, parser, scope)
                .map(FunctionResult::Number),
        }
    }
}

impl FunctionCall {
    /// Checks the target exists and is callable, the argument count matches,
    /// and bare-name arguments resolve in `params` or the symbol table.
    pub fn validate(&self, parser: &Parser, params: &[String]) -> Result<(), MathError> {
        let function = match parser.symbols().get(&self.name) {
            Some(Symbol::Function(function)) => function,
            Some(Symbol::Constant(_)) => {
                return Err(parser.name_error(
                    &self.token,
                    format!("'{}' is not a function", self.name),
                ))
            }
            None => {
                return Err(parser.name_error(
                    &self.token,
                    format!("Function '{}' not found", self.name),
                ))
            }
        };

        self.check_arity(parser, function)?;

        for arg in &self.args {
            if let [Chunk::Name(token)] = arg.chunks.as_slice() {
                let known = params.contains(&token.text)
                    || parser.symbols().constant(&token.text).is_some();
                if !known {
                    return Err(parser.name_error(
                        token,
                        format!("Variable '{}' not found", token.text),
                    ));
                }
            }
        }

        Ok(())
    }

    fn check_arity(&self, parser: &Parser, function: &Function) -> Result<(), MathError> {
        let expected = function.params().len();
        if expected == self.args.len() {
            return Ok(());
        }

        let message = if expected > self.args.len() {
            format!("Not enough arguments passed to {}", self.name)
        } else {
            format!("Too many arguments passed to {}", self.name)
        };
        Err(parser.name_error(&self.token, message))
    }

    /// Evaluates the arguments in the caller's scope, binds them to the
    /// callee's parameters and runs the callee.
    pub fn execute(&self, parser: &Parser, scope: &Scope) -> Result<f64, MathError> {
        let function = parser.symbols().function(&self.name).ok_or_else(|| {
            parser.name_error(&self.token, format!("Function '{}' not found", self.name))
        })?;
        self.check_arity(parser, function)?;

        let values = self
            .args
            .iter()
            .map(|arg| parser.do_math(&arg.chunks, scope))
            .collect::<Result<Vec<f64>, MathError>>()?;
        let bound = Scope::bind(&function.params(), &values);
        debug!("Calling {} with {:?}", self.name, bound);

        match function.execute(&self.token, self.kind, parser, &bound)? {
            FunctionResult::Number(value) => Ok(value),
            FunctionResult::Points(_) => {
                Err(parser.syntax_error(&self.token, "Plots cannot be called"))
            }
        }
    }
}

/// Validates every call in `chunks` against `params`, descending into brackets
/// and arguments. With `check_names`, bare names must also be parameters or
/// known symbols.
pub(crate) fn validate_chunks(
    parser: &Parser,
    chunks: &[Chunk],
    params: &[String],
    check_names: bool,
) -> Result<(), MathError> {
    for chunk in chunks {
        match chunk {
            Chunk::Name(token) if check_names => {
                if !params.contains(&token.text) && !parser.symbols().contains(&token.text) {
                    return Err(parser.name_error(
                        token,
                        format!("Unknown variable: '{}'", token.text),
                    ));
                }
            }
            Chunk::Bracket(bracket) => validate_chunks(parser, &bracket.chunks, params, check_names)?,
            Chunk::Call(call) => {
                call.validate(parser, params)?;
                for arg in &call.args {
                    validate_chunks(parser, &arg.chunks, params, check_names)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Every call in `chunks`, including calls nested in brackets and arguments.
pub(crate) fn calls_in(chunks: &[Chunk]) -> Vec<&FunctionCall> {
    let mut calls = Vec::new();
    for chunk in chunks {
        match chunk {
            Chunk::Bracket(bracket) => calls.extend(calls_in(&bracket.chunks)),
            Chunk::Call(call) => {
                calls.push(call);
                for arg in &call.args {
                    calls.extend(calls_in(&arg.chunks));
                }
            }
            _ => {}
        }
    }
    calls
}
