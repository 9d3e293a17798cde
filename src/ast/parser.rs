use crate::ast::{
    calls_in, fold_negative_literal, validate_chunks, Bracket, CallKind, Chunk, Expression,
    Function, FunctionCall, GeoSequence, Operator, OperatorKind, Scope, Statement, SymbolTable,
    UserFunction,
};
use crate::error::{
    EvaluationError, EvaluationErrorKind, MathError, Position, SyntaxError, SyntaxErrorKind,
};
use crate::lexer::{Capture, Lexer, LexerMode, Token, TokenKind};
use crate::limits::Limits;
use crate::render::{Output, Plot};
use log::debug;
use std::collections::HashSet;
use std::mem;

/// One parse-and-evaluate session over a single input text.
///
/// The session owns its symbol table, so definitions never leak between
/// inputs. Build it with [`Parser::new`], then either [`Parser::run`] it or
/// [`Parser::parse`] and [`Parser::evaluate`] the statements one by one.
#[derive(Debug, Clone)]
pub struct Parser {
    source: String,
    symbols: SymbolTable,
    sequence: Option<GeoSequence>,
    limits: Limits,
}

impl Parser {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            source: input.into(),
            symbols: SymbolTable::with_builtins(),
            sequence: None,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn sequence(&self) -> Option<&GeoSequence> {
        self.sequence.as_ref().filter(|sequence| sequence.is_validated())
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Tokenizes the whole input and builds its statements, registering every
    /// definition and validating the result.
    pub fn parse(&mut self) -> Result<Vec<Statement>, MathError> {
        debug!("Parsing input: {:?}", self.source);
        let tokens = Lexer::new(&self.source, LexerMode::Statement).tokenize()?;
        self.traverse_tokens(tokens, true)
    }

    /// Parses and evaluates every statement in input order. Plots are numbered
    /// from 1 in the order they appear.
    pub fn run(&mut self) -> Result<Vec<Output>, MathError> {
        let statements = self.parse()?;
        let mut plots = 0;
        statements
            .iter()
            .map(|statement| {
                if matches!(statement, Statement::Plot(_)) {
                    plots += 1;
                }
                self.evaluate(statement, plots)
            })
            .collect()
    }

    pub fn evaluate(&self, statement: &Statement, plot_number: usize) -> Result<Output, MathError> {
        match statement {
            Statement::Expression(expression) => self
                .do_math(&expression.chunks, &Scope::new())
                .map(Output::Number),
            Statement::Plot(Function::Plottable(plot)) => Ok(Output::Plot(Plot {
                number: plot_number,
                points: plot.plots(self)?,
            })),
            Statement::Plot(other) => Err(MathError::Internal(format!(
                "'{}' is not a plot",
                other.name()
            ))),
        }
    }

    /// Looks a bare name up in `scope`, then among the session's constants.
    pub fn get_var(&self, name: &str, scope: &Scope) -> Option<f64> {
        scope.get(name).or_else(|| self.symbols.constant(name))
    }

    /// Groups tokens into statements.
    ///
    /// Newlines (commas in argument lists) close the current expression,
    /// parentheses are collected and built as a nested group once they close,
    /// and definitions are registered as they are met. With
    /// `allow_definitions` set this is the top level of the input, and the
    /// whole session is validated once the tokens run out.
    pub fn traverse_tokens(
        &mut self,
        tokens: Vec<Token>,
        allow_definitions: bool,
    ) -> Result<Vec<Statement>, MathError> {
        let mut statements = Vec::new();
        let mut current = Expression::new();
        let mut bracket: Option<(Token, Vec<Token>)> = None;
        let mut depth = 0usize;
        let mut tokens = tokens.into_iter().peekable();

        while let Some(token) = tokens.next() {
            if bracket.is_some() {
                match token.kind {
                    TokenKind::LeftParen => depth += 1,
                    TokenKind::RightParen => depth -= 1,
                    _ => {}
                }
                if depth > 0 {
                    if let Some((_, inner)) = bracket.as_mut() {
                        inner.push(token);
                    }
                } else if let Some((start, inner)) = bracket.take() {
                    let built = self.build_bracket(start, inner)?;
                    current.add_chunk(Chunk::Bracket(built));
                }
                continue;
            }

            match token.kind {
                TokenKind::Number => current.add_chunk(Chunk::Literal(token)),
                TokenKind::Name => current.add_chunk(Chunk::Name(token)),
                TokenKind::Operator => self.push_operator(&mut current, token)?,
                TokenKind::LeftParen => {
                    depth = 1;
                    bracket = Some((token, Vec::new()));
                }
                TokenKind::RightParen => {
                    return Err(self.syntax_error(&token, "Unexpected closing bracket"))
                }
                TokenKind::Function | TokenKind::PlotFunction | TokenKind::Sequence => {
                    self.check_definition(&token, &current, allow_definitions)?;
                    match token.kind {
                        TokenKind::Function => self.define_function(&token)?,
                        TokenKind::PlotFunction => {
                            let plot = self.define_plot(&token)?;
                            statements.push(Statement::Plot(plot));
                        }
                        _ => self.define_sequence(&token)?,
                    }
                    if tokens
                        .peek()
                        .is_some_and(|next| next.kind == TokenKind::Newline)
                    {
                        tokens.next();
                    }
                }
                TokenKind::FunctionCall
                | TokenKind::SequenceIndexCall
                | TokenKind::SequenceSumCall
                | TokenKind::SequenceSumIndexCall => {
                    let call = self.build_call(token)?;
                    current.add_chunk(Chunk::Call(call));
                }
                TokenKind::Newline => {
                    statements.push(Statement::Expression(mem::take(&mut current)));
                }
                TokenKind::Equals => return Err(self.syntax_error(&token, "Unexpected '='")),
            }
        }

        if let Some((start, _)) = bracket {
            return Err(self.syntax_error(&start, "Unclosed bracket"));
        }
        statements.push(Statement::Expression(current));

        if allow_definitions {
            self.validate_session(&statements)?;
        }

        let mut validated = Vec::with_capacity(statements.len());
        for statement in statements {
            match statement {
                Statement::Expression(expression) if expression.is_empty() => {}
                Statement::Expression(mut expression) => {
                    self.validate_expression(&mut expression)?;
                    validated.push(Statement::Expression(expression));
                }
                plot => validated.push(plot),
            }
        }
        Ok(validated)
    }

    /// Tokenizes the text between a call's parentheses (or one sequence term)
    /// and builds one expression per comma-separated argument. Empty
    /// arguments are dropped.
    pub(crate) fn parse_arguments(&mut self, arguments: &Capture) -> Result<Vec<Expression>, MathError> {
        let tokens =
            Lexer::with_range(&self.source, LexerMode::Arguments, arguments.range()).tokenize()?;
        self.traverse_tokens(tokens, false)?
            .into_iter()
            .map(|statement| match statement {
                Statement::Expression(expression) => Ok(expression),
                Statement::Plot(_) => Err(MathError::Internal(
                    "argument list produced a plot".to_string(),
                )),
            })
            .collect()
    }

    fn build_bracket(&mut self, start: Token, inner: Vec<Token>) -> Result<Bracket, MathError> {
        if inner.is_empty() {
            return Err(self.syntax_error(&start, "Empty brackets"));
        }

        let mut statements = self.traverse_tokens(inner, false)?;
        match (statements.pop(), statements.is_empty()) {
            (Some(Statement::Expression(expression)), true) => {
                Ok(Bracket::new(start, expression.chunks))
            }
            (None, _) => Err(self.syntax_error(&start, "Empty brackets")),
            _ => Err(self.syntax_error(
                &start,
                "Invalid syntax (multiple expressions in brackets)",
            )),
        }
    }

    fn build_call(&mut self, token: Token) -> Result<FunctionCall, MathError> {
        let kind = CallKind::from_token(token.kind).ok_or_else(|| {
            MathError::Internal(format!("{:?} is not a call token", token.kind))
        })?;
        let (name, arguments) = match (kind, token.captures.as_slice()) {
            (CallKind::Call, [name, arguments]) => (name.text.clone(), arguments.clone()),
            (CallKind::IndexOfTerm | CallKind::PartialSum | CallKind::IndexOfPartialSum, [arguments]) => {
                ("s".to_string(), arguments.clone())
            }
            _ => {
                return Err(MathError::Internal(format!(
                    "malformed call token '{}'",
                    token.text
                )))
            }
        };

        let args = self.parse_arguments(&arguments)?;
        debug!("Built call to {} ({:?}) with {} arguments", name, kind, args.len());
        Ok(FunctionCall {
            token,
            name,
            kind,
            args,
        })
    }

    /// Appends an operator, rejecting operators without a left operand (other
    /// than a leading `-`) and doubled operators. `- -` becomes `+`.
    fn push_operator(&self, current: &mut Expression, token: Token) -> Result<(), MathError> {
        let operator = Operator::new(token).map_err(MathError::Internal)?;

        let previous = match current.last_chunk() {
            Some(Chunk::Operator(previous)) => Some(previous.kind),
            Some(_) => None,
            None if operator.kind == OperatorKind::Subtract => None,
            None => return Err(self.syntax_error(&operator.token, "Unexpected operator")),
        };

        match previous {
            Some(OperatorKind::Subtract) if operator.kind == OperatorKind::Subtract => {
                let last = current.chunks.len() - 1;
                let plus = Token::synthetic(TokenKind::Operator, "+", current.chunks[last].token());
                current.chunks[last] = Chunk::Operator(Operator {
                    kind: OperatorKind::Add,
                    token: plus,
                });
            }
            Some(kind) if kind == operator.kind => {
                return Err(self.syntax_error(
                    &operator.token,
                    format!("Unexpected '{}'", operator.kind),
                ))
            }
            Some(_) if operator.kind != OperatorKind::Subtract => {
                return Err(self.syntax_error(&operator.token, "Unexpected operator"))
            }
            _ => current.add_chunk(Chunk::Operator(operator)),
        }
        Ok(())
    }

    fn check_definition(
        &self,
        token: &Token,
        current: &Expression,
        allow_definitions: bool,
    ) -> Result<(), MathError> {
        if !allow_definitions {
            let message = match token.kind {
                TokenKind::Sequence => "Sequences are not allowed here",
                _ => "Functions are not allowed here",
            };
            return Err(self.syntax_error(token, message));
        }
        if !current.is_empty() {
            return Err(self.syntax_error(token, "Unexpected definition"));
        }
        Ok(())
    }

    fn define_function(&mut self, token: &Token) -> Result<(), MathError> {
        let [name, params, body] = token.captures.as_slice() else {
            return Err(MathError::Internal(format!(
                "malformed function token '{}'",
                token.text
            )));
        };
        let name = name.text.clone();
        if self.sequence.is_some() && (name == "S" || name == "s") {
            return Err(self.syntax_error(
                token,
                format!("'{}' is reserved for the sequence", name),
            ));
        }

        let mut parameters: Vec<String> = Vec::new();
        if !params.text.trim().is_empty() {
            for param in params.text.split(',').map(str::trim) {
                if param.is_empty() || !param.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(self.syntax_error(
                        token,
                        format!("Invalid argument name '{}' in {}", param, name),
                    ));
                }
                if parameters.iter().any(|existing| existing == param) {
                    return Err(self.syntax_error(
                        token,
                        format!("Duplicate argument '{}' in {}", param, name),
                    ));
                }
                parameters.push(param.to_string());
            }
        }

        let body = self.parse_body(token, body)?;
        debug!("Defined function {}({})", name, parameters.join(", "));
        self.symbols.define(
            &name,
            Function::User(UserFunction {
                token: token.clone(),
                name: name.clone(),
                params: parameters,
                body,
            }),
        );
        Ok(())
    }

    fn define_plot(&mut self, token: &Token) -> Result<Function, MathError> {
        let [body] = token.captures.as_slice() else {
            return Err(MathError::Internal(format!(
                "malformed plot token '{}'",
                token.text
            )));
        };
        let body = self.parse_body(token, body)?;
        debug!("Defined plot {}", token.text);
        let plot = Function::Plottable(UserFunction {
            token: token.clone(),
            name: "y".to_string(),
            params: vec!["x".to_string()],
            body,
        });
        self.symbols.define("y", plot.clone());
        Ok(plot)
    }

    fn define_sequence(&mut self, token: &Token) -> Result<(), MathError> {
        if self.sequence.is_some() || self.symbols.contains("S") || self.symbols.contains("s") {
            return Err(self.syntax_error(token, "A sequence has already been defined"));
        }
        debug!("Defined sequence {}", token.text);
        self.sequence = Some(GeoSequence::new(token.clone()));
        self.symbols.define("S", Function::Sequence);
        self.symbols.define("s", Function::Sequence);
        Ok(())
    }

    fn parse_body(&mut self, token: &Token, body: &Capture) -> Result<Vec<Chunk>, MathError> {
        let tokens = Lexer::with_range(&self.source, LexerMode::Statement, body.range()).tokenize()?;
        let mut statements = self.traverse_tokens(tokens, false)?;
        match (statements.pop(), statements.is_empty()) {
            (Some(Statement::Expression(expression)), true) => Ok(expression.chunks),
            (None, _) => Err(self.syntax_error(token, "Function body is empty")),
            _ => Err(self.syntax_error(token, "Invalid function body")),
        }
    }

    /// Checks the whole session once every definition is known: calls in
    /// top-level expressions, the plots, the sequence terms, then the user
    /// functions, which must not call themselves.
    fn validate_session(&mut self, statements: &[Statement]) -> Result<(), MathError> {
        for statement in statements {
            match statement {
                Statement::Expression(expression) => {
                    validate_chunks(self, &expression.chunks, &[], false)?
                }
                Statement::Plot(plot) => plot.validate(self)?,
            }
        }

        if let Some(mut sequence) = self.sequence.take() {
            let result = sequence.validate(self);
            self.sequence = Some(sequence);
            result?;
        }

        for function in self.symbols.definitions() {
            function.validate(self)?;
        }
        self.check_recursion()
    }

    fn check_recursion(&self) -> Result<(), MathError> {
        for function in self.symbols.definitions() {
            let (Function::User(root) | Function::Plottable(root)) = function else {
                continue;
            };

            let mut pending = calls_in(&root.body);
            let mut visited = HashSet::new();
            while let Some(call) = pending.pop() {
                if call.name == root.name {
                    return Err(self.syntax_error(
                        &call.token,
                        format!("Function '{}' cannot call itself", root.name),
                    ));
                }
                if !visited.insert(call.name.as_str()) {
                    continue;
                }
                if let Some(Function::User(callee)) = self.symbols.function(&call.name) {
                    pending.extend(calls_in(&callee.body));
                }
            }
        }
        Ok(())
    }

    fn validate_expression(&self, expression: &mut Expression) -> Result<(), MathError> {
        fold_negative_literal(&mut expression.chunks);
        if let Some(Chunk::Operator(operator)) = expression.last_chunk() {
            return Err(self.syntax_error(
                &operator.token,
                format!("Expected a value after '{}'", operator.kind),
            ));
        }
        Ok(())
    }

    pub(crate) fn syntax_error(&self, token: &Token, message: impl Into<String>) -> MathError {
        SyntaxError::new(
            SyntaxErrorKind::Syntax,
            message,
            Position::of(&self.source, token),
        )
        .into()
    }

    pub(crate) fn name_error(&self, token: &Token, message: impl Into<String>) -> MathError {
        SyntaxError::new(
            SyntaxErrorKind::Name,
            message,
            Position::of(&self.source, token),
        )
        .into()
    }

    pub(crate) fn evaluation_error(
        &self,
        kind: EvaluationErrorKind,
        token: &Token,
        message: impl Into<String>,
        left: f64,
        right: f64,
    ) -> MathError {
        EvaluationError {
            kind,
            message: message.into(),
            position: Position::of(&self.source, token),
            left,
            right,
        }
        .into()
    }
}
