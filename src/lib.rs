pub mod ast;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod limits;
pub mod render;

pub use ast::Parser;
pub use error::MathError;
pub use limits::Limits;
pub use render::{render_outputs, Output, Plot, PlotRenderer, Rendered};

/// Parses and evaluates every statement of `input` in a fresh session.
pub fn evaluate_expression(input: &str) -> Result<Vec<Output>, MathError> {
    Parser::new(input).run()
}
