use crate::ast::SymbolTable;
use crate::error::BuiltinError;
use mathparser_macros::builtin;
use std::f64::consts::{E, PI};

pub fn register(table: &mut SymbolTable) {
    table.register_function("log", LOG_PARAMS, log);

    table.register_constant("π", PI);
    table.register_constant("pi", PI);
    table.register_constant("E", E);
}

/// Natural logarithm.
#[builtin]
fn log(num: f64) -> Result<f64, BuiltinError> {
    Ok(num.ln())
}
