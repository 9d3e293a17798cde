//! Builtin functions and constants available in every session.

pub mod other;
pub mod trig;

use crate::ast::SymbolTable;

pub fn register_functions(table: &mut SymbolTable) {
    trig::register(table);
    other::register(table);
}
