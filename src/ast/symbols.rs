use crate::ast::{BuiltinCallback, BuiltinFunction, Function};
use crate::functions::register_functions;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Symbol {
    Constant(f64),
    Function(Function),
}

/// The names known to one session: builtins plus whatever the input defines.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    /// User definitions in the order they were parsed.
    definitions: Vec<String>,
}

impl SymbolTable {
    /// Creates an empty table without builtins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table seeded with the builtin functions and constants.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        register_functions(&mut table);
        table
    }

    /// Registers a native function.
    pub fn register_function(
        &mut self,
        name: &'static str,
        params: &'static [&'static str],
        callback: BuiltinCallback,
    ) {
        let function = Function::Builtin(BuiltinFunction::new(name, params, callback));
        self.symbols
            .insert(name.to_string(), Symbol::Function(function));
    }

    pub fn register_constant(&mut self, name: &str, value: f64) {
        self.symbols.insert(name.to_string(), Symbol::Constant(value));
    }

    /// Stores a function defined by the input, replacing any previous symbol
    /// of the same name.
    pub fn define(&mut self, name: &str, function: Function) {
        if !self.definitions.iter().any(|defined| defined == name) {
            self.definitions.push(name.to_string());
        }
        self.symbols
            .insert(name.to_string(), Symbol::Function(function));
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        match self.symbols.get(name) {
            Some(Symbol::Constant(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        match self.symbols.get(name) {
            Some(Symbol::Function(function)) => Some(function),
            _ => None,
        }
    }

    /// Functions defined by the input, in definition order.
    pub fn definitions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.definitions
            .iter()
            .filter_map(|name| self.function(name))
    }
}
