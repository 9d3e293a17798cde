use std::collections::HashMap;

/// Argument bindings visible while evaluating a function body.
///
/// Names are looked up here first and fall back to the session's symbol table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    values: HashMap<String, f64>,
}

impl Scope {
    /// Creates an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<K: Into<String>>(values: impl IntoIterator<Item = (K, f64)>) -> Self {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Binds `values` positionally to `params`.
    pub fn bind<S: AsRef<str>>(params: &[S], values: &[f64]) -> Self {
        Self::with_values(
            params
                .iter()
                .map(|param| param.as_ref().to_string())
                .zip(values.iter().copied()),
        )
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Retrieves a binding or reports the missing name
    pub fn get_number(&self, key: &str) -> Result<f64, String> {
        self.get(key)
            .ok_or_else(|| format!("Missing argument: {}", key))
    }
}
