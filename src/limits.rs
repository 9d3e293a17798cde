use std::ops::RangeInclusive;

/// Largest operand magnitude accepted by any binary operation.
pub const MAX_ALLOWABLE_NUMBER: f64 = 99_999_999.0;
/// Largest exponent accepted by `^` and by the sequence transforms.
pub const MAX_EXPONENT: f64 = 50.0;
/// The x values a plot is sampled at.
pub const PLOT_RANGE: RangeInclusive<i64> = -5..=5;

/// Numeric bounds applied while evaluating one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub max_number: f64,
    pub max_exponent: f64,
    pub plot_range: RangeInclusive<i64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_number: MAX_ALLOWABLE_NUMBER,
            max_exponent: MAX_EXPONENT,
            plot_range: PLOT_RANGE,
        }
    }
}
