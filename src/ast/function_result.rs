use std::collections::BTreeMap;

/// Sampled plot: x mapped to y, or `None` where the sample divided by zero.
pub type PlotPoints = BTreeMap<i64, Option<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionResult {
    Number(f64),
    Points(PlotPoints),
}

impl FunctionResult {
    /// The value of a numeric result.
    pub fn as_number(&self) -> Option<f64> {
        if let FunctionResult::Number(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// The samples of a plot result.
    pub fn as_points(&self) -> Option<&PlotPoints> {
        if let FunctionResult::Points(points) = self {
            Some(points)
        } else {
            None
        }
    }
}
