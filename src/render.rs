//! What a session hands back, and the seam to an external plot renderer.

use crate::ast::PlotPoints;
use log::debug;

/// A sampled plot and its position among the session's plots, starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub number: usize,
    pub points: PlotPoints,
}

/// The result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Number(f64),
    Plot(Plot),
}

impl Output {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Output::Number(value) => Some(*value),
            Output::Plot(_) => None,
        }
    }

    pub fn as_plot(&self) -> Option<&Plot> {
        match self {
            Output::Plot(plot) => Some(plot),
            Output::Number(_) => None,
        }
    }
}

/// Turns plot points into an image. Implemented outside this crate.
pub trait PlotRenderer {
    type Error;

    fn render(&self, plot: &Plot) -> Result<Vec<u8>, Self::Error>;
}

/// An output after rendering: numbers pass through, plots become image bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Number(f64),
    Image { number: usize, bytes: Vec<u8> },
}

/// Renders every plot in `outputs` with `renderer`, keeping statement order.
/// Stops at the first renderer failure.
pub fn render_outputs<R: PlotRenderer>(
    outputs: Vec<Output>,
    renderer: &R,
) -> Result<Vec<Rendered>, R::Error> {
    outputs
        .into_iter()
        .map(|output| match output {
            Output::Number(value) => Ok(Rendered::Number(value)),
            Output::Plot(plot) => {
                let bytes = renderer.render(&plot)?;
                debug!("Rendered plot {} into {} bytes", plot.number, bytes.len());
                Ok(Rendered::Image {
                    number: plot.number,
                    bytes,
                })
            }
        })
        .collect()
}
