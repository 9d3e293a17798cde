use mathparser::ast::Statement;
use mathparser::{render_outputs, Parser, Plot, PlotRenderer, Rendered};

/// Draws a plot as text, one row per sample.
struct TextRenderer;

impl PlotRenderer for TextRenderer {
    type Error = String;

    fn render(&self, plot: &Plot) -> Result<Vec<u8>, Self::Error> {
        let mut text = format!("plot {}\n", plot.number);
        for (x, y) in &plot.points {
            match y {
                Some(y) => text.push_str(&format!("{:>3} | {}\n", x, "#".repeat(y.abs().round() as usize))),
                None => text.push_str(&format!("{:>3} |\n", x)),
            }
        }
        Ok(text.into_bytes())
    }
}

fn main() {
    pretty_env_logger::init();

    let mut parser = Parser::new("f(a, b) = a * b + 1\nf(2, 3)\ny = x^2 / 2\nf(4, 4) - 7");
    let statements = match parser.parse() {
        Ok(statements) => statements,
        Err(err) => {
            println!("Error:\n{}", err.render());
            return;
        }
    };

    let mut outputs = Vec::new();
    let mut plots = 0;
    for statement in &statements {
        if matches!(statement, Statement::Plot(_)) {
            plots += 1;
        }
        match parser.evaluate(statement, plots) {
            Ok(output) => outputs.push(output),
            Err(err) => println!("Error:\n{}", err.render()),
        }
    }

    match render_outputs(outputs, &TextRenderer) {
        Ok(rendered) => {
            for item in rendered {
                match item {
                    Rendered::Number(value) => println!("Result: {}", value),
                    Rendered::Image { bytes, .. } => {
                        println!("{}", String::from_utf8_lossy(&bytes))
                    }
                }
            }
        }
        Err(err) => println!("Render error: {}", err),
    }
}
