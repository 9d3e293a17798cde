use mathparser::{Output, Parser};

fn main() {
    pretty_env_logger::init();

    // Each input is its own session: definitions do not carry over.
    let inputs = vec![
        "S = 3, 6, 12\nS(5)\nS!(5)\nS?(48)\nS!!(93)",
        "area(r) = pi * r^2\narea(2)\narea(3)",
        "area(2)",
        "y = x^2 - 4\ny = 1/x",
    ];

    for (i, input) in inputs.iter().enumerate() {
        match Parser::new(*input).run() {
            Ok(outputs) => {
                for output in outputs {
                    match output {
                        Output::Number(value) => println!("Session {}: {}", i, value),
                        Output::Plot(plot) => println!("Session {}: plot {} {:?}", i, plot.number, plot.points),
                    }
                }
            }
            Err(err) => println!("Session {} failed:\n{}", i, err.render()),
        }
    }
}
