use log::debug;
use mathparser::{evaluate_expression, Output};

fn main() {
    pretty_env_logger::init();

    let inputs = [
        "2 + 3 * 4",
        "2(3) - -1",
        "f(x) = x^2\nf(4) / 2",
        "atan(1, 0)",
        "2 ^ 51",
    ];

    for input in inputs {
        debug!("input: {input:?}");
        match evaluate_expression(input) {
            Ok(outputs) => {
                for output in outputs {
                    if let Output::Number(value) = output {
                        println!("{} => {}", input.replace('\n', "; "), value);
                    }
                }
            }
            Err(err) => println!("Error:\n{}", err.render()),
        }
    }
}
