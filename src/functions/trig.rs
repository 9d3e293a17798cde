use crate::ast::SymbolTable;
use crate::error::BuiltinError;
use mathparser_macros::builtin;

pub fn register(table: &mut SymbolTable) {
    table.register_function("rad", RAD_PARAMS, rad);
    table.register_function("sin", SIN_PARAMS, sin);
    table.register_function("cos", COS_PARAMS, cos);
    table.register_function("tan", TAN_PARAMS, tan);
    table.register_function("asin", ASIN_PARAMS, asin);
    table.register_function("acos", ACOS_PARAMS, acos);
    table.register_function("atan", ATAN_PARAMS, atan);
}

/// Degrees to radians.
#[builtin]
fn rad(num: f64) -> Result<f64, BuiltinError> {
    Ok(num.to_radians())
}

#[builtin]
fn sin(num: f64) -> Result<f64, BuiltinError> {
    Ok(num.sin())
}

#[builtin]
fn cos(num: f64) -> Result<f64, BuiltinError> {
    Ok(num.cos())
}

#[builtin]
fn tan(num: f64) -> Result<f64, BuiltinError> {
    Ok(num.tan())
}

// The inverse functions take the ratio as two numbers: asin(opposite, hypotenuse).

#[builtin]
fn asin(num: f64, num2: f64) -> Result<f64, BuiltinError> {
    ratio(num, num2).map(f64::asin)
}

#[builtin]
fn acos(num: f64, num2: f64) -> Result<f64, BuiltinError> {
    ratio(num, num2).map(f64::acos)
}

#[builtin]
fn atan(num: f64, num2: f64) -> Result<f64, BuiltinError> {
    ratio(num, num2).map(f64::atan)
}

fn ratio(numerator: f64, denominator: f64) -> Result<f64, BuiltinError> {
    if denominator == 0.0 {
        return Err(BuiltinError::DivisionByZero);
    }
    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_rad() {
        assert!((rad(&[180.0]).unwrap() - PI).abs() < 1e-12);
        assert_eq!(rad(&[0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_inverse_functions_take_a_ratio() {
        assert!((asin(&[1.0, 2.0]).unwrap() - PI / 6.0).abs() < 1e-12);
        assert_eq!(acos(&[1.0, 1.0]).unwrap(), 0.0);
        assert!((atan(&[2.0, 2.0]).unwrap() - FRAC_PI_4).abs() < 1e-12);
        assert!((asin(&[3.0, 3.0]).unwrap() - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominator() {
        assert_eq!(atan(&[1.0, 0.0]), Err(BuiltinError::DivisionByZero));
        assert_eq!(acos(&[0.0, 0.0]), Err(BuiltinError::DivisionByZero));
    }

    #[test]
    fn test_arity_is_checked() {
        assert_eq!(
            sin(&[1.0, 2.0]),
            Err(BuiltinError::Arity {
                expected: 1,
                got: 2
            })
        );
        assert_eq!(ATAN_PARAMS, &["num", "num2"]);
    }

    /// Halves its argument.
    #[builtin]
    #[inline]
    fn half(num: f64) -> Result<f64, BuiltinError> {
        Ok(num / 2.0)
    }

    #[test]
    fn test_attributes_are_kept() {
        assert_eq!(half(&[3.0]), Ok(1.5));
        assert_eq!(HALF_PARAMS, &["num"]);
    }

    #[test]
    fn test_out_of_domain_is_nan() {
        assert!(asin(&[2.0, 1.0]).unwrap().is_nan());
    }
}
