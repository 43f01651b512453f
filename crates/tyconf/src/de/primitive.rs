//! Primitive type handler.
//!
//! Loading supports implicit conversions that don't lose information: e.g., `2.0` can be loaded as an `int`,
//! and any scalar can be loaded as a `str`. Lossy conversions (e.g., `1.5` to `int`) fail with
//! an [`ImplicitCast`](ErrorKind::ImplicitCast) error. Dumping is strict.

use super::{
    ParseContext, TypeHandler, builtin::primitive_kind, expected_plain, expected_typed,
    float_to_plain, unexpected_type,
};
use crate::{
    error::{Error, ErrorKind, ValidationError},
    metadata::{PrimitiveType, Ty},
    value::{Plain, TypedValue},
};

#[derive(Debug)]
pub(super) struct PrimitiveHandler;

impl TypeHandler for PrimitiveHandler {
    fn name(&self) -> &str {
        "primitive"
    }

    fn claims(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Primitive(_))
    }

    fn load(&self, ty: &Ty, plain: &Plain, ctx: &mut ParseContext<'_>) -> Result<TypedValue, Error> {
        let Ty::Primitive(ty) = ty else {
            return Err(unexpected_type(self, ty));
        };
        let value = match ty {
            PrimitiveType::Bool => TypedValue::Bool(load_bool(plain)?),
            PrimitiveType::Int => TypedValue::Int(load_int(plain)?),
            PrimitiveType::Float => TypedValue::Float(load_float(plain)?),
            PrimitiveType::Str => TypedValue::Str(load_str(plain)?),
        };
        ctx.mark_cli_anchor(primitive_kind(*ty));
        Ok(value)
    }

    fn dump(&self, ty: &Ty, value: &TypedValue, _ctx: &mut ParseContext<'_>) -> Result<Plain, Error> {
        let Ty::Primitive(ty) = ty else {
            return Err(unexpected_type(self, ty));
        };
        Ok(match (ty, value) {
            (PrimitiveType::Bool, TypedValue::Bool(val)) => Plain::Bool(*val),
            (PrimitiveType::Int, TypedValue::Int(val)) => Plain::from(*val),
            (PrimitiveType::Float, TypedValue::Float(val)) => float_to_plain(*val)?,
            (PrimitiveType::Str, TypedValue::Str(val)) => Plain::String(val.clone()),
            _ => return Err(expected_typed(ty.name(), value)),
        })
    }
}

fn cast_error(from: &str, plain: &Plain, to: PrimitiveType) -> ValidationError {
    ValidationError::implicit_cast(format!("cannot implicitly cast {from} {plain} to {to}"))
}

/// Spellings accepted for Boolean values (compared case-insensitively).
const TRUE_SPELLINGS: &[&str] = &["true", "t", "yes", "y", "1"];
const FALSE_SPELLINGS: &[&str] = &["false", "f", "no", "n", "0"];

/// Parses a Boolean value from a string using common spellings.
pub fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim().to_ascii_lowercase();
    if TRUE_SPELLINGS.contains(&s.as_str()) {
        Some(true)
    } else if FALSE_SPELLINGS.contains(&s.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn load_bool(plain: &Plain) -> Result<bool, Error> {
    match plain {
        Plain::Bool(val) => Ok(*val),
        Plain::Number(num) => {
            if let Some(val) = num.as_i64() {
                match val {
                    0 => Ok(false),
                    1 => Ok(true),
                    _ => Err(cast_error("int", plain, PrimitiveType::Bool).into()),
                }
            } else if let Some(val) = num.as_f64() {
                if val == 0.0 {
                    Ok(false)
                } else if val == 1.0 {
                    Ok(true)
                } else {
                    Err(cast_error("float", plain, PrimitiveType::Bool).into())
                }
            } else {
                Err(cast_error("int", plain, PrimitiveType::Bool).into())
            }
        }
        Plain::String(s) => {
            parse_bool(s).ok_or_else(|| cast_error("string", plain, PrimitiveType::Bool).into())
        }
        _ => Err(expected_plain("bool", plain)),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)] // checked
fn load_int(plain: &Plain) -> Result<i64, Error> {
    match plain {
        Plain::Bool(val) => Ok(i64::from(*val)),
        Plain::Number(num) => {
            if let Some(val) = num.as_i64() {
                Ok(val)
            } else if num.is_u64() {
                Err(ValidationError::new(
                    ErrorKind::ImplicitCast,
                    format!("integer {num} does not fit into int"),
                )
                .into())
            } else {
                let val = num.as_f64().unwrap_or(f64::NAN);
                // `i64::MAX as f64` rounds up to 2^63, hence the strict upper bound.
                if val.fract() == 0.0 && val >= i64::MIN as f64 && val < i64::MAX as f64 {
                    Ok(val as i64)
                } else {
                    Err(cast_error("float", plain, PrimitiveType::Int).into())
                }
            }
        }
        Plain::String(s) => s
            .trim()
            .parse()
            .map_err(|_| cast_error("string", plain, PrimitiveType::Int).into()),
        _ => Err(expected_plain("int", plain)),
    }
}

fn load_float(plain: &Plain) -> Result<f64, Error> {
    match plain {
        Plain::Bool(val) => Ok(f64::from(u8::from(*val))),
        Plain::Number(num) => num
            .as_f64()
            .ok_or_else(|| cast_error("number", plain, PrimitiveType::Float).into()),
        // Non-finite values cannot be dumped back.
        Plain::String(s) => match s.trim().parse::<f64>() {
            Ok(val) if val.is_finite() => Ok(val),
            _ => Err(cast_error("string", plain, PrimitiveType::Float).into()),
        },
        _ => Err(expected_plain("float", plain)),
    }
}

fn load_str(plain: &Plain) -> Result<String, Error> {
    match plain {
        Plain::String(s) => Ok(s.clone()),
        Plain::Bool(val) => Ok(val.to_string()),
        Plain::Number(num) => Ok(num.to_string()),
        _ => Err(expected_plain("str", plain)),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use test_casing::test_casing;

    use super::*;

    #[test_casing(6, [
        (json!(1), 1),
        (json!(-3), -3),
        (json!(2.0), 2),
        (json!(true), 1),
        (json!("42"), 42),
        (json!(" -7 "), -7),
    ])]
    #[test]
    fn loading_int(plain: Plain, expected: i64) {
        assert_eq!(load_int(&plain).unwrap(), expected);
    }

    #[test_casing(4, [json!(1.5), json!(1e30), json!("1.5"), json!(u64::MAX)])]
    #[test]
    fn lossy_int_conversions(plain: Plain) {
        let err = load_int(&plain).unwrap_err();
        let Error::Validation(err) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_matches!(err.kind(), ErrorKind::ImplicitCast);
    }

    #[test]
    fn fractional_float_to_int_error_message() {
        let err = load_int(&json!(1.5)).unwrap_err();
        assert_eq!(err.to_string(), "cannot implicitly cast float 1.5 to int");
    }

    #[test_casing(8, [
        (json!(true), true),
        (json!(0), false),
        (json!(1.0), true),
        (json!("yes"), true),
        (json!("N"), false),
        (json!("TRUE"), true),
        (json!("f"), false),
        (json!("1"), true),
    ])]
    #[test]
    fn loading_bool(plain: Plain, expected: bool) {
        assert_eq!(load_bool(&plain).unwrap(), expected);
    }

    #[test]
    fn lossy_bool_conversions() {
        for plain in [json!(0.5), json!(2), json!("maybe")] {
            let err = load_bool(&plain).unwrap_err();
            let err = err.as_validation().unwrap();
            assert_matches!(err.kind(), ErrorKind::ImplicitCast);
        }
        let err = load_bool(&json!([true])).unwrap_err();
        assert_matches!(err.as_validation().unwrap().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn loading_float_and_str() {
        assert_eq!(load_float(&json!(3)).unwrap(), 3.0);
        assert_eq!(load_float(&json!("2.5")).unwrap(), 2.5);
        assert_eq!(load_float(&json!(false)).unwrap(), 0.0);
        assert_eq!(load_float(&json!(" -1e3 ")).unwrap(), -1000.0);
        assert_eq!(load_str(&json!(1)).unwrap(), "1");
        assert_eq!(load_str(&json!(1.0)).unwrap(), "1.0");
        assert_eq!(load_str(&json!(true)).unwrap(), "true");
        load_str(&json!(null)).unwrap_err();
        load_str(&json!({})).unwrap_err();
    }

    #[test_casing(5, ["nan", "NaN", "inf", "-infinity", "1e400"])]
    #[test]
    fn non_finite_floats_are_rejected(s: &str) {
        let err = load_float(&json!(s)).unwrap_err();
        let err = err.as_validation().unwrap();
        assert_matches!(err.kind(), ErrorKind::ImplicitCast);
        assert_eq!(err.message(), format!("cannot implicitly cast string \"{s}\" to float"));

        let err = crate::load(&Ty::float(), &json!(s)).unwrap_err();
        assert_matches!(err.as_validation().unwrap().kind(), ErrorKind::ImplicitCast);
    }
}
