//! Math builtin functions.

use crate::error::{ExprError, ExprResult};
use crate::expression::FunctionKey;
use crate::value::Value;

/// Call a math function. Returns None if function not found.
pub fn call(key: FunctionKey, args: &[Value]) -> ExprResult<Option<Value>> {
    let result = match key {
        FunctionKey::Abs => match &args[0] {
            Value::Null => Value::Null,
            Value::Int(i) => Value::Int(i.checked_abs().ok_or_else(|| {
                ExprError::Evaluation(format!("integer overflow in Abs({})", i))
            })?),
            Value::Float(f) => Value::Float(f.abs()),
            other => return Err(not_numeric(key, other)),
        },

        FunctionKey::Round => {
            let digits = match args.get(1) {
                None => 0,
                Some(Value::Int(d)) => *d,
                Some(Value::Null) => return Ok(Some(Value::Null)),
                Some(other) => return Err(not_numeric(key, other)),
            };
            match &args[0] {
                Value::Null => Value::Null,
                Value::Int(i) => Value::Int(*i),
                Value::Float(f) => {
                    let multiplier = 10f64.powi(digits as i32);
                    Value::Float((f * multiplier).round() / multiplier)
                }
                other => return Err(not_numeric(key, other)),
            }
        }

        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn not_numeric(key: FunctionKey, value: &Value) -> ExprError {
    ExprError::TypeMismatch(format!(
        "{}: expected number, found {}",
        key.name(),
        value.kind_name()
    ))
}
