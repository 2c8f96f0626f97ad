//! String builtin functions.

use crate::error::{ExprError, ExprResult};
use crate::expression::FunctionKey;
use crate::value::Value;

/// Call a string function. Returns None if function not found.
pub fn call(key: FunctionKey, args: &[Value]) -> ExprResult<Option<Value>> {
    if !matches!(
        key,
        FunctionKey::Contains
            | FunctionKey::Upper
            | FunctionKey::Lower
            | FunctionKey::Trim
            | FunctionKey::Length
    ) {
        return Ok(None);
    }
    if args.iter().any(Value::is_null) {
        return Ok(Some(Value::Null));
    }

    let s = get_string(&args[0], key)?;
    let result = match key {
        FunctionKey::Contains => {
            let needle = get_string(&args[1], key)?;
            Value::Boolean(s.contains(needle))
        }
        FunctionKey::Upper => Value::Text(s.to_uppercase()),
        FunctionKey::Lower => Value::Text(s.to_lowercase()),
        FunctionKey::Trim => Value::Text(s.trim().to_string()),
        _ => Value::Int(s.chars().count() as i64),
    };
    Ok(Some(result))
}

fn get_string(value: &Value, key: FunctionKey) -> ExprResult<&str> {
    value.as_str().ok_or_else(|| {
        ExprError::TypeMismatch(format!(
            "{}: expected string, found {}",
            key.name(),
            value.kind_name()
        ))
    })
}
