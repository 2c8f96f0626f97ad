//! Null-aware functions. These never propagate NULL.

use crate::error::ExprResult;
use crate::expression::FunctionKey;
use crate::value::Value;

/// Call a null-aware function. Returns None if function not found.
pub fn call(key: FunctionKey, args: &[Value]) -> ExprResult<Option<Value>> {
    let result = match key {
        FunctionKey::IsNull => Some(Value::Boolean(args[0].is_null())),
        FunctionKey::IsNotNull => Some(Value::Boolean(!args[0].is_null())),
        FunctionKey::IfNull => Some(if args[0].is_null() {
            args[1].clone()
        } else {
            args[0].clone()
        }),
        _ => None,
    };
    Ok(result)
}
