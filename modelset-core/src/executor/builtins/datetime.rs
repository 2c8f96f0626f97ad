//! Clock and identity functions.

use chrono::{Local, Utc};
use uuid::Uuid;

use crate::error::ExprResult;
use crate::expression::FunctionKey;
use crate::value::Value;

/// Call a clock/identity function. Returns None if function not found.
pub fn call(key: FunctionKey, _args: &[Value]) -> ExprResult<Option<Value>> {
    let result = match key {
        FunctionKey::GetDate => Some(Value::DateTime(Local::now().naive_local())),
        FunctionKey::GetUtcDate => Some(Value::DateTime(Utc::now().naive_utc())),
        FunctionKey::NewGuid => Some(Value::Guid(Uuid::new_v4())),
        _ => None,
    };
    Ok(result)
}
