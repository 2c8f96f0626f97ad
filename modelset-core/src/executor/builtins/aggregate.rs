//! Aggregate functions, ranged over the rows in the argument's scope.

use std::cmp::Ordering;

use crate::error::{ExprError, ExprResult};
use crate::expression::{Expr, FunctionKey};
use crate::value::{finite, DataType, Value};

use super::super::evaluator::evaluate;
use super::super::helpers::compare_values;
use super::super::RowScope;

/// Evaluate an aggregate at `row`.
pub fn call<R: RowScope>(
    key: FunctionKey,
    arg: &Expr,
    result_type: DataType,
    row: Option<&R>,
) -> ExprResult<Value> {
    let row = row.ok_or_else(|| ExprError::UnboundColumn(format!("{}()", key.name())))?;
    let scope = arg.scope_model().ok_or_else(|| {
        ExprError::Argument(format!(
            "{} requires an argument referencing a model column",
            key.name()
        ))
    })?;
    let rows = row.rows_in_scope(scope)?;

    match key {
        FunctionKey::CountRows => Ok(Value::Int(rows.len() as i64)),

        FunctionKey::First => match rows.first() {
            Some(r) => evaluate(arg, Some(r)),
            None => Ok(Value::Null),
        },

        FunctionKey::Last => match rows.last() {
            Some(r) => evaluate(arg, Some(r)),
            None => Ok(Value::Null),
        },

        FunctionKey::Count => {
            let mut count = 0i64;
            for r in &rows {
                if !evaluate(arg, Some(r))?.is_null() {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }

        FunctionKey::Sum => {
            let mut sum: Option<Value> = None;
            for r in &rows {
                let value = evaluate(arg, Some(r))?;
                if value.is_null() {
                    continue;
                }
                sum = Some(match sum {
                    None => value,
                    Some(acc) => add(acc, value)?,
                });
            }
            sum.unwrap_or(Value::Null).conform(result_type)
        }

        FunctionKey::Average => {
            let mut total = 0.0;
            let mut count = 0usize;
            for r in &rows {
                let value = evaluate(arg, Some(r))?;
                if value.is_null() {
                    continue;
                }
                total += value.as_f64().ok_or_else(|| {
                    ExprError::TypeMismatch(format!(
                        "Average requires numeric values, found {}",
                        value.kind_name()
                    ))
                })?;
                count += 1;
            }
            if count == 0 {
                Ok(Value::Null)
            } else {
                finite(total / count as f64, DataType::Double)
            }
        }

        FunctionKey::Min | FunctionKey::Max => {
            let wanted = if key == FunctionKey::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<Value> = None;
            for r in &rows {
                let value = evaluate(arg, Some(r))?;
                if value.is_null() {
                    continue;
                }
                best = Some(match best {
                    None => value,
                    Some(current) => {
                        if compare_values(&value, &current)? == wanted {
                            value
                        } else {
                            current
                        }
                    }
                });
            }
            Ok(best.unwrap_or(Value::Null))
        }

        other => Err(ExprError::Evaluation(format!(
            "{} is not an aggregate",
            other.name()
        ))),
    }
}

fn add(acc: Value, value: Value) -> ExprResult<Value> {
    match (acc, value) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(b)
            .map(Value::Int)
            .ok_or_else(|| ExprError::Evaluation("integer overflow in Sum".to_string())),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => finite(x + y, DataType::Double),
            _ => Err(ExprError::TypeMismatch(format!(
                "Sum requires numeric values, found {}",
                b.kind_name()
            ))),
        },
    }
}
