//! Expression evaluator.

use std::cmp::Ordering;

use crate::error::{ExprError, ExprResult};
use crate::expression::{BinaryOp, Expr};
use crate::value::Value;

use super::builtins::BuiltinFunctions;
use super::helpers::*;
use super::RowScope;

/// Evaluate an expression, optionally against a row.
///
/// Without a row, column references and aggregates fail with
/// [`ExprError::UnboundColumn`].
pub fn evaluate<R: RowScope>(expr: &Expr, row: Option<&R>) -> ExprResult<Value> {
    match expr {
        Expr::Constant { value, .. } | Expr::Parameter { value, .. } => Ok(value.clone()),

        Expr::Column(column) => match row {
            Some(row) => row.value(column),
            None => Err(ExprError::UnboundColumn(column.name.clone())),
        },

        Expr::Unary { op, operand } => {
            let value = evaluate(operand, row)?;
            evaluate_unary_op(*op, value)
        }

        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                let l = truth(&evaluate(left, row)?)?;
                if l == Some(false) {
                    return Ok(Value::Boolean(false));
                }
                let r = truth(&evaluate(right, row)?)?;
                Ok(from3(and3(l, r)))
            }
            BinaryOp::Or => {
                let l = truth(&evaluate(left, row)?)?;
                if l == Some(true) {
                    return Ok(Value::Boolean(true));
                }
                let r = truth(&evaluate(right, row)?)?;
                Ok(from3(or3(l, r)))
            }
            _ => {
                let l = evaluate(left, row)?;
                let r = evaluate(right, row)?;
                evaluate_binary_op(*op, l, r)?.conform(expr.data_type())
            }
        },

        Expr::Cast { operand, target } => evaluate(operand, row)?.cast(*target),

        Expr::Case {
            on,
            when,
            otherwise,
        } => {
            match on {
                Some(selector) => {
                    let selector = evaluate(selector, row)?;
                    for (candidate, then) in when {
                        let candidate = evaluate(candidate, row)?;
                        if selector.compare(&candidate)? == Some(Ordering::Equal) {
                            return evaluate(then, row);
                        }
                    }
                }
                None => {
                    for (guard, then) in when {
                        if truth(&evaluate(guard, row)?)? == Some(true) {
                            return evaluate(then, row);
                        }
                    }
                }
            }
            evaluate(otherwise, row)
        }

        Expr::Function { key, args } => {
            BuiltinFunctions::call(*key, args, expr.data_type(), row)
        }
    }
}
