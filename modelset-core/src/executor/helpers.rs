//! Core evaluation helpers.
//!
//! - three-valued logic (`and3`, `or3`, `not3`, `truth`)
//! - evaluate_unary_op / evaluate_binary_op with SQL NULL propagation
//! - compare_values for aggregate ordering

use std::cmp::Ordering;

use crate::error::{ExprError, ExprResult};
use crate::expression::{BinaryOp, UnaryOp};
use crate::value::{finite, DataType, Value};

/// Interpret a value as a nullable boolean.
#[inline]
pub fn truth(value: &Value) -> ExprResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(ExprError::TypeMismatch(format!(
            "expected boolean, found {}",
            other.kind_name()
        ))),
    }
}

/// SQL AND: false dominates, then NULL.
#[inline]
pub fn and3(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// SQL OR: true dominates, then NULL.
#[inline]
pub fn or3(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

#[inline]
pub fn not3(value: Option<bool>) -> Option<bool> {
    value.map(|b| !b)
}

#[inline]
pub fn from3(value: Option<bool>) -> Value {
    value.map(Value::Boolean).unwrap_or(Value::Null)
}

/// Evaluate a unary operator. NULL in, NULL out.
pub fn evaluate_unary_op(op: UnaryOp, value: Value) -> ExprResult<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Negate, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(|| {
            ExprError::Evaluation(format!("integer overflow negating {}", i))
        }),
        (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::OnesComplement, Value::Int(i)) => Ok(Value::Int(!i)),
        (op, v) => Err(ExprError::TypeMismatch(format!(
            "operator {:?} cannot be applied to {}",
            op,
            v.kind_name()
        ))),
    }
}

/// Evaluate a non-short-circuit binary operator.
///
/// Any NULL operand yields NULL. `And`/`Or` are handled here with
/// three-valued semantics for callers that already hold both operands.
pub fn evaluate_binary_op(op: BinaryOp, left: Value, right: Value) -> ExprResult<Value> {
    if op.is_logical() {
        let (l, r) = (truth(&left)?, truth(&right)?);
        return Ok(from3(match op {
            BinaryOp::And => and3(l, r),
            _ => or3(l, r),
        }));
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if op.is_comparison() {
        let ordering = left.compare(&right)?;
        return Ok(match ordering {
            None => Value::Null,
            Some(o) => Value::Boolean(match op {
                BinaryOp::Equal => o == Ordering::Equal,
                BinaryOp::NotEqual => o != Ordering::Equal,
                BinaryOp::LessThan => o == Ordering::Less,
                BinaryOp::LessThanOrEqual => o != Ordering::Greater,
                BinaryOp::GreaterThan => o == Ordering::Greater,
                _ => o != Ordering::Less,
            }),
        });
    }
    match (op, left, right) {
        (BinaryOp::Add, Value::Text(a), Value::Text(b)) => Ok(Value::Text(a + &b)),
        (op, Value::Int(a), Value::Int(b)) => integer_op(op, a, b),
        (op, Value::Boolean(a), Value::Boolean(b)) => match op {
            BinaryOp::BitwiseAnd => Ok(Value::Boolean(a & b)),
            BinaryOp::BitwiseOr => Ok(Value::Boolean(a | b)),
            BinaryOp::BitwiseXor => Ok(Value::Boolean(a ^ b)),
            _ => Err(mismatch(op, "boolean")),
        },
        (op, l @ (Value::Int(_) | Value::Float(_)), r @ (Value::Int(_) | Value::Float(_))) => {
            let (a, b) = (l.as_f64().unwrap_or_default(), r.as_f64().unwrap_or_default());
            float_op(op, a, b)
        }
        (op, l, _) => Err(mismatch(op, l.kind_name())),
    }
}

fn integer_op(op: BinaryOp, a: i64, b: i64) -> ExprResult<Value> {
    let overflow = || ExprError::Evaluation(format!("integer overflow in {} {:?} {}", a, op, b));
    let result = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Divide => {
            if b == 0 {
                return Err(ExprError::DivideByZero);
            }
            a.checked_div(b).ok_or_else(overflow)?
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Err(ExprError::DivideByZero);
            }
            a.checked_rem(b).ok_or_else(overflow)?
        }
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::BitwiseXor => a ^ b,
        _ => return Err(mismatch(op, "integer")),
    };
    Ok(Value::Int(result))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> ExprResult<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => return Err(ExprError::DivideByZero),
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        _ => return Err(mismatch(op, "float")),
    };
    finite(result, DataType::Double)
}

fn mismatch(op: BinaryOp, kind: &str) -> ExprError {
    ExprError::TypeMismatch(format!("operator {:?} cannot be applied to {}", op, kind))
}

/// Total ordering for aggregate MIN/MAX over non-null values.
#[inline]
pub fn compare_values(left: &Value, right: &Value) -> ExprResult<Ordering> {
    Ok(left.compare(right)?.unwrap_or(Ordering::Equal))
}
