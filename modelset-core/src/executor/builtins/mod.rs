//! Builtin functions.
//!
//! Aggregates receive their argument unevaluated and range it over the rows
//! in scope; every other function receives evaluated argument values.

mod aggregate;
mod datetime;
mod math;
mod null;
mod string;

use crate::error::{ExprError, ExprResult};
use crate::expression::{Expr, FunctionKey};
use crate::value::{DataType, Value};

use super::evaluator::evaluate;
use super::RowScope;

/// Container for builtin function implementations.
pub struct BuiltinFunctions;

impl BuiltinFunctions {
    /// Call a builtin function.
    pub fn call<R: RowScope>(
        key: FunctionKey,
        args: &[Expr],
        result_type: DataType,
        row: Option<&R>,
    ) -> ExprResult<Value> {
        check_arity(key, args.len())?;

        if key.is_aggregate() {
            return aggregate::call(key, &args[0], result_type, row);
        }

        let values = args
            .iter()
            .map(|arg| evaluate(arg, row))
            .collect::<ExprResult<Vec<Value>>>()?;

        // Null-aware functions
        if let Some(result) = null::call(key, &values)? {
            return Ok(result);
        }

        // String functions
        if let Some(result) = string::call(key, &values)? {
            return Ok(result);
        }

        // Math functions
        if let Some(result) = math::call(key, &values)? {
            return Ok(result.conform(result_type)?);
        }

        // DateTime and identity functions
        if let Some(result) = datetime::call(key, &values)? {
            return Ok(result);
        }

        Err(ExprError::Evaluation(format!(
            "Unknown function: {}",
            key.name()
        )))
    }
}

fn check_arity(key: FunctionKey, count: usize) -> ExprResult<()> {
    let (min, max) = key.arity();
    if count < min || count > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}-{}", min, max)
        };
        return Err(ExprError::Argument(format!(
            "{} requires {} argument(s), got {}",
            key.name(),
            expected,
            count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NoRow;

    fn call(key: FunctionKey, args: Vec<Expr>) -> ExprResult<Value> {
        let result_type = Expr::function(key, args.clone()).data_type();
        BuiltinFunctions::call::<NoRow>(key, &args, result_type, None)
    }

    fn text(s: &str) -> Expr {
        Expr::constant(s, DataType::String)
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(
            call(FunctionKey::Upper, vec![text("hello")]).unwrap(),
            Value::from("HELLO")
        );
        assert_eq!(
            call(FunctionKey::Lower, vec![text("HELLO")]).unwrap(),
            Value::from("hello")
        );
        assert_eq!(
            call(FunctionKey::Length, vec![text("héllo")]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            call(FunctionKey::Trim, vec![text("  x ")]).unwrap(),
            Value::from("x")
        );
        assert_eq!(
            call(FunctionKey::Contains, vec![text("abcdef"), text("cd")]).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            call(
                FunctionKey::Contains,
                vec![text("abc"), Expr::null(DataType::String)]
            )
            .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_null_functions() {
        let null = Expr::null(DataType::Int32);
        let five = Expr::constant(5, DataType::Int32);
        assert_eq!(
            call(FunctionKey::IsNull, vec![null.clone()]).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            call(FunctionKey::IsNotNull, vec![null.clone()]).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            call(FunctionKey::IfNull, vec![null, five.clone()]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            call(FunctionKey::IfNull, vec![five, Expr::constant(7, DataType::Int32)]).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(
            call(FunctionKey::Abs, vec![Expr::constant(-5, DataType::Int32)]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            call(
                FunctionKey::Round,
                vec![
                    Expr::constant(2.375, DataType::Double),
                    Expr::constant(2, DataType::Int32)
                ]
            )
            .unwrap(),
            Value::Float(2.38)
        );
    }

    #[test]
    fn test_system_functions() {
        let now = call(FunctionKey::GetUtcDate, vec![]).unwrap();
        assert!(matches!(now, Value::DateTime(_)));
        let a = call(FunctionKey::NewGuid, vec![]).unwrap();
        let b = call(FunctionKey::NewGuid, vec![]).unwrap();
        assert!(matches!(a, Value::Guid(_)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_arity_checked() {
        let err = call(FunctionKey::IfNull, vec![text("a")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument: IfNull requires 2 argument(s), got 1"
        );
    }

    #[test]
    fn test_aggregate_without_row_is_unbound() {
        let column = Expr::column(crate::expression::ColumnRef {
            model: crate::expression::ModelId(0),
            slot: 0,
            name: "Amount".to_string(),
            data_type: DataType::Int32,
        });
        assert!(matches!(
            call(FunctionKey::Sum, vec![column]),
            Err(ExprError::UnboundColumn(_))
        ));
    }
}
