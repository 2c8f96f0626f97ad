//! Typed column expressions.
//!
//! [`Column<T>`] wraps a logical [`Expr`] with the Rust type its values take.
//! Schema registration hands out slot-bound columns; operators and functions
//! compose them into derived expressions that evaluate in memory or lower to
//! SQL.

use std::marker::PhantomData;
use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};

use chrono::NaiveDateTime;
use modelset_core::{BinaryOp, ColumnRef, DataType, Expr, FunctionKey, UnaryOp, Value};
use uuid::Uuid;

use crate::dataset::{DataSet, RowKey};
use crate::error::{DataError, DataResult};
use crate::schema::SortDirection;

/// Rust types that can back a column.
pub trait ColumnType: Sized + 'static {
    const DATA_TYPE: DataType;

    fn into_value(self) -> Value;

    /// Convert a stored value back. `Ok(None)` for NULL.
    fn from_value(value: Value) -> DataResult<Option<Self>>;
}

/// Numeric column types: arithmetic and `Sum`/`Average`.
pub trait NumericType: ColumnType {}

/// Integer column types: bitwise operators.
pub trait IntegerType: NumericType {}

/// Fixed-point decimal value. Stored as a double in memory.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Decimal(pub f64);

fn mismatch<T: ColumnType>(value: &Value) -> DataError {
    DataError::Argument(format!(
        "cannot read {} value as {}",
        value.kind_name(),
        T::DATA_TYPE
    ))
}

macro_rules! integer_column_type {
    ($ty:ty, $data_type:ident) => {
        impl ColumnType for $ty {
            const DATA_TYPE: DataType = DataType::$data_type;

            fn into_value(self) -> Value {
                Value::Int(self as i64)
            }

            fn from_value(value: Value) -> DataResult<Option<Self>> {
                match value {
                    Value::Null => Ok(None),
                    Value::Int(i) => <$ty>::try_from(i).map(Some).map_err(|_| {
                        DataError::Expression(modelset_core::ExprError::Overflow {
                            value: i.to_string(),
                            target: DataType::$data_type,
                        })
                    }),
                    other => Err(mismatch::<Self>(&other)),
                }
            }
        }

        impl NumericType for $ty {}
        impl IntegerType for $ty {}
    };
}

integer_column_type!(u8, Byte);
integer_column_type!(i16, Int16);
integer_column_type!(i32, Int32);
integer_column_type!(i64, Int64);

macro_rules! float_column_type {
    ($ty:ty, $data_type:ident, $wrap:expr, $unwrap:expr) => {
        impl ColumnType for $ty {
            const DATA_TYPE: DataType = DataType::$data_type;

            fn into_value(self) -> Value {
                Value::Float($unwrap(self))
            }

            fn from_value(value: Value) -> DataResult<Option<Self>> {
                match value {
                    Value::Null => Ok(None),
                    Value::Float(f) => Ok(Some($wrap(f))),
                    Value::Int(i) => Ok(Some($wrap(i as f64))),
                    other => Err(mismatch::<Self>(&other)),
                }
            }
        }

        impl NumericType for $ty {}
    };
}

float_column_type!(f32, Single, |f: f64| f as f32, |v: f32| v as f64);
float_column_type!(f64, Double, |f: f64| f, |v: f64| v);
float_column_type!(Decimal, Decimal, Decimal, |v: Decimal| v.0);

macro_rules! plain_column_type {
    ($ty:ty, $data_type:ident, $variant:ident) => {
        impl ColumnType for $ty {
            const DATA_TYPE: DataType = DataType::$data_type;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> DataResult<Option<Self>> {
                match value {
                    Value::Null => Ok(None),
                    Value::$variant(v) => Ok(Some(v)),
                    other => Err(mismatch::<Self>(&other)),
                }
            }
        }
    };
}

plain_column_type!(bool, Boolean, Boolean);
plain_column_type!(String, String, Text);
plain_column_type!(NaiveDateTime, DateTime, DateTime);
plain_column_type!(Uuid, Guid, Guid);
plain_column_type!(Vec<u8>, Binary, Binary);

/// Ordering term for queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub expr: Expr,
    pub direction: SortDirection,
}

/// A typed column expression.
pub struct Column<T> {
    expr: Expr,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Column").field(&self.expr).finish()
    }
}

impl<T> PartialEq for Column<T> {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl<T> From<Column<T>> for Expr {
    fn from(column: Column<T>) -> Self {
        column.expr
    }
}

impl<T> From<&Column<T>> for Expr {
    fn from(column: &Column<T>) -> Self {
        column.expr.clone()
    }
}

impl<T: ColumnType> Column<T> {
    pub(crate) fn wrap(expr: Expr) -> Self {
        Self {
            expr,
            _marker: PhantomData,
        }
    }

    /// Wrap an untyped expression, checking its static type.
    pub fn from_expr(expr: Expr) -> DataResult<Self> {
        if expr.data_type() != T::DATA_TYPE {
            return Err(DataError::Argument(format!(
                "expression is {} but the column type is {}",
                expr.data_type(),
                T::DATA_TYPE
            )));
        }
        Ok(Self::wrap(expr))
    }

    pub fn constant(value: T) -> Self {
        Self::wrap(Expr::constant(value.into_value(), T::DATA_TYPE))
    }

    pub fn null() -> Self {
        Self::wrap(Expr::null(T::DATA_TYPE))
    }

    /// A bound value, rendered as a placeholder in SQL.
    pub fn parameter(value: T) -> Self {
        Self::wrap(Expr::parameter(value.into_value(), T::DATA_TYPE))
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    pub fn data_type(&self) -> DataType {
        self.expr.data_type()
    }

    /// The model slot this column is bound to, if it is a plain slot.
    pub fn column_ref(&self) -> Option<&ColumnRef> {
        match &self.expr {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn slot_ref(&self) -> DataResult<ColumnRef> {
        self.column_ref()
            .cloned()
            .ok_or_else(|| DataError::Argument("expression is not a model column".to_string()))
    }

    /// Evaluate against a row of `dataset`.
    pub fn eval(&self, dataset: &DataSet, row: RowKey) -> DataResult<Option<T>> {
        T::from_value(dataset.eval(row, &self.expr)?)
    }

    /// Evaluate a row-independent expression.
    pub fn eval_constant(&self) -> DataResult<Option<T>> {
        T::from_value(self.expr.eval_constant()?)
    }

    pub fn cast<U: ColumnType>(&self) -> Column<U> {
        Column::wrap(Expr::cast(self.expr.clone(), U::DATA_TYPE))
    }

    fn compare(&self, op: BinaryOp, other: &Column<T>) -> Column<bool> {
        Column::wrap(Expr::binary(self.expr.clone(), op, other.expr.clone()))
    }

    pub fn eq(&self, other: &Column<T>) -> Column<bool> {
        self.compare(BinaryOp::Equal, other)
    }

    pub fn ne(&self, other: &Column<T>) -> Column<bool> {
        self.compare(BinaryOp::NotEqual, other)
    }

    pub fn lt(&self, other: &Column<T>) -> Column<bool> {
        self.compare(BinaryOp::LessThan, other)
    }

    pub fn le(&self, other: &Column<T>) -> Column<bool> {
        self.compare(BinaryOp::LessThanOrEqual, other)
    }

    pub fn gt(&self, other: &Column<T>) -> Column<bool> {
        self.compare(BinaryOp::GreaterThan, other)
    }

    pub fn ge(&self, other: &Column<T>) -> Column<bool> {
        self.compare(BinaryOp::GreaterThanOrEqual, other)
    }

    fn function<U: ColumnType>(&self, key: FunctionKey) -> Column<U> {
        Column::wrap(Expr::function(key, vec![self.expr.clone()]))
    }

    pub fn is_null(&self) -> Column<bool> {
        self.function(FunctionKey::IsNull)
    }

    pub fn is_not_null(&self) -> Column<bool> {
        self.function(FunctionKey::IsNotNull)
    }

    pub fn if_null(&self, replacement: &Column<T>) -> Column<T> {
        Column::wrap(Expr::function(
            FunctionKey::IfNull,
            vec![self.expr.clone(), replacement.expr.clone()],
        ))
    }

    /// Number of non-null values in the aggregate scope.
    pub fn count(&self) -> Column<i32> {
        self.function(FunctionKey::Count)
    }

    /// Number of rows in the aggregate scope, nulls included.
    pub fn count_rows(&self) -> Column<i32> {
        self.function(FunctionKey::CountRows)
    }

    pub fn first(&self) -> Column<T> {
        self.function(FunctionKey::First)
    }

    pub fn last(&self) -> Column<T> {
        self.function(FunctionKey::Last)
    }

    pub fn min(&self) -> Column<T> {
        self.function(FunctionKey::Min)
    }

    pub fn max(&self) -> Column<T> {
        self.function(FunctionKey::Max)
    }

    pub fn asc(&self) -> SortSpec {
        SortSpec {
            expr: self.expr.clone(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(&self) -> SortSpec {
        SortSpec {
            expr: self.expr.clone(),
            direction: SortDirection::Descending,
        }
    }

    /// Searched CASE: the first branch whose guard is true wins.
    pub fn case_when(branches: Vec<(Column<bool>, Column<T>)>, otherwise: Column<T>) -> Self {
        Self::wrap(Expr::case_when(
            branches
                .into_iter()
                .map(|(guard, then)| (guard.expr, then.expr))
                .collect(),
            otherwise.expr,
        ))
    }

    /// Simple CASE comparing `selector` to each branch value.
    pub fn case_on<S: ColumnType>(
        selector: &Column<S>,
        branches: Vec<(Column<S>, Column<T>)>,
        otherwise: Column<T>,
    ) -> Self {
        Self::wrap(Expr::case_on(
            selector.expr.clone(),
            branches
                .into_iter()
                .map(|(value, then)| (value.expr, then.expr))
                .collect(),
            otherwise.expr,
        ))
    }
}

impl<T: NumericType> Column<T> {
    pub fn sum(&self) -> Column<T> {
        self.function(FunctionKey::Sum)
    }

    pub fn average(&self) -> Column<f64> {
        self.function(FunctionKey::Average)
    }

    pub fn abs(&self) -> Column<T> {
        self.function(FunctionKey::Abs)
    }

    pub fn round(&self, digits: i32) -> Column<T> {
        Column::wrap(Expr::function(
            FunctionKey::Round,
            vec![self.expr.clone(), Expr::constant(digits, DataType::Int32)],
        ))
    }
}

impl<T: IntegerType> Column<T> {
    fn bitwise(&self, op: BinaryOp, other: &Column<T>) -> Column<T> {
        Column::wrap(Expr::binary(self.expr.clone(), op, other.expr.clone()))
    }

    pub fn bit_and(&self, other: &Column<T>) -> Column<T> {
        self.bitwise(BinaryOp::BitwiseAnd, other)
    }

    pub fn bit_or(&self, other: &Column<T>) -> Column<T> {
        self.bitwise(BinaryOp::BitwiseOr, other)
    }

    pub fn bit_xor(&self, other: &Column<T>) -> Column<T> {
        self.bitwise(BinaryOp::BitwiseXor, other)
    }

    pub fn ones_complement(&self) -> Column<T> {
        Column::wrap(Expr::unary(UnaryOp::OnesComplement, self.expr.clone()))
    }
}

impl Column<bool> {
    pub fn and(&self, other: &Column<bool>) -> Column<bool> {
        Column::wrap(Expr::binary(
            self.expr.clone(),
            BinaryOp::And,
            other.expr.clone(),
        ))
    }

    pub fn or(&self, other: &Column<bool>) -> Column<bool> {
        Column::wrap(Expr::binary(
            self.expr.clone(),
            BinaryOp::Or,
            other.expr.clone(),
        ))
    }
}

impl Column<String> {
    pub fn concat(&self, other: &Column<String>) -> Column<String> {
        Column::wrap(Expr::binary(
            self.expr.clone(),
            BinaryOp::Add,
            other.expr.clone(),
        ))
    }

    pub fn contains(&self, needle: &Column<String>) -> Column<bool> {
        Column::wrap(Expr::function(
            FunctionKey::Contains,
            vec![self.expr.clone(), needle.expr.clone()],
        ))
    }

    pub fn upper(&self) -> Column<String> {
        self.function(FunctionKey::Upper)
    }

    pub fn lower(&self) -> Column<String> {
        self.function(FunctionKey::Lower)
    }

    pub fn trim(&self) -> Column<String> {
        self.function(FunctionKey::Trim)
    }

    pub fn length(&self) -> Column<i32> {
        self.function(FunctionKey::Length)
    }
}

impl Column<NaiveDateTime> {
    pub fn get_date() -> Self {
        Self::wrap(Expr::function(FunctionKey::GetDate, Vec::new()))
    }

    pub fn get_utc_date() -> Self {
        Self::wrap(Expr::function(FunctionKey::GetUtcDate, Vec::new()))
    }
}

impl Column<Uuid> {
    pub fn new_guid() -> Self {
        Self::wrap(Expr::function(FunctionKey::NewGuid, Vec::new()))
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:ident, $bound:ident) => {
        impl<T: $bound> $trait for Column<T> {
            type Output = Column<T>;

            fn $method(self, rhs: Column<T>) -> Column<T> {
                Column::wrap(Expr::binary(self.expr, BinaryOp::$op, rhs.expr))
            }
        }

        impl<'a, T: $bound> $trait<&'a Column<T>> for &'a Column<T> {
            type Output = Column<T>;

            fn $method(self, rhs: &'a Column<T>) -> Column<T> {
                Column::wrap(Expr::binary(
                    self.expr.clone(),
                    BinaryOp::$op,
                    rhs.expr.clone(),
                ))
            }
        }
    };
}

binary_operator!(Add, add, Add, NumericType);
binary_operator!(Sub, sub, Subtract, NumericType);
binary_operator!(Mul, mul, Multiply, NumericType);
binary_operator!(Div, div, Divide, NumericType);
binary_operator!(Rem, rem, Modulo, NumericType);

impl Add for Column<String> {
    type Output = Column<String>;

    fn add(self, rhs: Column<String>) -> Column<String> {
        Column::wrap(Expr::binary(self.expr, BinaryOp::Add, rhs.expr))
    }
}

impl<T: NumericType> Neg for Column<T> {
    type Output = Column<T>;

    fn neg(self) -> Column<T> {
        Column::wrap(Expr::unary(UnaryOp::Negate, self.expr))
    }
}

impl Not for Column<bool> {
    type Output = Column<bool>;

    fn not(self) -> Column<bool> {
        Column::wrap(Expr::unary(UnaryOp::Not, self.expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_arithmetic() {
        let a = Column::constant(6i32);
        let b = Column::constant(7i32);
        assert_eq!((&a * &b).eval_constant().unwrap(), Some(42));
        assert_eq!((a.clone() - b.clone()).eval_constant().unwrap(), Some(-1));
        assert_eq!((-a).eval_constant().unwrap(), Some(-6));
    }

    #[test]
    fn test_null_and_if_null() {
        let n = Column::<i64>::null();
        assert_eq!(n.eval_constant().unwrap(), None);
        assert_eq!(n.is_null().eval_constant().unwrap(), Some(true));
        let replaced = n.if_null(&Column::constant(9));
        assert_eq!(replaced.eval_constant().unwrap(), Some(9));
    }

    #[test]
    fn test_string_functions() {
        let s = Column::constant("  Hello ".to_string());
        assert_eq!(s.trim().upper().eval_constant().unwrap(), Some("HELLO".to_string()));
        assert_eq!(s.length().eval_constant().unwrap(), Some(8));
        let joined = s.trim() + Column::constant("!".to_string());
        assert_eq!(joined.eval_constant().unwrap(), Some("Hello!".to_string()));
        let has = s.contains(&Column::constant("ell".to_string()));
        assert_eq!(has.eval_constant().unwrap(), Some(true));
    }

    #[test]
    fn test_cast_and_case() {
        let n = Column::constant(12i32);
        assert_eq!(n.cast::<String>().eval_constant().unwrap(), Some("12".to_string()));
        let parsed = Column::constant("x1".to_string()).cast::<i32>();
        assert!(matches!(
            parsed.eval_constant(),
            Err(DataError::Expression(_))
        ));

        let label = Column::case_when(
            vec![(n.gt(&Column::constant(10)), Column::constant("big".to_string()))],
            Column::constant("small".to_string()),
        );
        assert_eq!(label.eval_constant().unwrap(), Some("big".to_string()));
    }

    #[test]
    fn test_from_value_checks_range() {
        assert_eq!(u8::from_value(Value::Int(255)).unwrap(), Some(255));
        assert!(u8::from_value(Value::Int(256)).is_err());
        assert_eq!(Decimal::from_value(Value::Int(3)).unwrap(), Some(Decimal(3.0)));
        assert!(bool::from_value(Value::Int(1)).is_err());
    }

    #[test]
    fn test_from_expr_checks_type() {
        assert!(Column::<i32>::from_expr(Expr::constant(1, DataType::Int32)).is_ok());
        assert!(Column::<i64>::from_expr(Expr::constant(1, DataType::Int32)).is_err());
    }
}
