//! Column data types and nullable runtime values.
//!
//! `DataType` is the closed set of primitive column types. `Value` is the
//! storage representation shared by every type: all integer types are held as
//! `Int`, all floating/decimal types as `Float`.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ExprError, ExprResult};

/// Canonical text form for date/time values (ISO-8601, millisecond precision).
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// 2^63, the first float past `i64::MAX`.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

const DATETIME_PARSE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Primitive type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    DateTime,
    Guid,
    Binary,
}

impl DataType {
    pub const ALL: [DataType; 12] = [
        DataType::Boolean,
        DataType::Byte,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Single,
        DataType::Double,
        DataType::Decimal,
        DataType::String,
        DataType::DateTime,
        DataType::Guid,
        DataType::Binary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Byte => "Byte",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Single => "Single",
            DataType::Double => "Double",
            DataType::Decimal => "Decimal",
            DataType::String => "String",
            DataType::DateTime => "DateTime",
            DataType::Guid => "Guid",
            DataType::Binary => "Binary",
        }
    }

    /// Case-insensitive lookup by type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Byte | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(self, DataType::Single | DataType::Double | DataType::Decimal)
    }

    fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            DataType::Byte => Some((u8::MIN as i64, u8::MAX as i64)),
            DataType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            DataType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            DataType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::Byte => Some(0),
            DataType::Int16 => Some(1),
            DataType::Int32 => Some(2),
            DataType::Int64 => Some(3),
            DataType::Decimal => Some(4),
            DataType::Single => Some(5),
            DataType::Double => Some(6),
            _ => None,
        }
    }

    /// Result type of combining two operand types arithmetically.
    ///
    /// Numeric types promote to the wider of the two; non-numeric types only
    /// combine with themselves.
    pub fn widen(left: DataType, right: DataType) -> Option<DataType> {
        if left == right {
            return Some(left);
        }
        let (l, r) = (left.numeric_rank()?, right.numeric_rank()?);
        Some(if l >= r { left } else { right })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A nullable runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the storage variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::DateTime(_) => "datetime",
            Value::Guid(_) => "guid",
            Value::Binary(_) => "binary",
        }
    }

    /// Normalise a value into the storage variant of `data_type`.
    ///
    /// Only lossless conversions are accepted (integer into a floating type,
    /// range-checked integers). Anything else is a type mismatch; use
    /// [`Value::cast`] for converting casts.
    pub fn conform(self, data_type: DataType) -> ExprResult<Value> {
        match (self, data_type) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Boolean(b), DataType::Boolean) => Ok(Value::Boolean(b)),
            (Value::Int(i), t) if t.is_integer() => check_range(i, t),
            (Value::Int(i), DataType::Single | DataType::Double | DataType::Decimal) => {
                Ok(Value::Float(i as f64))
            }
            (Value::Float(f), t @ (DataType::Single | DataType::Double | DataType::Decimal)) => {
                finite(f, t)
            }
            (Value::Text(s), DataType::String) => Ok(Value::Text(s)),
            (Value::DateTime(d), DataType::DateTime) => Ok(Value::DateTime(d)),
            (Value::Guid(g), DataType::Guid) => Ok(Value::Guid(g)),
            (Value::Binary(b), DataType::Binary) => Ok(Value::Binary(b)),
            (value, t) => Err(ExprError::TypeMismatch(format!(
                "cannot store {} value in {} column",
                value.kind_name(),
                t
            ))),
        }
    }

    /// Converting cast with dialect-agnostic default semantics.
    ///
    /// Text that does not parse as the target type is an error, never NULL.
    pub fn cast(self, target: DataType) -> ExprResult<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        match target {
            DataType::String => Ok(Value::Text(self.to_text())),
            t if t.is_integer() => {
                let i = match &self {
                    Value::Int(i) => *i,
                    Value::Float(f) => {
                        let truncated = f.trunc();
                        if !truncated.is_finite()
                            || truncated < i64::MIN as f64
                            || truncated >= I64_UPPER_BOUND
                        {
                            return Err(overflow(&self, t));
                        }
                        truncated as i64
                    }
                    Value::Boolean(b) => *b as i64,
                    Value::Text(s) => s.trim().parse::<i64>().map_err(|_| cast_error(&self, t))?,
                    _ => return Err(cast_error(&self, t)),
                };
                check_range(i, t)
            }
            DataType::Single | DataType::Double | DataType::Decimal => match &self {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(f) => finite(*f, target),
                Value::Boolean(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
                Value::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| cast_error(&self, target))
                    .and_then(|f| finite(f, target)),
                _ => Err(cast_error(&self, target)),
            },
            DataType::Boolean => match &self {
                Value::Boolean(b) => Ok(Value::Boolean(*b)),
                Value::Int(i) => Ok(Value::Boolean(*i != 0)),
                Value::Float(f) => Ok(Value::Boolean(*f != 0.0)),
                Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(Value::Boolean(true)),
                    "false" | "0" => Ok(Value::Boolean(false)),
                    _ => Err(cast_error(&self, target)),
                },
                _ => Err(cast_error(&self, target)),
            },
            DataType::DateTime => match &self {
                Value::DateTime(d) => Ok(Value::DateTime(*d)),
                Value::Text(s) => parse_datetime(s)
                    .map(Value::DateTime)
                    .ok_or_else(|| cast_error(&self, target)),
                _ => Err(cast_error(&self, target)),
            },
            DataType::Guid => match &self {
                Value::Guid(g) => Ok(Value::Guid(*g)),
                Value::Text(s) => Uuid::parse_str(s.trim())
                    .map(Value::Guid)
                    .map_err(|_| cast_error(&self, target)),
                Value::Binary(b) => Uuid::from_slice(b)
                    .map(Value::Guid)
                    .map_err(|_| cast_error(&self, target)),
                _ => Err(cast_error(&self, target)),
            },
            DataType::Binary => match &self {
                Value::Binary(b) => Ok(Value::Binary(b.clone())),
                Value::Guid(g) => Ok(Value::Binary(g.as_bytes().to_vec())),
                Value::Text(s) => {
                    let digits = s.trim();
                    let digits = digits
                        .strip_prefix("0x")
                        .or_else(|| digits.strip_prefix("0X"))
                        .unwrap_or(digits);
                    hex::decode(digits)
                        .map(Value::Binary)
                        .map_err(|_| cast_error(&self, target))
                }
                _ => Err(cast_error(&self, target)),
            },
            _ => Err(cast_error(&self, target)),
        }
    }

    /// Text form used by casts to String. Parses back with [`Value::cast`].
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::DateTime(d) => d.format(DATETIME_FORMAT).to_string(),
            Value::Guid(g) => g.hyphenated().to_string(),
            Value::Binary(b) => hex::encode(b),
        }
    }

    /// SQL-style comparison. `None` when either side is NULL.
    pub fn compare(&self, other: &Value) -> ExprResult<Option<Ordering>> {
        let ordering = match (self, other) {
            (Value::Null, _) | (_, Value::Null) => return Ok(None),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                // Both sides are numeric here
                let (a, b) = (self.as_f64().unwrap_or_default(), other.as_f64().unwrap_or_default());
                match a.partial_cmp(&b) {
                    Some(o) => o,
                    None => return Ok(None),
                }
            }
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Guid(a), Value::Guid(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (a, b) => {
                return Err(ExprError::TypeMismatch(format!(
                    "cannot compare {} with {}",
                    a.kind_name(),
                    b.kind_name()
                )))
            }
        };
        Ok(Some(ordering))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Parse the accepted date/time text forms, including a bare date.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn check_range(i: i64, target: DataType) -> ExprResult<Value> {
    match target.integer_range() {
        Some((min, max)) if i < min || i > max => Err(ExprError::Overflow {
            value: i.to_string(),
            target,
        }),
        _ => Ok(Value::Int(i)),
    }
}

fn cast_error(value: &Value, target: DataType) -> ExprError {
    ExprError::Cast {
        value: value.to_text(),
        target,
    }
}

fn overflow(value: &Value, target: DataType) -> ExprError {
    ExprError::Overflow {
        value: value.to_text(),
        target,
    }
}

/// Stored floats are finite; infinities and NaN have no JSON or SQL form.
pub(crate) fn finite(f: f64, target: DataType) -> ExprResult<Value> {
    if f.is_finite() {
        Ok(Value::Float(f))
    } else {
        Err(ExprError::Overflow {
            value: f.to_string(),
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conform_integer_range() {
        assert_eq!(Value::Int(200).conform(DataType::Byte).unwrap(), Value::Int(200));
        assert!(matches!(
            Value::Int(300).conform(DataType::Byte),
            Err(ExprError::Overflow { .. })
        ));
        assert_eq!(
            Value::Int(3).conform(DataType::Double).unwrap(),
            Value::Float(3.0)
        );
        assert!(Value::Text("x".into()).conform(DataType::Int32).is_err());
        assert_eq!(Value::Null.conform(DataType::Guid).unwrap(), Value::Null);
    }

    #[test]
    fn test_cast_string_parse_failure_is_error() {
        let err = Value::from("12a").cast(DataType::Int32).unwrap_err();
        assert_eq!(
            err,
            ExprError::Cast {
                value: "12a".to_string(),
                target: DataType::Int32
            }
        );
        assert_eq!(
            Value::from(" 42 ").cast(DataType::Int32).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn test_cast_numeric_to_string_round_trips() {
        for v in [Value::Int(-17), Value::Float(2.5), Value::Float(0.1)] {
            let text = v.clone().cast(DataType::String).unwrap();
            let target = if matches!(v, Value::Int(_)) {
                DataType::Int64
            } else {
                DataType::Double
            };
            assert_eq!(text.cast(target).unwrap(), v);
        }
    }

    #[test]
    fn test_cast_float_to_int_truncates() {
        assert_eq!(Value::Float(3.9).cast(DataType::Int32).unwrap(), Value::Int(3));
        assert_eq!(Value::Float(-3.9).cast(DataType::Int32).unwrap(), Value::Int(-3));
    }

    #[test]
    fn test_cast_datetime_and_guid() {
        let v = Value::from("2024-03-01 10:20:30").cast(DataType::DateTime).unwrap();
        assert_eq!(
            v.to_text(),
            "2024-03-01T10:20:30.000"
        );
        let g = Value::from("67e55044-10b1-426f-9247-bb680e5fe0c8")
            .cast(DataType::Guid)
            .unwrap();
        assert_eq!(g.to_text(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!(Value::from("not-a-guid").cast(DataType::Guid).is_err());
    }

    #[test]
    fn test_compare_null_and_mixed_numeric() {
        assert_eq!(Value::Null.compare(&Value::Int(1)).unwrap(), None);
        assert_eq!(
            Value::Int(2).compare(&Value::Float(2.5)).unwrap(),
            Some(Ordering::Less)
        );
        assert!(Value::Int(1).compare(&Value::from("1")).is_err());
    }

    #[test]
    fn test_widen() {
        assert_eq!(DataType::widen(DataType::Int16, DataType::Int32), Some(DataType::Int32));
        assert_eq!(DataType::widen(DataType::Int64, DataType::Double), Some(DataType::Double));
        assert_eq!(DataType::widen(DataType::String, DataType::String), Some(DataType::String));
        assert_eq!(DataType::widen(DataType::String, DataType::Int32), None);
    }

    #[test]
    fn test_hex_round_trip() {
        let v = Value::Binary(vec![0x00, 0xab, 0xff]);
        let text = v.clone().cast(DataType::String).unwrap();
        assert_eq!(text, Value::from("00abff"));
        assert_eq!(text.cast(DataType::Binary).unwrap(), v);
        assert_eq!(
            Value::from("0XABFF").cast(DataType::Binary).unwrap(),
            Value::Binary(vec![0xab, 0xff])
        );
        assert!(Value::from("abc").cast(DataType::Binary).is_err());
        assert!(Value::from("zz").cast(DataType::Binary).is_err());
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        for f in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            for t in [DataType::Single, DataType::Double, DataType::Decimal] {
                assert!(matches!(
                    Value::Float(f).conform(t),
                    Err(ExprError::Overflow { .. })
                ));
                assert!(matches!(
                    Value::Float(f).cast(t),
                    Err(ExprError::Overflow { .. })
                ));
            }
        }
        assert!(matches!(
            Value::from("inf").cast(DataType::Double),
            Err(ExprError::Overflow { .. })
        ));
        assert_eq!(
            Value::Float(1e308).conform(DataType::Double).unwrap(),
            Value::Float(1e308)
        );
    }

    #[test]
    fn test_cast_float_to_int64_bounds() {
        assert!(matches!(
            Value::Float(9.223372036854775807e18).cast(DataType::Int64),
            Err(ExprError::Overflow { .. })
        ));
        assert_eq!(
            Value::Float(-9.223372036854775808e18).cast(DataType::Int64).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            Value::Float(9.0e18).cast(DataType::Int64).unwrap(),
            Value::Int(9_000_000_000_000_000_000)
        );
    }
}
