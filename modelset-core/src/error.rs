//! Error types for modelset-core.
//!
//! Evaluation and lowering errors only; schema and structural errors live in
//! the `modelset` crate.

use thiserror::Error;

use crate::value::DataType;

/// Expression error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Cannot cast '{value}' to {target}")]
    Cast { value: String, target: DataType },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Value out of range for {target}: {value}")]
    Overflow { value: String, target: DataType },

    #[error("Division by zero")]
    DivideByZero,

    #[error("Column '{0}' requires a data row")]
    UnboundColumn(String),

    #[error("Expression is not translatable to SQL: {0}")]
    NotTranslatable(String),

    #[error("Invalid argument: {0}")]
    Argument(String),
}

/// Result type for expression operations
pub type ExprResult<T> = Result<T, ExprError>;

impl serde::Serialize for ExprError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExprError::Cast {
            value: "abc".to_string(),
            target: DataType::Int32,
        };
        assert_eq!(err.to_string(), "Cannot cast 'abc' to Int32");

        let err = ExprError::UnboundColumn("Amount".to_string());
        assert_eq!(err.to_string(), "Column 'Amount' requires a data row");

        let err = ExprError::NotTranslatable("First".to_string());
        assert_eq!(
            err.to_string(),
            "Expression is not translatable to SQL: First"
        );

        assert_eq!(ExprError::DivideByZero.to_string(), "Division by zero");
    }

    #[test]
    fn test_error_serializes_as_message() {
        let err = ExprError::TypeMismatch("expected number".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!("Type mismatch: expected number"));
    }
}
