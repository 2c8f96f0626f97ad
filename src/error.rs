use modelset_core::ExprError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    // Schema errors
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Column '{column}' is already registered on model '{model}' with a different shape")]
    DuplicateSlot { model: String, column: String },

    #[error("Child model cycle: {0}")]
    ChildModelCycle(String),

    // Build-time query errors
    #[error("Invalid argument: {0}")]
    Argument(String),

    // Evaluation errors
    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),

    // Structural-mutation errors
    #[error("Ordinal {ordinal} is out of range for a set of {count} rows")]
    InvalidOrdinal { ordinal: usize, count: usize },

    #[error("Row has been disposed")]
    DisposedRow,

    #[error("Invalid mutation: {0}")]
    Mutation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type DataResult<T> = Result<T, DataError>;

impl serde::Serialize for DataError {
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
    fn test_error_display() {
        let err = DataError::DuplicateSlot {
            model: "Order".to_string(),
            column: "Total".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Column 'Total' is already registered on model 'Order' with a different shape"
        );

        let err = DataError::InvalidOrdinal {
            ordinal: 4,
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "Ordinal 4 is out of range for a set of 3 rows"
        );

        let err: DataError = ExprError::DivideByZero.into();
        assert_eq!(err.to_string(), "Expression error: Division by zero");
    }

    #[test]
    fn test_error_serializes_as_string() {
        let err = DataError::Argument("no FROM clause".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Invalid argument: no FROM clause\"");
    }
}
