//! ModelSet Core - storage-independent column expression model.
//!
//! This crate holds the pieces of the expression system that do not depend on
//! any particular data store:
//!
//! - **Value**: scalar values and the closed set of data types
//! - **Expression**: the logical expression tree shared by both execution modes
//! - **Executor**: in-memory evaluation against any [`RowScope`] implementation
//! - **DbExpression**: the SQL-facing tree produced by lowering an [`Expr`]
//!
//! # Example
//!
//! ```rust
//! use modelset_core::{BinaryOp, DataType, Expr, Value};
//!
//! let e = Expr::binary(
//!     Expr::constant(6, DataType::Int32),
//!     BinaryOp::Multiply,
//!     Expr::constant(7, DataType::Int32),
//! );
//! assert_eq!(e.eval_constant().unwrap(), Value::Int(42));
//! ```

pub mod db_expression;
pub mod error;
pub mod executor;
pub mod expression;
pub mod value;

pub use db_expression::DbExpression;
pub use error::{ExprError, ExprResult};
pub use executor::{evaluate, BuiltinFunctions, NoRow, RowScope};
pub use expression::{BinaryOp, ColumnRef, Expr, FunctionKey, ModelId, UnaryOp};
pub use value::{parse_datetime, DataType, Value, DATETIME_FORMAT};
