//! In-memory evaluation of logical expressions.
//!
//! The evaluator walks an [`Expr`] against any row type implementing the
//! [`RowScope`] trait, so it has no knowledge of how rows are stored.

mod builtins;
mod evaluator;
mod helpers;

pub use builtins::BuiltinFunctions;
pub use evaluator::evaluate;
pub use helpers::*;

use crate::error::ExprResult;
use crate::expression::{ColumnRef, Expr, ModelId};
use crate::value::Value;

/// Trait for rows that expressions can be evaluated against.
///
/// Implement this trait to evaluate expressions over your row store.
pub trait RowScope: Sized {
    /// Read the value of a column of this row.
    fn value(&self, column: &ColumnRef) -> ExprResult<Value>;

    /// Rows an aggregate over columns of `model` ranges over when evaluated
    /// at this row.
    ///
    /// For the row's own model this is its containing DataSet (its siblings),
    /// never a flattened hierarchy.
    fn rows_in_scope(&self, model: ModelId) -> ExprResult<Vec<Self>>;
}

/// Row type for row-independent evaluation. Has no values.
#[derive(Debug, Clone, Copy)]
pub enum NoRow {}

impl RowScope for NoRow {
    fn value(&self, _column: &ColumnRef) -> ExprResult<Value> {
        match *self {}
    }

    fn rows_in_scope(&self, _model: ModelId) -> ExprResult<Vec<Self>> {
        match *self {}
    }
}

impl Expr {
    /// Evaluate against a row.
    pub fn eval<R: RowScope>(&self, row: &R) -> ExprResult<Value> {
        evaluate(self, Some(row))
    }

    /// Evaluate a row-independent expression.
    pub fn eval_constant(&self) -> ExprResult<Value> {
        evaluate::<NoRow>(self, None)
    }
}

#[cfg(test)]
mod tests;
