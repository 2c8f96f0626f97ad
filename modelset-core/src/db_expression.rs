//! SQL-facing expression tree.
//!
//! `DbExpression` mirrors [`Expr`] node for node, annotated with result types.
//! It is immutable once lowered and is what the SQL generator renders.

use crate::error::{ExprError, ExprResult};
use crate::expression::{BinaryOp, ColumnRef, Expr, FunctionKey, UnaryOp};
use crate::value::{DataType, Value};

/// SQL-compilable expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum DbExpression {
    Constant {
        value: Value,
        data_type: DataType,
    },
    Parameter {
        value: Value,
        data_type: DataType,
    },
    Column(ColumnRef),
    Unary {
        op: UnaryOp,
        operand: Box<DbExpression>,
        data_type: DataType,
    },
    Binary {
        op: BinaryOp,
        left: Box<DbExpression>,
        right: Box<DbExpression>,
        data_type: DataType,
    },
    Cast {
        operand: Box<DbExpression>,
        source_type: DataType,
        target_type: DataType,
    },
    Case {
        on: Option<Box<DbExpression>>,
        when: Vec<(DbExpression, DbExpression)>,
        otherwise: Box<DbExpression>,
        data_type: DataType,
    },
    Function {
        key: FunctionKey,
        args: Vec<DbExpression>,
        data_type: DataType,
    },
}

impl DbExpression {
    pub fn data_type(&self) -> DataType {
        match self {
            DbExpression::Constant { data_type, .. }
            | DbExpression::Parameter { data_type, .. }
            | DbExpression::Unary { data_type, .. }
            | DbExpression::Binary { data_type, .. }
            | DbExpression::Case { data_type, .. }
            | DbExpression::Function { data_type, .. } => *data_type,
            DbExpression::Column(column) => column.data_type,
            DbExpression::Cast { target_type, .. } => *target_type,
        }
    }

    /// Pre-order, left-to-right walk. Parameter numbering follows this order.
    pub fn walk<'a, F>(&'a self, visitor: &mut F)
    where
        F: FnMut(&'a DbExpression),
    {
        visitor(self);
        match self {
            DbExpression::Constant { .. }
            | DbExpression::Parameter { .. }
            | DbExpression::Column(_) => {}
            DbExpression::Unary { operand, .. } | DbExpression::Cast { operand, .. } => {
                operand.walk(visitor)
            }
            DbExpression::Binary { left, right, .. } => {
                left.walk(visitor);
                right.walk(visitor);
            }
            DbExpression::Case {
                on,
                when,
                otherwise,
                ..
            } => {
                if let Some(on) = on {
                    on.walk(visitor);
                }
                for (w, then) in when {
                    w.walk(visitor);
                    then.walk(visitor);
                }
                otherwise.walk(visitor);
            }
            DbExpression::Function { args, .. } => {
                for arg in args {
                    arg.walk(visitor);
                }
            }
        }
    }

    pub fn column_refs(&self) -> Vec<&ColumnRef> {
        let mut refs = Vec::new();
        self.walk(&mut |e| {
            if let DbExpression::Column(c) = e {
                refs.push(c);
            }
        });
        refs
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let DbExpression::Function { key, .. } = e {
                found |= key.is_aggregate();
            }
        });
        found
    }

    /// True for constants and parameters, which never need grouping.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            DbExpression::Constant { .. } | DbExpression::Parameter { .. }
        )
    }
}

impl Expr {
    /// Lower into the SQL-facing tree.
    ///
    /// `First` and `Last` depend on in-memory row order and have no SQL
    /// translation.
    pub fn to_db_expression(&self) -> ExprResult<DbExpression> {
        let data_type = self.data_type();
        let lowered = match self {
            Expr::Constant { value, data_type } => DbExpression::Constant {
                value: value.clone(),
                data_type: *data_type,
            },
            Expr::Parameter { value, data_type } => DbExpression::Parameter {
                value: value.clone(),
                data_type: *data_type,
            },
            Expr::Column(column) => DbExpression::Column(column.clone()),
            Expr::Unary { op, operand } => DbExpression::Unary {
                op: *op,
                operand: Box::new(operand.to_db_expression()?),
                data_type,
            },
            Expr::Binary { op, left, right } => DbExpression::Binary {
                op: *op,
                left: Box::new(left.to_db_expression()?),
                right: Box::new(right.to_db_expression()?),
                data_type,
            },
            Expr::Cast { operand, target } => DbExpression::Cast {
                operand: Box::new(operand.to_db_expression()?),
                source_type: operand.data_type(),
                target_type: *target,
            },
            Expr::Case {
                on,
                when,
                otherwise,
            } => DbExpression::Case {
                on: match on {
                    Some(on) => Some(Box::new(on.to_db_expression()?)),
                    None => None,
                },
                when: when
                    .iter()
                    .map(|(w, then)| Ok((w.to_db_expression()?, then.to_db_expression()?)))
                    .collect::<ExprResult<Vec<_>>>()?,
                otherwise: Box::new(otherwise.to_db_expression()?),
                data_type,
            },
            Expr::Function { key, args } => {
                if matches!(key, FunctionKey::First | FunctionKey::Last) {
                    return Err(ExprError::NotTranslatable(key.name().to_string()));
                }
                DbExpression::Function {
                    key: *key,
                    args: args
                        .iter()
                        .map(Expr::to_db_expression)
                        .collect::<ExprResult<Vec<_>>>()?,
                    data_type,
                }
            }
        };
        Ok(lowered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ModelId;

    fn amount() -> Expr {
        Expr::column(ColumnRef {
            model: ModelId(3),
            slot: 1,
            name: "Amount".to_string(),
            data_type: DataType::Decimal,
        })
    }

    #[test]
    fn test_lowering_is_isomorphic() {
        let e = Expr::case_when(
            vec![(
                Expr::binary(amount(), BinaryOp::GreaterThan, Expr::parameter(10, DataType::Int32)),
                Expr::constant("high", DataType::String),
            )],
            Expr::constant("low", DataType::String),
        );
        let db = e.to_db_expression().unwrap();
        match &db {
            DbExpression::Case {
                on: None,
                when,
                data_type,
                ..
            } => {
                assert_eq!(*data_type, DataType::String);
                assert!(matches!(
                    &when[0].0,
                    DbExpression::Binary {
                        op: BinaryOp::GreaterThan,
                        data_type: DataType::Boolean,
                        ..
                    }
                ));
            }
            other => panic!("Expected Case, got {:?}", other),
        }
        assert_eq!(db.column_refs().len(), 1);
    }

    #[test]
    fn test_cast_records_source_type() {
        let db = Expr::cast(amount(), DataType::String)
            .to_db_expression()
            .unwrap();
        assert_eq!(
            db,
            DbExpression::Cast {
                operand: Box::new(DbExpression::Column(ColumnRef {
                    model: ModelId(3),
                    slot: 1,
                    name: "Amount".to_string(),
                    data_type: DataType::Decimal,
                })),
                source_type: DataType::Decimal,
                target_type: DataType::String,
            }
        );
    }

    #[test]
    fn test_first_last_not_translatable() {
        let first = Expr::function(FunctionKey::First, vec![amount()]);
        assert_eq!(
            first.to_db_expression(),
            Err(ExprError::NotTranslatable("First".to_string()))
        );
        let sum = Expr::function(FunctionKey::Sum, vec![amount()]);
        assert!(sum.to_db_expression().unwrap().contains_aggregate());
    }
}
