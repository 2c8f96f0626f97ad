//! Logical expression tree.
//!
//! One closed sum type covers every node kind. Both interpreters, the
//! in-memory evaluator (`executor`) and the SQL lowering pass
//! (`db_expression`), match on it exhaustively.

use serde::{Deserialize, Serialize};

use crate::value::{DataType, Value};

/// Identity of a registered model (schema) within a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u32);

impl ModelId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Reference to one column slot of a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub model: ModelId,
    pub slot: usize,
    pub name: String,
    pub data_type: DataType,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
    OnesComplement,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Builtin function keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKey {
    // Aggregates, scoped to the row's containing DataSet
    First,
    Last,
    Count,
    CountRows,
    Sum,
    Min,
    Max,
    Average,
    // Null-aware
    IsNull,
    IsNotNull,
    IfNull,
    // Scalars
    Contains,
    GetDate,
    GetUtcDate,
    NewGuid,
    Upper,
    Lower,
    Length,
    Trim,
    Abs,
    Round,
}

impl FunctionKey {
    pub const ALL: [FunctionKey; 21] = [
        FunctionKey::First,
        FunctionKey::Last,
        FunctionKey::Count,
        FunctionKey::CountRows,
        FunctionKey::Sum,
        FunctionKey::Min,
        FunctionKey::Max,
        FunctionKey::Average,
        FunctionKey::IsNull,
        FunctionKey::IsNotNull,
        FunctionKey::IfNull,
        FunctionKey::Contains,
        FunctionKey::GetDate,
        FunctionKey::GetUtcDate,
        FunctionKey::NewGuid,
        FunctionKey::Upper,
        FunctionKey::Lower,
        FunctionKey::Length,
        FunctionKey::Trim,
        FunctionKey::Abs,
        FunctionKey::Round,
    ];

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            FunctionKey::First
                | FunctionKey::Last
                | FunctionKey::Count
                | FunctionKey::CountRows
                | FunctionKey::Sum
                | FunctionKey::Min
                | FunctionKey::Max
                | FunctionKey::Average
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            FunctionKey::First => "First",
            FunctionKey::Last => "Last",
            FunctionKey::Count => "Count",
            FunctionKey::CountRows => "CountRows",
            FunctionKey::Sum => "Sum",
            FunctionKey::Min => "Min",
            FunctionKey::Max => "Max",
            FunctionKey::Average => "Average",
            FunctionKey::IsNull => "IsNull",
            FunctionKey::IsNotNull => "IsNotNull",
            FunctionKey::IfNull => "IfNull",
            FunctionKey::Contains => "Contains",
            FunctionKey::GetDate => "GetDate",
            FunctionKey::GetUtcDate => "GetUtcDate",
            FunctionKey::NewGuid => "NewGuid",
            FunctionKey::Upper => "Upper",
            FunctionKey::Lower => "Lower",
            FunctionKey::Length => "Length",
            FunctionKey::Trim => "Trim",
            FunctionKey::Abs => "Abs",
            FunctionKey::Round => "Round",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Accepted argument counts (inclusive).
    pub fn arity(&self) -> (usize, usize) {
        match self {
            FunctionKey::GetDate | FunctionKey::GetUtcDate | FunctionKey::NewGuid => (0, 0),
            FunctionKey::IfNull | FunctionKey::Contains => (2, 2),
            FunctionKey::Round => (1, 2),
            _ => (1, 1),
        }
    }
}

/// Logical expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value, rendered inline in SQL.
    Constant { value: Value, data_type: DataType },
    /// Bound value, rendered as a positional placeholder in SQL.
    Parameter { value: Value, data_type: DataType },
    /// Model column slot.
    Column(ColumnRef),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cast { operand: Box<Expr>, target: DataType },
    /// `on` present: simple CASE comparing the selector to each `when`;
    /// absent: searched CASE over boolean `when` guards.
    Case {
        on: Option<Box<Expr>>,
        when: Vec<(Expr, Expr)>,
        otherwise: Box<Expr>,
    },
    Function { key: FunctionKey, args: Vec<Expr> },
}

impl Expr {
    pub fn constant(value: impl Into<Value>, data_type: DataType) -> Self {
        Expr::Constant {
            value: value.into(),
            data_type,
        }
    }

    pub fn null(data_type: DataType) -> Self {
        Expr::Constant {
            value: Value::Null,
            data_type,
        }
    }

    pub fn parameter(value: impl Into<Value>, data_type: DataType) -> Self {
        Expr::Parameter {
            value: value.into(),
            data_type,
        }
    }

    pub fn column(column: ColumnRef) -> Self {
        Expr::Column(column)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cast(operand: Expr, target: DataType) -> Self {
        Expr::Cast {
            operand: Box::new(operand),
            target,
        }
    }

    pub fn case_when(when: Vec<(Expr, Expr)>, otherwise: Expr) -> Self {
        Expr::Case {
            on: None,
            when,
            otherwise: Box::new(otherwise),
        }
    }

    pub fn case_on(on: Expr, when: Vec<(Expr, Expr)>, otherwise: Expr) -> Self {
        Expr::Case {
            on: Some(Box::new(on)),
            when,
            otherwise: Box::new(otherwise),
        }
    }

    pub fn function(key: FunctionKey, args: Vec<Expr>) -> Self {
        Expr::Function { key, args }
    }

    /// Static result type of the expression.
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Constant { data_type, .. } | Expr::Parameter { data_type, .. } => *data_type,
            Expr::Column(column) => column.data_type,
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => DataType::Boolean,
                _ => operand.data_type(),
            },
            Expr::Binary { op, left, right } => {
                if op.is_comparison() || op.is_logical() {
                    DataType::Boolean
                } else {
                    let (l, r) = (left.data_type(), right.data_type());
                    DataType::widen(l, r).unwrap_or(l)
                }
            }
            Expr::Cast { target, .. } => *target,
            Expr::Case {
                when, otherwise, ..
            } => when
                .first()
                .map(|(_, then)| then.data_type())
                .unwrap_or_else(|| otherwise.data_type()),
            Expr::Function { key, args } => {
                let first = args.first().map(|a| a.data_type());
                match key {
                    FunctionKey::Count | FunctionKey::CountRows | FunctionKey::Length => {
                        DataType::Int32
                    }
                    FunctionKey::Average => match first {
                        Some(DataType::Decimal) => DataType::Decimal,
                        _ => DataType::Double,
                    },
                    FunctionKey::IsNull | FunctionKey::IsNotNull | FunctionKey::Contains => {
                        DataType::Boolean
                    }
                    FunctionKey::GetDate | FunctionKey::GetUtcDate => DataType::DateTime,
                    FunctionKey::NewGuid => DataType::Guid,
                    FunctionKey::Upper | FunctionKey::Lower | FunctionKey::Trim => {
                        DataType::String
                    }
                    _ => first.unwrap_or(DataType::Int32),
                }
            }
        }
    }

    /// Pre-order walk over every node.
    pub fn walk<'a, F>(&'a self, visitor: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        visitor(self);
        match self {
            Expr::Constant { .. } | Expr::Parameter { .. } | Expr::Column(_) => {}
            Expr::Unary { operand, .. } | Expr::Cast { operand, .. } => operand.walk(visitor),
            Expr::Binary { left, right, .. } => {
                left.walk(visitor);
                right.walk(visitor);
            }
            Expr::Case {
                on,
                when,
                otherwise,
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
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk(visitor);
                }
            }
        }
    }

    /// Column references in left-to-right order.
    pub fn column_refs(&self) -> Vec<&ColumnRef> {
        let mut refs = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Column(c) = e {
                refs.push(c);
            }
        });
        refs
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Expr::Function { key, .. } = e {
                found |= key.is_aggregate();
            }
        });
        found
    }

    /// True when evaluation does not need a data row.
    pub fn is_row_independent(&self) -> bool {
        self.column_refs().is_empty()
    }

    /// Model whose DataSet an aggregate over this expression ranges over.
    pub fn scope_model(&self) -> Option<ModelId> {
        self.column_refs().first().map(|c| c.model)
    }
}

impl From<ColumnRef> for Expr {
    fn from(column: ColumnRef) -> Self {
        Expr::Column(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(slot: usize, name: &str, data_type: DataType) -> Expr {
        Expr::column(ColumnRef {
            model: ModelId(0),
            slot,
            name: name.to_string(),
            data_type,
        })
    }

    #[test]
    fn test_data_type_promotion() {
        let e = Expr::binary(
            col(0, "a", DataType::Int32),
            BinaryOp::Add,
            col(1, "b", DataType::Int64),
        );
        assert_eq!(e.data_type(), DataType::Int64);

        let cmp = Expr::binary(
            col(0, "a", DataType::Int32),
            BinaryOp::LessThan,
            Expr::constant(5, DataType::Int32),
        );
        assert_eq!(cmp.data_type(), DataType::Boolean);

        let avg = Expr::function(FunctionKey::Average, vec![col(0, "a", DataType::Int32)]);
        assert_eq!(avg.data_type(), DataType::Double);
    }

    #[test]
    fn test_contains_aggregate_and_refs() {
        let sum = Expr::function(FunctionKey::Sum, vec![col(2, "amount", DataType::Double)]);
        let e = Expr::binary(sum, BinaryOp::Multiply, col(0, "rate", DataType::Double));
        assert!(e.contains_aggregate());
        let names: Vec<&str> = e.column_refs().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["amount", "rate"]);
        assert_eq!(e.scope_model(), Some(ModelId(0)));
        assert!(!Expr::constant(1, DataType::Int32).contains_aggregate());
    }

    #[test]
    fn test_function_key_names() {
        for key in FunctionKey::ALL {
            assert_eq!(FunctionKey::from_name(key.name()), Some(key));
        }
        assert_eq!(FunctionKey::from_name("Nope"), None);
    }
}
