//! Tests for the expression evaluator against a small in-memory hierarchy.

use super::*;
use crate::error::ExprError;
use crate::expression::*;
use crate::value::DataType;

const ORDER: ModelId = ModelId(0);
const LINE: ModelId = ModelId(1);

struct Table {
    rows: Vec<(ModelId, Option<usize>, Vec<Value>)>,
}

#[derive(Clone, Copy)]
struct MockRow<'a> {
    table: &'a Table,
    index: usize,
}

impl RowScope for MockRow<'_> {
    fn value(&self, column: &ColumnRef) -> ExprResult<Value> {
        Ok(self.table.rows[self.index].2[column.slot].clone())
    }

    fn rows_in_scope(&self, model: ModelId) -> ExprResult<Vec<Self>> {
        let (own_model, parent, _) = &self.table.rows[self.index];
        let rows = self
            .table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, (m, p, _))| {
                *m == model
                    && if model == *own_model {
                        p == parent
                    } else {
                        *p == Some(self.index)
                    }
            })
            .map(|(index, _)| MockRow {
                table: self.table,
                index,
            })
            .collect();
        Ok(rows)
    }
}

fn order_id() -> Expr {
    Expr::column(ColumnRef {
        model: ORDER,
        slot: 0,
        name: "Id".to_string(),
        data_type: DataType::Int32,
    })
}

fn qty() -> Expr {
    Expr::column(ColumnRef {
        model: LINE,
        slot: 0,
        name: "Qty".to_string(),
        data_type: DataType::Int32,
    })
}

fn flag() -> Expr {
    Expr::column(ColumnRef {
        model: LINE,
        slot: 1,
        name: "Flag".to_string(),
        data_type: DataType::Boolean,
    })
}

/// Two orders; order 0 has lines qty 1, NULL, 3; order 1 has a single line qty 10.
fn table() -> Table {
    Table {
        rows: vec![
            (ORDER, None, vec![Value::Int(100)]),
            (ORDER, None, vec![Value::Int(200)]),
            (LINE, Some(0), vec![Value::Int(1), Value::Boolean(true)]),
            (LINE, Some(0), vec![Value::Null, Value::Null]),
            (LINE, Some(0), vec![Value::Int(3), Value::Boolean(false)]),
            (LINE, Some(1), vec![Value::Int(10), Value::Boolean(true)]),
        ],
    }
}

fn row(table: &Table, index: usize) -> MockRow<'_> {
    MockRow { table, index }
}

fn int(i: i32) -> Expr {
    Expr::constant(i, DataType::Int32)
}

#[test]
fn test_column_arithmetic() {
    let t = table();
    let e = Expr::binary(order_id(), BinaryOp::Add, int(5));
    assert_eq!(e.eval(&row(&t, 0)).unwrap(), Value::Int(105));
    assert_eq!(e.eval(&row(&t, 1)).unwrap(), Value::Int(205));
}

#[test]
fn test_null_operand_propagates() {
    let t = table();
    let e = Expr::binary(qty(), BinaryOp::Multiply, int(2));
    assert_eq!(e.eval(&row(&t, 3)).unwrap(), Value::Null);
    let cmp = Expr::binary(qty(), BinaryOp::GreaterThan, int(0));
    assert_eq!(cmp.eval(&row(&t, 3)).unwrap(), Value::Null);
}

#[test]
fn test_three_valued_and_or() {
    let t = table();
    let null_flag = row(&t, 3);
    let f = Expr::constant(false, DataType::Boolean);
    let tr = Expr::constant(true, DataType::Boolean);

    let e = Expr::binary(f.clone(), BinaryOp::And, flag());
    assert_eq!(e.eval(&null_flag).unwrap(), Value::Boolean(false));

    let e = Expr::binary(tr.clone(), BinaryOp::Or, flag());
    assert_eq!(e.eval(&null_flag).unwrap(), Value::Boolean(true));

    let e = Expr::binary(flag(), BinaryOp::And, flag());
    assert_eq!(e.eval(&null_flag).unwrap(), Value::Null);

    let e = Expr::binary(tr, BinaryOp::And, flag());
    assert_eq!(e.eval(&null_flag).unwrap(), Value::Null);

    let e = Expr::unary(UnaryOp::Not, flag());
    assert_eq!(e.eval(&null_flag).unwrap(), Value::Null);
}

#[test]
fn test_row_independent_eval() {
    let e = Expr::binary(int(6), BinaryOp::Multiply, int(7));
    assert_eq!(e.eval_constant().unwrap(), Value::Int(42));
    assert!(matches!(
        qty().eval_constant(),
        Err(ExprError::UnboundColumn(name)) if name == "Qty"
    ));
}

#[test]
fn test_int32_overflow_is_error() {
    let e = Expr::binary(
        Expr::constant(i32::MAX, DataType::Int32),
        BinaryOp::Add,
        int(1),
    );
    assert!(matches!(e.eval_constant(), Err(ExprError::Overflow { .. })));
}

#[test]
fn test_cast_parse_failure_surfaces() {
    let e = Expr::cast(Expr::constant("abc", DataType::String), DataType::Int32);
    assert!(matches!(e.eval_constant(), Err(ExprError::Cast { .. })));
    let e = Expr::cast(int(12), DataType::String);
    assert_eq!(e.eval_constant().unwrap(), Value::from("12"));
}

#[test]
fn test_case_expressions() {
    let t = table();
    let simple = Expr::case_on(
        qty(),
        vec![
            (int(1), Expr::constant("one", DataType::String)),
            (int(3), Expr::constant("three", DataType::String)),
        ],
        Expr::constant("other", DataType::String),
    );
    assert_eq!(simple.eval(&row(&t, 2)).unwrap(), Value::from("one"));
    assert_eq!(simple.eval(&row(&t, 4)).unwrap(), Value::from("three"));
    // NULL never matches a WHEN
    assert_eq!(simple.eval(&row(&t, 3)).unwrap(), Value::from("other"));

    let searched = Expr::case_when(
        vec![(
            Expr::binary(qty(), BinaryOp::GreaterThan, int(2)),
            Expr::constant("big", DataType::String),
        )],
        Expr::null(DataType::String),
    );
    assert_eq!(searched.eval(&row(&t, 4)).unwrap(), Value::from("big"));
    assert_eq!(searched.eval(&row(&t, 2)).unwrap(), Value::Null);
}

#[test]
fn test_aggregate_scoped_to_siblings() {
    let t = table();
    let sum = Expr::function(FunctionKey::Sum, vec![qty()]);
    // Evaluated at a line row: only that order's lines
    assert_eq!(sum.eval(&row(&t, 2)).unwrap(), Value::Int(4));
    assert_eq!(sum.eval(&row(&t, 5)).unwrap(), Value::Int(10));
}

#[test]
fn test_aggregate_over_child_scope() {
    let t = table();
    let count = Expr::function(FunctionKey::Count, vec![qty()]);
    let rows = Expr::function(FunctionKey::CountRows, vec![qty()]);
    assert_eq!(count.eval(&row(&t, 0)).unwrap(), Value::Int(2));
    assert_eq!(rows.eval(&row(&t, 0)).unwrap(), Value::Int(3));
    assert_eq!(rows.eval(&row(&t, 1)).unwrap(), Value::Int(1));
}

#[test]
fn test_min_max_average_first_last() {
    let t = table();
    let at = row(&t, 0);
    let min = Expr::function(FunctionKey::Min, vec![qty()]);
    let max = Expr::function(FunctionKey::Max, vec![qty()]);
    let avg = Expr::function(FunctionKey::Average, vec![qty()]);
    let first = Expr::function(FunctionKey::First, vec![qty()]);
    let last = Expr::function(FunctionKey::Last, vec![qty()]);
    assert_eq!(min.eval(&at).unwrap(), Value::Int(1));
    assert_eq!(max.eval(&at).unwrap(), Value::Int(3));
    assert_eq!(avg.eval(&at).unwrap(), Value::Float(2.0));
    assert_eq!(first.eval(&at).unwrap(), Value::Int(1));
    assert_eq!(last.eval(&at).unwrap(), Value::Int(3));
}

#[test]
fn test_sum_of_all_nulls_is_null() {
    let t = Table {
        rows: vec![
            (ORDER, None, vec![Value::Int(1)]),
            (LINE, Some(0), vec![Value::Null, Value::Null]),
        ],
    };
    let sum = Expr::function(FunctionKey::Sum, vec![qty()]);
    assert_eq!(sum.eval(&row(&t, 0)).unwrap(), Value::Null);
}

#[test]
fn test_float_aggregates_reject_overflow() {
    let t = Table {
        rows: vec![
            (ORDER, None, vec![Value::Int(1)]),
            (LINE, Some(0), vec![Value::Float(1e308)]),
            (LINE, Some(0), vec![Value::Float(1e308)]),
        ],
    };
    let amount = Expr::column(ColumnRef {
        model: LINE,
        slot: 0,
        name: "Amount".to_string(),
        data_type: DataType::Double,
    });
    for key in [FunctionKey::Sum, FunctionKey::Average] {
        let aggregate = Expr::function(key, vec![amount.clone()]);
        assert!(matches!(
            aggregate.eval(&row(&t, 0)),
            Err(ExprError::Overflow { .. })
        ));
    }
}
