//! Local (computed) column values.
//!
//! Each row caches computed values per slot. Writes invalidate the cache
//! entries of every transitively dependent slot; the next read recomputes.

use std::collections::VecDeque;

use modelset_core::{ExprResult, Value};

use super::{DataRow, DataSet, RowKey};
use crate::schema::Computation;

impl DataSet {
    pub(crate) fn computed_value(
        &self,
        row: RowKey,
        slot: usize,
        computation: &Computation,
    ) -> ExprResult<Value> {
        let cached = self.rows[row.index()]
            .computed
            .borrow()
            .get(slot)
            .cloned()
            .flatten();
        if let Some(value) = cached {
            return Ok(value);
        }

        let model = self.schema.model(
            self.rows[row.index()]
                .model
                .ok_or_else(|| modelset_core::ExprError::Evaluation("row has been disposed".to_string()))?,
        );
        let value = match computation {
            Computation::Expression(expr) => expr.eval(&DataRow::new(self, row))?,
            Computation::Function {
                dependencies,
                function,
            } => {
                let inputs = dependencies
                    .iter()
                    .map(|dependency| self.read_value(row, &model.slot_ref(*dependency)))
                    .collect::<ExprResult<Vec<_>>>()?;
                function(&inputs)?
            }
        };
        let value = value.conform(model.columns[slot].data_type)?;

        if let Some(entry) = self.rows[row.index()].computed.borrow_mut().get_mut(slot) {
            *entry = Some(value.clone());
        }
        Ok(value)
    }

    /// Drop cached values depending on `slot`. Returns the invalidated
    /// computed slots in breadth-first order.
    pub(crate) fn invalidate_dependents(&mut self, row: RowKey, slot: usize) -> Vec<usize> {
        let Some(model) = self.rows[row.index()].model else {
            return Vec::new();
        };
        let model = self.schema.model(model);
        let cache = self.rows[row.index()].computed.get_mut();

        let mut invalidated = Vec::new();
        let mut queue = VecDeque::from([slot]);
        while let Some(current) = queue.pop_front() {
            for dependent in &model.dependents[current] {
                if !invalidated.contains(dependent) {
                    invalidated.push(*dependent);
                    cache[*dependent] = None;
                    queue.push_back(*dependent);
                }
            }
        }
        invalidated
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use modelset_core::{ExprError, Value};

    use crate::column::Column;
    use crate::dataset::{DataSet, DataSetEvent, DataSetOptions};
    use crate::error::DataError;
    use crate::schema::SchemaBuilder;

    #[test]
    fn test_computed_columns_recompute_after_write() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Line", "lines").unwrap();
        let qty = b.register_column::<i32>(m, "Qty").unwrap();
        let price = b.register_column::<f64>(m, "Price").unwrap();
        let total = b
            .register_function_column::<f64, _>(
                m,
                "Total",
                &[qty.slot_ref().unwrap(), price.slot_ref().unwrap()],
                |values| match (&values[0], &values[1]) {
                    (Value::Int(q), Value::Float(p)) => Ok(Value::Float(*q as f64 * p)),
                    _ => Ok(Value::Null),
                },
            )
            .unwrap();
        let doubled = b
            .register_local_column::<f64>(m, "Doubled", total.clone() * Column::constant(2.0))
            .unwrap();
        let schema = b.build().unwrap();

        let mut ds = DataSet::new(schema, m, DataSetOptions::default()).unwrap();
        let root = ds.root();
        let row = ds.add_row(root).unwrap();
        assert_eq!(ds.get(row, &total).unwrap(), None);

        ds.set(row, &qty, 3).unwrap();
        ds.set(row, &price, 2.5).unwrap();
        assert_eq!(ds.get(row, &total).unwrap(), Some(7.5));
        assert_eq!(ds.get(row, &doubled).unwrap(), Some(15.0));

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        ds.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        ds.set(row, &qty, 4).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![
                DataSetEvent::ValueChanged { row, slot: 0 },
                DataSetEvent::ValueChanged { row, slot: 2 },
                DataSetEvent::ValueChanged { row, slot: 3 },
            ]
        );
        assert_eq!(ds.get(row, &doubled).unwrap(), Some(20.0));
    }

    #[test]
    fn test_computed_column_is_read_only() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Line", "lines").unwrap();
        let qty = b.register_column::<i32>(m, "Qty").unwrap();
        let neg = b.register_local_column::<i32>(m, "Neg", -qty).unwrap();
        let schema = b.build().unwrap();
        let mut ds = DataSet::new(schema, m, DataSetOptions::default()).unwrap();
        let row = ds.add_row(ds.root()).unwrap();
        let err = ds.set(row, &neg, 1).unwrap_err();
        assert!(matches!(err, DataError::Mutation(_)));
    }

    #[test]
    fn test_function_errors_surface() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Line", "lines").unwrap();
        let qty = b.register_column::<i32>(m, "Qty").unwrap();
        let broken = b
            .register_function_column::<i32, _>(m, "Broken", &[qty.slot_ref().unwrap()], |_| {
                Err(ExprError::Evaluation("boom".to_string()))
            })
            .unwrap();
        let schema = b.build().unwrap();
        let mut ds = DataSet::new(schema, m, DataSetOptions::default()).unwrap();
        let row = ds.add_row(ds.root()).unwrap();
        assert!(matches!(
            ds.get(row, &broken),
            Err(DataError::Expression(ExprError::Evaluation(_)))
        ));
    }
}
