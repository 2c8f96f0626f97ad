//! Row views for expression evaluation.

use modelset_core::{ColumnRef, ExprError, ExprResult, ModelId, RowScope, Value};

use super::{DataSet, RowKey, RowState};

/// Borrowed view of one row, the evaluation context of expressions.
#[derive(Clone, Copy)]
pub struct DataRow<'a> {
    dataset: &'a DataSet,
    key: RowKey,
}

impl<'a> DataRow<'a> {
    pub(crate) fn new(dataset: &'a DataSet, key: RowKey) -> Self {
        Self { dataset, key }
    }

    pub fn key(&self) -> RowKey {
        self.key
    }

    pub fn ordinal(&self) -> Option<usize> {
        self.dataset.ordinal(self.key)
    }

    pub fn parent(&self) -> Option<DataRow<'a>> {
        self.dataset
            .parent(self.key)
            .map(|key| DataRow::new(self.dataset, key))
    }
}

impl std::fmt::Debug for DataRow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRow")
            .field("key", &self.key)
            .field("ordinal", &self.ordinal())
            .finish()
    }
}

impl RowScope for DataRow<'_> {
    fn value(&self, column: &ColumnRef) -> ExprResult<Value> {
        self.dataset.read_value(self.key, column)
    }

    fn rows_in_scope(&self, model: ModelId) -> ExprResult<Vec<Self>> {
        let keys = self.dataset.scope_rows(self.key, model)?;
        Ok(keys
            .into_iter()
            .map(|key| DataRow::new(self.dataset, key))
            .collect())
    }
}

impl DataSet {
    /// Read `column` at `row`, resolving columns of ancestor models through
    /// the parent chain.
    pub(crate) fn read_value(&self, row: RowKey, column: &ColumnRef) -> ExprResult<Value> {
        let mut current = Some(row);
        while let Some(key) = current {
            let slot = &self.rows[key.index()];
            let model = slot
                .model
                .ok_or_else(|| ExprError::Evaluation("row has been disposed".to_string()))?;
            if model == column.model {
                let descriptor = self
                    .schema
                    .model(model)
                    .columns
                    .get(column.slot)
                    .ok_or_else(|| {
                        ExprError::Argument(format!("unknown column '{}'", column.name))
                    })?;
                return match &descriptor.computation {
                    Some(computation) => self.computed_value(key, column.slot, computation),
                    None => Ok(slot.values[column.slot].clone()),
                };
            }
            current = slot.parent;
        }
        Err(ExprError::Argument(format!(
            "column '{}' is not in scope of this row",
            column.name
        )))
    }

    /// Rows an aggregate over `model` ranges over when evaluated at `row`.
    ///
    /// Same model: the row's own set. Ancestor model: the set containing the
    /// ancestor row. Descendant model: every row of that model below `row`.
    pub(crate) fn scope_rows(&self, row: RowKey, model: ModelId) -> ExprResult<Vec<RowKey>> {
        let slot = &self.rows[row.index()];
        let own = slot
            .model
            .ok_or_else(|| ExprError::Evaluation("row has been disposed".to_string()))?;

        if model == own {
            return Ok(slot
                .set
                .map(|set| self.sets[set.index()].rows.clone())
                .unwrap_or_default());
        }

        if self.schema.is_ancestor(model, own) {
            let mut current = slot.parent;
            while let Some(key) = current {
                let ancestor = &self.rows[key.index()];
                if ancestor.model == Some(model) {
                    return Ok(ancestor
                        .set
                        .map(|set| self.sets[set.index()].rows.clone())
                        .unwrap_or_default());
                }
                current = ancestor.parent;
            }
            return Ok(Vec::new());
        }

        if self.schema.is_ancestor(own, model) {
            let mut found = Vec::new();
            self.collect_descendants(row, model, &mut found);
            return Ok(found);
        }

        Err(ExprError::Argument(format!(
            "model '{}' is not related to model '{}'",
            self.schema.model(model).name,
            self.schema.model(own).name
        )))
    }

    fn collect_descendants(&self, row: RowKey, model: ModelId, found: &mut Vec<RowKey>) {
        for set in self.rows[row.index()].children.iter().flatten() {
            for child in &self.sets[set.index()].rows {
                if self.rows[child.index()].state != RowState::Attached {
                    continue;
                }
                if self.rows[child.index()].model == Some(model) {
                    found.push(*child);
                }
                self.collect_descendants(*child, model, found);
            }
        }
    }
}
