//! DataSet export and import.
//!
//! A set is an array of row objects. Stored columns appear under their
//! names and materialized child sets under their relationship names.
//! Computed columns are never written.

use std::sync::Arc;

use modelset_core::ModelId;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::{invalid, value_from_json, value_to_json};
use crate::dataset::{DataSet, DataSetOptions, RowKey, SetKey};
use crate::error::{DataError, DataResult};
use crate::schema::Schema;

impl DataSet {
    pub fn to_json_value(&self) -> DataResult<JsonValue> {
        self.set_to_json(self.root())
    }

    pub fn to_json_string(&self) -> DataResult<String> {
        Ok(serde_json::to_string(&self.to_json_value()?)?)
    }

    pub fn to_json_string_pretty(&self) -> DataResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_json_value()?)?)
    }

    fn set_to_json(&self, set: SetKey) -> DataResult<JsonValue> {
        let rows = self.rows(set)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.row_to_json(*row)?);
        }
        Ok(JsonValue::Array(items))
    }

    fn row_to_json(&self, row: RowKey) -> DataResult<JsonValue> {
        let schema = Arc::clone(self.schema());
        let model = schema.model(self.set_model_of(row)?);
        let mut object = Map::new();
        for column in model.stored_columns() {
            let value = self.get_value(row, &model.slot_ref(column.slot))?;
            object.insert(column.name.clone(), value_to_json(&value)?);
        }
        for relationship in &model.children {
            if let Some(set) = self.existing_child_set(row, *relationship) {
                let name = schema.relationship(*relationship).name.clone();
                object.insert(name, self.set_to_json(set)?);
            }
        }
        Ok(JsonValue::Object(object))
    }

    fn set_model_of(&self, row: RowKey) -> DataResult<ModelId> {
        self.model(row).ok_or(DataError::DisposedRow)
    }

    /// Build a DataSet of `model` from its JSON form.
    ///
    /// Keys must name stored columns or relationships of the row's model.
    pub fn parse_json(
        schema: Arc<Schema>,
        model: ModelId,
        options: DataSetOptions,
        json: &str,
    ) -> DataResult<DataSet> {
        let document: JsonValue = serde_json::from_str(json)?;
        let mut dataset = DataSet::new(schema, model, options)?;
        let root = dataset.root();
        let rows = dataset.fill_set(root, &document)?;
        debug!(rows, "DataSet parsed");
        Ok(dataset)
    }

    /// Append the rows of `json` to `set`, returning the number of rows
    /// created at every depth.
    fn fill_set(&mut self, set: SetKey, json: &JsonValue) -> DataResult<usize> {
        let items = json
            .as_array()
            .ok_or_else(|| invalid("a row set must be a JSON array"))?;
        let schema = Arc::clone(self.schema());
        let model = schema.model(self.set_model(set)?);
        let mut created = 0;
        for item in items {
            let object = item
                .as_object()
                .ok_or_else(|| invalid(format!("rows of '{}' must be JSON objects", model.name)))?;
            let row = self.add_row(set)?;
            created += 1;
            for (key, value) in object {
                if let Some(column) = model.column(key).filter(|c| !c.is_local()) {
                    let value = value_from_json(column.data_type, value)?;
                    self.set_value(row, &model.slot_ref(column.slot), value)?;
                    continue;
                }
                let relationship = model
                    .children
                    .iter()
                    .map(|id| schema.relationship(*id))
                    .find(|r| r.name == *key)
                    .ok_or_else(|| {
                        invalid(format!("'{}' is not a column or relationship of '{}'", key, model.name))
                    })?;
                let child = self.child_set(row, relationship.id)?;
                created += self.fill_set(child, value)?;
            }
        }
        Ok(created)
    }
}
