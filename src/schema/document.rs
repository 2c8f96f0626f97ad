//! JSON schema documents.
//!
//! A [`SchemaDocument`] describes models declaratively. It is converted into a
//! [`Schema`] through the same [`SchemaBuilder`] calls as hand-written
//! registration.

use std::path::Path;
use std::sync::Arc;

use modelset_core::DataType;
use serde::{Deserialize, Serialize};

use super::{ColumnFacets, Schema, SchemaBuilder, SortDirection};
use crate::error::{DataError, DataResult};
use crate::json::value_from_json;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub models: Vec<ModelDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    pub name: String,
    pub table: String,
    pub columns: Vec<ColumnDocument>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub unique: Vec<UniqueDocument>,
    #[serde(default)]
    pub children: Vec<ChildDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(flatten)]
    pub facets: ColumnFacets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueDocument {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildDocument {
    /// Relationship name; also the member name in DataSet JSON.
    pub name: String,
    /// Child model name. Equal to the declaring model for recursive children.
    pub model: String,
    /// `[child column, parent column]` pairs.
    pub foreign_key: Vec<(String, String)>,
}

impl SchemaDocument {
    pub fn from_json(json: &str) -> DataResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> DataResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Register every model, then keys and relationships, and build.
    pub fn build(&self) -> DataResult<Arc<Schema>> {
        let mut builder = SchemaBuilder::new();
        let mut ids = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let id = builder.add_model(&model.name, &model.table)?;
            for column in &model.columns {
                let mut facets = column.facets.clone();
                if let Some(default) = &column.default {
                    facets.default = Some(value_from_json(column.data_type, default)?);
                }
                builder.register_slot(id, &column.name, column.data_type, facets)?;
            }
            ids.push(id);
        }

        for (model, id) in self.models.iter().zip(&ids) {
            if !model.primary_key.is_empty() {
                let key: Vec<(&str, SortDirection)> = model
                    .primary_key
                    .iter()
                    .map(|c| (c.as_str(), SortDirection::Ascending))
                    .collect();
                builder.set_primary_key(*id, &key)?;
            }
            for unique in &model.unique {
                let columns: Vec<&str> = unique.columns.iter().map(String::as_str).collect();
                builder.add_unique(*id, &unique.name, &columns)?;
            }
        }

        for (model, id) in self.models.iter().zip(&ids) {
            for child in &model.children {
                let foreign_key: Vec<(&str, &str)> = child
                    .foreign_key
                    .iter()
                    .map(|(c, p)| (c.as_str(), p.as_str()))
                    .collect();
                if child.model == model.name {
                    builder.register_recursive_child(*id, &child.name, &foreign_key)?;
                } else {
                    let child_id = self
                        .models
                        .iter()
                        .position(|m| m.name == child.model)
                        .map(|i| ids[i])
                        .ok_or_else(|| {
                            DataError::Schema(format!(
                                "relationship '{}' refers to unknown model '{}'",
                                child.name, child.model
                            ))
                        })?;
                    builder.register_child_model(*id, child_id, &child.name, &foreign_key)?;
                }
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelset_core::Value;

    const DOCUMENT: &str = r#"{
        "models": [
            {
                "name": "Customer",
                "table": "customers",
                "columns": [
                    { "name": "Id", "type": "Int32", "identity": true, "nullable": false },
                    { "name": "Name", "type": "String", "size": 80 },
                    { "name": "Active", "type": "Boolean", "default": true }
                ],
                "primary_key": ["Id"],
                "unique": [{ "name": "UQ_Customer_Name", "columns": ["Name"] }],
                "children": [
                    { "name": "Orders", "model": "Order", "foreign_key": [["CustomerId", "Id"]] }
                ]
            },
            {
                "name": "Order",
                "table": "orders",
                "columns": [
                    { "name": "Id", "type": "Int32" },
                    { "name": "CustomerId", "type": "Int32" },
                    { "name": "Amount", "type": "Decimal", "precision": 12, "scale": 2 }
                ],
                "primary_key": ["Id"]
            }
        ]
    }"#;

    #[test]
    fn test_document_builds_schema() {
        let schema = SchemaDocument::from_json(DOCUMENT).unwrap().build().unwrap();
        let customer = schema.model_by_name("Customer").unwrap();
        assert_eq!(customer.columns.len(), 3);
        assert!(customer.columns[0].facets.identity);
        assert_eq!(customer.columns[1].facets.size, Some(80));
        assert_eq!(customer.columns[2].facets.default, Some(Value::Boolean(true)));
        assert_eq!(customer.uniques[0].name, "UQ_Customer_Name");

        let orders = schema
            .relationship_by_name(customer.id, "Orders")
            .unwrap();
        let order = schema.model_by_name("Order").unwrap();
        assert_eq!(orders.child, order.id);
        assert_eq!(orders.foreign_key, vec![(1, 0)]);
        assert_eq!(order.columns[2].facets.precision, Some(12));
    }

    #[test]
    fn test_unknown_child_model_is_schema_error() {
        let json = r#"{ "models": [ {
            "name": "A", "table": "a",
            "columns": [ { "name": "Id", "type": "Int32" } ],
            "primary_key": ["Id"],
            "children": [ { "name": "Bs", "model": "B", "foreign_key": [["AId", "Id"]] } ]
        } ] }"#;
        let err = SchemaDocument::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, DataError::Schema(_)));
    }
}
