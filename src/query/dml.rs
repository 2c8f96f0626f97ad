//! INSERT, UPDATE, DELETE and table DDL statement trees.

use modelset_core::{BinaryOp, ColumnRef, DataType, DbExpression, ModelId};

use super::DbSelectStatement;
use crate::dataset::{DataSet, RowKey};
use crate::error::{DataError, DataResult};
use crate::schema::{ColumnFacets, Model, Schema, SortDirection};

#[derive(Debug, Clone, PartialEq)]
pub struct DbColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub facets: ColumnFacets,
}

/// CREATE TABLE for a model's stored columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DbCreateTable {
    pub model: ModelId,
    pub table: String,
    pub temporary: bool,
    pub columns: Vec<DbColumnDefinition>,
    pub primary_key: Vec<(String, SortDirection)>,
    /// `(constraint name, column names)`
    pub uniques: Vec<(String, Vec<String>)>,
    pub checks: Vec<(String, DbExpression)>,
}

impl DbCreateTable {
    pub fn for_model(schema: &Schema, model: ModelId) -> DataResult<Self> {
        if model.index() >= schema.models().len() {
            return Err(DataError::Argument(format!("unknown model id {}", model.0)));
        }
        let model = schema.model(model);
        let columns = model
            .stored_columns()
            .map(|c| DbColumnDefinition {
                name: c.name.clone(),
                data_type: c.data_type,
                facets: c.facets.clone(),
            })
            .collect();
        let primary_key = model
            .primary_key
            .iter()
            .map(|k| (model.columns[k.slot].name.clone(), k.direction))
            .collect();
        let uniques = model
            .uniques
            .iter()
            .map(|u| {
                let names = u.slots.iter().map(|s| model.columns[*s].name.clone()).collect();
                (u.name.clone(), names)
            })
            .collect();
        let checks = model
            .checks
            .iter()
            .map(|c| -> DataResult<(String, DbExpression)> {
                Ok((c.name.clone(), c.expr.to_db_expression()?))
            })
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Self {
            model: model.id,
            table: model.table.clone(),
            temporary: model.temporary,
            columns,
            primary_key,
            uniques,
            checks,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbDropTable {
    pub table: String,
    pub temporary: bool,
}

/// `INSERT INTO table (columns) SELECT ...`
#[derive(Debug, Clone, PartialEq)]
pub struct DbInsertSelect {
    pub table: String,
    pub temporary: bool,
    pub columns: Vec<String>,
    pub select: DbSelectStatement,
}

/// Single-row INSERT. Identity columns are left to the database and read
/// back afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DbInsertStatement {
    pub model: ModelId,
    pub table: String,
    pub values: Vec<(ColumnRef, DbExpression)>,
    pub identity: Option<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbUpdateStatement {
    pub model: ModelId,
    pub table: String,
    pub assignments: Vec<(ColumnRef, DbExpression)>,
    pub where_clause: DbExpression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbDeleteStatement {
    pub model: ModelId,
    pub table: String,
    pub where_clause: DbExpression,
}

fn data_model(dataset: &DataSet, row: RowKey) -> DataResult<&Model> {
    let model = dataset.model(row).ok_or(DataError::DisposedRow)?;
    if dataset.is_synthetic(row) {
        return Err(DataError::Mutation(
            "synthetic rows have no database counterpart".to_string(),
        ));
    }
    Ok(dataset.schema().model(model))
}

fn parameter(dataset: &DataSet, row: RowKey, column: &ColumnRef) -> DataResult<DbExpression> {
    Ok(DbExpression::Parameter {
        value: dataset.get_value(row, column)?,
        data_type: column.data_type,
    })
}

/// `key1 = @p AND key2 = @p ...` over the row's primary key values.
fn key_predicate(dataset: &DataSet, row: RowKey, model: &Model) -> DataResult<DbExpression> {
    let mut predicate: Option<DbExpression> = None;
    for key in &model.primary_key {
        let column = model.slot_ref(key.slot);
        let value = parameter(dataset, row, &column)?;
        if matches!(&value, DbExpression::Parameter { value, .. } if value.is_null()) {
            return Err(DataError::Argument(format!(
                "primary key column '{}' is NULL",
                column.name
            )));
        }
        let pair = DbExpression::Binary {
            op: BinaryOp::Equal,
            left: Box::new(DbExpression::Column(column)),
            right: Box::new(value),
            data_type: DataType::Boolean,
        };
        predicate = Some(match predicate {
            Some(existing) => DbExpression::Binary {
                op: BinaryOp::And,
                left: Box::new(existing),
                right: Box::new(pair),
                data_type: DataType::Boolean,
            },
            None => pair,
        });
    }
    predicate.ok_or_else(|| {
        DataError::Argument(format!("model '{}' has no primary key", model.name))
    })
}

impl DbInsertStatement {
    pub fn from_row(dataset: &DataSet, row: RowKey) -> DataResult<Self> {
        let model = data_model(dataset, row)?;
        let mut values = Vec::new();
        for column in model.stored_columns().filter(|c| !c.facets.identity) {
            let column = model.slot_ref(column.slot);
            let value = parameter(dataset, row, &column)?;
            values.push((column, value));
        }
        Ok(Self {
            model: model.id,
            table: model.table.clone(),
            values,
            identity: model.identity_column().map(|c| model.slot_ref(c.slot)),
        })
    }
}

impl DbUpdateStatement {
    pub fn from_row(dataset: &DataSet, row: RowKey) -> DataResult<Self> {
        let model = data_model(dataset, row)?;
        let where_clause = key_predicate(dataset, row, model)?;
        let keys = model.primary_key_slots();
        let mut assignments = Vec::new();
        for column in model
            .stored_columns()
            .filter(|c| !c.facets.identity && !keys.contains(&c.slot))
        {
            let column = model.slot_ref(column.slot);
            let value = parameter(dataset, row, &column)?;
            assignments.push((column, value));
        }
        if assignments.is_empty() {
            return Err(DataError::Argument(format!(
                "model '{}' has no updatable columns",
                model.name
            )));
        }
        Ok(Self {
            model: model.id,
            table: model.table.clone(),
            assignments,
            where_clause,
        })
    }
}

impl DbDeleteStatement {
    pub fn from_row(dataset: &DataSet, row: RowKey) -> DataResult<Self> {
        let model = data_model(dataset, row)?;
        Ok(Self {
            model: model.id,
            table: model.table.clone(),
            where_clause: key_predicate(dataset, row, model)?,
        })
    }
}
