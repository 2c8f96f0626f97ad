//! Row validation against schema constraints.

use modelset_core::Value;

use super::{DataRow, DataSet, RowKey, SetKey};
use crate::error::{DataError, DataResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    NotNull,
    Check,
    Unique,
}

/// A constraint violated by a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub row: RowKey,
    pub kind: ValidationKind,
    /// Column name for NOT NULL, constraint name otherwise.
    pub constraint: String,
    pub message: String,
}

impl DataSet {
    /// Check NOT NULL facets, check constraints and unique constraints.
    ///
    /// A check that evaluates to NULL passes, as in SQL. Unique keys
    /// containing NULL are not compared.
    pub fn validate(&self, row: RowKey) -> DataResult<Vec<ValidationError>> {
        let slot = self.live_row(row)?;
        let model = self.schema.model(slot.model.ok_or(DataError::DisposedRow)?);
        let mut errors = Vec::new();

        for column in model.stored_columns() {
            if !column.facets.nullable
                && !column.facets.identity
                && slot.values[column.slot].is_null()
            {
                errors.push(ValidationError {
                    row,
                    kind: ValidationKind::NotNull,
                    constraint: column.name.clone(),
                    message: format!("column '{}' does not allow NULL", column.name),
                });
            }
        }

        let scope = DataRow::new(self, row);
        for check in &model.checks {
            if check.expr.eval(&scope)? == Value::Boolean(false) {
                errors.push(ValidationError {
                    row,
                    kind: ValidationKind::Check,
                    constraint: check.name.clone(),
                    message: format!("check constraint '{}' failed", check.name),
                });
            }
        }

        if let Some(set) = slot.set {
            for unique in &model.uniques {
                let key: Vec<&Value> = unique.slots.iter().map(|s| &slot.values[*s]).collect();
                if key.iter().any(|v| v.is_null()) {
                    continue;
                }
                let duplicate = self.sets[set.index()].rows.iter().any(|other| {
                    *other != row
                        && unique
                            .slots
                            .iter()
                            .zip(&key)
                            .all(|(s, v)| self.rows[other.index()].values[*s] == **v)
                });
                if duplicate {
                    errors.push(ValidationError {
                        row,
                        kind: ValidationKind::Unique,
                        constraint: unique.name.clone(),
                        message: format!("unique constraint '{}' is violated", unique.name),
                    });
                }
            }
        }

        Ok(errors)
    }

    /// Validate every data row of `set`.
    pub fn validate_set(&self, set: SetKey) -> DataResult<Vec<ValidationError>> {
        let mut errors = Vec::new();
        for row in self.rows(set)? {
            errors.extend(self.validate(*row)?);
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::dataset::DataSetOptions;
    use crate::schema::{ColumnFacets, SchemaBuilder, SortDirection};

    #[test]
    fn test_constraints() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Product", "products").unwrap();
        b.register_column_with::<i32>(m, "Id", ColumnFacets::identity())
            .unwrap();
        let code = b
            .register_column_with::<String>(m, "Code", ColumnFacets::not_null().with_size(10))
            .unwrap();
        let price = b.register_column::<f64>(m, "Price").unwrap();
        b.set_primary_key(m, &[("Id", SortDirection::Ascending)])
            .unwrap();
        b.add_unique(m, "UQ_Code", &["Code"]).unwrap();
        b.add_check(m, "CK_Price", price.ge(&Column::constant(0.0)))
            .unwrap();
        let schema = b.build().unwrap();

        let mut ds = DataSet::new(schema, m, DataSetOptions::default()).unwrap();
        let root = ds.root();
        let a = ds.add_row(root).unwrap();
        let errors = ds.validate(a).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationKind::NotNull);
        assert_eq!(errors[0].constraint, "Code");

        ds.set(a, &code, "X1".to_string()).unwrap();
        ds.set(a, &price, -1.0).unwrap();
        let errors = ds.validate(a).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationKind::Check);

        ds.set(a, &price, None).unwrap();
        assert!(ds.validate(a).unwrap().is_empty());

        let b_row = ds.add_row(root).unwrap();
        ds.set(b_row, &code, "X1".to_string()).unwrap();
        let errors = ds.validate_set(root).unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ValidationKind::Unique));
    }
}
