//! Explicit schema registration.

use std::sync::Arc;

use modelset_core::{ColumnRef, DataType, Expr, ExprResult, ModelId, Value};
use tracing::debug;

use super::{
    CheckConstraint, ColumnDescriptor, ColumnFacets, Computation, KeyColumn, Model,
    Relationship, RelationshipId, Schema, SortDirection, UniqueConstraint, SEQUENTIAL_PREFIX,
    SEQUENTIAL_ROW_ID,
};
use crate::column::{Column, ColumnType};
use crate::error::{DataError, DataResult};

/// Registers models, columns and relationships, then freezes them into a
/// [`Schema`].
///
/// Registration is idempotent: registering the same (model, name, type) again
/// returns the existing slot, while a conflicting registration fails with
/// [`DataError::DuplicateSlot`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    models: Vec<Model>,
    relationships: Vec<Relationship>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, name: &str, table: &str) -> DataResult<ModelId> {
        if name.is_empty() || table.is_empty() {
            return Err(DataError::Schema(
                "model name and table must not be empty".to_string(),
            ));
        }
        if let Some(existing) = self.models.iter().find(|m| m.name == name) {
            if existing.table == table {
                return Ok(existing.id);
            }
            return Err(DataError::Schema(format!(
                "model '{}' is already registered on table '{}'",
                name, existing.table
            )));
        }
        let id = ModelId(self.models.len() as u32);
        self.models.push(Model {
            id,
            name: name.to_string(),
            table: table.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            children: Vec::new(),
            parent_relationship: None,
            dependents: Vec::new(),
            temporary: false,
            sequential_key: None,
        });
        Ok(id)
    }

    fn model(&self, id: ModelId) -> DataResult<&Model> {
        self.models
            .get(id.index())
            .ok_or_else(|| DataError::Argument(format!("unknown model id {}", id.0)))
    }

    fn model_mut(&mut self, id: ModelId) -> DataResult<&mut Model> {
        self.models
            .get_mut(id.index())
            .ok_or_else(|| DataError::Argument(format!("unknown model id {}", id.0)))
    }

    pub fn register_column<T: ColumnType>(
        &mut self,
        model: ModelId,
        name: &str,
    ) -> DataResult<Column<T>> {
        self.register_column_with(model, name, ColumnFacets::default())
    }

    pub fn register_column_with<T: ColumnType>(
        &mut self,
        model: ModelId,
        name: &str,
        facets: ColumnFacets,
    ) -> DataResult<Column<T>> {
        let column = self.register_slot(model, name, T::DATA_TYPE, facets)?;
        Ok(Column::wrap(Expr::Column(column)))
    }

    /// Register several stored columns of one type.
    pub fn register_column_list<T: ColumnType>(
        &mut self,
        model: ModelId,
        names: &[&str],
    ) -> DataResult<Vec<Column<T>>> {
        names
            .iter()
            .map(|name| self.register_column::<T>(model, name))
            .collect()
    }

    /// Untyped registration of a stored column.
    pub fn register_slot(
        &mut self,
        model: ModelId,
        name: &str,
        data_type: DataType,
        facets: ColumnFacets,
    ) -> DataResult<ColumnRef> {
        if let Some(default) = &facets.default {
            default.clone().conform(data_type)?;
        }
        self.push_column(model, name, data_type, facets, None)
    }

    /// Register an in-memory column computed from an expression over columns
    /// of the same model.
    pub fn register_local_column<T: ColumnType>(
        &mut self,
        model: ModelId,
        name: &str,
        expr: impl Into<Expr>,
    ) -> DataResult<Column<T>> {
        let expr = expr.into();
        let owner = self.model(model)?;
        if expr.contains_aggregate() {
            return Err(DataError::Schema(format!(
                "local column '{}' cannot use an aggregate",
                name
            )));
        }
        for column in expr.column_refs() {
            if column.model != model || column.slot >= owner.columns.len() {
                return Err(DataError::Schema(format!(
                    "local column '{}' references '{}' outside model '{}'",
                    name, column.name, owner.name
                )));
            }
        }
        if !type_fits(expr.data_type(), T::DATA_TYPE) {
            return Err(DataError::Schema(format!(
                "local column '{}' is {} but its expression is {}",
                name,
                T::DATA_TYPE,
                expr.data_type()
            )));
        }
        let column = self.push_column(
            model,
            name,
            T::DATA_TYPE,
            ColumnFacets::default(),
            Some(Computation::Expression(expr)),
        )?;
        Ok(Column::wrap(Expr::Column(column)))
    }

    /// Register an in-memory column computed by a pure function of the
    /// listed dependency columns.
    pub fn register_function_column<T, F>(
        &mut self,
        model: ModelId,
        name: &str,
        dependencies: &[ColumnRef],
        function: F,
    ) -> DataResult<Column<T>>
    where
        T: ColumnType,
        F: Fn(&[Value]) -> ExprResult<Value> + Send + Sync + 'static,
    {
        let owner = self.model(model)?;
        for column in dependencies {
            if column.model != model || column.slot >= owner.columns.len() {
                return Err(DataError::Schema(format!(
                    "local column '{}' depends on '{}' outside model '{}'",
                    name, column.name, owner.name
                )));
            }
        }
        let computation = Computation::Function {
            dependencies: dependencies.iter().map(|c| c.slot).collect(),
            function: Arc::new(function),
        };
        let column = self.push_column(
            model,
            name,
            T::DATA_TYPE,
            ColumnFacets::default(),
            Some(computation),
        )?;
        Ok(Column::wrap(Expr::Column(column)))
    }

    fn push_column(
        &mut self,
        model: ModelId,
        name: &str,
        data_type: DataType,
        facets: ColumnFacets,
        computation: Option<Computation>,
    ) -> DataResult<ColumnRef> {
        if name.is_empty() {
            return Err(DataError::Schema("column name must not be empty".to_string()));
        }
        let relationship_names: Vec<&str> = self
            .relationships
            .iter()
            .filter(|r| r.parent == model)
            .map(|r| r.name.as_str())
            .collect();
        if relationship_names.contains(&name) {
            return Err(DataError::DuplicateSlot {
                model: self.model(model)?.name.clone(),
                column: name.to_string(),
            });
        }

        let owner = self.model_mut(model)?;
        if let Some(existing) = owner.column(name) {
            if existing.data_type == data_type && existing.is_local() == computation.is_some() {
                return Ok(owner.slot_ref(existing.slot));
            }
            return Err(DataError::DuplicateSlot {
                model: owner.name.clone(),
                column: name.to_string(),
            });
        }
        let slot = owner.columns.len();
        owner.columns.push(ColumnDescriptor {
            name: name.to_string(),
            slot,
            data_type,
            facets,
            computation,
        });
        Ok(owner.slot_ref(slot))
    }

    pub fn set_primary_key(
        &mut self,
        model: ModelId,
        columns: &[(&str, SortDirection)],
    ) -> DataResult<()> {
        if columns.is_empty() {
            return Err(DataError::Schema("primary key must not be empty".to_string()));
        }
        let owner = self.model_mut(model)?;
        let mut key = Vec::with_capacity(columns.len());
        for (name, direction) in columns {
            let slot = stored_slot(owner, name)?;
            owner.columns[slot].facets.nullable = false;
            key.push(KeyColumn {
                slot,
                direction: *direction,
            });
        }
        owner.primary_key = key;
        Ok(())
    }

    pub fn add_unique(&mut self, model: ModelId, name: &str, columns: &[&str]) -> DataResult<()> {
        let owner = self.model_mut(model)?;
        let slots = columns
            .iter()
            .map(|c| stored_slot(owner, c))
            .collect::<DataResult<Vec<_>>>()?;
        if slots.is_empty() {
            return Err(DataError::Schema(format!(
                "unique constraint '{}' has no columns",
                name
            )));
        }
        if let Some(existing) = owner.uniques.iter().find(|u| u.name == name) {
            if existing.slots == slots {
                return Ok(());
            }
            return Err(DataError::Schema(format!(
                "unique constraint '{}' is already defined differently",
                name
            )));
        }
        owner.uniques.push(UniqueConstraint {
            name: name.to_string(),
            slots,
        });
        Ok(())
    }

    pub fn add_check(&mut self, model: ModelId, name: &str, expr: impl Into<Expr>) -> DataResult<()> {
        let expr = expr.into();
        let owner = self.model_mut(model)?;
        if expr.data_type() != DataType::Boolean || expr.contains_aggregate() {
            return Err(DataError::Schema(format!(
                "check constraint '{}' must be a non-aggregate boolean expression",
                name
            )));
        }
        for column in expr.column_refs() {
            let stored = column.model == model
                && owner
                    .columns
                    .get(column.slot)
                    .is_some_and(|c| !c.is_local());
            if !stored {
                return Err(DataError::Schema(format!(
                    "check constraint '{}' references '{}' which is not a stored column of '{}'",
                    name, column.name, owner.name
                )));
            }
        }
        owner.checks.retain(|c| c.name != name);
        owner.checks.push(CheckConstraint {
            name: name.to_string(),
            expr,
        });
        Ok(())
    }

    /// Declare `child` as a one-to-many child of `parent`.
    ///
    /// `foreign_key` lists `(child column, parent column)` pairs.
    pub fn register_child_model(
        &mut self,
        parent: ModelId,
        child: ModelId,
        name: &str,
        foreign_key: &[(&str, &str)],
    ) -> DataResult<RelationshipId> {
        self.model(child)?;
        if parent == child {
            return Err(DataError::ChildModelCycle(format!(
                "model '{}' cannot be its own child without register_recursive_child",
                self.model(parent)?.name
            )));
        }
        if self.is_ancestor(child, parent) {
            return Err(DataError::ChildModelCycle(format!(
                "model '{}' is an ancestor of '{}'",
                self.model(child)?.name,
                self.model(parent)?.name
            )));
        }
        if let Some(existing) = self.model(child)?.parent_relationship {
            let existing = &self.relationships[existing.index()];
            if existing.parent == parent && existing.name == name {
                return Ok(existing.id);
            }
            return Err(DataError::Schema(format!(
                "model '{}' is already a child of '{}'",
                self.model(child)?.name,
                self.model(existing.parent)?.name
            )));
        }
        let id = self.push_relationship(parent, child, name, foreign_key, false)?;
        self.model_mut(child)?.parent_relationship = Some(id);
        Ok(id)
    }

    /// Declare a self-referencing relationship: rows of `model` own child
    /// sets of the same model.
    pub fn register_recursive_child(
        &mut self,
        model: ModelId,
        name: &str,
        foreign_key: &[(&str, &str)],
    ) -> DataResult<RelationshipId> {
        if let Some(existing) = self
            .relationships
            .iter()
            .find(|r| r.recursive && r.parent == model && r.name == name)
        {
            return Ok(existing.id);
        }
        self.push_relationship(model, model, name, foreign_key, true)
    }

    fn push_relationship(
        &mut self,
        parent: ModelId,
        child: ModelId,
        name: &str,
        foreign_key: &[(&str, &str)],
        recursive: bool,
    ) -> DataResult<RelationshipId> {
        let parent_model = self.model(parent)?;
        let child_model = self.model(child)?;
        if parent_model.column(name).is_some()
            || self
                .relationships
                .iter()
                .any(|r| r.parent == parent && r.name == name)
        {
            return Err(DataError::DuplicateSlot {
                model: parent_model.name.clone(),
                column: name.to_string(),
            });
        }
        if foreign_key.is_empty() {
            return Err(DataError::Schema(format!(
                "relationship '{}' has an empty foreign key",
                name
            )));
        }
        let mut pairs = Vec::with_capacity(foreign_key.len());
        for (child_column, parent_column) in foreign_key {
            let child_slot = stored_slot(child_model, child_column)?;
            let parent_slot = stored_slot(parent_model, parent_column)?;
            let (c, p) = (
                &child_model.columns[child_slot],
                &parent_model.columns[parent_slot],
            );
            if c.data_type != p.data_type {
                return Err(DataError::Schema(format!(
                    "foreign key column '{}.{}' is {} but '{}.{}' is {}",
                    child_model.name, c.name, c.data_type, parent_model.name, p.name, p.data_type
                )));
            }
            pairs.push((child_slot, parent_slot));
        }

        let id = RelationshipId(self.relationships.len() as u32);
        self.relationships.push(Relationship {
            id,
            name: name.to_string(),
            parent,
            child,
            foreign_key: pairs,
            recursive,
        });
        self.model_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn is_ancestor(&self, ancestor: ModelId, model: ModelId) -> bool {
        let mut current = model;
        // Bounded by the number of relationships, which are acyclic here
        for _ in 0..=self.relationships.len() {
            let parent = self
                .models
                .get(current.index())
                .and_then(|m| m.parent_relationship)
                .map(|r| self.relationships[r.index()].parent);
            match parent {
                Some(p) if p == ancestor => return true,
                Some(p) => current = p,
                None => return false,
            }
        }
        false
    }

    /// Validate relationships, generate sequential key models and freeze.
    pub fn build(mut self) -> DataResult<Arc<Schema>> {
        for relationship in &self.relationships {
            let parent = &self.models[relationship.parent.index()];
            let key = parent.primary_key_slots();
            let referenced: Vec<usize> = relationship.foreign_key.iter().map(|p| p.1).collect();
            if key.is_empty() || key != referenced {
                return Err(DataError::Schema(format!(
                    "foreign key of relationship '{}' must reference the primary key of '{}'",
                    relationship.name, parent.name
                )));
            }
        }

        let parents: Vec<ModelId> = self
            .models
            .iter()
            .filter(|m| !m.children.is_empty())
            .map(|m| m.id)
            .collect();
        for parent in parents {
            let sequential = self.sequential_model(parent)?;
            self.models[parent.index()].sequential_key = Some(sequential.id);
            self.models.push(sequential);
        }

        for model in &mut self.models {
            let mut dependents = vec![Vec::new(); model.columns.len()];
            for column in &model.columns {
                if let Some(computation) = &column.computation {
                    for slot in computation.dependencies() {
                        dependents[slot].push(column.slot);
                    }
                }
            }
            model.dependents = dependents;
        }

        debug!(
            models = self.models.len(),
            relationships = self.relationships.len(),
            "Schema built"
        );
        Ok(Arc::new(Schema::new(self.models, self.relationships)))
    }

    /// Staging model holding one surrogate row id per parent row.
    fn sequential_model(&self, parent: ModelId) -> DataResult<Model> {
        let parent = &self.models[parent.index()];
        let name = format!("{}{}", SEQUENTIAL_PREFIX, parent.name);
        if self.models.iter().any(|m| m.name == name) {
            return Err(DataError::Schema(format!(
                "model name '{}' is reserved for sequential key tables",
                name
            )));
        }
        let mut columns = vec![ColumnDescriptor {
            name: SEQUENTIAL_ROW_ID.to_string(),
            slot: 0,
            data_type: DataType::Int32,
            facets: ColumnFacets::identity(),
            computation: None,
        }];
        for key in &parent.primary_key {
            let source = &parent.columns[key.slot];
            columns.push(ColumnDescriptor {
                name: source.name.clone(),
                slot: columns.len(),
                data_type: source.data_type,
                facets: ColumnFacets {
                    nullable: false,
                    identity: false,
                    default: None,
                    ..source.facets.clone()
                },
                computation: None,
            });
        }
        let dependents = vec![Vec::new(); columns.len()];
        Ok(Model {
            id: ModelId(self.models.len() as u32),
            name,
            table: format!("{}{}", SEQUENTIAL_PREFIX, parent.table),
            columns,
            primary_key: vec![KeyColumn {
                slot: 0,
                direction: SortDirection::Ascending,
            }],
            uniques: Vec::new(),
            checks: Vec::new(),
            children: Vec::new(),
            parent_relationship: None,
            dependents,
            temporary: true,
            sequential_key: None,
        })
    }
}

fn stored_slot(model: &Model, name: &str) -> DataResult<usize> {
    match model.column(name) {
        Some(c) if !c.is_local() => Ok(c.slot),
        Some(_) => Err(DataError::Schema(format!(
            "local column '{}.{}' cannot be used in a key",
            model.name, name
        ))),
        None => Err(DataError::Schema(format!(
            "model '{}' has no column '{}'",
            model.name, name
        ))),
    }
}

/// Whether a value of type `source` can be stored in a column of `target`.
pub(crate) fn type_fits(source: DataType, target: DataType) -> bool {
    source == target
        || (source.is_numeric()
            && target.is_numeric()
            && DataType::widen(source, target) == Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelset_core::{BinaryOp, DataType};

    fn order_schema() -> (SchemaBuilder, ModelId, ModelId) {
        let mut b = SchemaBuilder::new();
        let order = b.add_model("Order", "orders").unwrap();
        let line = b.add_model("Line", "order_lines").unwrap();
        b.register_column_with::<i32>(order, "Id", ColumnFacets::identity())
            .unwrap();
        b.register_column::<i32>(line, "Id").unwrap();
        b.register_column::<i32>(line, "OrderId").unwrap();
        b.set_primary_key(order, &[("Id", SortDirection::Ascending)])
            .unwrap();
        b.set_primary_key(line, &[("Id", SortDirection::Ascending)])
            .unwrap();
        (b, order, line)
    }

    #[test]
    fn test_registration_is_idempotent() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Item", "items").unwrap();
        assert_eq!(b.add_model("Item", "items").unwrap(), m);

        let first = b.register_column::<String>(m, "Name").unwrap();
        let again = b.register_column::<String>(m, "Name").unwrap();
        assert_eq!(first.expr(), again.expr());

        let err = b.register_column::<i32>(m, "Name").unwrap_err();
        assert!(matches!(err, DataError::DuplicateSlot { .. }));
    }

    #[test]
    fn test_slots_are_stable() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Item", "items").unwrap();
        let cols = b
            .register_column_list::<f64>(m, &["A", "B", "C"])
            .unwrap();
        let slots: Vec<usize> = cols
            .iter()
            .map(|c| c.slot_ref().unwrap().slot)
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
        let b_again = b.register_column::<f64>(m, "B").unwrap();
        assert_eq!(b_again.slot_ref().unwrap().slot, 1);
    }

    #[test]
    fn test_child_cycle_rejected() {
        let (mut b, order, line) = order_schema();
        b.register_child_model(order, line, "Lines", &[("OrderId", "Id")])
            .unwrap();
        let err = b
            .register_child_model(line, order, "Orders", &[("Id", "Id")])
            .unwrap_err();
        assert!(matches!(err, DataError::ChildModelCycle(_)));

        let err = b
            .register_child_model(order, order, "Self", &[("Id", "Id")])
            .unwrap_err();
        assert!(matches!(err, DataError::ChildModelCycle(_)));
    }

    #[test]
    fn test_recursive_child_allowed() {
        let mut b = SchemaBuilder::new();
        let node = b.add_model("Node", "nodes").unwrap();
        b.register_column::<i32>(node, "Id").unwrap();
        b.register_column::<i32>(node, "ParentId").unwrap();
        b.set_primary_key(node, &[("Id", SortDirection::Ascending)])
            .unwrap();
        let rel = b
            .register_recursive_child(node, "Children", &[("ParentId", "Id")])
            .unwrap();
        let schema = b.build().unwrap();
        assert!(schema.relationship(rel).recursive);
        assert!(schema.model(node).sequential_key.is_some());
    }

    #[test]
    fn test_build_generates_sequential_key_model() {
        let (mut b, order, line) = order_schema();
        b.register_child_model(order, line, "Lines", &[("OrderId", "Id")])
            .unwrap();
        let schema = b.build().unwrap();
        let seq = schema.model(schema.model(order).sequential_key.unwrap());
        assert!(seq.temporary);
        assert_eq!(seq.name, "sys_sequential_Order");
        assert_eq!(seq.table, "sys_sequential_orders");
        let names: Vec<&str> = seq.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sys_row_id", "Id"]);
        assert!(seq.columns[0].facets.identity);
        assert!(!seq.columns[1].facets.identity);
        assert!(schema.model(line).sequential_key.is_none());
    }

    #[test]
    fn test_foreign_key_must_reference_primary_key() {
        let (mut b, order, line) = order_schema();
        b.register_column::<i32>(order, "Number").unwrap();
        b.register_child_model(order, line, "Lines", &[("OrderId", "Number")])
            .unwrap();
        assert!(matches!(b.build().unwrap_err(), DataError::Schema(_)));
    }

    #[test]
    fn test_local_column_validation() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Item", "items").unwrap();
        let qty = b.register_column::<i32>(m, "Qty").unwrap();
        let total = b
            .register_local_column::<i32>(m, "Double", qty.clone() * Column::constant(2))
            .unwrap();
        assert_eq!(total.slot_ref().unwrap().slot, 1);

        let err = b
            .register_local_column::<i32>(m, "Sum", qty.sum())
            .unwrap_err();
        assert!(matches!(err, DataError::Schema(_)));

        let err = b
            .register_local_column::<bool>(m, "Wrong", qty.clone() * Column::constant(2))
            .unwrap_err();
        assert!(matches!(err, DataError::Schema(_)));

        let schema = b.build().unwrap();
        assert_eq!(schema.model(m).dependents[0], vec![1]);
    }

    #[test]
    fn test_check_must_be_boolean() {
        let mut b = SchemaBuilder::new();
        let m = b.add_model("Item", "items").unwrap();
        let qty = b.register_column::<i32>(m, "Qty").unwrap();
        assert!(b.add_check(m, "CK_Qty", qty.expr().clone()).is_err());
        let positive = Expr::binary(
            qty.expr().clone(),
            BinaryOp::GreaterThan,
            Expr::constant(0, DataType::Int32),
        );
        b.add_check(m, "CK_Qty", positive).unwrap();
        let schema = b.build().unwrap();
        assert_eq!(schema.model(m).checks.len(), 1);
    }
}
