//! SELECT statement builder and sequential key child queries.

use std::sync::Arc;

use modelset_core::{BinaryOp, ColumnRef, DataType, DbExpression, Expr, ModelId};
use tracing::debug;

use super::dml::{DbCreateTable, DbDropTable, DbInsertSelect};
use super::{ColumnMapping, DbFromClause, DbSelectStatement, DbSortExpression, JoinKind};
use crate::column::SortSpec;
use crate::error::{DataError, DataResult};
use crate::schema::{type_fits, RelationshipId, Schema, SortDirection, SEQUENTIAL_ROW_ID};

fn lower(expr: Expr) -> DataResult<DbExpression> {
    expr.to_db_expression()
        .map_err(|e| DataError::Argument(e.to_string()))
}

fn column(column: ColumnRef) -> DbExpression {
    DbExpression::Column(column)
}

fn equals(left: DbExpression, right: DbExpression) -> DbExpression {
    DbExpression::Binary {
        op: BinaryOp::Equal,
        left: Box::new(left),
        right: Box::new(right),
        data_type: DataType::Boolean,
    }
}

fn and(left: DbExpression, right: DbExpression) -> DbExpression {
    DbExpression::Binary {
        op: BinaryOp::And,
        left: Box::new(left),
        right: Box::new(right),
        data_type: DataType::Boolean,
    }
}

fn predicate(expr: Expr, clause: &str) -> DataResult<DbExpression> {
    let expr = lower(expr)?;
    if expr.data_type() != DataType::Boolean {
        return Err(DataError::Argument(format!(
            "{} predicate must be Boolean, found {}",
            clause,
            expr.data_type()
        )));
    }
    Ok(expr)
}

/// Composes a [`DbSelectStatement`] projecting into one target model.
///
/// Every method validates what it can immediately; checks that depend on the
/// whole statement (grouping, bound models, paging) run in [`build`].
///
/// [`build`]: QueryBuilder::build
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    schema: Arc<Schema>,
    model: ModelId,
    from: Option<DbFromClause>,
    select: Vec<ColumnMapping>,
    aggregate: bool,
    group_by: Vec<DbExpression>,
    where_clause: Option<DbExpression>,
    having: Option<DbExpression>,
    order_by: Vec<DbSortExpression>,
    offset: Option<u64>,
    fetch: Option<u64>,
}

impl QueryBuilder {
    pub fn new(schema: Arc<Schema>, model: ModelId) -> DataResult<Self> {
        if model.index() >= schema.models().len() {
            return Err(DataError::Argument(format!("unknown model id {}", model.0)));
        }
        Ok(Self {
            schema,
            model,
            from: None,
            select: Vec::new(),
            aggregate: false,
            group_by: Vec::new(),
            where_clause: None,
            having: None,
            order_by: Vec::new(),
            offset: None,
            fetch: None,
        })
    }

    /// `SELECT <all columns> FROM <table>` for a model.
    pub fn select_table(schema: Arc<Schema>, model: ModelId) -> DataResult<DbSelectStatement> {
        Self::new(schema, model)?
            .from_table(model)?
            .select_all()?
            .build()
    }

    fn set_from(mut self, from: DbFromClause) -> DataResult<Self> {
        if self.from.is_some() {
            return Err(DataError::Argument("FROM source is already set".to_string()));
        }
        self.from = Some(from);
        Ok(self)
    }

    pub fn from_table(self, model: ModelId) -> DataResult<Self> {
        if model.index() >= self.schema.models().len() {
            return Err(DataError::Argument(format!("unknown model id {}", model.0)));
        }
        let source = self.schema.model(model);
        let from = DbFromClause::Table {
            model,
            table: source.table.clone(),
            temporary: source.temporary,
        };
        self.set_from(from)
    }

    /// Use a built statement as a derived table, bound under its model.
    pub fn from_query(self, query: DbSelectStatement) -> DataResult<Self> {
        self.set_from(DbFromClause::Query(Box::new(query)))
    }

    pub fn from_union(self, queries: Vec<DbSelectStatement>, all: bool) -> DataResult<Self> {
        if queries.len() < 2 {
            return Err(DataError::Argument(
                "a union needs at least two queries".to_string(),
            ));
        }
        let model = queries[0].model;
        for query in &queries[1..] {
            if query.model != model || query.select.len() != queries[0].select.len() {
                return Err(DataError::Argument(format!(
                    "union queries must all project model '{}'",
                    self.schema.model(model).name
                )));
            }
        }
        self.set_from(DbFromClause::Union { all, queries })
    }

    pub fn inner_join(self, model: ModelId, on: &[(ColumnRef, ColumnRef)]) -> DataResult<Self> {
        self.join(JoinKind::Inner, model, on)
    }

    pub fn left_join(self, model: ModelId, on: &[(ColumnRef, ColumnRef)]) -> DataResult<Self> {
        self.join(JoinKind::Left, model, on)
    }

    /// Join `model`'s table on `(bound column, joined column)` key pairs.
    fn join(
        mut self,
        kind: JoinKind,
        model: ModelId,
        on: &[(ColumnRef, ColumnRef)],
    ) -> DataResult<Self> {
        let left = self
            .from
            .take()
            .ok_or_else(|| DataError::Argument("join requires a FROM source".to_string()))?;
        if model.index() >= self.schema.models().len() {
            return Err(DataError::Argument(format!("unknown model id {}", model.0)));
        }
        let joined = self.schema.model(model);
        let bound = left.models();
        if bound.contains(&model) {
            return Err(DataError::Argument(format!(
                "model '{}' is already bound to the FROM source",
                joined.name
            )));
        }

        let mut condition: Option<DbExpression> = None;
        for (outer, inner) in on {
            if !bound.contains(&outer.model) {
                return Err(DataError::Argument(format!(
                    "join key '{}' is not bound to the FROM source",
                    outer.name
                )));
            }
            if inner.model != model {
                return Err(DataError::Argument(format!(
                    "join key '{}' does not belong to model '{}'",
                    inner.name, joined.name
                )));
            }
            let compatible = outer.data_type == inner.data_type
                || (outer.data_type.is_numeric() && inner.data_type.is_numeric());
            if !compatible {
                return Err(DataError::Argument(format!(
                    "join keys '{}' ({}) and '{}' ({}) have different types",
                    outer.name, outer.data_type, inner.name, inner.data_type
                )));
            }
            check_stored(&self.schema, outer)?;
            check_stored(&self.schema, inner)?;
            let pair = equals(column(outer.clone()), column(inner.clone()));
            condition = Some(match condition {
                Some(existing) => and(existing, pair),
                None => pair,
            });
        }
        let on = condition
            .ok_or_else(|| DataError::Argument("join needs at least one key pair".to_string()))?;

        let right = DbFromClause::Table {
            model,
            table: joined.table.clone(),
            temporary: joined.temporary,
        };
        self.from = Some(DbFromClause::Join {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            on,
        });
        Ok(self)
    }

    /// Project `expr` into the `target` column of the target model.
    pub fn select(mut self, expr: impl Into<Expr>, target: &ColumnRef) -> DataResult<Self> {
        let model = self.schema.model(self.model);
        if target.model != self.model {
            return Err(DataError::Argument(format!(
                "'{}' is not a column of model '{}'",
                target.name, model.name
            )));
        }
        let descriptor = model.columns.get(target.slot).ok_or_else(|| {
            DataError::Argument(format!("unknown column '{}'", target.name))
        })?;
        if descriptor.is_local() {
            return Err(DataError::Argument(format!(
                "computed column '{}' cannot be selected into",
                descriptor.name
            )));
        }
        let expr = lower(expr.into())?;
        if !type_fits(expr.data_type(), descriptor.data_type) {
            return Err(DataError::Argument(format!(
                "cannot select {} into column '{}' of type {}",
                expr.data_type(),
                descriptor.name,
                descriptor.data_type
            )));
        }
        if self.select.iter().any(|m| m.target.slot == target.slot) {
            return Err(DataError::Argument(format!(
                "column '{}' is already selected",
                descriptor.name
            )));
        }
        let target = model.slot_ref(target.slot);
        self.select.push(ColumnMapping { target, expr });
        Ok(self)
    }

    /// Map every unselected stored column of the target model from the
    /// same-named column of the first bound model exposing one.
    pub fn select_all(mut self) -> DataResult<Self> {
        let from = self
            .from
            .as_ref()
            .ok_or_else(|| DataError::Argument("select_all requires a FROM source".to_string()))?;
        let bound = from.models();
        let target = self.schema.model(self.model);

        let mut mappings = Vec::new();
        for descriptor in target.stored_columns() {
            if self.select.iter().any(|m| m.target.slot == descriptor.slot) {
                continue;
            }
            let source = bound.iter().find_map(|m| {
                let model = self.schema.model(*m);
                model
                    .column(&descriptor.name)
                    .filter(|c| !c.is_local() && exposes(from, *m, c.slot))
                    .filter(|c| type_fits(c.data_type, descriptor.data_type))
                    .map(|c| model.slot_ref(c.slot))
            });
            if let Some(source) = source {
                mappings.push(ColumnMapping {
                    target: target.slot_ref(descriptor.slot),
                    expr: column(source),
                });
            }
        }
        if mappings.is_empty() && self.select.is_empty() {
            return Err(DataError::Argument(format!(
                "no column of the FROM source maps to model '{}'",
                target.name
            )));
        }
        self.select.extend(mappings);
        Ok(self)
    }

    /// Group by every selected expression that is not an aggregate.
    pub fn auto_group_by(mut self) -> Self {
        self.aggregate = true;
        self
    }

    pub fn group_by(mut self, expr: impl Into<Expr>) -> DataResult<Self> {
        let expr = lower(expr.into())?;
        if expr.contains_aggregate() {
            return Err(DataError::Argument(
                "GROUP BY cannot contain an aggregate".to_string(),
            ));
        }
        if !self.group_by.contains(&expr) {
            self.group_by.push(expr);
        }
        Ok(self)
    }

    /// Add a WHERE predicate, ANDed with any previous one.
    pub fn where_clause(mut self, expr: impl Into<Expr>) -> DataResult<Self> {
        let expr = predicate(expr.into(), "WHERE")?;
        if expr.contains_aggregate() {
            return Err(DataError::Argument(
                "WHERE cannot contain an aggregate; use HAVING".to_string(),
            ));
        }
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => and(existing, expr),
            None => expr,
        });
        Ok(self)
    }

    pub fn having(mut self, expr: impl Into<Expr>) -> DataResult<Self> {
        let expr = predicate(expr.into(), "HAVING")?;
        self.having = Some(match self.having.take() {
            Some(existing) => and(existing, expr),
            None => expr,
        });
        Ok(self)
    }

    pub fn order_by(mut self, spec: SortSpec) -> DataResult<Self> {
        let expr = lower(spec.expr)?;
        self.order_by.push(DbSortExpression {
            expr,
            direction: spec.direction,
        });
        Ok(self)
    }

    pub fn offset_fetch(mut self, offset: Option<u64>, fetch: Option<u64>) -> Self {
        self.offset = offset;
        self.fetch = fetch;
        self
    }

    pub fn build(self) -> DataResult<DbSelectStatement> {
        let Self {
            schema,
            model,
            from,
            mut select,
            aggregate,
            mut group_by,
            where_clause,
            having,
            order_by,
            offset,
            fetch,
        } = self;
        let target = schema.model(model);
        let from =
            from.ok_or_else(|| DataError::Argument("statement has no FROM source".to_string()))?;
        if select.is_empty() {
            return Err(DataError::Argument(format!(
                "statement for model '{}' selects no columns",
                target.name
            )));
        }

        let bound = from.models();
        let expressions = select
            .iter()
            .map(|m| &m.expr)
            .chain(where_clause.iter())
            .chain(group_by.iter())
            .chain(having.iter())
            .chain(order_by.iter().map(|o| &o.expr));
        for expr in expressions {
            for column in expr.column_refs() {
                check_bound(&schema, &from, &bound, column)?;
            }
        }

        let grouped = aggregate || !group_by.is_empty();
        if grouped {
            if aggregate {
                for mapping in &select {
                    if !mapping.expr.contains_aggregate()
                        && !mapping.expr.is_literal()
                        && !group_by.contains(&mapping.expr)
                    {
                        group_by.push(mapping.expr.clone());
                    }
                }
            }
            for mapping in &select {
                if !mapping.expr.contains_aggregate()
                    && !mapping.expr.is_literal()
                    && !group_by.contains(&mapping.expr)
                {
                    return Err(DataError::Argument(format!(
                        "column '{}' must be aggregated or appear in GROUP BY",
                        mapping.target.name
                    )));
                }
            }
        } else {
            if let Some(mapping) = select.iter().find(|m| m.expr.contains_aggregate()) {
                return Err(DataError::Argument(format!(
                    "aggregate selected into '{}' in a non-aggregate query",
                    mapping.target.name
                )));
            }
            if having.is_some() {
                return Err(DataError::Argument(
                    "HAVING requires an aggregate query".to_string(),
                ));
            }
            if order_by.iter().any(|o| o.expr.contains_aggregate()) {
                return Err(DataError::Argument(
                    "ORDER BY aggregate in a non-aggregate query".to_string(),
                ));
            }
        }

        if offset.is_some() && order_by.is_empty() {
            return Err(DataError::Argument("OFFSET requires ORDER BY".to_string()));
        }

        select.sort_by_key(|m| m.target.slot);
        debug!(
            model = %target.name,
            columns = select.len(),
            grouped,
            "Select statement built"
        );
        Ok(DbSelectStatement {
            model,
            select,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            offset,
            fetch,
        })
    }
}

fn check_stored(schema: &Schema, column: &ColumnRef) -> DataResult<()> {
    let model = schema.model(column.model);
    match model.columns.get(column.slot) {
        Some(c) if !c.is_local() => Ok(()),
        Some(c) => Err(DataError::Argument(format!(
            "computed column '{}.{}' has no SQL source",
            model.name, c.name
        ))),
        None => Err(DataError::Argument(format!(
            "unknown column '{}'",
            column.name
        ))),
    }
}

/// Whether `model`'s bound source exposes `slot`.
fn exposes(from: &DbFromClause, model: ModelId, slot: usize) -> bool {
    match from.source_of(model) {
        Some(DbFromClause::Table { .. }) => true,
        Some(DbFromClause::Query(query)) => query.projection(slot).is_some(),
        Some(DbFromClause::Union { queries, .. }) => queries
            .first()
            .is_some_and(|q| q.projection(slot).is_some()),
        _ => false,
    }
}

fn check_bound(
    schema: &Schema,
    from: &DbFromClause,
    bound: &[ModelId],
    column: &ColumnRef,
) -> DataResult<()> {
    if !bound.contains(&column.model) {
        return Err(DataError::Argument(format!(
            "column '{}' of model '{}' is not bound to the FROM source",
            column.name,
            schema.model(column.model).name
        )));
    }
    check_stored(schema, column)?;
    if !exposes(from, column.model, column.slot) {
        return Err(DataError::Argument(format!(
            "column '{}' is not projected by the derived query of '{}'",
            column.name,
            schema.model(column.model).name
        )));
    }
    Ok(())
}

/// Statements loading the rows of one child relationship for the rows a
/// parent statement returns.
///
/// The parent's primary keys are inserted, in the parent's order, into a
/// temporary sequential key table whose identity column numbers them. The
/// child select joins that table and orders by the surrogate row id, so child
/// rows come back grouped and ordered like their parents.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildQuery {
    pub relationship: RelationshipId,
    pub create_temp_table: DbCreateTable,
    pub fill: DbInsertSelect,
    pub select: DbSelectStatement,
    pub drop_temp_table: DbDropTable,
}

pub fn create_child(
    schema: &Schema,
    parent: &DbSelectStatement,
    relationship: RelationshipId,
) -> DataResult<ChildQuery> {
    let relationship = schema
        .relationships()
        .get(relationship.index())
        .ok_or_else(|| DataError::Argument(format!("unknown relationship {}", relationship.0)))?;
    let parent_model = schema.model(parent.model);
    if relationship.parent != parent.model {
        return Err(DataError::Argument(format!(
            "relationship '{}' is not a child of model '{}'",
            relationship.name, parent_model.name
        )));
    }
    let sequential_id = parent_model.sequential_key.ok_or_else(|| {
        DataError::Schema(format!(
            "model '{}' has no sequential key table",
            parent_model.name
        ))
    })?;
    let sequential = schema.model(sequential_id);
    let child = schema.model(relationship.child);

    let mut keys = Vec::with_capacity(parent_model.primary_key.len());
    for (index, key) in parent_model.primary_key.iter().enumerate() {
        let expr = parent.projection(key.slot).cloned().ok_or_else(|| {
            DataError::Argument(format!(
                "parent statement does not select key column '{}'",
                parent_model.columns[key.slot].name
            ))
        })?;
        keys.push(ColumnMapping {
            target: sequential.slot_ref(index + 1),
            expr,
        });
    }
    let fill = DbInsertSelect {
        table: sequential.table.clone(),
        temporary: true,
        columns: keys.iter().map(|k| k.target.name.clone()).collect(),
        select: DbSelectStatement {
            model: sequential_id,
            select: keys,
            from: parent.from.clone(),
            where_clause: parent.where_clause.clone(),
            group_by: parent.group_by.clone(),
            having: parent.having.clone(),
            order_by: parent.order_by.clone(),
            offset: parent.offset,
            fetch: parent.fetch,
        },
    };

    // Foreign key pairs follow the parent key order, so pair i joins
    // sequential column i + 1.
    let on = relationship
        .foreign_key
        .iter()
        .enumerate()
        .map(|(index, (child_slot, _))| {
            equals(
                column(child.slot_ref(*child_slot)),
                column(sequential.slot_ref(index + 1)),
            )
        })
        .reduce(and)
        .ok_or_else(|| {
            DataError::Schema(format!(
                "relationship '{}' has no foreign key",
                relationship.name
            ))
        })?;

    let row_id = sequential.column_ref(SEQUENTIAL_ROW_ID)?;
    let mut order_by = vec![DbSortExpression {
        expr: column(row_id),
        direction: SortDirection::Ascending,
    }];
    order_by.extend(child.primary_key.iter().map(|k| DbSortExpression {
        expr: column(child.slot_ref(k.slot)),
        direction: k.direction,
    }));

    let select = DbSelectStatement {
        model: child.id,
        select: child
            .stored_columns()
            .map(|c| ColumnMapping {
                target: child.slot_ref(c.slot),
                expr: column(child.slot_ref(c.slot)),
            })
            .collect(),
        from: DbFromClause::Join {
            kind: JoinKind::Inner,
            left: Box::new(DbFromClause::Table {
                model: child.id,
                table: child.table.clone(),
                temporary: child.temporary,
            }),
            right: Box::new(DbFromClause::Table {
                model: sequential_id,
                table: sequential.table.clone(),
                temporary: true,
            }),
            on,
        },
        where_clause: None,
        group_by: Vec::new(),
        having: None,
        order_by,
        offset: None,
        fetch: None,
    };

    debug!(
        parent = %parent_model.name,
        child = %child.name,
        relationship = %relationship.name,
        "Child query built"
    );
    Ok(ChildQuery {
        relationship: relationship.id,
        create_temp_table: DbCreateTable::for_model(schema, sequential_id)?,
        fill,
        select,
        drop_temp_table: DbDropTable {
            table: sequential.table.clone(),
            temporary: true,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::schema::{ColumnFacets, SchemaBuilder};

    struct Shop {
        schema: Arc<Schema>,
        customer: ModelId,
        order: ModelId,
        summary: ModelId,
        name: Column<String>,
        amount: Column<f64>,
        customer_id: Column<i32>,
        order_customer: Column<i32>,
        summary_name: Column<String>,
        summary_total: Column<f64>,
        summary_orders: Column<i32>,
        orders: RelationshipId,
    }

    fn shop() -> Shop {
        let mut b = SchemaBuilder::new();
        let customer = b.add_model("Customer", "customers").unwrap();
        let order = b.add_model("Order", "orders").unwrap();
        let summary = b.add_model("Summary", "summaries").unwrap();
        let customer_id = b
            .register_column_with::<i32>(customer, "Id", ColumnFacets::identity())
            .unwrap();
        let name = b.register_column::<String>(customer, "Name").unwrap();
        b.register_local_column::<String>(customer, "Shout", name.upper())
            .unwrap();
        b.register_column::<i32>(order, "Id").unwrap();
        let order_customer = b.register_column::<i32>(order, "CustomerId").unwrap();
        let amount = b.register_column::<f64>(order, "Amount").unwrap();
        let summary_name = b.register_column::<String>(summary, "Name").unwrap();
        let summary_total = b.register_column::<f64>(summary, "Total").unwrap();
        let summary_orders = b.register_column::<i32>(summary, "Orders").unwrap();
        b.set_primary_key(customer, &[("Id", SortDirection::Ascending)])
            .unwrap();
        b.set_primary_key(order, &[("Id", SortDirection::Descending)])
            .unwrap();
        let orders = b
            .register_child_model(customer, order, "Orders", &[("CustomerId", "Id")])
            .unwrap();
        Shop {
            schema: b.build().unwrap(),
            customer,
            order,
            summary,
            name,
            amount,
            customer_id,
            order_customer,
            summary_name,
            summary_total,
            summary_orders,
            orders,
        }
    }

    fn slot(column: &Column<impl crate::column::ColumnType>) -> ColumnRef {
        column.slot_ref().unwrap()
    }

    #[test]
    fn test_select_table_skips_computed_columns() {
        let s = shop();
        let stmt = QueryBuilder::select_table(Arc::clone(&s.schema), s.customer).unwrap();
        let names: Vec<&str> = stmt.select.iter().map(|m| m.target.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Name"]);
        assert_eq!(stmt.from.models(), vec![s.customer]);
    }

    #[test]
    fn test_aggregate_requires_grouping() {
        let s = shop();
        let err = QueryBuilder::new(Arc::clone(&s.schema), s.summary)
            .unwrap()
            .from_table(s.order)
            .unwrap()
            .select(s.amount.sum(), &slot(&s.summary_total))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, DataError::Argument(_)));
    }

    #[test]
    fn test_auto_group_by() {
        let s = shop();
        let stmt = QueryBuilder::new(Arc::clone(&s.schema), s.summary)
            .unwrap()
            .from_table(s.customer)
            .unwrap()
            .inner_join(s.order, &[(slot(&s.customer_id), slot(&s.order_customer))])
            .unwrap()
            .select(s.amount.sum(), &slot(&s.summary_total))
            .unwrap()
            .select(s.name.clone(), &slot(&s.summary_name))
            .unwrap()
            .select(s.amount.count(), &slot(&s.summary_orders))
            .unwrap()
            .auto_group_by()
            .build()
            .unwrap();
        assert_eq!(stmt.group_by, vec![DbExpression::Column(slot(&s.name))]);
        // Output follows target slot order
        let names: Vec<&str> = stmt.select.iter().map(|m| m.target.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Total", "Orders"]);
        assert_eq!(stmt.from.models(), vec![s.customer, s.order]);
    }

    #[test]
    fn test_ungrouped_column_is_rejected() {
        let s = shop();
        let err = QueryBuilder::new(Arc::clone(&s.schema), s.summary)
            .unwrap()
            .from_table(s.order)
            .unwrap()
            .group_by(s.order_customer.clone())
            .unwrap()
            .select(s.amount.clone(), &slot(&s.summary_total))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("GROUP BY"));
    }

    #[test]
    fn test_join_validation() {
        let s = shop();
        let builder = QueryBuilder::new(Arc::clone(&s.schema), s.summary)
            .unwrap()
            .from_table(s.customer)
            .unwrap();
        let err = builder
            .clone()
            .inner_join(s.order, &[(slot(&s.name), slot(&s.order_customer))])
            .unwrap_err();
        assert!(err.to_string().contains("different types"));

        let err = builder
            .inner_join(s.customer, &[(slot(&s.customer_id), slot(&s.customer_id))])
            .unwrap_err();
        assert!(err.to_string().contains("already bound"));
    }

    #[test]
    fn test_unbound_column_is_rejected() {
        let s = shop();
        let err = QueryBuilder::new(Arc::clone(&s.schema), s.summary)
            .unwrap()
            .from_table(s.customer)
            .unwrap()
            .select(s.amount.clone(), &slot(&s.summary_total))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not bound"));
    }

    #[test]
    fn test_untranslatable_and_paging_errors() {
        let s = shop();
        let err = QueryBuilder::new(Arc::clone(&s.schema), s.summary)
            .unwrap()
            .select(s.name.first(), &slot(&s.summary_name))
            .unwrap_err();
        assert!(matches!(err, DataError::Argument(_)));

        let err = QueryBuilder::new(Arc::clone(&s.schema), s.customer)
            .unwrap()
            .from_table(s.customer)
            .unwrap()
            .select_all()
            .unwrap()
            .offset_fetch(Some(10), Some(5))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ORDER BY"));
    }

    #[test]
    fn test_derived_query_exposes_only_projected_columns() {
        let s = shop();
        let inner = QueryBuilder::new(Arc::clone(&s.schema), s.customer)
            .unwrap()
            .from_table(s.customer)
            .unwrap()
            .select(s.customer_id.clone(), &slot(&s.customer_id))
            .unwrap()
            .build()
            .unwrap();
        let err = QueryBuilder::new(Arc::clone(&s.schema), s.summary)
            .unwrap()
            .from_query(inner)
            .unwrap()
            .select(s.name.clone(), &slot(&s.summary_name))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not projected"));
    }

    #[test]
    fn test_create_child() {
        let s = shop();
        let parent = QueryBuilder::new(Arc::clone(&s.schema), s.customer)
            .unwrap()
            .from_table(s.customer)
            .unwrap()
            .select_all()
            .unwrap()
            .order_by(s.name.asc())
            .unwrap()
            .build()
            .unwrap();
        let child = create_child(&s.schema, &parent, s.orders).unwrap();

        assert_eq!(child.fill.table, "sys_sequential_customers");
        assert_eq!(child.fill.columns, vec!["Id".to_string()]);
        assert_eq!(child.fill.select.order_by, parent.order_by);
        assert_eq!(child.create_temp_table.columns.len(), 2);
        assert!(child.create_temp_table.temporary);

        assert_eq!(child.select.model, s.order);
        let order: Vec<&str> = child
            .select
            .order_by
            .iter()
            .map(|o| match &o.expr {
                DbExpression::Column(c) => c.name.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(order, vec!["sys_row_id", "Id"]);
        assert_eq!(child.select.order_by[1].direction, SortDirection::Descending);

        let err = create_child(&s.schema, &child.select, s.orders).unwrap_err();
        assert!(matches!(err, DataError::Argument(_)));
    }
}
