//! Statement trees.
//!
//! The SQL-facing mirror of a composed query: sources, projections,
//! predicates and ordering, all as [`DbExpression`] trees. Statements are
//! immutable once built and are rendered by [`crate::sql::SqlGenerator`].

mod builder;
mod dml;

pub use builder::{create_child, ChildQuery, QueryBuilder};
pub use dml::{
    DbColumnDefinition, DbCreateTable, DbDeleteStatement, DbDropTable, DbInsertSelect,
    DbInsertStatement, DbUpdateStatement,
};

use modelset_core::{ColumnRef, DbExpression, ModelId};

use crate::schema::SortDirection;

/// One projected output column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    /// Output slot of the statement's target model.
    pub target: ColumnRef,
    pub expr: DbExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// Row source of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum DbFromClause {
    /// A model's table. Temporary tables are the sequential key tables.
    Table {
        model: ModelId,
        table: String,
        temporary: bool,
    },
    /// A derived query, bound under its target model.
    Query(Box<DbSelectStatement>),
    Join {
        kind: JoinKind,
        left: Box<DbFromClause>,
        right: Box<DbFromClause>,
        on: DbExpression,
    },
    /// Union of queries sharing one target model, bound under that model.
    Union {
        all: bool,
        queries: Vec<DbSelectStatement>,
    },
}

impl DbFromClause {
    /// Model under which this source exposes its columns, for simple sources.
    pub fn model(&self) -> Option<ModelId> {
        match self {
            DbFromClause::Table { model, .. } => Some(*model),
            DbFromClause::Query(query) => Some(query.model),
            DbFromClause::Union { queries, .. } => queries.first().map(|q| q.model),
            DbFromClause::Join { .. } => None,
        }
    }

    /// Every bound model, left to right.
    pub fn models(&self) -> Vec<ModelId> {
        let mut models = Vec::new();
        self.collect_models(&mut models);
        models
    }

    fn collect_models(&self, models: &mut Vec<ModelId>) {
        match self {
            DbFromClause::Join { left, right, .. } => {
                left.collect_models(models);
                right.collect_models(models);
            }
            other => models.extend(other.model()),
        }
    }

    /// The simple source bound under `model`.
    pub fn source_of(&self, model: ModelId) -> Option<&DbFromClause> {
        match self {
            DbFromClause::Join { left, right, .. } => {
                left.source_of(model).or_else(|| right.source_of(model))
            }
            other if other.model() == Some(model) => Some(other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbSortExpression {
    pub expr: DbExpression,
    pub direction: SortDirection,
}

/// A SELECT projecting into the columns of one target model.
#[derive(Debug, Clone, PartialEq)]
pub struct DbSelectStatement {
    pub model: ModelId,
    /// Projections in target slot order.
    pub select: Vec<ColumnMapping>,
    pub from: DbFromClause,
    pub where_clause: Option<DbExpression>,
    pub group_by: Vec<DbExpression>,
    pub having: Option<DbExpression>,
    pub order_by: Vec<DbSortExpression>,
    pub offset: Option<u64>,
    pub fetch: Option<u64>,
}

impl DbSelectStatement {
    /// Projection feeding target `slot`, if selected.
    pub fn projection(&self, slot: usize) -> Option<&DbExpression> {
        self.select
            .iter()
            .find(|m| m.target.slot == slot)
            .map(|m| &m.expr)
    }

    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || self.select.iter().any(|m| m.expr.contains_aggregate())
    }
}
