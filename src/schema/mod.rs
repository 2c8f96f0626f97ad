//! Model schemas.
//!
//! A [`Schema`] is the frozen registry of every model (row shape) and every
//! parent/child relationship. It is produced once by [`SchemaBuilder`] and
//! shared read-only behind an `Arc` by every DataSet built on it.

mod builder;
mod document;

pub use builder::SchemaBuilder;
pub(crate) use builder::type_fits;
pub use document::{
    ChildDocument, ColumnDocument, ModelDocument, SchemaDocument, UniqueDocument,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use modelset_core::{ColumnRef, DataType, Expr, ExprResult, ModelId, Value};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Name of the surrogate row id column of sequential key tables.
pub const SEQUENTIAL_ROW_ID: &str = "sys_row_id";

/// Name prefix of generated sequential key models and tables.
pub const SEQUENTIAL_PREFIX: &str = "sys_sequential_";

/// Identity of a parent/child relationship within a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(pub u32);

impl RelationshipId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Storage facets of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFacets {
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<u8>,
    #[serde(default)]
    pub identity: bool,
    #[serde(skip)]
    pub default: Option<Value>,
}

fn default_nullable() -> bool {
    true
}

impl Default for ColumnFacets {
    fn default() -> Self {
        Self {
            nullable: default_nullable(),
            size: None,
            precision: None,
            scale: None,
            identity: false,
            default: None,
        }
    }
}

impl ColumnFacets {
    pub fn not_null() -> Self {
        Self {
            nullable: false,
            ..Self::default()
        }
    }

    /// Non-nullable auto-numbered key column.
    pub fn identity() -> Self {
        Self {
            nullable: false,
            identity: true,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Pure function backing a function-computed local column.
pub type ComputeFn = Arc<dyn Fn(&[Value]) -> ExprResult<Value> + Send + Sync>;

/// How a local (computed) column derives its value.
#[derive(Clone)]
pub enum Computation {
    /// Expression over columns of the same model.
    Expression(Expr),
    /// Registered function over an explicit dependency list of slots.
    Function {
        dependencies: Vec<usize>,
        function: ComputeFn,
    },
}

impl Computation {
    /// Slots this computation reads.
    pub fn dependencies(&self) -> Vec<usize> {
        match self {
            Computation::Expression(expr) => {
                let mut slots: Vec<usize> = expr.column_refs().iter().map(|c| c.slot).collect();
                slots.sort_unstable();
                slots.dedup();
                slots
            }
            Computation::Function { dependencies, .. } => dependencies.clone(),
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computation::Expression(expr) => f.debug_tuple("Expression").field(expr).finish(),
            Computation::Function { dependencies, .. } => f
                .debug_struct("Function")
                .field("dependencies", dependencies)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub slot: usize,
    pub data_type: DataType,
    pub facets: ColumnFacets,
    pub computation: Option<Computation>,
}

impl ColumnDescriptor {
    /// Local columns live only in memory and never reach the database.
    pub fn is_local(&self) -> bool {
        self.computation.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumn {
    pub slot: usize,
    pub direction: SortDirection,
}

#[derive(Debug, Clone)]
pub struct UniqueConstraint {
    pub name: String,
    pub slots: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct CheckConstraint {
    pub name: String,
    pub expr: Expr,
}

/// One-to-many relationship between a parent and a child model.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: RelationshipId,
    pub name: String,
    pub parent: ModelId,
    pub child: ModelId,
    /// `(child slot, parent slot)` pairs, in parent primary key order.
    pub foreign_key: Vec<(usize, usize)>,
    /// Self-referencing relationship (parent == child).
    pub recursive: bool,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<KeyColumn>,
    pub uniques: Vec<UniqueConstraint>,
    pub checks: Vec<CheckConstraint>,
    /// Relationships in which this model is the parent, in registration order.
    pub children: Vec<RelationshipId>,
    /// The non-recursive relationship in which this model is the child.
    pub parent_relationship: Option<RelationshipId>,
    /// Computed slots reading each slot directly.
    pub dependents: Vec<Vec<usize>>,
    /// Generated staging model (sequential key table).
    pub temporary: bool,
    /// Sequential key model used when this model's rows parent a child query.
    pub sequential_key: Option<ModelId>,
}

impl Model {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_ref(&self, name: &str) -> DataResult<ColumnRef> {
        self.column(name)
            .map(|c| self.slot_ref(c.slot))
            .ok_or_else(|| {
                DataError::Argument(format!(
                    "model '{}' has no column '{}'",
                    self.name, name
                ))
            })
    }

    pub fn slot_ref(&self, slot: usize) -> ColumnRef {
        let column = &self.columns[slot];
        ColumnRef {
            model: self.id,
            slot,
            name: column.name.clone(),
            data_type: column.data_type,
        }
    }

    /// Columns that exist in the database table.
    pub fn stored_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.is_local())
    }

    pub fn primary_key_slots(&self) -> Vec<usize> {
        self.primary_key.iter().map(|k| k.slot).collect()
    }

    pub fn identity_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.facets.identity)
    }
}

/// Frozen registry of models and relationships.
#[derive(Debug)]
pub struct Schema {
    models: Vec<Model>,
    relationships: Vec<Relationship>,
    by_name: HashMap<String, ModelId>,
}

impl Schema {
    pub(crate) fn new(models: Vec<Model>, relationships: Vec<Relationship>) -> Self {
        let by_name = models.iter().map(|m| (m.name.clone(), m.id)).collect();
        Self {
            models,
            relationships,
            by_name,
        }
    }

    /// Model by id. Ids are only issued by the builder of this schema.
    pub fn model(&self, id: ModelId) -> &Model {
        &self.models[id.index()]
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn model_by_name(&self, name: &str) -> DataResult<&Model> {
        self.by_name
            .get(name)
            .map(|id| self.model(*id))
            .ok_or_else(|| DataError::Argument(format!("unknown model '{}'", name)))
    }

    pub fn relationship(&self, id: RelationshipId) -> &Relationship {
        &self.relationships[id.index()]
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship_by_name(&self, parent: ModelId, name: &str) -> DataResult<&Relationship> {
        self.model(parent)
            .children
            .iter()
            .map(|id| self.relationship(*id))
            .find(|r| r.name == name)
            .ok_or_else(|| {
                DataError::Argument(format!(
                    "model '{}' has no child relationship '{}'",
                    self.model(parent).name,
                    name
                ))
            })
    }

    /// Parent model through the non-recursive parent relationship.
    pub fn parent_model(&self, model: ModelId) -> Option<ModelId> {
        self.model(model)
            .parent_relationship
            .map(|r| self.relationship(r).parent)
    }

    /// True when `ancestor` is a strict ancestor of `model` along
    /// non-recursive relationships.
    pub fn is_ancestor(&self, ancestor: ModelId, model: ModelId) -> bool {
        let mut current = self.parent_model(model);
        while let Some(m) = current {
            if m == ancestor {
                return true;
            }
            current = self.parent_model(m);
        }
        false
    }

    /// Resolve a column reference by model and column name.
    pub fn column_ref(&self, model: &str, column: &str) -> DataResult<ColumnRef> {
        self.model_by_name(model)?.column_ref(column)
    }
}
