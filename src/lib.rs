//! ModelSet - hierarchical in-memory DataSets with a typed column-expression
//! model.
//!
//! The same [`Column`] expressions evaluate against DataSet rows in memory
//! and compile to dialect SQL:
//!
//! - **schema**: models, stored and computed columns, parent/child relationships
//! - **dataset**: the row arena with ordinals, synthetic rows and events
//! - **query**: statement trees built from column expressions
//! - **sql**: per-dialect rendering into parameterized scripts
//! - **json**: converters for values, expressions and DataSets

pub mod column;
pub mod config;
pub mod dataset;
pub mod error;
pub mod json;
pub mod query;
pub mod schema;
pub mod sql;

pub use column::{Column, ColumnType, Decimal, SortSpec};
pub use config::Config;
pub use dataset::{
    ArenaStats, DataRow, DataSet, DataSetEvent, DataSetOptions, RowKey, RowState, SetKey,
};
pub use error::{DataError, DataResult};
pub use json::ConverterRegistry;
pub use query::{create_child, ChildQuery, DbSelectStatement, QueryBuilder};
pub use schema::{ColumnFacets, Schema, SchemaBuilder, SchemaDocument, SortDirection};
pub use sql::{import_script, Dialect, MySqlVersion, SqlGenerator, SqlScript, SqlServerVersion};

pub use modelset_core::{DataType, Expr, ExprError, ModelId, Value};
