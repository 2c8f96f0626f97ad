//! Native type mapping per dialect.

use modelset_core::DataType;

use crate::schema::ColumnFacets;

const DEFAULT_PRECISION: u8 = 18;
const DEFAULT_SCALE: u8 = 2;

/// Maps column types and facets to native SQL type names.
pub trait TypeMapper: Send + Sync {
    /// Type used in CREATE TABLE.
    fn column_type(&self, data_type: DataType, facets: &ColumnFacets) -> String;

    /// Target type of a CAST.
    fn cast_type(&self, data_type: DataType) -> String {
        self.column_type(data_type, &ColumnFacets::default())
    }

    /// Declared type of a bound parameter.
    fn parameter_type(&self, data_type: DataType) -> String {
        self.cast_type(data_type)
    }
}

fn decimal(facets: &ColumnFacets) -> String {
    format!(
        "DECIMAL({}, {})",
        facets.precision.unwrap_or(DEFAULT_PRECISION),
        facets.scale.unwrap_or(DEFAULT_SCALE)
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerTypes;

impl TypeMapper for SqlServerTypes {
    fn column_type(&self, data_type: DataType, facets: &ColumnFacets) -> String {
        match data_type {
            DataType::Boolean => "BIT".to_string(),
            DataType::Byte => "TINYINT".to_string(),
            DataType::Int16 => "SMALLINT".to_string(),
            DataType::Int32 => "INT".to_string(),
            DataType::Int64 => "BIGINT".to_string(),
            DataType::Single => "REAL".to_string(),
            DataType::Double => "FLOAT".to_string(),
            DataType::Decimal => decimal(facets),
            DataType::String => match facets.size {
                Some(size) if size <= 4000 => format!("NVARCHAR({})", size),
                _ => "NVARCHAR(MAX)".to_string(),
            },
            DataType::DateTime => "DATETIME2".to_string(),
            DataType::Guid => "UNIQUEIDENTIFIER".to_string(),
            DataType::Binary => match facets.size {
                Some(size) if size <= 8000 => format!("VARBINARY({})", size),
                _ => "VARBINARY(MAX)".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTypes;

impl TypeMapper for MySqlTypes {
    fn column_type(&self, data_type: DataType, facets: &ColumnFacets) -> String {
        match data_type {
            DataType::Boolean => "TINYINT(1)".to_string(),
            DataType::Byte => "TINYINT UNSIGNED".to_string(),
            DataType::Int16 => "SMALLINT".to_string(),
            DataType::Int32 => "INT".to_string(),
            DataType::Int64 => "BIGINT".to_string(),
            DataType::Single => "FLOAT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
            DataType::Decimal => decimal(facets),
            DataType::String => match facets.size {
                Some(size) => format!("VARCHAR({})", size),
                None => "LONGTEXT".to_string(),
            },
            DataType::DateTime => "DATETIME(3)".to_string(),
            DataType::Guid => "CHAR(36)".to_string(),
            DataType::Binary => match facets.size {
                Some(size) => format!("VARBINARY({})", size),
                None => "LONGBLOB".to_string(),
            },
        }
    }

    // MySQL only casts to a small set of target types
    fn cast_type(&self, data_type: DataType) -> String {
        match data_type {
            DataType::Boolean | DataType::Byte => "UNSIGNED".to_string(),
            DataType::Int16 | DataType::Int32 | DataType::Int64 => "SIGNED".to_string(),
            DataType::Single => "FLOAT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
            DataType::Decimal => decimal(&ColumnFacets::default()),
            DataType::String => "CHAR".to_string(),
            DataType::DateTime => "DATETIME(3)".to_string(),
            DataType::Guid => "CHAR(36)".to_string(),
            DataType::Binary => "BINARY".to_string(),
        }
    }

    fn parameter_type(&self, data_type: DataType) -> String {
        self.column_type(data_type, &ColumnFacets::default())
    }
}
