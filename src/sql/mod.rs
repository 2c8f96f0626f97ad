//! Dialect SQL generation.
//!
//! [`SqlGenerator`] renders statement and expression trees into SQL text for
//! one [`Dialect`], numbering parameters `@p1`, `@p2`, ... in the order they
//! are rendered. Output is deterministic: identical trees and dialect give
//! byte-identical text.

mod alias;
mod generator;
mod import;
mod script;
mod types;

pub use alias::ModelAliasManager;
pub use generator::SqlGenerator;
pub use import::import_script;
pub use script::{SqlParameter, SqlScript};
pub use types::{MySqlTypes, SqlServerTypes, TypeMapper};

use std::fmt;

use modelset_core::{DataType, ExprError, Value, DATETIME_FORMAT};

use crate::error::{DataError, DataResult};

const MYSQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

static SQL_SERVER_TYPES: SqlServerTypes = SqlServerTypes;
static MYSQL_TYPES: MySqlTypes = MySqlTypes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SqlServerVersion {
    V2008,
    V2012,
    V2016,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MySqlVersion {
    V5_7,
    V8_0,
}

/// Target SQL dialect and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    SqlServer(SqlServerVersion),
    MySql(MySqlVersion),
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::SqlServer(SqlServerVersion::V2016)
    }
}

impl Dialect {
    /// Parse a dialect from its config form, e.g. `("sqlserver", "2012")` or
    /// `("mysql", "8.0")`.
    pub fn parse(kind: &str, version: &str) -> DataResult<Self> {
        let dialect = match (kind.to_ascii_lowercase().as_str(), version.trim()) {
            ("sqlserver" | "mssql", "2008") => Dialect::SqlServer(SqlServerVersion::V2008),
            ("sqlserver" | "mssql", "2012") => Dialect::SqlServer(SqlServerVersion::V2012),
            ("sqlserver" | "mssql", "2016") => Dialect::SqlServer(SqlServerVersion::V2016),
            ("mysql", "5.7") => Dialect::MySql(MySqlVersion::V5_7),
            ("mysql", "8.0" | "8") => Dialect::MySql(MySqlVersion::V8_0),
            ("sqlserver" | "mssql" | "mysql", _) => {
                return Err(DataError::Config(format!(
                    "unsupported {} version '{}'",
                    kind, version
                )))
            }
            _ => return Err(DataError::Config(format!("unknown dialect '{}'", kind))),
        };
        Ok(dialect)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Dialect::SqlServer(_) => "sqlserver",
            Dialect::MySql(_) => "mysql",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Dialect::SqlServer(SqlServerVersion::V2008) => "2008",
            Dialect::SqlServer(SqlServerVersion::V2012) => "2012",
            Dialect::SqlServer(SqlServerVersion::V2016) => "2016",
            Dialect::MySql(MySqlVersion::V5_7) => "5.7",
            Dialect::MySql(MySqlVersion::V8_0) => "8.0",
        }
    }

    pub fn type_mapper(&self) -> &'static dyn TypeMapper {
        match self {
            Dialect::SqlServer(_) => &SQL_SERVER_TYPES,
            Dialect::MySql(_) => &MYSQL_TYPES,
        }
    }

    /// Quote an identifier.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::SqlServer(_) => format!("[{}]", ident.replace(']', "]]")),
            Dialect::MySql(_) => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Quoted table name; SQL Server temporary tables take a `#` prefix.
    pub fn table_name(&self, table: &str, temporary: bool) -> String {
        match self {
            Dialect::SqlServer(_) if temporary => self.quote(&format!("#{}", table)),
            _ => self.quote(table),
        }
    }

    /// Inline literal text for a value. Non-finite floats have no literal.
    pub fn literal(&self, value: &Value) -> DataResult<String> {
        Ok(match (self, value) {
            (_, Value::Null) => "NULL".to_string(),
            (Dialect::SqlServer(_), Value::Boolean(b)) => (if *b { "1" } else { "0" }).to_string(),
            (Dialect::MySql(_), Value::Boolean(b)) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            (_, Value::Int(i)) => i.to_string(),
            (_, Value::Float(f)) if f.is_finite() => format!("{:?}", f),
            (_, Value::Float(f)) => {
                return Err(ExprError::Overflow {
                    value: f.to_string(),
                    target: DataType::Double,
                }
                .into())
            }
            (Dialect::SqlServer(_), Value::Text(s)) => format!("N'{}'", s.replace('\'', "''")),
            (Dialect::MySql(_), Value::Text(s)) => {
                format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
            }
            (Dialect::SqlServer(SqlServerVersion::V2008), Value::DateTime(dt)) => format!(
                "CONVERT(DATETIME2, '{}', 126)",
                dt.format(DATETIME_FORMAT)
            ),
            (Dialect::SqlServer(_), Value::DateTime(dt)) => {
                format!("CAST('{}' AS DATETIME2)", dt.format(DATETIME_FORMAT))
            }
            (Dialect::MySql(_), Value::DateTime(dt)) => {
                format!("TIMESTAMP '{}'", dt.format(MYSQL_DATETIME_FORMAT))
            }
            (Dialect::SqlServer(_), Value::Guid(g)) => {
                format!("CAST('{}' AS UNIQUEIDENTIFIER)", g.hyphenated())
            }
            (Dialect::MySql(_), Value::Guid(g)) => format!("'{}'", g.hyphenated()),
            (Dialect::SqlServer(_), Value::Binary(b)) => format!("0x{}", hex::encode_upper(b)),
            (Dialect::MySql(_), Value::Binary(b)) => format!("X'{}'", hex::encode_upper(b)),
        })
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::SqlServer(_) => write!(f, "SQL Server {}", self.version()),
            Dialect::MySql(_) => write!(f, "MySQL {}", self.version()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_parse_dialect() {
        assert_eq!(
            Dialect::parse("SqlServer", "2012").unwrap(),
            Dialect::SqlServer(SqlServerVersion::V2012)
        );
        assert_eq!(
            Dialect::parse("mysql", "8.0").unwrap(),
            Dialect::MySql(MySqlVersion::V8_0)
        );
        assert!(matches!(
            Dialect::parse("mysql", "2016"),
            Err(DataError::Config(_))
        ));
        assert!(matches!(
            Dialect::parse("oracle", "19"),
            Err(DataError::Config(_))
        ));
        assert_eq!(Dialect::default().to_string(), "SQL Server 2016");
    }

    #[test]
    fn test_quoting() {
        let sql = Dialect::SqlServer(SqlServerVersion::V2016);
        let my = Dialect::MySql(MySqlVersion::V8_0);
        assert_eq!(sql.quote("a]b"), "[a]]b]");
        assert_eq!(my.quote("a`b"), "`a``b`");
        assert_eq!(sql.table_name("seq", true), "[#seq]");
        assert_eq!(my.table_name("seq", true), "`seq`");
    }

    #[test]
    fn test_literals() {
        let v2008 = Dialect::SqlServer(SqlServerVersion::V2008);
        let v2016 = Dialect::SqlServer(SqlServerVersion::V2016);
        let my = Dialect::MySql(MySqlVersion::V5_7);
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 30, 0, 250)
            .unwrap();
        let lit = |dialect: Dialect, value: Value| dialect.literal(&value).unwrap();

        assert_eq!(lit(v2016, Value::Text("O'Neil".into())), "N'O''Neil'");
        assert_eq!(lit(my, Value::Text("a\\b".into())), "'a\\\\b'");
        assert_eq!(
            lit(v2008, Value::DateTime(dt)),
            "CONVERT(DATETIME2, '2024-03-01T08:30:00.250', 126)"
        );
        assert_eq!(
            lit(v2016, Value::DateTime(dt)),
            "CAST('2024-03-01T08:30:00.250' AS DATETIME2)"
        );
        assert_eq!(
            lit(my, Value::DateTime(dt)),
            "TIMESTAMP '2024-03-01 08:30:00.250'"
        );
        assert_eq!(lit(v2016, Value::Float(2.0)), "2.0");
        assert_eq!(lit(v2016, Value::Boolean(true)), "1");
        assert_eq!(lit(my, Value::Boolean(false)), "FALSE");
        assert_eq!(lit(v2016, Value::Binary(vec![0xab, 0x01])), "0xAB01");
        assert_eq!(lit(my, Value::Binary(vec![0xab, 0x01])), "X'AB01'");
        assert_eq!(
            lit(v2016, Value::Guid(Uuid::nil())),
            "CAST('00000000-0000-0000-0000-000000000000' AS UNIQUEIDENTIFIER)"
        );
        assert_eq!(lit(my, Value::Null), "NULL");
        for f in [f64::INFINITY, f64::NAN] {
            assert!(matches!(
                v2016.literal(&Value::Float(f)),
                Err(DataError::Expression(ExprError::Overflow { .. }))
            ));
        }
    }
}
