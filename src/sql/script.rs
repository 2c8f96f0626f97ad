//! Rendered SQL scripts.

use std::fmt;

use modelset_core::{DataType, Value};

use super::Dialect;
use crate::error::DataResult;

/// A bound parameter, in first-use order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    /// Placeholder name including the `@` prefix.
    pub name: String,
    pub data_type: DataType,
    pub value: Value,
    pub native_type: String,
}

/// Ordered statements plus the parameters they bind.
///
/// Displaying a script renders the parameter declarations followed by the
/// statements, each terminated by `;`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlScript {
    pub dialect: Dialect,
    pub statements: Vec<String>,
    pub parameters: Vec<SqlParameter>,
}

impl SqlScript {
    pub fn new(dialect: Dialect, statements: Vec<String>, parameters: Vec<SqlParameter>) -> Self {
        Self {
            dialect,
            statements,
            parameters,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Declaration line binding one parameter.
    pub fn declaration(&self, parameter: &SqlParameter) -> DataResult<String> {
        let value = self.dialect.literal(&parameter.value)?;
        Ok(match self.dialect {
            Dialect::SqlServer(_) => format!(
                "DECLARE {} {} = {};",
                parameter.name, parameter.native_type, value
            ),
            Dialect::MySql(_) => format!("SET {} = {};", parameter.name, value),
        })
    }
}

/// Parameters bound through [`super::SqlGenerator`] always have a literal;
/// a hand-built parameter without one fails formatting.
impl fmt::Display for SqlScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for parameter in &self.parameters {
            let line = self.declaration(parameter).map_err(|_| fmt::Error)?;
            if !first {
                writeln!(f)?;
            }
            first = false;
            f.write_str(&line)?;
        }
        for statement in &self.statements {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{};", statement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{MySqlVersion, SqlServerVersion};

    fn parameter(name: &str, value: Value, native_type: &str) -> SqlParameter {
        SqlParameter {
            name: name.to_string(),
            data_type: DataType::String,
            value,
            native_type: native_type.to_string(),
        }
    }

    #[test]
    fn test_script_rendering() {
        let params = vec![
            parameter("@p1", Value::Int(5), "INT"),
            parameter("@p2", Value::Text("x".into()), "NVARCHAR(MAX)"),
        ];
        let statements = vec!["DELETE FROM [t]\nWHERE ([Id] = @p1)".to_string()];
        let script = SqlScript::new(
            Dialect::SqlServer(SqlServerVersion::V2016),
            statements.clone(),
            params.clone(),
        );
        assert_eq!(
            script.to_string(),
            "DECLARE @p1 INT = 5;\nDECLARE @p2 NVARCHAR(MAX) = N'x';\nDELETE FROM [t]\nWHERE ([Id] = @p1);"
        );

        let script = SqlScript::new(Dialect::MySql(MySqlVersion::V8_0), statements, params);
        assert!(script.to_string().starts_with("SET @p1 = 5;\nSET @p2 = 'x';\n"));
    }
}
