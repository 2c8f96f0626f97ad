//! Statement and expression rendering.

use std::fmt;

use modelset_core::{
    BinaryOp, ColumnRef, DataType, DbExpression, FunctionKey, ModelId, UnaryOp, Value,
};
use tracing::{debug, trace};

use super::alias::ModelAliasManager;
use super::script::{SqlParameter, SqlScript};
use super::types::TypeMapper;
use super::{Dialect, SqlServerVersion};
use crate::error::{DataError, DataResult};
use crate::query::{
    ChildQuery, DbCreateTable, DbDeleteStatement, DbDropTable, DbFromClause, DbInsertSelect,
    DbInsertStatement, DbSelectStatement, DbSortExpression, DbUpdateStatement, JoinKind,
};
use crate::schema::{Schema, SortDirection};

/// Paging column added by the ROW_NUMBER() rendering of OFFSET.
const ROW_NUMBER_COLUMN: &str = "sys_row_number";
const PAGED_ALIAS: &str = "sys_paged";

/// How column references render.
#[derive(Clone, Copy)]
enum Scope<'s> {
    /// `[alias].[column]`, inside SELECT statements.
    Qualified(&'s ModelAliasManager),
    /// `[column]`, inside DML and table constraints.
    Unqualified,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    Value,
    Predicate,
}

/// Nodes that are conditions rather than values in SQL.
fn is_predicate(expr: &DbExpression) -> bool {
    match expr {
        DbExpression::Binary { op, .. } => op.is_comparison() || op.is_logical(),
        DbExpression::Unary { op, .. } => *op == UnaryOp::Not,
        DbExpression::Function { key, .. } => matches!(
            key,
            FunctionKey::IsNull | FunctionKey::IsNotNull | FunctionKey::Contains
        ),
        _ => false,
    }
}

fn argument(args: &[DbExpression], index: usize, key: FunctionKey) -> DataResult<&DbExpression> {
    args.get(index).ok_or_else(|| {
        DataError::Argument(format!(
            "{} is missing argument {}",
            key.name(),
            index + 1
        ))
    })
}

fn direction(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    }
}

/// Renders statements for one dialect, collecting statements and bound
/// parameters into a [`SqlScript`].
///
/// Parameters are numbered in rendering order and the numbering continues
/// across every statement rendered by the same generator.
pub struct SqlGenerator<'a> {
    schema: &'a Schema,
    dialect: Dialect,
    types: &'static dyn TypeMapper,
    parameters: Vec<SqlParameter>,
    statements: Vec<String>,
}

impl fmt::Debug for SqlGenerator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlGenerator")
            .field("dialect", &self.dialect)
            .field("parameters", &self.parameters.len())
            .field("statements", &self.statements.len())
            .finish()
    }
}

impl<'a> SqlGenerator<'a> {
    pub fn new(schema: &'a Schema, dialect: Dialect) -> Self {
        Self {
            schema,
            dialect,
            types: dialect.type_mapper(),
            parameters: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn parameters(&self) -> &[SqlParameter] {
        &self.parameters
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Append raw statement text.
    pub fn push(&mut self, statement: String) {
        trace!(dialect = %self.dialect, "{}", statement);
        self.statements.push(statement);
    }

    pub fn finish(self) -> SqlScript {
        debug!(
            dialect = %self.dialect,
            statements = self.statements.len(),
            parameters = self.parameters.len(),
            "SQL script generated"
        );
        SqlScript::new(self.dialect, self.statements, self.parameters)
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    /// Allocate the next placeholder for `value`. Values without a SQL
    /// literal form are rejected here, so a finished script always renders.
    pub fn parameter(&mut self, value: Value, data_type: DataType) -> DataResult<String> {
        let native_type = self.types.parameter_type(data_type);
        self.parameter_with_type(value, data_type, native_type)
    }

    pub(crate) fn parameter_with_type(
        &mut self,
        value: Value,
        data_type: DataType,
        native_type: String,
    ) -> DataResult<String> {
        self.dialect.literal(&value)?;
        let name = format!("@p{}", self.parameters.len() + 1);
        self.parameters.push(SqlParameter {
            name: name.clone(),
            data_type,
            value,
            native_type,
        });
        Ok(name)
    }

    // --- Expressions ---

    /// Render an expression as a value, qualifying columns by `aliases`.
    pub fn expression(
        &mut self,
        expr: &DbExpression,
        aliases: &ModelAliasManager,
    ) -> DataResult<String> {
        self.value(expr, Scope::Qualified(aliases))
    }

    /// Render a Boolean expression as a condition.
    pub fn condition(
        &mut self,
        expr: &DbExpression,
        aliases: &ModelAliasManager,
    ) -> DataResult<String> {
        self.predicate(expr, Scope::Qualified(aliases))
    }

    fn value(&mut self, expr: &DbExpression, scope: Scope<'_>) -> DataResult<String> {
        self.render(expr, scope, Context::Value)
    }

    fn predicate(&mut self, expr: &DbExpression, scope: Scope<'_>) -> DataResult<String> {
        self.render(expr, scope, Context::Predicate)
    }

    /// SQL Server has no Boolean values: conditions used as values become a
    /// CASE yielding BIT, and BIT values used as conditions compare to 1.
    fn render(
        &mut self,
        expr: &DbExpression,
        scope: Scope<'_>,
        context: Context,
    ) -> DataResult<String> {
        let text = self.node(expr, scope)?;
        let sql_server = matches!(self.dialect, Dialect::SqlServer(_));
        Ok(match (is_predicate(expr), context) {
            (true, Context::Value) if sql_server => format!(
                "CASE WHEN {0} THEN CAST(1 AS BIT) WHEN NOT {0} THEN CAST(0 AS BIT) END",
                text
            ),
            (false, Context::Predicate) if sql_server => format!("({} = 1)", text),
            _ => text,
        })
    }

    fn node(&mut self, expr: &DbExpression, scope: Scope<'_>) -> DataResult<String> {
        match expr {
            DbExpression::Constant { value, .. } => self.dialect.literal(value),
            DbExpression::Parameter { value, data_type } => {
                self.parameter(value.clone(), *data_type)
            }
            DbExpression::Column(column) => self.column(column, scope),
            DbExpression::Unary { op, operand, .. } => Ok(match op {
                UnaryOp::Negate => format!("(-{})", self.value(operand, scope)?),
                UnaryOp::OnesComplement => format!("(~{})", self.value(operand, scope)?),
                UnaryOp::Not => format!("(NOT {})", self.predicate(operand, scope)?),
            }),
            DbExpression::Binary {
                op,
                left,
                right,
                data_type,
            } => self.binary(*op, left, right, *data_type, scope),
            DbExpression::Cast {
                operand,
                target_type,
                ..
            } => Ok(format!(
                "CAST({} AS {})",
                self.value(operand, scope)?,
                self.types.cast_type(*target_type)
            )),
            DbExpression::Case {
                on,
                when,
                otherwise,
                ..
            } => {
                let mut parts = vec!["CASE".to_string()];
                if let Some(on) = on {
                    parts.push(self.value(on, scope)?);
                }
                for (guard, then) in when {
                    let guard = if on.is_some() {
                        self.value(guard, scope)?
                    } else {
                        self.predicate(guard, scope)?
                    };
                    let then = self.value(then, scope)?;
                    parts.push(format!("WHEN {} THEN {}", guard, then));
                }
                parts.push(format!("ELSE {}", self.value(otherwise, scope)?));
                parts.push("END".to_string());
                Ok(parts.join(" "))
            }
            DbExpression::Function { key, args, .. } => self.function(*key, args, scope),
        }
    }

    fn column(&self, column: &ColumnRef, scope: Scope<'_>) -> DataResult<String> {
        match scope {
            Scope::Qualified(aliases) => {
                let alias = aliases.alias(column.model).ok_or_else(|| {
                    DataError::Argument(format!(
                        "column '{}' refers to a model outside the statement",
                        column.name
                    ))
                })?;
                Ok(format!("{}.{}", self.quote(alias), self.quote(&column.name)))
            }
            Scope::Unqualified => Ok(self.quote(&column.name)),
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &DbExpression,
        right: &DbExpression,
        data_type: DataType,
        scope: Scope<'_>,
    ) -> DataResult<String> {
        let (left, right) = if op.is_logical() {
            (self.predicate(left, scope)?, self.predicate(right, scope)?)
        } else {
            (self.value(left, scope)?, self.value(right, scope)?)
        };
        if op == BinaryOp::Add && data_type == DataType::String {
            if let Dialect::MySql(_) = self.dialect {
                return Ok(format!("CONCAT({}, {})", left, right));
            }
        }
        let symbol = match op {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
        };
        Ok(format!("({} {} {})", left, symbol, right))
    }

    fn function(
        &mut self,
        key: FunctionKey,
        args: &[DbExpression],
        scope: Scope<'_>,
    ) -> DataResult<String> {
        let sql_server = matches!(self.dialect, Dialect::SqlServer(_));
        let text = match key {
            FunctionKey::First | FunctionKey::Last => {
                return Err(DataError::Argument(format!(
                    "{} has no SQL translation",
                    key.name()
                )))
            }
            FunctionKey::CountRows => "COUNT(*)".to_string(),
            FunctionKey::Count => format!("COUNT({})", self.value(argument(args, 0, key)?, scope)?),
            FunctionKey::Sum => format!("SUM({})", self.value(argument(args, 0, key)?, scope)?),
            FunctionKey::Min => format!("MIN({})", self.value(argument(args, 0, key)?, scope)?),
            FunctionKey::Max => format!("MAX({})", self.value(argument(args, 0, key)?, scope)?),
            FunctionKey::Average => {
                let arg = argument(args, 0, key)?;
                let text = self.value(arg, scope)?;
                // SQL Server averages integers with integer division
                if sql_server && arg.data_type().is_integer() {
                    format!("AVG(CAST({} AS FLOAT))", text)
                } else {
                    format!("AVG({})", text)
                }
            }
            FunctionKey::IsNull => {
                format!("({} IS NULL)", self.value(argument(args, 0, key)?, scope)?)
            }
            FunctionKey::IsNotNull => {
                format!("({} IS NOT NULL)", self.value(argument(args, 0, key)?, scope)?)
            }
            FunctionKey::IfNull => {
                let value = self.value(argument(args, 0, key)?, scope)?;
                let replacement = self.value(argument(args, 1, key)?, scope)?;
                let name = if sql_server { "ISNULL" } else { "IFNULL" };
                format!("{}({}, {})", name, value, replacement)
            }
            FunctionKey::Contains => {
                let text = self.value(argument(args, 0, key)?, scope)?;
                let needle = self.value(argument(args, 1, key)?, scope)?;
                let name = if sql_server { "CHARINDEX" } else { "LOCATE" };
                format!("({}({}, {}) > 0)", name, needle, text)
            }
            FunctionKey::GetDate => (if sql_server { "GETDATE()" } else { "NOW(3)" }).to_string(),
            FunctionKey::GetUtcDate => {
                (if sql_server { "GETUTCDATE()" } else { "UTC_TIMESTAMP(3)" }).to_string()
            }
            FunctionKey::NewGuid => (if sql_server { "NEWID()" } else { "UUID()" }).to_string(),
            FunctionKey::Upper => format!("UPPER({})", self.value(argument(args, 0, key)?, scope)?),
            FunctionKey::Lower => format!("LOWER({})", self.value(argument(args, 0, key)?, scope)?),
            FunctionKey::Length => {
                let text = self.value(argument(args, 0, key)?, scope)?;
                if sql_server {
                    format!("LEN({})", text)
                } else {
                    format!("CHAR_LENGTH({})", text)
                }
            }
            FunctionKey::Trim => {
                let text = self.value(argument(args, 0, key)?, scope)?;
                if sql_server {
                    format!("LTRIM(RTRIM({}))", text)
                } else {
                    format!("TRIM({})", text)
                }
            }
            FunctionKey::Abs => format!("ABS({})", self.value(argument(args, 0, key)?, scope)?),
            FunctionKey::Round => {
                let value = self.value(argument(args, 0, key)?, scope)?;
                let digits = match args.get(1) {
                    Some(digits) => self.value(digits, scope)?,
                    None => "0".to_string(),
                };
                format!("ROUND({}, {})", value, digits)
            }
        };
        Ok(text)
    }

    // --- SELECT ---

    pub fn select(&mut self, stmt: &DbSelectStatement) -> DataResult<()> {
        let text = self.select_text(stmt)?;
        debug!(
            model = %self.schema.model(stmt.model).name,
            dialect = %self.dialect,
            "Select rendered"
        );
        self.push(text);
        Ok(())
    }

    fn order_list(
        &mut self,
        order_by: &[DbSortExpression],
        scope: Scope<'_>,
    ) -> DataResult<String> {
        let mut items = Vec::with_capacity(order_by.len());
        for item in order_by {
            items.push(format!(
                "{} {}",
                self.value(&item.expr, scope)?,
                direction(item.direction)
            ));
        }
        Ok(items.join(", "))
    }

    fn select_text(&mut self, stmt: &DbSelectStatement) -> DataResult<String> {
        let aliases = ModelAliasManager::for_models(self.schema, &stmt.from.models());
        let scope = Scope::Qualified(&aliases);
        let row_number_paging =
            self.dialect == Dialect::SqlServer(SqlServerVersion::V2008) && stmt.offset.is_some();
        let top = match self.dialect {
            Dialect::SqlServer(version) if stmt.offset.is_none() => stmt
                .fetch
                .filter(|_| version == SqlServerVersion::V2008 || stmt.order_by.is_empty()),
            _ => None,
        };

        let mut columns = Vec::with_capacity(stmt.select.len() + 1);
        for mapping in &stmt.select {
            columns.push(format!(
                "{} AS {}",
                self.value(&mapping.expr, scope)?,
                self.quote(&mapping.target.name)
            ));
        }
        if row_number_paging {
            let order = self.order_list(&stmt.order_by, scope)?;
            columns.push(format!(
                "ROW_NUMBER() OVER (ORDER BY {}) AS {}",
                order,
                self.quote(ROW_NUMBER_COLUMN)
            ));
        }

        let mut lines = Vec::new();
        lines.push(match top {
            Some(fetch) => format!("SELECT TOP ({}) {}", fetch, columns.join(", ")),
            None => format!("SELECT {}", columns.join(", ")),
        });
        lines.push(format!("FROM {}", self.from_clause(&stmt.from, &aliases)?));
        if let Some(where_clause) = &stmt.where_clause {
            lines.push(format!("WHERE {}", self.predicate(where_clause, scope)?));
        }
        if !stmt.group_by.is_empty() {
            let mut items = Vec::with_capacity(stmt.group_by.len());
            for expr in &stmt.group_by {
                items.push(self.value(expr, scope)?);
            }
            lines.push(format!("GROUP BY {}", items.join(", ")));
        }
        if let Some(having) = &stmt.having {
            lines.push(format!("HAVING {}", self.predicate(having, scope)?));
        }

        if row_number_paging {
            let offset = stmt.offset.unwrap_or(0);
            let row_number = self.quote(ROW_NUMBER_COLUMN);
            let mut bounds = vec![format!("{} > {}", row_number, offset)];
            if let Some(fetch) = stmt.fetch {
                bounds.push(format!("{} <= {}", row_number, offset + fetch));
            }
            let outer: Vec<String> = stmt
                .select
                .iter()
                .map(|m| self.quote(&m.target.name))
                .collect();
            return Ok(format!(
                "SELECT {}\nFROM (\n{}\n) AS {}\nWHERE {}\nORDER BY {}",
                outer.join(", "),
                lines.join("\n"),
                self.quote(PAGED_ALIAS),
                bounds.join(" AND "),
                row_number
            ));
        }

        if !stmt.order_by.is_empty() {
            lines.push(format!("ORDER BY {}", self.order_list(&stmt.order_by, scope)?));
        }
        match self.dialect {
            Dialect::SqlServer(_) => {
                if stmt.offset.is_some() || (stmt.fetch.is_some() && top.is_none()) {
                    let mut paging = format!("OFFSET {} ROWS", stmt.offset.unwrap_or(0));
                    if let Some(fetch) = stmt.fetch {
                        paging.push_str(&format!(" FETCH NEXT {} ROWS ONLY", fetch));
                    }
                    lines.push(paging);
                }
            }
            Dialect::MySql(_) => match (stmt.offset, stmt.fetch) {
                (Some(offset), Some(fetch)) => lines.push(format!("LIMIT {}, {}", offset, fetch)),
                (Some(offset), None) => lines.push(format!("LIMIT {}, {}", offset, u64::MAX)),
                (None, Some(fetch)) => lines.push(format!("LIMIT {}", fetch)),
                (None, None) => {}
            },
        }
        Ok(lines.join("\n"))
    }

    fn alias_of(&self, aliases: &ModelAliasManager, model: ModelId) -> DataResult<String> {
        aliases
            .alias(model)
            .map(|a| self.quote(a))
            .ok_or_else(|| DataError::Argument(format!("model id {} has no alias", model.0)))
    }

    fn from_clause(&mut self, from: &DbFromClause, aliases: &ModelAliasManager) -> DataResult<String> {
        match from {
            DbFromClause::Table {
                model,
                table,
                temporary,
            } => Ok(format!(
                "{} AS {}",
                self.dialect.table_name(table, *temporary),
                self.alias_of(aliases, *model)?
            )),
            DbFromClause::Query(query) => {
                let inner = self.select_text(query)?;
                Ok(format!("(\n{}\n) AS {}", inner, self.alias_of(aliases, query.model)?))
            }
            DbFromClause::Union { all, queries } => {
                let model = queries
                    .first()
                    .map(|q| q.model)
                    .ok_or_else(|| DataError::Argument("empty union".to_string()))?;
                let mut parts = Vec::with_capacity(queries.len());
                for query in queries {
                    parts.push(self.select_text(query)?);
                }
                let separator = if *all { "\nUNION ALL\n" } else { "\nUNION\n" };
                Ok(format!(
                    "(\n{}\n) AS {}",
                    parts.join(separator),
                    self.alias_of(aliases, model)?
                ))
            }
            DbFromClause::Join {
                kind,
                left,
                right,
                on,
            } => {
                let left = self.from_clause(left, aliases)?;
                let right = self.from_clause(right, aliases)?;
                let on = self.predicate(on, Scope::Qualified(aliases))?;
                let join = match kind {
                    JoinKind::Inner => "INNER JOIN",
                    JoinKind::Left => "LEFT JOIN",
                };
                Ok(format!("{}\n{} {} ON {}", left, join, right, on))
            }
        }
    }

    // --- DDL ---

    pub fn create_table(&mut self, stmt: &DbCreateTable) -> DataResult<()> {
        let sql_server = matches!(self.dialect, Dialect::SqlServer(_));
        let mut items = Vec::new();
        for column in &stmt.columns {
            let mut definition = format!(
                "{} {}",
                self.quote(&column.name),
                self.types.column_type(column.data_type, &column.facets)
            );
            definition.push_str(if column.facets.nullable { " NULL" } else { " NOT NULL" });
            if column.facets.identity {
                definition.push_str(if sql_server { " IDENTITY(1, 1)" } else { " AUTO_INCREMENT" });
            }
            if let Some(default) = &column.facets.default {
                definition.push_str(&format!(" DEFAULT {}", self.dialect.literal(default)?));
            }
            items.push(definition);
        }

        let mut checks = Vec::with_capacity(stmt.checks.len());
        for (name, expr) in &stmt.checks {
            checks.push((name, self.predicate(expr, Scope::Unqualified)?));
        }

        // Named constraints on temporary tables clash across sessions
        let constraint = |name: &str, body: String| -> String {
            if stmt.temporary {
                body
            } else {
                format!("CONSTRAINT {} {}", self.dialect.quote(name), body)
            }
        };
        if !stmt.primary_key.is_empty() {
            let keys: Vec<String> = stmt
                .primary_key
                .iter()
                .map(|(name, d)| format!("{} {}", self.quote(name), direction(*d)))
                .collect();
            items.push(constraint(
                &format!("PK_{}", stmt.table),
                format!("PRIMARY KEY ({})", keys.join(", ")),
            ));
        }
        for (name, columns) in &stmt.uniques {
            let columns: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
            items.push(constraint(name, format!("UNIQUE ({})", columns.join(", "))));
        }
        for (name, check) in checks {
            items.push(constraint(name, format!("CHECK ({})", check)));
        }

        let create = if stmt.temporary && !sql_server {
            "CREATE TEMPORARY TABLE"
        } else {
            "CREATE TABLE"
        };
        let text = format!(
            "{} {} (\n    {}\n)",
            create,
            self.dialect.table_name(&stmt.table, stmt.temporary),
            items.join(",\n    ")
        );
        self.push(text);
        Ok(())
    }

    pub fn drop_table(&mut self, stmt: &DbDropTable) {
        let drop = match self.dialect {
            Dialect::MySql(_) if stmt.temporary => "DROP TEMPORARY TABLE",
            _ => "DROP TABLE",
        };
        let text = format!(
            "{} {}",
            drop,
            self.dialect.table_name(&stmt.table, stmt.temporary)
        );
        self.push(text);
    }

    // --- DML ---

    pub fn insert(&mut self, stmt: &DbInsertStatement) -> DataResult<()> {
        let table = self.dialect.table_name(&stmt.table, false);
        let text = if stmt.values.is_empty() {
            match self.dialect {
                Dialect::SqlServer(_) => format!("INSERT INTO {} DEFAULT VALUES", table),
                Dialect::MySql(_) => format!("INSERT INTO {} () VALUES ()", table),
            }
        } else {
            let columns: Vec<String> = stmt.values.iter().map(|(c, _)| self.quote(&c.name)).collect();
            let mut values = Vec::with_capacity(stmt.values.len());
            for (_, expr) in &stmt.values {
                values.push(self.value(expr, Scope::Unqualified)?);
            }
            format!(
                "INSERT INTO {} ({})\nVALUES ({})",
                table,
                columns.join(", "),
                values.join(", ")
            )
        };
        self.push(text);
        if let Some(identity) = &stmt.identity {
            let function = match self.dialect {
                Dialect::SqlServer(_) => "SCOPE_IDENTITY()",
                Dialect::MySql(_) => "LAST_INSERT_ID()",
            };
            let text = format!("SELECT {} AS {}", function, self.quote(&identity.name));
            self.push(text);
        }
        Ok(())
    }

    pub fn update(&mut self, stmt: &DbUpdateStatement) -> DataResult<()> {
        let mut assignments = Vec::with_capacity(stmt.assignments.len());
        for (column, expr) in &stmt.assignments {
            let value = self.value(expr, Scope::Unqualified)?;
            assignments.push(format!("{} = {}", self.quote(&column.name), value));
        }
        let predicate = self.predicate(&stmt.where_clause, Scope::Unqualified)?;
        let text = format!(
            "UPDATE {}\nSET {}\nWHERE {}",
            self.dialect.table_name(&stmt.table, false),
            assignments.join(", "),
            predicate
        );
        self.push(text);
        Ok(())
    }

    pub fn delete(&mut self, stmt: &DbDeleteStatement) -> DataResult<()> {
        let predicate = self.predicate(&stmt.where_clause, Scope::Unqualified)?;
        let text = format!(
            "DELETE FROM {}\nWHERE {}",
            self.dialect.table_name(&stmt.table, false),
            predicate
        );
        self.push(text);
        Ok(())
    }

    pub fn insert_select(&mut self, stmt: &DbInsertSelect) -> DataResult<()> {
        let columns: Vec<String> = stmt.columns.iter().map(|c| self.quote(c)).collect();
        let select = self.select_text(&stmt.select)?;
        let text = format!(
            "INSERT INTO {} ({})\n{}",
            self.dialect.table_name(&stmt.table, stmt.temporary),
            columns.join(", "),
            select
        );
        self.push(text);
        Ok(())
    }

    /// Create and fill the sequential key table, select the child rows, then
    /// drop the table.
    pub fn child_query(&mut self, query: &ChildQuery) -> DataResult<()> {
        self.create_table(&query.create_temp_table)?;
        self.insert_select(&query.fill)?;
        self.select(&query.select)?;
        self.drop_table(&query.drop_temp_table);
        Ok(())
    }
}
