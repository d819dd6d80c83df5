//! SQL parsing of dump statements.

use crate::error::MaskError;
use sqlparser::ast::{Expr, Insert, ObjectNamePart, SetExpr, Statement, TableObject};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::{Parser, ParserOptions};

/// Parses single `INSERT` statements in the MySQL dialect.
///
/// String literals are kept in their escaped form so that re-serializing a
/// statement reproduces untouched values exactly.
pub struct StatementParser {
    dialect: MySqlDialect,
}

impl Clone for StatementParser {
    fn clone(&self) -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser {
    /// Create a new statement parser.
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Parse `sql` as exactly one `INSERT` statement.
    pub fn parse_insert(&self, sql: &str) -> Result<Insert, MaskError> {
        let mut statements = Parser::new(&self.dialect)
            .with_options(ParserOptions::new().with_unescape(false))
            .try_with_sql(sql)
            .and_then(|mut parser| parser.parse_statements())
            .map_err(|e| MaskError::Parse(e.to_string()))?;

        if statements.len() != 1 {
            return Err(MaskError::Parse(format!(
                "expected a single statement, found {}",
                statements.len()
            )));
        }

        match statements.pop() {
            Some(Statement::Insert(insert)) => Ok(insert),
            _ => Err(MaskError::Parse(
                "statement is not an INSERT".to_string(),
            )),
        }
    }
}

/// Unqualified name of the table an `INSERT` writes to.
///
/// `db.users` and `` `users` `` both yield `users`.
pub fn insert_table_name(insert: &Insert) -> Option<&str> {
    match &insert.table {
        TableObject::TableName(name) => match name.0.last()? {
            ObjectNamePart::Identifier(ident) => Some(ident.value.as_str()),
            _ => None,
        },
        _ => None,
    }
}

/// Names of the columns listed in the `INSERT`, in order.
pub fn insert_column_names(insert: &Insert) -> Vec<&str> {
    insert.columns.iter().map(|c| c.value.as_str()).collect()
}

/// The `VALUES` rows of an `INSERT`, or `None` for `INSERT ... SELECT` and
/// other sources.
pub fn insert_rows_mut(insert: &mut Insert) -> Option<&mut Vec<Vec<Expr>>> {
    let query = insert.source.as_mut()?;
    match query.body.as_mut() {
        SetExpr::Values(values) => Some(&mut values.rows),
        _ => None,
    }
}
