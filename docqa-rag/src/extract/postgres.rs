//! PostgreSQL table source.
//!
//! Provides [`PostgresTableSource`], which reads rows with
//! `SELECT id, <fields> FROM <table> [WHERE <clause>]` via
//! [sqlx](https://docs.rs/sqlx). This module is only available when the
//! `postgres` feature is enabled.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, error};

use super::table::{TableRow, TableSource};
use crate::document::MetadataValue;
use crate::error::{RagError, Result};

const PROVIDER: &str = "postgres";

/// A [`TableSource`] reading rows from a PostgreSQL table.
///
/// The optional `WHERE` clause is passed through verbatim and must come from a
/// trusted operator, never from end users.
pub struct PostgresTableSource {
    pool: PgPool,
    table: String,
    where_clause: Option<String>,
}

/// Accept `name` or `schema.name` made of ASCII letters, digits and underscores.
fn validate_identifier(kind: &str, ident: &str) -> Result<()> {
    let valid = !ident.is_empty()
        && ident.split('.').all(|part| {
            let mut chars = part.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(RagError::Config(format!("invalid {kind} identifier '{ident}'")))
    }
}

impl PostgresTableSource {
    /// Connect to `database_url` and read from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for an invalid table name and
    /// [`RagError::ProviderUnavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier("table", &table)?;

        let pool = PgPoolOptions::new().max_connections(2).connect(database_url).await.map_err(
            |e| {
                error!(provider = PROVIDER, error = %e, "failed to connect to database");
                RagError::unavailable(PROVIDER, e.to_string())
            },
        )?;
        Ok(Self { pool, table, where_clause: None })
    }

    /// Restrict the rows read with a SQL condition (without the `WHERE` keyword).
    pub fn with_where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    fn build_query(&self, fields: &[String]) -> Result<String> {
        let mut columns = vec!["id::text AS id".to_string()];
        for field in fields {
            validate_identifier("column", field)?;
            columns.push(format!("{field}::text AS {field}"));
        }
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), self.table);
        if let Some(clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        Ok(sql)
    }

    fn decode_row(row: &PgRow, fields: &[String]) -> Result<TableRow> {
        let decode = |e: sqlx::Error| RagError::Extraction {
            source_name: PROVIDER.to_string(),
            message: format!("failed to decode row: {e}"),
        };
        let raw_id: String = row.try_get("id").map_err(decode)?;
        let id = raw_id.parse::<i64>().map_or(MetadataValue::Text(raw_id), MetadataValue::Integer);

        let mut values = BTreeMap::new();
        for field in fields {
            let value: Option<String> = row.try_get(field.as_str()).map_err(decode)?;
            values.insert(field.clone(), value.unwrap_or_default());
        }
        Ok(TableRow { id, fields: values })
    }
}

#[async_trait]
impl TableSource for PostgresTableSource {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn fetch_rows(&self, fields: &[String]) -> Result<Vec<TableRow>> {
        let sql = self.build_query(fields)?;
        debug!(provider = PROVIDER, %sql, "executing query");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(|e| {
            error!(provider = PROVIDER, table = %self.table, error = %e, "query failed");
            RagError::unavailable(PROVIDER, format!("query on '{}' failed: {e}", self.table))
        })?;

        rows.iter().map(|row| Self::decode_row(row, fields)).collect()
    }
}
