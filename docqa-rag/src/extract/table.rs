//! Table rows as documents.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ExtractOptions, Extractor, SourceItem};
use crate::document::{Document, MetadataValue};
use crate::error::{RagError, Result};

/// Text fields used when none are requested: the columns of an FAQ table.
pub const DEFAULT_TEXT_FIELDS: [&str; 2] = ["question", "answer"];

/// A single row read from a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// The row's primary key.
    pub id: MetadataValue,
    /// Column values, rendered as text.
    pub fields: BTreeMap<String, String>,
}

impl TableRow {
    /// Create a row from an id and `(column, value)` pairs.
    pub fn new<I, K, V>(id: impl Into<MetadataValue>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            id: id.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Where table rows come from.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// The table name recorded in document metadata.
    fn table_name(&self) -> &str;

    /// Fetch the rows, with at least the requested fields populated.
    async fn fetch_rows(&self, fields: &[String]) -> Result<Vec<TableRow>>;
}

/// A [`TableSource`] over rows already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryTableSource {
    table: String,
    rows: Vec<TableRow>,
}

impl InMemoryTableSource {
    /// Create a source for `table` holding `rows`.
    pub fn new(table: impl Into<String>, rows: Vec<TableRow>) -> Self {
        Self { table: table.into(), rows }
    }
}

#[async_trait]
impl TableSource for InMemoryTableSource {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn fetch_rows(&self, _fields: &[String]) -> Result<Vec<TableRow>> {
        Ok(self.rows.clone())
    }
}

/// Builds one [`Document`] per table row.
///
/// The document text joins the selected text fields with a blank line, in the
/// order requested. Metadata records `source = "database"`, the table, the row
/// id and each selected field.
#[derive(Debug, Clone)]
pub struct TableExtractor<S> {
    source: S,
}

impl<S: TableSource> TableExtractor<S> {
    /// Create an extractor over `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn row_to_document(&self, row: &TableRow, fields: &[String]) -> Result<Document> {
        let table = self.source.table_name();
        let mut parts = Vec::with_capacity(fields.len());
        let mut document = Document::new(format!("{table}_{}", row.id), String::new())
            .with_metadata("source", "database")
            .with_metadata("table", table)
            .with_metadata("id", row.id.clone());

        for field in fields {
            let value = row.fields.get(field).ok_or_else(|| {
                let message = format!("missing from row {} of table '{table}'", row.id);
                RagError::validation(field, message)
            })?;
            parts.push(value.as_str());
            document.metadata.insert(field.clone(), MetadataValue::Text(value.clone()));
        }

        document.text = parts.join("\n\n");
        Ok(document)
    }
}

#[async_trait]
impl<S: TableSource> Extractor for TableExtractor<S> {
    fn describe(&self) -> String {
        format!("table '{}'", self.source.table_name())
    }

    async fn extract(&self, options: &ExtractOptions) -> Result<Vec<Document>> {
        let fields: Vec<String> = if options.text_fields.is_empty() {
            DEFAULT_TEXT_FIELDS.iter().map(|f| (*f).to_string()).collect()
        } else {
            options.text_fields.clone()
        };

        let rows = self.source.fetch_rows(&fields).await?;
        let fetched = rows.len();
        let documents = rows
            .iter()
            .filter(|row| options.accepts(&SourceItem::Row(row)))
            .map(|row| self.row_to_document(row, &fields))
            .collect::<Result<Vec<_>>>()?;

        debug!(table = self.source.table_name(), fetched, kept = documents.len(), "filtered rows");
        if documents.is_empty() {
            return Err(RagError::EmptyInput(format!(
                "no rows to ingest from table '{}' ({fetched} fetched)",
                self.source.table_name()
            )));
        }

        info!(table = self.source.table_name(), document_count = documents.len(), "extracted rows");
        Ok(documents)
    }
}
