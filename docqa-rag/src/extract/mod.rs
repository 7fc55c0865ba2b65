//! Document extraction from heterogeneous sources.
//!
//! An [`Extractor`] turns a source into raw [`Document`]s. Two variants feed
//! the same chunk → embed → store pipeline:
//!
//! - [`TableExtractor`]: one document per table row, built from selected text fields
//! - [`FileExtractor`]: one document per file in a directory tree

mod file;
#[cfg(feature = "postgres")]
mod postgres;
mod table;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;

pub use file::FileExtractor;
#[cfg(feature = "postgres")]
pub use postgres::PostgresTableSource;
pub use table::{DEFAULT_TEXT_FIELDS, InMemoryTableSource, TableExtractor, TableRow, TableSource};

/// An item considered for extraction, passed to a [`SourceFilter`].
#[derive(Debug, Clone, Copy)]
pub enum SourceItem<'a> {
    /// A table row.
    Row(&'a TableRow),
    /// A file path.
    File(&'a Path),
}

/// A predicate deciding which source items become documents.
#[derive(Clone)]
pub struct SourceFilter(Arc<dyn Fn(&SourceItem<'_>) -> bool + Send + Sync>);

impl SourceFilter {
    /// Wrap a predicate. Items for which it returns `false` are skipped.
    pub fn new(predicate: impl Fn(&SourceItem<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Keep only rows matching `predicate`; files always pass.
    pub fn rows(predicate: impl Fn(&TableRow) -> bool + Send + Sync + 'static) -> Self {
        Self::new(move |item| match item {
            SourceItem::Row(row) => predicate(row),
            SourceItem::File(_) => true,
        })
    }

    /// Keep only files matching `predicate`; rows always pass.
    pub fn files(predicate: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        Self::new(move |item| match item {
            SourceItem::File(path) => predicate(path),
            SourceItem::Row(_) => true,
        })
    }

    /// Evaluate the predicate.
    pub fn accepts(&self, item: &SourceItem<'_>) -> bool {
        (self.0)(item)
    }
}

impl fmt::Debug for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SourceFilter(..)")
    }
}

/// Per-run extraction options.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Fields combined into the document text. Only table sources use this;
    /// when empty, [`DEFAULT_TEXT_FIELDS`] applies.
    pub text_fields: Vec<String>,
    /// Optional predicate excluding source items.
    pub filter: Option<SourceFilter>,
}

impl ExtractOptions {
    /// Options selecting the given text fields.
    pub fn with_text_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { text_fields: fields.into_iter().map(Into::into).collect(), filter: None }
    }

    /// Attach a filter predicate.
    pub fn filter(mut self, filter: SourceFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn accepts(&self, item: &SourceItem<'_>) -> bool {
        self.filter.as_ref().is_none_or(|f| f.accepts(item))
    }
}

/// A source of raw documents.
///
/// Implementations return [`RagError::EmptyInput`](crate::RagError::EmptyInput)
/// when the source (after filtering) holds nothing to ingest.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Describes the source in logs, e.g. a table name or directory.
    fn describe(&self) -> String;

    /// Read the source and produce documents.
    async fn extract(&self, options: &ExtractOptions) -> Result<Vec<Document>>;
}
