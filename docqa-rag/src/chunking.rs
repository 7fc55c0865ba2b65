//! Fixed-size, overlapping text chunking.
//!
//! [`FixedSizeChunker`] slides a window of `chunk_size` characters across the
//! text with a stride of `chunk_size - chunk_overlap`. The last window is kept
//! even when it is shorter than `chunk_size`, and the walk stops once a window
//! reaches the end of the text, so every chunk after the first starts with
//! exactly `chunk_overlap` characters of the previous one.
//!
//! Sizes are counted in `char`s, so a window never splits a multi-byte character.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus `chunk_index` and `chunk_offset` fields.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// for chunk in chunker.chunks(&document) {
///     println!("{}: {}", chunk.id, chunk.text);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if either size is zero or
    /// `chunk_overlap >= chunk_size`. Sizes are never clamped.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap == 0 {
            return Err(RagError::Config("chunk_overlap must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Lazily split raw text into windows.
    ///
    /// Empty text yields no windows; text shorter than `chunk_size` yields a
    /// single window equal to the whole text.
    pub fn windows<'a>(&self, text: &'a str) -> TextWindows<'a> {
        TextWindows {
            text,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            stride: self.chunk_size - self.chunk_overlap,
            byte_pos: 0,
            char_pos: 0,
            index: 0,
            finished: false,
        }
    }

    /// Lazily split a document into [`Chunk`]s, in document order.
    pub fn chunks<'a>(&self, document: &'a Document) -> DocumentChunks<'a> {
        DocumentChunks { document, windows: self.windows(&document.text) }
    }
}

/// One window produced by [`TextWindows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWindow<'a> {
    /// Position of the window in the sequence.
    pub index: usize,
    /// Offset of the window's first character in the source text.
    pub char_offset: usize,
    /// The window text.
    pub text: &'a str,
    /// Prefix of `text` shared with the previous window.
    pub overlap_text: &'a str,
}

/// Iterator over the windows of a text. Cloning it restarts from the
/// current position.
#[derive(Debug, Clone)]
pub struct TextWindows<'a> {
    text: &'a str,
    chunk_size: usize,
    chunk_overlap: usize,
    stride: usize,
    byte_pos: usize,
    char_pos: usize,
    index: usize,
    finished: bool,
}

/// Byte length of the first `n` chars of `s` (or all of `s` if shorter).
fn byte_len_of_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

impl<'a> Iterator for TextWindows<'a> {
    type Item = TextWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let rest = &self.text[self.byte_pos..];
        if rest.is_empty() {
            self.finished = true;
            return None;
        }

        let window_len = byte_len_of_chars(rest, self.chunk_size);
        let text = &rest[..window_len];
        let overlap_text =
            if self.index == 0 { "" } else { &text[..byte_len_of_chars(text, self.chunk_overlap)] };
        let window =
            TextWindow { index: self.index, char_offset: self.char_pos, text, overlap_text };

        if window_len == rest.len() {
            self.finished = true;
        } else {
            self.byte_pos += byte_len_of_chars(rest, self.stride);
            self.char_pos += self.stride;
        }
        self.index += 1;
        Some(window)
    }
}

impl std::iter::FusedIterator for TextWindows<'_> {}

/// Iterator over the chunks of a [`Document`].
#[derive(Debug, Clone)]
pub struct DocumentChunks<'a> {
    document: &'a Document,
    windows: TextWindows<'a>,
}

impl Iterator for DocumentChunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.windows.next()?;
        let mut metadata = self.document.metadata.clone();
        metadata.insert("chunk_index".to_string(), window.index.into());
        metadata.insert("chunk_offset".to_string(), window.char_offset.into());

        Some(Chunk {
            id: format!("{}_{}", self.document.id, window.index),
            document_id: self.document.id.clone(),
            text: window.text.to_string(),
            overlap_text: window.overlap_text.to_string(),
            metadata,
        })
    }
}
