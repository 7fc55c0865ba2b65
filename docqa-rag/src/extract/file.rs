//! Files of mixed formats as documents.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ExtractOptions, Extractor, SourceItem};
use crate::document::Document;
use crate::error::{RagError, Result};

/// Extensions this build can read.
fn supported_extensions() -> Vec<&'static str> {
    let mut exts = vec!["txt", "md"];
    if cfg!(feature = "pdf") {
        exts.push("pdf");
    }
    if cfg!(feature = "docx") {
        exts.push("docx");
    }
    exts
}

/// Builds one [`Document`] per file found under a root directory.
///
/// Plain text and markdown are always supported; PDF and DOCX need the `pdf`
/// and `docx` features. Files are visited recursively in path order.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{ExtractOptions, Extractor, FileExtractor};
///
/// let extractor = FileExtractor::new("./data/docs");
/// let documents = extractor.extract(&ExtractOptions::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct FileExtractor {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileExtractor {
    /// Create an extractor over every supported file under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: supported_extensions().into_iter().map(String::from).collect(),
        }
    }

    /// Restrict extraction to the given extensions (case-insensitive, no dot).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if an extension is not supported by this build.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let supported = supported_extensions();
        let mut requested = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim_start_matches('.').to_ascii_lowercase();
            if !supported.contains(&ext.as_str()) {
                return Err(RagError::Config(format!(
                    "unsupported source type '.{ext}' (supported: {})",
                    supported.join(", ")
                )));
            }
            requested.push(ext);
        }
        self.extensions = requested;
        Ok(self)
    }

    /// The directory being read.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn extension_of(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.contains(&ext).then_some(ext)
    }

    fn discover(&self, options: &ExtractOptions) -> Result<Vec<(PathBuf, String)>> {
        if !self.root.is_dir() {
            return Err(RagError::Extraction {
                source_name: self.root.display().to_string(),
                message: "documents directory does not exist".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| RagError::Extraction {
                source_name: self.root.display().to_string(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            let Some(ext) = self.extension_of(&path) else { continue };
            if options.accepts(&SourceItem::File(&path)) {
                files.push((path, ext));
            }
        }
        Ok(files)
    }

    fn document_id(&self, path: &Path) -> String {
        path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy().replace('\\', "/")
    }
}

async fn read_text(path: &Path, ext: &str) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| RagError::Extraction {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;

    match ext {
        #[cfg(feature = "pdf")]
        "pdf" => blocking(path, move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
        })
        .await,
        #[cfg(feature = "docx")]
        "docx" => blocking(path, move || docx_text(&bytes)).await,
        _ => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

#[cfg(any(feature = "pdf", feature = "docx"))]
async fn blocking<F>(path: &Path, f: F) -> Result<String>
where
    F: FnOnce() -> std::result::Result<String, String> + Send + 'static,
{
    let source_name = path.display().to_string();
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RagError::Extraction {
            source_name: source_name.clone(),
            message: format!("task join error: {e}"),
        })?
        .map_err(|message| RagError::Extraction { source_name, message })
}

/// Pull paragraph text out of `word/document.xml`.
#[cfg(feature = "docx")]
fn docx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    use std::io::{Cursor, Read};

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    xml_to_text(&xml)
}

/// Flatten WordprocessingML to text: paragraphs and breaks become newlines,
/// tab runs become tabs, and character references are decoded.
#[cfg(feature = "docx")]
fn xml_to_text(xml: &str) -> std::result::Result<String, String> {
    use regex::{Captures, Regex};

    let compile = |pattern: &str| Regex::new(pattern).map_err(|e| e.to_string());
    // Tab stop definitions live in paragraph properties and carry no text.
    let tab_stops = compile(r"(?s)<w:tabs>.*?</w:tabs>")?;
    let tab = compile(r"<w:tab\b[^>]*/>")?;
    let line_break = compile(r"<w:(?:br|cr)\b[^>]*/>|</w:p>")?;
    let tag = compile(r"<[^>]+>")?;
    let entity = compile(r"&(#x[0-9a-fA-F]+|#[0-9]+|lt|gt|quot|apos|amp);")?;

    let text = tab_stops.replace_all(xml, "");
    let text = tab.replace_all(&text, "\t");
    let text = line_break.replace_all(&text, "\n");
    let text = tag.replace_all(&text, "");
    let decoded = entity.replace_all(&text, |caps: &Captures<'_>| {
        let name = &caps[1];
        let code = match name {
            "lt" => return "<".to_string(),
            "gt" => return ">".to_string(),
            "quot" => return "\"".to_string(),
            "apos" => return "'".to_string(),
            "amp" => return "&".to_string(),
            _ => match name.strip_prefix("#x") {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => name[1..].parse().ok(),
            },
        };
        code.and_then(char::from_u32).map(String::from).unwrap_or_else(|| caps[0].to_string())
    });
    Ok(decoded.into_owned())
}

#[async_trait]
impl Extractor for FileExtractor {
    fn describe(&self) -> String {
        format!("directory '{}'", self.root.display())
    }

    async fn extract(&self, options: &ExtractOptions) -> Result<Vec<Document>> {
        let files = self.discover(options)?;
        if files.is_empty() {
            return Err(RagError::EmptyInput(format!(
                "no {} files found in '{}'",
                self.extensions.join("/"),
                self.root.display()
            )));
        }
        info!(root = %self.root.display(), file_count = files.len(), "found documents to process");

        let mut documents = Vec::with_capacity(files.len());
        for (path, ext) in files {
            let text = read_text(&path, &ext).await?;
            if text.trim().is_empty() {
                warn!(path = %path.display(), "skipping file with no extractable text");
                continue;
            }
            debug!(path = %path.display(), chars = text.chars().count(), "extracted file");

            let file_name =
                path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let mut document = Document::new(self.document_id(&path), text)
                .with_metadata("source", "file")
                .with_metadata("file_name", file_name)
                .with_metadata("file_path", path.display().to_string())
                .with_metadata("file_type", ext);
            document.source_uri = Some(path.display().to_string());
            documents.push(document);
        }

        if documents.is_empty() {
            return Err(RagError::EmptyInput(format!(
                "no extractable text in '{}'",
                self.root.display()
            )));
        }
        Ok(documents)
    }
}
