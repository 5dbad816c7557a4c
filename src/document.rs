//! Plain-text documents paginated by form feeds.
//!
//! Text exported from paginated formats (e.g. `pdftotext`) separates pages
//! with `\x0c`. Each page's text is served as-is, with one geometry index
//! per char.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{DocumentError, SourceError};
use crate::page::{PageSource, PageText};

pub const PAGE_SEPARATOR: char = '\x0c';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pages: Vec<String>,
}

impl TextDocument {
    /// Split `text` into pages. A trailing separator does not open an
    /// empty last page; an empty text is one empty page.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_suffix(PAGE_SEPARATOR).unwrap_or(text);
        Self {
            pages: text.split(PAGE_SEPARATOR).map(str::to_string).collect(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DocumentError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::parse(&text))
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// The whole document with pages joined by newlines, for callers that
    /// search across page boundaries.
    pub fn full_text(&self) -> String {
        self.pages.join("\n")
    }
}

#[async_trait]
impl PageSource for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn page_text(&self, page_index: usize) -> Result<PageText, SourceError> {
        let text = self
            .pages
            .get(page_index)
            .ok_or(SourceError::PageOutOfRange(page_index))?;
        Ok(PageText::plain(page_index, text.as_str()))
    }
}
