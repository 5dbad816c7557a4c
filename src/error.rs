//! Error types shared across the crate.
//!
//! Search itself never fails: bad queries are escaped, failed pages count
//! as empty. These types cover the edges where real I/O happens.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce the text of a single page.
///
/// The find controller treats a page that fails with this error as an
/// empty page and keeps searching the rest of the document.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("page {0} is out of range")]
    PageOutOfRange(usize),
    #[error("text extraction failed for page {page}: {reason}")]
    Extraction { page: usize, reason: String },
}

/// Failure to load a document from disk.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to read or parse the config file.
///
/// [`crate::config::build_config`] collects these instead of failing; the
/// binary logs them as warnings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
