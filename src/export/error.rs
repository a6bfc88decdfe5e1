//! Shared error type for the export pipeline and the browser collaborator.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from catalog retrieval, page rendering, asset fetches, and output writes.
#[derive(Debug, Error)]
pub enum ExportError {
    // Preconditions
    #[error("Catalog for book {book_id} returned no data (wrong book id, or not logged in).")]
    EmptyCatalog { book_id: u64 },

    #[error("Could not fetch chapter catalog for book {book_id}: {reason}")]
    CatalogFetch { book_id: u64, reason: String },

    // Browser collaborator
    #[error("Browser error: {source}")]
    Browser {
        #[source]
        source: anyhow::Error,
    },

    #[error("In-page evaluation failed at {url}: {reason}")]
    Evaluate { url: String, reason: String },

    #[error("Login was not completed within {timeout_secs}s.")]
    LoginTimeout { timeout_secs: u64 },

    // Asset fetches
    #[error("Network error: could not fetch image {url}: {source}")]
    AssetNetwork {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching image: {url}")]
    AssetStatus { status: u16, url: String },

    #[error("Failed to write image {path}: {source}")]
    AssetWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Output
    #[error("Failed to write chapter file {path}: {source}")]
    WriteChapter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
