//! File Index Module
//!
//! Searchable catalogue of cached Telegram files. Both backends share the
//! matching and pagination rules defined here, so an in-memory index and a
//! SQLite one answer the same query identically.
pub mod db_index;
pub mod memory_index;

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::{debug, info};

use crate::system::{IndexBackend, IndexSettings};
use db_index::DbIndex;
use memory_index::MemoryIndex;

/// A cached file that can be re-sent by its Telegram file id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    /// Size in bytes
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub caption: Option<String>,
    pub file_type: String,
}

/// One page request against the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub term: String,
    /// Exact file type to keep; `None` keeps every type
    pub file_type: Option<String>,
    pub max_results: usize,
    pub offset: usize,
    pub use_caption_filter: bool,
}

/// One page of search hits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResultPage {
    pub files: Vec<FileRecord>,
    /// Offset of the following page, absent on the last page
    pub next_offset: Option<usize>,
    /// Number of matches across all pages
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Unable to read seed file: {0}")]
    SeedIo(#[from] std::io::Error),
    #[error("Invalid seed file: {0}")]
    SeedFormat(#[from] serde_json::Error),
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Returns the requested page of matches, newest first.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, IndexError>;

    /// Adds a record. Returns `false` when its file id is already indexed.
    async fn save_file(&self, record: FileRecord) -> Result<bool, IndexError>;
}

/// Builds the case-insensitive pattern a search term is matched with.
///
/// A single word must sit between word boundaries or one of `. + - _`;
/// several words may be separated by anything ending in whitespace or one
/// of those separators.
pub fn build_pattern(term: &str) -> Result<Regex, regex::Error> {
    let term = term.trim();
    let raw = if term.is_empty() {
        ".".to_string()
    } else if !term.contains(' ') {
        format!(r"(\b|[\.\+\-_]){}(\b|[\.\+\-_])", regex::escape(term))
    } else {
        term.split(' ')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r".*[\s\.\+\-_]")
    };

    RegexBuilder::new(&raw).case_insensitive(true).build()
}

/// Record filter compiled from a [`SearchRequest`]
pub(crate) struct Matcher<'a> {
    pattern: Regex,
    file_type: Option<&'a str>,
    use_caption_filter: bool,
}

impl<'a> Matcher<'a> {
    pub(crate) fn new(request: &'a SearchRequest) -> Result<Self, IndexError> {
        Ok(Self {
            pattern: build_pattern(&request.term)?,
            file_type: request.file_type.as_deref().filter(|t| !t.is_empty()),
            use_caption_filter: request.use_caption_filter,
        })
    }

    pub(crate) fn accepts(&self, record: &FileRecord) -> bool {
        if let Some(file_type) = self.file_type {
            if record.file_type != file_type {
                return false;
            }
        }

        self.pattern.is_match(&record.file_name)
            || (self.use_caption_filter
                && record
                    .caption
                    .as_deref()
                    .is_some_and(|caption| self.pattern.is_match(caption)))
    }
}

/// Offset of the page after `request`, `None` once it reaches `total`.
pub(crate) fn next_page_offset(request: &SearchRequest, total: usize) -> Option<usize> {
    let next_offset = request.offset.saturating_add(request.max_results);
    (next_offset < total).then_some(next_offset)
}

/// Cuts the requested window out of the full, ordered match list.
pub(crate) fn paginate(matched: Vec<FileRecord>, request: &SearchRequest) -> SearchResultPage {
    let total = matched.len();
    let files = matched
        .into_iter()
        .skip(request.offset)
        .take(request.max_results)
        .collect();

    SearchResultPage {
        files,
        next_offset: next_page_offset(request, total),
        total,
    }
}

/// Creates the configured index backend
pub async fn create_index(settings: &IndexSettings) -> Result<Arc<dyn FileIndex>, IndexError> {
    match settings.backend {
        IndexBackend::Memory => {
            info!("Using in-memory file index");
            Ok(Arc::new(MemoryIndex::new()))
        }
        IndexBackend::Sqlite => {
            info!("Using SQLite file index at {}", settings.database_url);
            Ok(Arc::new(DbIndex::new(&settings.database_url).await?))
        }
    }
}

/// Loads a JSON array of records into the index, skipping known file ids.
///
/// # Returns
/// * `Result<usize, IndexError>` - Number of newly added records
pub async fn load_seed(index: &dyn FileIndex, path: &Path) -> Result<usize, IndexError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let records: Vec<FileRecord> = serde_json::from_str(&raw)?;

    let mut added = 0;
    for record in records {
        let file_id = record.file_id.clone();
        if index.save_file(record).await? {
            added += 1;
        } else {
            debug!("Skipping duplicate seed record {}", file_id);
        }
    }

    info!("Seeded {} files from {}", added, path.display());
    Ok(added)
}
