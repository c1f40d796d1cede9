use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::index::{FileIndex, FileRecord, IndexError, Matcher, SearchRequest, SearchResultPage, paginate};

/// In-memory index implementation
///
/// Records are kept in insertion order and searched newest first.
/// Suitable for development, testing, and small seeded catalogues.
pub struct MemoryIndex {
    files: RwLock<Vec<FileRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(Vec::with_capacity(100)),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileIndex for MemoryIndex {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, IndexError> {
        let matcher = Matcher::new(request)?;
        let files = self.files.read().await;
        let matched = files
            .iter()
            .rev()
            .filter(|record| matcher.accepts(record))
            .cloned()
            .collect();

        Ok(paginate(matched, request))
    }

    async fn save_file(&self, record: FileRecord) -> Result<bool, IndexError> {
        let mut files = self.files.write().await;
        if files.iter().any(|known| known.file_id == record.file_id) {
            return Ok(false);
        }
        files.push(record);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{record, request};

    async fn seeded() -> MemoryIndex {
        let index = MemoryIndex::new();
        for (id, name, kind) in [
            ("1", "Batman.Begins.2005.mkv", "video"),
            ("2", "The.Dark.Knight.2008.mkv", "video"),
            ("3", "Batman.Returns.1992.mp4", "video"),
            ("4", "batman_comics.pdf", "document"),
        ] {
            assert!(index.save_file(record(id, name, kind)).await.unwrap());
        }
        index
    }

    #[tokio::test]
    async fn test_search_returns_newest_first() {
        let index = seeded().await;
        let page = index.search(&request("batman")).await.unwrap();

        let ids: Vec<_> = page.files.iter().map(|f| f.file_id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3", "1"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.next_offset, None);
    }

    #[tokio::test]
    async fn test_search_filters_by_type() {
        let index = seeded().await;
        let mut req = request("batman");
        req.file_type = Some("document".to_string());

        let page = index.search(&req).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.files[0].file_name, "batman_comics.pdf");
    }

    #[tokio::test]
    async fn test_search_pages_through_results() {
        let index = seeded().await;
        let mut req = request("");
        req.max_results = 3;

        let first = index.search(&req).await.unwrap();
        assert_eq!(first.files.len(), 3);
        assert_eq!(first.next_offset, Some(3));
        assert_eq!(first.total, 4);

        req.offset = 3;
        let second = index.search(&req).await.unwrap();
        assert_eq!(second.files.len(), 1);
        assert_eq!(second.files[0].file_id, "1");
        assert_eq!(second.next_offset, None);
    }

    #[tokio::test]
    async fn test_save_file_rejects_duplicate_id() {
        let index = seeded().await;
        assert!(!index.save_file(record("1", "other.mkv", "video")).await.unwrap());
        assert_eq!(index.search(&request("")).await.unwrap().total, 4);
    }
}
