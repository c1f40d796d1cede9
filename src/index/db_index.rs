use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{Level, event};

use crate::{
    db,
    index::{
        FileIndex, FileRecord, IndexError, Matcher, SearchRequest, SearchResultPage,
        next_page_offset, paginate,
    },
};

const SELECT_FILES: &str = "SELECT file_id, file_name, file_size, caption, file_type FROM files";

#[derive(sqlx::FromRow)]
struct FileRow {
    file_id: String,
    file_name: String,
    file_size: Option<i64>,
    caption: Option<String>,
    file_type: String,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        Self {
            file_id: row.file_id,
            file_name: row.file_name,
            file_size: row.file_size.and_then(|size| u64::try_from(size).ok()),
            caption: row.caption,
            file_type: row.file_type,
        }
    }
}

/// Escapes `LIKE` wildcards so a word only matches itself.
fn escape_like(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One substring pattern per ASCII word of the term.
///
/// SQLite's `LIKE` only folds ASCII case, so other words are left to the
/// regex matcher.
fn like_patterns(term: &str) -> Vec<String> {
    term.trim()
        .split(' ')
        .filter(|word| !word.is_empty() && word.is_ascii())
        .map(|word| format!("%{}%", escape_like(word)))
        .collect()
}

fn push_all_like(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, patterns: &[String]) {
    builder.push("(");
    for (i, pattern) in patterns.iter().enumerate() {
        if i > 0 {
            builder.push(" AND ");
        }
        builder
            .push(column)
            .push(" LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\'");
    }
    builder.push(")");
}

/// Appends the `WHERE` clause narrowing `files` to rows that can match.
///
/// Every row the regex matcher accepts passes this filter; for an empty
/// term the two agree exactly.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, request: &SearchRequest) {
    builder.push(" WHERE 1 = 1");
    if let Some(file_type) = request.file_type.as_deref().filter(|t| !t.is_empty()) {
        builder.push(" AND file_type = ").push_bind(file_type.to_string());
    }

    if request.term.trim().is_empty() {
        builder.push(" AND (file_name != ''");
        if request.use_caption_filter {
            builder.push(" OR caption != ''");
        }
        builder.push(")");
        return;
    }

    let patterns = like_patterns(&request.term);
    if patterns.is_empty() {
        return;
    }
    builder.push(" AND (");
    push_all_like(builder, "file_name", &patterns);
    if request.use_caption_filter {
        builder.push(" OR ");
        push_all_like(builder, "caption", &patterns);
    }
    builder.push(")");
}

fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// SQLite-backed index
///
/// Type filtering and a substring pre-filter run in SQL; the shared regex
/// matcher then decides on the remaining candidates since SQLite has no
/// built-in `REGEXP`. Browsing with an empty term is paged entirely in SQL.
pub struct DbIndex {
    db: Pool<Sqlite>,
}

impl DbIndex {
    pub async fn new(database_url: &str) -> Result<Self, IndexError> {
        event!(Level::INFO, "Trying to init_db...");
        let db = db::sqlite::init_db(database_url).await?;
        event!(Level::INFO, "init_db succeed!");
        Ok(Self::from_pool(db))
    }

    pub fn from_pool(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    async fn recent(&self, request: &SearchRequest) -> Result<SearchResultPage, IndexError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM files");
        push_filters(&mut count, request);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;
        let total = usize::try_from(total).unwrap_or_default();

        let mut select = QueryBuilder::new(SELECT_FILES);
        push_filters(&mut select, request);
        select
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(to_sql_int(request.max_results))
            .push(" OFFSET ")
            .push_bind(to_sql_int(request.offset));
        let rows: Vec<FileRow> = select.build_query_as().fetch_all(&self.db).await?;

        Ok(SearchResultPage {
            files: rows.into_iter().map(FileRecord::from).collect(),
            next_offset: next_page_offset(request, total),
            total,
        })
    }
}

#[async_trait]
impl FileIndex for DbIndex {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, IndexError> {
        if request.term.trim().is_empty() {
            return self.recent(request).await;
        }

        let matcher = Matcher::new(request)?;
        let mut select = QueryBuilder::new(SELECT_FILES);
        push_filters(&mut select, request);
        select.push(" ORDER BY id DESC");
        let rows: Vec<FileRow> = select.build_query_as().fetch_all(&self.db).await?;
        event!(Level::DEBUG, "{} candidate row(s) for {:?}", rows.len(), request.term);

        let matched = rows
            .into_iter()
            .map(FileRecord::from)
            .filter(|record| matcher.accepts(record))
            .collect();

        Ok(paginate(matched, request))
    }

    async fn save_file(&self, record: FileRecord) -> Result<bool, IndexError> {
        let result = sqlx::query(
            "INSERT INTO files (file_id, file_name, file_size, caption, file_type)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(file_id) DO NOTHING",
        )
        .bind(&record.file_id)
        .bind(&record.file_name)
        .bind(record.file_size.and_then(|size| i64::try_from(size).ok()))
        .bind(record.caption.as_deref())
        .bind(&record.file_type)
        .execute(&self.db)
        .await?;

        event!(
            Level::DEBUG,
            "save_file {}: {} row(s)",
            record.file_id,
            result.rows_affected()
        );
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{record, request};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_db() -> DbIndex {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::sqlite::create_schema(&pool).await.unwrap();
        DbIndex::from_pool(pool)
    }

    #[tokio::test]
    async fn test_round_trip_keeps_optional_fields() {
        let index = memory_db().await;
        let mut file = record("abc", "Lecture.01.mp4", "video");
        file.caption = Some("Lecture one".to_string());
        file.file_size = None;
        assert!(index.save_file(file.clone()).await.unwrap());

        let page = index.search(&request("lecture")).await.unwrap();
        assert_eq!(page.files, vec![file]);
    }

    #[tokio::test]
    async fn test_duplicate_file_id_is_skipped() {
        let index = memory_db().await;
        assert!(index.save_file(record("abc", "a.pdf", "document")).await.unwrap());
        assert!(!index.save_file(record("abc", "b.pdf", "document")).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_orders_filters_and_pages() {
        let index = memory_db().await;
        for i in 0..12 {
            index
                .save_file(record(&format!("v{i}"), &format!("Show.S01E{i:02}.mkv"), "video"))
                .await
                .unwrap();
        }
        index
            .save_file(record("d0", "Show.Guide.pdf", "document"))
            .await
            .unwrap();

        let mut req = request("show");
        req.file_type = Some("video".to_string());
        let page = index.search(&req).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.files.len(), 10);
        assert_eq!(page.files[0].file_id, "v11");
        assert_eq!(page.next_offset, Some(10));

        req.offset = 10;
        let page = index.search(&req).await.unwrap();
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.next_offset, None);

        let all = index.search(&request("show")).await.unwrap();
        assert_eq!(all.total, 13);
        assert_eq!(all.files[0].file_id, "d0");
    }

    #[test]
    fn test_like_patterns_escape_wildcards_and_skip_non_ascii() {
        assert_eq!(like_patterns("100% a_b"), vec![r"%100\%%", r"%a\_b%"]);
        assert_eq!(like_patterns(r"c:\docs"), vec![r"%c:\\docs%"]);
        assert_eq!(like_patterns("ñandú  film"), vec!["%film%"]);
        assert!(like_patterns("   ").is_empty());
    }

    #[tokio::test]
    async fn test_candidates_still_pass_the_regex() {
        let index = memory_db().await;
        index.save_file(record("a", "BatmanBegins.mkv", "video")).await.unwrap();
        index.save_file(record("b", "Batman.1989.mkv", "video")).await.unwrap();
        index.save_file(record("c", "a_b.pdf", "document")).await.unwrap();
        index.save_file(record("d", "axb.pdf", "document")).await.unwrap();

        let page = index.search(&request("batman")).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.files[0].file_id, "b");

        let page = index.search(&request("a_b")).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.files[0].file_id, "c");
    }

    #[tokio::test]
    async fn test_non_ascii_terms_fold_case() {
        let index = memory_db().await;
        index.save_file(record("n", "Ñandú.mp4", "video")).await.unwrap();

        let page = index.search(&request("ñandú")).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_empty_term_pages_in_sql() {
        let index = memory_db().await;
        for i in 0..15 {
            index
                .save_file(record(&format!("f{i}"), &format!("file{i}.pdf"), "document"))
                .await
                .unwrap();
        }
        index.save_file(record("v", "clip.mp4", "video")).await.unwrap();

        let mut req = request("");
        req.file_type = Some("document".to_string());
        let page = index.search(&req).await.unwrap();
        assert_eq!(page.total, 15);
        assert_eq!(page.files.len(), 10);
        assert_eq!(page.files[0].file_id, "f14");
        assert_eq!(page.next_offset, Some(10));

        req.offset = 10;
        let page = index.search(&req).await.unwrap();
        assert_eq!(page.files.len(), 5);
        assert_eq!(page.files[4].file_id, "f0");
        assert_eq!(page.next_offset, None);

        req.offset = usize::MAX;
        let page = index.search(&req).await.unwrap();
        assert!(page.files.is_empty());
        assert_eq!(page.next_offset, None);
    }
}
