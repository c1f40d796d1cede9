use sqlx::{Error, Pool, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::{error, info};

/// Opens (creating if needed) the SQLite database behind the file index.
pub async fn init_db(database_url: &str) -> Result<Pool<Sqlite>, Error> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url).await?;
    }

    let db = SqlitePool::connect(database_url).await.map_err(|err| {
        error!("Failed to connect to database: {:?}", err);
        err
    })?;

    create_schema(&db).await?;
    Ok(db)
}

pub async fn create_schema(db: &Pool<Sqlite>) -> Result<(), Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            file_size INTEGER,
            caption TEXT,
            file_type TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(db)
    .await
    .map_err(|err| {
        error!("Failed to create files table: {:?}", err);
        err
    })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS files_file_type ON files (file_type)")
        .execute(db)
        .await?;

    Ok(())
}
