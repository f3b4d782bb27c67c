use anyhow::Result;
use sqlx::migrate::MigrateDatabase;
use sqlx::{Pool, Sqlite, sqlite::SqlitePoolOptions};

#[derive(Clone)]
pub struct Db {
    pub pool: Pool<Sqlite>,
}

impl Db {
    pub async fn connect(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        // An in-memory database lives and dies with its connection, so keep exactly one.
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(db_url).await?;

        sqlx::migrate!().run(&pool).await?;
        tracing::debug!("database ready at {db_url}");
        Ok(Self { pool })
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> Db {
    Db::connect("sqlite::memory:")
        .await
        .expect("in-memory database should open")
}
