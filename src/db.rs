use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::error::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database with the schema applied
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Self { pool };
        db.run_migrations().await.unwrap();
        db
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to be returned
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                odk_uri TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS remote_connections (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                host TEXT NOT NULL,
                port INTEGER NOT NULL DEFAULT 5432,
                database_name TEXT NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Both attachment indexes share one shape
        for table in ["organization_photos", "organization_files"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY,
                    organization_id INTEGER NOT NULL,
                    file_name TEXT NOT NULL,
                    odk_uri TEXT UNIQUE NOT NULL,
                    size_bytes INTEGER NOT NULL DEFAULT 0,
                    observation TEXT,
                    group_label TEXT,
                    remote_created_at TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
                )
                "#
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_organization_id ON {table}(organization_id)"
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_organizations_odk_uri ON organizations(odk_uri)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}
