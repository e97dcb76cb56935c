use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::ConnectionProfile;

/// Remote connection profile lookup
pub struct ConnectionService;

impl ConnectionService {
    /// Get the active profile with the given name
    pub async fn active_profile(db: &Database, name: &str) -> Result<ConnectionProfile> {
        let profile: Option<ConnectionProfile> = sqlx::query_as(
            r#"
            SELECT name, host, port, database_name, username, password, is_active
            FROM remote_connections
            WHERE name = ? AND is_active = 1
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(db.pool())
        .await?;

        profile.ok_or_else(|| {
            AppError::Configuration(format!(
                "No active remote connection profile named '{}'",
                name
            ))
        })
    }
}
