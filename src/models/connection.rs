use sqlx::FromRow;

/// Named remote database connection profile
#[derive(Clone, FromRow)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: i64,
    pub database_name: String,
    pub username: String,
    pub password: String,
    pub is_active: bool,
}

impl ConnectionProfile {
    /// Everything a pooled connection was opened with. Carries the password,
    /// never log it.
    pub fn endpoint_key(&self) -> String {
        format!(
            "{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

// Keep the password out of logs
impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .field("username", &self.username)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}
