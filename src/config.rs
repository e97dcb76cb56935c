use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub odk: OdkConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Bearer tokens are issued by the main PINOVARA backend; we only verify them.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OdkConfig {
    /// Name of the row in `remote_connections` to use
    #[serde(default = "default_odk_profile")]
    pub profile: String,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_photos_dir")]
    pub photos_dir: String,
    #[serde(default = "default_files_dir")]
    pub files_dir: String,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_db_path() -> String {
    "data/pinovara.db".to_string()
}

fn default_jwt_secret() -> String {
    "pinovara-dev-secret-change-it".to_string()
}

fn default_odk_profile() -> String {
    "odk_prod".to_string()
}

fn default_query_timeout() -> u64 {
    60
}

fn default_max_connections() -> u32 {
    2
}

fn default_photos_dir() -> String {
    "/var/pinovara/shared/uploads/fotos".to_string()
}

fn default_files_dir() -> String {
    "/var/pinovara/shared/uploads/arquivos".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
        }
    }
}

impl Default for OdkConfig {
    fn default() -> Self {
        Self {
            profile: default_odk_profile(),
            query_timeout_seconds: default_query_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            photos_dir: default_photos_dir(),
            files_dir: default_files_dir(),
        }
    }
}

impl OdkConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds.max(1))
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides(|key| env::var(key).ok());
        config.ensure_directories()?;
        if config.jwt.secret == default_jwt_secret() {
            tracing::warn!("Using the default JWT secret; set PV_CONF_JWT_SECRET in production");
        }
        tracing::info!(
            "Mirror directories: photos={}, files={}",
            config.mirror.photos_dir,
            config.mirror.files_dir
        );
        Ok(config)
    }

    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: PV_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("PV_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("PV_CONF_SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(val) = var("PV_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Some(val) = var("PV_CONF_JWT_SECRET") {
            self.jwt.secret = val;
        }

        if let Some(val) = var("PV_CONF_ODK_PROFILE") {
            if !val.trim().is_empty() {
                self.odk.profile = val;
            }
        }
        if let Some(secs) = var("PV_CONF_ODK_QUERY_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.odk.query_timeout_seconds = secs;
        }
        if let Some(n) = var("PV_CONF_ODK_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.odk.max_connections = n;
        }

        if let Some(val) = var("PV_CONF_MIRROR_PHOTOS_DIR") {
            self.mirror.photos_dir = val;
        }
        if let Some(val) = var("PV_CONF_MIRROR_FILES_DIR") {
            self.mirror.files_dir = val;
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.mirror.photos_dir)?;
        fs::create_dir_all(&self.mirror.files_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.odk.profile, "odk_prod");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.odk.query_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [mirror]
            photos_dir = "/tmp/fotos"
            "#,
        )
        .unwrap();
        assert_eq!(config.mirror.photos_dir, "/tmp/fotos");
        assert_eq!(config.mirror.files_dir, default_files_dir());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PV_CONF_SERVER_PORT", "8080"),
            ("PV_CONF_ODK_PROFILE", "odk_homolog"),
            ("PV_CONF_ODK_QUERY_TIMEOUT", "not-a-number"),
            ("PV_CONF_MIRROR_FILES_DIR", "/srv/arquivos"),
        ]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.odk.profile, "odk_homolog");
        assert_eq!(config.odk.query_timeout_seconds, 60);
        assert_eq!(config.mirror.files_dir, "/srv/arquivos");
    }
}
