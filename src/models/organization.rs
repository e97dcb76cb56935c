use serde::Serialize;
use sqlx::FromRow;

/// The slice of an organization record the sync pipeline reads
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    /// External ODK submission URI, absent for organizations never collected through ODK
    pub odk_uri: Option<String>,
}

impl Organization {
    /// The external identifier, treating blank values as absent
    pub fn external_id(&self) -> Option<&str> {
        self.odk_uri
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
