use chrono::{DateTime, Utc};

/// Personal access token record. Only the SHA-256 digest of the bearer
/// value is kept; the raw value exists once, in the login response.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    /// None = never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}
