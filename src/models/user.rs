use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account. `password` holds the bcrypt hash, never the secret.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,  // PRIMARY IDENTIFIER - ObjectId hex
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user (GET /user, register response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.user_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
