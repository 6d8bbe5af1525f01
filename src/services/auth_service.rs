use crate::{
    database::{TokenRepository, UserRepository},
    models::{AccessToken, User, UserInfo},
    utils::{error::AppError, time::now_millis},
};
use base64::Engine;
use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Name recorded on every issued token
pub const TOKEN_NAME: &str = "api-token";

// Request/Response structures
#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginRequest {
    #[validate(
        required(message = "The email field is required."),
        email(message = "The email field must be a valid email address.")
    )]
    #[schema(value_type = String, example = "jane@example.com")]
    pub email: Option<String>,

    #[validate(
        required(message = "The password field is required."),
        length(min = 1, message = "The password field is required.")
    )]
    #[schema(value_type = String)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegisterRequest {
    #[validate(
        required(message = "The email field is required."),
        email(message = "The email field must be a valid email address.")
    )]
    #[schema(value_type = String, example = "jane@example.com")]
    pub email: Option<String>,

    #[validate(
        required(message = "The password field is required."),
        length(min = 8, message = "The password field must be at least 8 characters.")
    )]
    #[schema(value_type = String)]
    pub password: Option<String>,

    #[validate(length(max = 255, message = "The name field must not be greater than 255 characters."))]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Principal resolved from a bearer token; handed explicitly to every
/// expense operation.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token_id: String,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    bcrypt_cost: u32,
    token_ttl: Option<Duration>,
    /// Verified against when the email is unknown, so both failures cost one bcrypt check
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        bcrypt_cost: u32,
        token_ttl_minutes: Option<i64>,
    ) -> Result<Self, AppError> {
        let token_ttl = match token_ttl_minutes {
            Some(minutes) => Some(Duration::try_minutes(minutes).ok_or_else(|| {
                AppError::Internal(format!("Token lifetime of {} minutes is out of range", minutes))
            })?),
            None => None,
        };

        let dummy_hash = hash(Uuid::new_v4().to_string(), bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(Self {
            users,
            tokens,
            bcrypt_cost,
            token_ttl,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    // User login
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        request.validate()?;

        let email = normalize_email(request.email.as_deref().unwrap_or_default());
        let password = request.password.unwrap_or_default();

        let user = self.users.find_user_by_email(&email).await?;

        let stored_hash = match &user {
            Some(user) => user.password.clone(),
            None => self.dummy_hash.to_string(),
        };
        let valid = verify_password(password, stored_hash).await?;

        let user = match user {
            Some(user) if valid => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        let token = self.issue_token(&user).await?;
        log::info!("✅ Token issued for user {}", user.user_id);

        Ok(LoginResponse { token })
    }

    // User registration
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AppError> {
        request.validate()?;

        let email = normalize_email(request.email.as_deref().unwrap_or_default());
        let password = request.password.unwrap_or_default();
        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let now = now_millis();

        let user = User {
            user_id: ObjectId::new().to_hex(),
            email,
            password: password_hash,
            name,
            created_at: now,
            updated_at: now,
        };

        self.users.insert_user(&user).await?;
        log::info!("✅ User registered successfully: {}", user.email);

        let token = self.issue_token(&user).await?;

        Ok(RegisterResponse {
            token,
            user: UserInfo::from(&user),
        })
    }

    /// Bearer token -> user. Expired tokens are deleted when seen.
    pub async fn resolve(&self, raw_token: &str) -> Result<AuthenticatedUser, AppError> {
        let token = self
            .tokens
            .find_token_by_hash(&hash_token(raw_token))
            .await?
            .ok_or(AppError::Unauthenticated)?;

        let now = now_millis();

        if token.is_expired(now) {
            log::info!("⌛ Token {} expired, removing", token.id);
            self.tokens.delete_token(&token.id).await?;
            return Err(AppError::Unauthenticated);
        }

        let user = match self.users.find_user_by_id(&token.user_id).await? {
            Some(user) => user,
            None => {
                log::warn!("⚠️ Token {} belongs to missing user {}", token.id, token.user_id);
                self.tokens.delete_token(&token.id).await?;
                return Err(AppError::Unauthenticated);
            }
        };

        self.tokens
            .touch_token(&token.id, now, self.expiry_from(now)?)
            .await?;

        Ok(AuthenticatedUser {
            user,
            token_id: token.id,
        })
    }

    /// End of the inactivity window starting at `now`; None when tokens never expire.
    fn expiry_from(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, AppError> {
        match self.token_ttl {
            Some(ttl) => now
                .checked_add_signed(ttl)
                .map(Some)
                .ok_or_else(|| AppError::Internal("Token expiry is out of range".to_string())),
            None => Ok(None),
        }
    }

    async fn issue_token(&self, user: &User) -> Result<String, AppError> {
        let raw = generate_raw_token();
        let now = now_millis();

        let token = AccessToken {
            id: ObjectId::new().to_hex(),
            user_id: user.user_id.clone(),
            name: TOKEN_NAME.to_string(),
            token_hash: hash_token(&raw),
            created_at: now,
            last_used_at: None,
            expires_at: self.expiry_from(now)?,
        };

        self.tokens.insert_token(&token).await?;

        Ok(raw)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 32 random bytes (two v4 UUIDs), URL-safe base64
fn generate_raw_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest; the only form of a token that is stored
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// bcrypt is CPU bound; keep it off the request workers
async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify(password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn service_with_ttl(store: &Arc<MemoryStore>, ttl: Option<i64>) -> AuthService {
        AuthService::new(store.clone(), store.clone(), 4, ttl).unwrap()
    }

    #[test]
    fn test_out_of_range_ttl_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let result = AuthService::new(store.clone(), store.clone(), 4, Some(i64::MAX));
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_expiry_past_calendar_range_fails_cleanly() {
        let store = Arc::new(MemoryStore::new());
        // Fits in a Duration, but not when added to today
        let auth = service_with_ttl(&store, Some(100_000_000_000_000));

        let err = auth
            .register(register_request("jane@example.com", "correct-horse"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            name: Some("Jane".to_string()),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_login_token_resolves_to_same_user() {
        let store = Arc::new(MemoryStore::new());
        let auth = service_with_ttl(&store, Some(60));

        let registered = auth
            .register(register_request("jane@example.com", "correct-horse"))
            .await
            .unwrap();

        let login = auth
            .login(login_request("Jane@Example.com", "correct-horse"))
            .await
            .unwrap();
        assert_ne!(login.token, registered.token);

        let principal = auth.resolve(&login.token).await.unwrap();
        assert_eq!(principal.user_id(), registered.user.id);
        assert_eq!(principal.user.email, "jane@example.com");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let store = Arc::new(MemoryStore::new());
        let auth = service_with_ttl(&store, Some(60));
        auth.register(register_request("jane@example.com", "correct-horse"))
            .await
            .unwrap();

        let wrong_password = auth
            .login(login_request("jane@example.com", "wrong-horse"))
            .await
            .unwrap_err();
        let unknown_email = auth
            .login(login_request("nobody@example.com", "correct-horse"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_validation() {
        let store = Arc::new(MemoryStore::new());
        let auth = service_with_ttl(&store, None);

        let err = auth
            .login(LoginRequest {
                email: Some("not-an-email".to_string()),
                password: None,
            })
            .await
            .unwrap_err();

        match err {
            AppError::Validation(errors) => {
                assert_eq!(errors["email"], vec!["The email field must be a valid email address."]);
                assert_eq!(errors["password"], vec!["The password field is required."]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let store = Arc::new(MemoryStore::new());
        let auth = service_with_ttl(&store, None);
        auth.register(register_request("jane@example.com", "correct-horse"))
            .await
            .unwrap();

        let err = auth
            .register(register_request("JANE@example.com", "another-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let store = Arc::new(MemoryStore::new());
        let auth = service_with_ttl(&store, None);
        assert!(matches!(
            auth.resolve("not-a-real-token").await,
            Err(AppError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_and_removed() {
        let store = Arc::new(MemoryStore::new());
        let auth = service_with_ttl(&store, Some(60));
        let registered = auth
            .register(register_request("jane@example.com", "correct-horse"))
            .await
            .unwrap();

        let raw = "expired-token-value";
        let past = now_millis() - Duration::minutes(5);
        store
            .insert_token(&AccessToken {
                id: ObjectId::new().to_hex(),
                user_id: registered.user.id.clone(),
                name: TOKEN_NAME.to_string(),
                token_hash: hash_token(raw),
                created_at: past - Duration::hours(1),
                last_used_at: None,
                expires_at: Some(past),
            })
            .await
            .unwrap();

        assert!(matches!(auth.resolve(raw).await, Err(AppError::Unauthenticated)));
        assert!(store.find_token_by_hash(&hash_token(raw)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_slides_expiry() {
        let store = Arc::new(MemoryStore::new());
        let auth = service_with_ttl(&store, Some(30));
        let registered = auth
            .register(register_request("jane@example.com", "correct-horse"))
            .await
            .unwrap();

        let before = store
            .find_token_by_hash(&hash_token(&registered.token))
            .await
            .unwrap()
            .unwrap();
        assert!(before.last_used_at.is_none());

        auth.resolve(&registered.token).await.unwrap();

        let after = store
            .find_token_by_hash(&hash_token(&registered.token))
            .await
            .unwrap()
            .unwrap();
        let last_used = after.last_used_at.unwrap();
        assert_eq!(after.expires_at, Some(last_used + Duration::minutes(30)));
        assert!(after.expires_at >= before.expires_at);
    }

    #[test]
    fn test_raw_tokens_are_unique_and_url_safe() {
        let a = generate_raw_token();
        let b = generate_raw_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
