use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::error::ClientError;
use super::storage::{TokenStorage, TOKEN_KEY};

/// How long a successful validation is reused.
pub const DEFAULT_VALIDATION_TTL: Duration = Duration::from_secs(60);

/// Asks the server whether a token is still accepted.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Ok(false) means the server rejected the token (401).
    async fn validate(&self, token: &str) -> Result<bool, ClientError>;
}

struct CachedValidation {
    token: String,
    checked_at: Instant,
}

/// The client's authentication state: the stored token plus when it was
/// last confirmed by the server.
pub struct Session {
    storage: Box<dyn TokenStorage>,
    validation_ttl: Duration,
    cache: Mutex<Option<CachedValidation>>,
}

impl Session {
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        Self::with_validation_ttl(storage, DEFAULT_VALIDATION_TTL)
    }

    pub fn with_validation_ttl(storage: Box<dyn TokenStorage>, validation_ttl: Duration) -> Self {
        Self {
            storage,
            validation_ttl,
            cache: Mutex::new(None),
        }
    }

    pub fn token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    /// Presence check only.
    pub fn has_token(&self) -> Result<bool, ClientError> {
        Ok(self.token()?.is_some())
    }

    /// Stores a freshly issued token. It is known to be valid.
    pub fn set_token(&self, token: &str) -> Result<(), ClientError> {
        self.storage.set(TOKEN_KEY, token)?;
        self.remember(token);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        *self.cache_guard() = None;
        self.storage.remove(TOKEN_KEY)
    }

    /// Validity check. No token means no network call; a rejected token is
    /// removed from storage.
    pub async fn is_authenticated(&self, validator: &dyn TokenValidator) -> Result<bool, ClientError> {
        let token = match self.token()? {
            Some(token) => token,
            None => return Ok(false),
        };

        if self.is_cached(&token) {
            return Ok(true);
        }

        let valid = validator.validate(&token).await?;
        if valid {
            self.remember(&token);
        } else {
            log::info!("🔒 Stored token was rejected, clearing it");
            self.clear()?;
        }

        Ok(valid)
    }

    fn is_cached(&self, token: &str) -> bool {
        self.cache_guard()
            .as_ref()
            .is_some_and(|c| c.token == token && c.checked_at.elapsed() < self.validation_ttl)
    }

    fn remember(&self, token: &str) {
        *self.cache_guard() = Some(CachedValidation {
            token: token.to_string(),
            checked_at: Instant::now(),
        });
    }

    fn cache_guard(&self) -> std::sync::MutexGuard<'_, Option<CachedValidation>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
