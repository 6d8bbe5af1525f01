use std::env;

pub const MEMORY_DATABASE_URL: &str = "memory://";

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;
/// Ten years
const MAX_TOKEN_TTL_MINUTES: i64 = 10 * 365 * 24 * 60;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Server configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub bcrypt_cost: u32,
    /// Sliding inactivity window; None = tokens never expire
    pub token_ttl_minutes: Option<i64>,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| format!("PORT must be a port number, got '{}'", raw))?,
            None => 8000,
        };

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| "DATABASE_URL must be set".to_string())?;

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => {
                let cost = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("BCRYPT_COST must be an integer, got '{}'", raw))?;
                if !(4..=31).contains(&cost) {
                    return Err(format!("BCRYPT_COST must be between 4 and 31, got {}", cost));
                }
                cost
            }
            None => bcrypt::DEFAULT_COST,
        };

        let token_ttl_minutes = match lookup("TOKEN_TTL_MINUTES") {
            Some(raw) => {
                let minutes = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("TOKEN_TTL_MINUTES must be an integer, got '{}'", raw))?;
                match minutes {
                    0 => None,
                    m if m < 0 => {
                        return Err(format!("TOKEN_TTL_MINUTES must not be negative, got {}", m))
                    }
                    m if m > MAX_TOKEN_TTL_MINUTES || chrono::Duration::try_minutes(m).is_none() => {
                        return Err(format!(
                            "TOKEN_TTL_MINUTES must be at most {} (ten years), got {}",
                            MAX_TOKEN_TTL_MINUTES, m
                        ))
                    }
                    m => Some(m),
                }
            }
            None => Some(DEFAULT_TOKEN_TTL_MINUTES),
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(AppConfig {
            host,
            port,
            database_url,
            bcrypt_cost,
            token_ttl_minutes,
            cors_allowed_origins,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DATABASE_URL)
    }
}
