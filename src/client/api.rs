use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::error::ClientError;
use super::session::{Session, TokenValidator};
use crate::models::{CreateExpenseRequest, Expense, ExpensePage, UserInfo};
use crate::services::auth_service::LoginResponse;
use crate::utils::error::ErrorBody;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the expense API. Sends the session's token on every
/// protected call and drops it when the server answers 401.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<Session>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /login. Stores the token on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ClientError> {
        log::debug!("🔐 POST /login - {}", email);

        let response = self
            .http
            .post(self.url("/login"))
            .header("Accept", "application/json")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        // A 401 here means wrong credentials, not a stale session
        let body: LoginResponse = decode(response).await?;
        self.session.set_token(&body.token)?;
        Ok(body.token)
    }

    pub async fn current_user(&self) -> Result<UserInfo, ClientError> {
        let request = self.http.get(self.url("/user"));
        self.send_protected(request).await
    }

    pub async fn list_expenses(&self, page: u64) -> Result<ExpensePage, ClientError> {
        let request = self
            .http
            .get(self.url("/expenses"))
            .query(&[("page", page.max(1))]);
        self.send_protected(request).await
    }

    pub async fn create_expense(
        &self,
        item_name: &str,
        amount: &str,
        date: &str,
    ) -> Result<Expense, ClientError> {
        let body = CreateExpenseRequest {
            item_name: Some(item_name.to_string()),
            amount: Some(amount_value(amount)),
            date: Some(Value::String(date.to_string())),
        };
        let request = self.http.post(self.url("/expenses")).json(&body);
        self.send_protected(request).await
    }

    pub async fn delete_expense(&self, expense_id: &str) -> Result<(), ClientError> {
        let path = format!("/expenses/{}", urlencoding::encode(expense_id));
        let response = self.authorized(self.http.delete(self.url(&path)))?.send().await?;
        self.check_session(&response)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self
            .session
            .token()?
            .ok_or_else(|| ClientError::Unauthenticated("Not logged in".to_string()))?;
        Ok(request
            .header("Accept", "application/json")
            .bearer_auth(token))
    }

    async fn send_protected<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.authorized(request)?.send().await?;
        self.check_session(&response)?;
        decode(response).await
    }

    /// 401 on a protected call: the token is dead, forget it.
    fn check_session(&self, response: &Response) -> Result<(), ClientError> {
        if response.status() == StatusCode::UNAUTHORIZED {
            log::info!("🔒 Server rejected the token, clearing session");
            self.session.clear()?;
        }
        Ok(())
    }
}

#[async_trait]
impl TokenValidator for ApiClient {
    async fn validate(&self, token: &str) -> Result<bool, ClientError> {
        let response = self
            .http
            .get(self.url("/user"))
            .header("Accept", "application/json")
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            _ => Err(error_from(response).await),
        }
    }
}

/// Numbers go out as JSON numbers; anything else as typed, so the server
/// reports it as a field error.
fn amount_value(raw: &str) -> Value {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Transport(format!("Failed to parse response: {}", e)))
}

async fn error_from(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_for_status(status, &body)
}

fn error_for_status(status: StatusCode, body: &str) -> ClientError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        });

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthenticated(message),
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
            message,
            errors: parsed.and_then(|b| b.errors).unwrap_or_default(),
        },
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    }
}
