//! Persistence seams. Services only see these traits; `MongoDB` backs
//! production and `MemoryStore` backs `memory://` and the test suite.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoDB;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AccessToken, Expense, User};
use crate::utils::error::AppError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `AppError::Conflict` when the email is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert_token(&self, token: &AccessToken) -> Result<(), AppError>;

    async fn find_token_by_hash(&self, token_hash: &str) -> Result<Option<AccessToken>, AppError>;

    /// Records a use and moves the sliding expiry.
    async fn touch_token(
        &self,
        token_id: &str,
        last_used_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    async fn delete_token(&self, token_id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    async fn insert_expense(&self, expense: &Expense) -> Result<(), AppError>;

    /// One page of the owner's expenses, newest first, plus the owner's total.
    /// `page` is 1-based.
    async fn find_expenses_by_owner(
        &self,
        owner_id: &str,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Expense>, u64), AppError>;

    async fn find_expense_by_id(&self, expense_id: &str) -> Result<Option<Expense>, AppError>;

    /// Returns false when nothing was deleted.
    async fn delete_expense(&self, expense_id: &str) -> Result<bool, AppError>;
}
