use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ExpenseRepository, TokenRepository, UserRepository};
use crate::models::{AccessToken, Expense, User};
use crate::utils::error::AppError;

/// Process-local store (`DATABASE_URL=memory://`). Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    /// token_hash -> record
    tokens: RwLock<HashMap<String, AccessToken>>,
    /// Insertion order; listing walks it backwards
    expenses: RwLock<Vec<Expense>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.email == user.email || u.user_id == user.user_id)
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.user_id == user_id).cloned())
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn insert_token(&self, token: &AccessToken) -> Result<(), AppError> {
        self.tokens
            .write()
            .await
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_token_by_hash(&self, token_hash: &str) -> Result<Option<AccessToken>, AppError> {
        Ok(self.tokens.read().await.get(token_hash).cloned())
    }

    async fn touch_token(
        &self,
        token_id: &str,
        last_used_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut tokens = self.tokens.write().await;
        if let Some(token) = tokens.values_mut().find(|t| t.id == token_id) {
            token.last_used_at = Some(last_used_at);
            token.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_token(&self, token_id: &str) -> Result<(), AppError> {
        self.tokens.write().await.retain(|_, t| t.id != token_id);
        Ok(())
    }
}

#[async_trait]
impl ExpenseRepository for MemoryStore {
    async fn insert_expense(&self, expense: &Expense) -> Result<(), AppError> {
        self.expenses.write().await.push(expense.clone());
        Ok(())
    }

    async fn find_expenses_by_owner(
        &self,
        owner_id: &str,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Expense>, u64), AppError> {
        let expenses = self.expenses.read().await;

        // Newest inserted first, then a stable sort so equal timestamps keep that order
        let mut owned: Vec<&Expense> = expenses
            .iter()
            .rev()
            .filter(|e| e.user_id == owner_id)
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = owned.len() as u64;
        let skip = page.saturating_sub(1).saturating_mul(per_page);
        let data = owned
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(per_page).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok((data, total))
    }

    async fn find_expense_by_id(&self, expense_id: &str) -> Result<Option<Expense>, AppError> {
        let expenses = self.expenses.read().await;
        Ok(expenses.iter().find(|e| e.id == expense_id).cloned())
    }

    async fn delete_expense(&self, expense_id: &str) -> Result<bool, AppError> {
        let mut expenses = self.expenses.write().await;
        let before = expenses.len();
        expenses.retain(|e| e.id != expense_id);
        Ok(expenses.len() < before)
    }
}
