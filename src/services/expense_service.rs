// ==================== EXPENSES ====================
// Every operation runs for the principal passed in; no user id is ever
// taken from the request.

use crate::{
    database::ExpenseRepository,
    models::{CreateExpenseRequest, Expense, ExpensePage, PER_PAGE},
    services::auth_service::AuthenticatedUser,
    utils::{error::AppError, time::now_millis},
};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

#[derive(Clone)]
pub struct ExpenseService {
    expenses: Arc<dyn ExpenseRepository>,
}

impl ExpenseService {
    pub fn new(expenses: Arc<dyn ExpenseRepository>) -> Self {
        Self { expenses }
    }

    /// One page (15 per page) of the caller's expenses, newest first.
    /// `path` is the listing URL used for the paginator links.
    pub async fn list(
        &self,
        principal: &AuthenticatedUser,
        page: u64,
        path: &str,
    ) -> Result<ExpensePage, AppError> {
        let page = page.max(1);
        let (data, total) = self
            .expenses
            .find_expenses_by_owner(principal.user_id(), page, PER_PAGE)
            .await?;

        Ok(ExpensePage::new(data, total, page, PER_PAGE, path))
    }

    /// Validates and stores a new expense owned by the caller.
    pub async fn create(
        &self,
        principal: &AuthenticatedUser,
        request: CreateExpenseRequest,
    ) -> Result<Expense, AppError> {
        let new_expense = request.into_new_expense()?;
        let now = now_millis();

        let expense = Expense {
            id: ObjectId::new().to_hex(),
            item_name: new_expense.item_name,
            amount: new_expense.amount,
            date: new_expense.date,
            user_id: principal.user_id().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.expenses.insert_expense(&expense).await?;
        log::info!("✅ Expense {} created for user {}", expense.id, expense.user_id);

        Ok(expense)
    }

    /// Not found -> 404 before ownership is looked at; foreign -> 403, untouched.
    pub async fn destroy(
        &self,
        principal: &AuthenticatedUser,
        expense_id: &str,
    ) -> Result<(), AppError> {
        let expense = self
            .expenses
            .find_expense_by_id(expense_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Expense".to_string()))?;

        if expense.user_id != principal.user_id() {
            log::warn!(
                "⚠️ User {} tried to delete expense {} owned by {}",
                principal.user_id(),
                expense.id,
                expense.user_id
            );
            return Err(AppError::Forbidden);
        }

        // Lost a race with another delete of the same record
        if !self.expenses.delete_expense(&expense.id).await? {
            return Err(AppError::NotFound("Expense".to_string()));
        }

        log::info!("🗑️ Expense {} deleted by user {}", expense.id, principal.user_id());
        Ok(())
    }

    /// Declared but without defined behavior yet.
    pub async fn show(
        &self,
        _principal: &AuthenticatedUser,
        _expense_id: &str,
    ) -> Result<Expense, AppError> {
        Err(AppError::NotImplemented(
            "Reading a single expense is not supported yet".to_string(),
        ))
    }

    /// Declared but without defined behavior yet.
    pub async fn update(
        &self,
        _principal: &AuthenticatedUser,
        _expense_id: &str,
    ) -> Result<Expense, AppError> {
        Err(AppError::NotImplemented(
            "Updating an expense is not supported yet".to_string(),
        ))
    }
}
