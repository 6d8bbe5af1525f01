pub mod auth_service;
pub mod expense_service;

pub use auth_service::{AuthService, AuthenticatedUser};
pub use expense_service::ExpenseService;
