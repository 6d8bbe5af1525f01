pub mod auth;
pub mod expenses;
pub mod health;
pub mod swagger;
