pub mod access_token;
pub mod expense;
pub mod pagination;
pub mod user;

pub use access_token::*;
pub use expense::*;
pub use pagination::*;
pub use user::*;
