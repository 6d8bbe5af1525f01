//! Client Application: persisted token, navigation guard and API calls.

pub mod api;
pub mod error;
pub mod router;
pub mod session;
pub mod storage;

pub use api::ApiClient;
pub use error::ClientError;
pub use router::{guard, navigate, Navigation, Route};
pub use session::{Session, TokenValidator};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage, TOKEN_KEY};
