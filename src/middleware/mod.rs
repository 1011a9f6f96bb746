pub mod auth;
pub mod response;

pub use auth::{require_user, Caller, CurrentUser, UserToken};
pub use response::{ApiResponse, ApiResult};
