pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthUser, Claims};
pub use rate_limit::rate_limit_middleware;
