//! Request middleware

pub mod auth;

pub use auth::{auth_middleware, encode_token, require_admin, AuthUser, Claims, CurrentUser};
