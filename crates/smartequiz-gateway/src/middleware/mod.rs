//! Request middleware: API key authentication, IP allowlisting, and rate
//! limiting.

pub mod auth;

pub use auth::{require_api_key, require_secret_key, AuthContext};
