//! Bearer token handling
//!
//! Tokens are HS256 JWTs whose `sub` claim is the caller id that scopes every
//! storage path to `users/{sub}/`.

mod token;

pub use token::{create_access_token, verify_token, ACCESS_TOKEN_HOURS};
