// core/src/auth/mod.rs

//! Token Service: password verification, bearer token issuance and the
//! server-side token records that back them.

pub mod password;
pub mod service;
pub mod token;

pub use password::{hash_password, verify_password};
pub use service::TokenService;
pub use token::{hash_token, Claims, IssuedToken, TokenConfig};
