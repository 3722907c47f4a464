//! Business logic services.
//!
//! - `auth` - password registration, login and account edits
//! - `token` - signed bearer tokens for authenticated requests

pub mod auth;
pub mod token;
