//! Prime Shine Core - Shared domain types.
//!
//! This crate provides the value types shared by the Prime Shine components:
//! - `api` - JSON backend for users, schedules and scheduled customers
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP. Enabling the `postgres` feature adds `sqlx` encode/decode
//! support so the types can be bound and read directly.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for entity IDs, emails and day offsets

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
