//! Prime Shine API library.
//!
//! JSON backend for users, weekly schedules, schedule days and scheduled
//! customer visits. Every mutating request runs in one lazily started
//! Postgres transaction that commits only if the whole request succeeds.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
