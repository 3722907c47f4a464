//! Core types for Prime Shine.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod day_offset;
pub mod email;
pub mod id;

pub use day_offset::{DayOffset, DayOffsetError};
pub use email::{Email, EmailError};
pub use id::*;
