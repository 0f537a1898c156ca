//! Common utilities and types shared across credkeep crates.
//!
//! This module provides the error taxonomy, identifiers and the caller
//! context that every account operation is evaluated against.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{AccountConfig, AccountId, CallerContext, Secret, UserId};
