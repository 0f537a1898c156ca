//! Account management core for credkeep.
//!
//! This module provides:
//! - Account records with ownership, sharing and cached backend status
//! - The account store boundary with in-memory and JSON-file stores
//! - The account manager applying access policy and coordinating refresh
//! - The permission-gated API façade in front of the manager
//!
//! # Architecture
//! Callers go through [`AccountApi`], which authorizes a session into a
//! [`credkeep_common::CallerContext`] and forwards to [`AccountManager`].
//! The manager is the only component touching the store and the backend
//! registry.

pub mod api;
pub mod config;
pub mod locks;
pub mod manager;
pub mod record;
pub mod store;

pub use api::{authorize, AccountApi, Permission, Role, Session};
pub use config::{ManagerConfig, StoreConfig};
pub use locks::IdentityLocks;
pub use manager::{AccountManager, AccountView};
pub use record::{
    AccountInfo, AccountRecord, InfoUpdate, RefreshApplied, RefreshResult, RefreshStep,
    RefreshTicket,
};
pub use store::{AccountStore, LocalStore, MemoryStore};
