//! Backend abstraction for credkeep.
//!
//! A backend is a pluggable service definition that accounts authenticate
//! against. This crate provides the capability trait each backend type
//! implements, the option schema used to validate account configuration,
//! and the registry that maps backend type names to implementations.
//!
//! # Design Principles
//! - Capability table: new backend types are added by registering an
//!   implementer of [`Backend`], never by specializing account records
//! - Async status checks: backends may talk to slow remote services
//! - Unified error semantics: backends report failures as
//!   `Error::BackendUnavailable`

pub mod backend;
pub mod registry;
pub mod schema;
pub mod static_backend;

pub use backend::{Backend, LiveStatus, StatusReport, DEFAULT_MIN_REFRESH_INTERVAL};
pub use registry::{create_default_registry, BackendRegistry, OFFLINE_BACKEND};
pub use schema::{ConfigOption, ConfigSchema, OptionKind};
pub use static_backend::StaticBackend;
