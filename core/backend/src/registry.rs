//! Backend registry for resolving backend types by name.

use std::collections::HashMap;
use std::sync::Arc;

use credkeep_common::{Error, Result};

use crate::backend::Backend;
use crate::static_backend::StaticBackend;

/// Name of the built-in backend that needs no remote service.
pub const OFFLINE_BACKEND: &str = "offline";

/// Registry of available backend types.
///
/// Populated at startup by whatever discovers backends and read-mostly
/// afterwards. Swapping a registry for a reloaded one is done by the owner
/// holding it behind an `Arc`.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own name.
    ///
    /// # Preconditions
    /// - `backend.name()` must be unique within the registry
    ///
    /// # Postconditions
    /// - Backend can be described by name
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, backend: Arc<dyn Backend>) -> Result<()> {
        let name = backend.name().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Backend name cannot be empty".to_string(),
            ));
        }
        if self.backends.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Backend '{}' is already registered",
                name
            )));
        }
        self.backends.insert(name, backend);
        Ok(())
    }

    /// Resolve a backend by type name.
    ///
    /// # Errors
    /// - `UnknownBackend` if the type is not registered
    pub fn describe(&self, backend_type: &str) -> Result<Arc<dyn Backend>> {
        self.backends
            .get(backend_type)
            .cloned()
            .ok_or_else(|| Error::UnknownBackend(backend_type.to_string()))
    }

    /// Registered backend type names, sorted.
    pub fn list_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a backend type is registered.
    pub fn has_backend(&self, backend_type: &str) -> bool {
        self.backends.contains_key(backend_type)
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Create a registry with the built-in backends.
pub fn create_default_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry
        .backends
        .insert(OFFLINE_BACKEND.to_string(), Arc::new(StaticBackend::new(OFFLINE_BACKEND)));
    registry
}
