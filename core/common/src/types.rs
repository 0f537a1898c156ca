//! Common types used throughout credkeep.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Backend-specific account options, keyed by option name.
pub type AccountConfig = BTreeMap<String, serde_json::Value>;

/// Unique identifier for a stored account.
///
/// Identifiers are random UUIDs and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its string form.
    ///
    /// # Errors
    /// - Returns error if `id` is not a valid UUID
    pub fn parse(id: &str) -> crate::Result<Self> {
        Uuid::parse_str(id.trim())
            .map(Self)
            .map_err(|e| crate::Error::InvalidInput(format!("Invalid account id '{}': {}", id, e)))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a user as supplied by the permission layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId from a string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "UserId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account secret (password, token) that zeroizes on drop.
///
/// Serializes transparently so stores can persist it; callers only ever
/// see account projections that leave it out.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for handing it to a backend.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

/// Authorized caller, produced by the permission layer before any core call.
///
/// The core trusts this pair completely and performs no authentication of
/// its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    user: UserId,
    administrative: bool,
}

impl CallerContext {
    /// Create a context for `user`.
    pub fn new(user: UserId, administrative: bool) -> Self {
        Self {
            user,
            administrative,
        }
    }

    /// The calling user.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Whether the caller has cross-owner rights.
    pub fn is_administrative(&self) -> bool {
        self.administrative
    }

    /// Whether the caller may modify, refresh or remove an account owned by `owner`.
    pub fn may_manage(&self, owner: &UserId) -> bool {
        self.administrative || &self.user == owner
    }

    /// Whether the caller may see an account owned by `owner`.
    pub fn may_view(&self, owner: &UserId, shared: bool) -> bool {
        shared || self.may_manage(owner)
    }
}
