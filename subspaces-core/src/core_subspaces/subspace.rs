//! Subspace data structures

use super::errors::{SubspacesError, SubspacesResult};
use super::types::{Address, SubspaceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A subspace is a tenant owning its own sections, groups and allowances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subspace {
    /// Unique identifier, never zero
    pub id: SubspaceId,

    /// Human-readable name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Account paying for granted allowances
    pub treasury: Option<Address>,

    /// Owner, bypasses every permission check
    pub owner: Address,

    /// Who created the subspace
    pub creator: Address,

    /// When the subspace was created
    pub creation_time: Timestamp,
}

impl Subspace {
    /// Create a new subspace record
    pub fn new(
        id: SubspaceId,
        name: impl Into<String>,
        description: impl Into<String>,
        treasury: Option<Address>,
        owner: Address,
        creator: Address,
        creation_time: Timestamp,
    ) -> Self {
        Subspace {
            id,
            name: name.into(),
            description: description.into(),
            treasury,
            owner,
            creator,
            creation_time,
        }
    }

    /// Check the record for structural problems
    pub fn validate(&self) -> SubspacesResult<()> {
        if self.id == 0 {
            return Err(SubspacesError::InvalidRequest("invalid subspace id: 0".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(SubspacesError::InvalidRequest("subspace name cannot be empty".to_string()));
        }
        if let Some(treasury) = &self.treasury {
            treasury
                .validate()
                .map_err(|e| SubspacesError::InvalidRequest(format!("invalid treasury: {}", e)))?;
        }
        self.owner
            .validate()
            .map_err(|e| SubspacesError::InvalidRequest(format!("invalid owner: {}", e)))?;
        self.creator
            .validate()
            .map_err(|e| SubspacesError::InvalidRequest(format!("invalid creator: {}", e)))?;
        Ok(())
    }

    /// Apply an update, leaving `None` fields untouched
    pub fn update(&self, update: SubspaceUpdate) -> Subspace {
        Subspace {
            id: self.id,
            name: update.name.unwrap_or_else(|| self.name.clone()),
            description: update.description.unwrap_or_else(|| self.description.clone()),
            treasury: update.treasury.unwrap_or_else(|| self.treasury.clone()),
            owner: update.owner.unwrap_or_else(|| self.owner.clone()),
            creator: self.creator.clone(),
            creation_time: self.creation_time,
        }
    }
}

/// Fields to change on a subspace; `None` means "do not modify"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubspaceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the treasury
    pub treasury: Option<Option<Address>>,
    pub owner: Option<Address>,
}

/// Per-subspace user lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserListKind {
    Admins,
    Registered,
    Banned,
}

impl UserListKind {
    /// Byte used for this list in store keys
    pub fn as_byte(&self) -> u8 {
        match self {
            UserListKind::Admins => 1,
            UserListKind::Registered => 2,
            UserListKind::Banned => 3,
        }
    }
}

impl fmt::Display for UserListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserListKind::Admins => write!(f, "admins"),
            UserListKind::Registered => write!(f, "registered users"),
            UserListKind::Banned => write!(f, "banned users"),
        }
    }
}
