//! User group data structures

use super::errors::{SubspacesError, SubspacesResult};
use super::permission::Permissions;
use super::types::{GroupId, SectionId, SubspaceId, DEFAULT_GROUP_ID, ROOT_SECTION_ID};
use serde::{Deserialize, Serialize};

/// A named set of users sharing a permission mask, scoped to one section.
///
/// Members are stored as separate entries keyed by
/// `(subspace, group, user)`; see `Keeper::group_members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub subspace_id: SubspaceId,
    pub section_id: SectionId,
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub permissions: Permissions,
}

impl UserGroup {
    /// Create a new group
    pub fn new(
        subspace_id: SubspaceId,
        section_id: SectionId,
        id: GroupId,
        name: impl Into<String>,
        description: impl Into<String>,
        permissions: Permissions,
    ) -> Self {
        UserGroup {
            subspace_id,
            section_id,
            id,
            name: name.into(),
            description: description.into(),
            permissions,
        }
    }

    /// The default group every user belongs to
    pub fn default_group(subspace_id: SubspaceId) -> Self {
        UserGroup::new(
            subspace_id,
            ROOT_SECTION_ID,
            DEFAULT_GROUP_ID,
            "Default",
            "This is a default user group which all users are automatically part of",
            Permissions::empty(),
        )
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_GROUP_ID
    }

    /// Check the record for structural problems
    pub fn validate(&self) -> SubspacesResult<()> {
        if self.subspace_id == 0 {
            return Err(SubspacesError::InvalidRequest("invalid subspace id: 0".to_string()));
        }
        if self.is_default() && self.section_id != ROOT_SECTION_ID {
            return Err(SubspacesError::InvalidRequest(
                "default group must be in the root section".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(SubspacesError::InvalidRequest("group name cannot be empty".to_string()));
        }
        if Permissions::sanitize(self.permissions.bits()) != self.permissions {
            return Err(SubspacesError::InvalidRequest(format!(
                "invalid permission bits: {:#x}",
                self.permissions.bits()
            )));
        }
        Ok(())
    }

    /// Apply an update, leaving `None` fields untouched
    pub fn update(&self, update: UserGroupUpdate) -> UserGroup {
        UserGroup {
            subspace_id: self.subspace_id,
            section_id: self.section_id,
            id: self.id,
            name: update.name.unwrap_or_else(|| self.name.clone()),
            description: update.description.unwrap_or_else(|| self.description.clone()),
            permissions: update.permissions.unwrap_or(self.permissions),
        }
    }
}

/// Fields to change on a group; `None` means "do not modify"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserGroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Permissions>,
}
