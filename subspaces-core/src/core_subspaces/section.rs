//! Section data structures

use super::errors::{SubspacesError, SubspacesResult};
use super::types::{SectionId, SubspaceId, ROOT_SECTION_ID};
use serde::{Deserialize, Serialize};

/// A node of a subspace's section tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub subspace_id: SubspaceId,
    pub id: SectionId,
    /// Parent section; the root points at itself
    pub parent_id: SectionId,
    pub name: String,
    pub description: String,
}

impl Section {
    /// Create a new section
    pub fn new(
        subspace_id: SubspaceId,
        id: SectionId,
        parent_id: SectionId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Section { subspace_id, id, parent_id, name: name.into(), description: description.into() }
    }

    /// The root section every subspace starts with
    pub fn root(subspace_id: SubspaceId) -> Self {
        Section::new(
            subspace_id,
            ROOT_SECTION_ID,
            ROOT_SECTION_ID,
            "Default section",
            "This is the default subspace section",
        )
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_SECTION_ID
    }

    /// Check the record for structural problems.
    ///
    /// This does not check that the parent exists; see
    /// `Keeper::is_section_path_valid`.
    pub fn validate(&self) -> SubspacesResult<()> {
        if self.subspace_id == 0 {
            return Err(SubspacesError::InvalidRequest("invalid subspace id: 0".to_string()));
        }
        if self.is_root() && self.parent_id != ROOT_SECTION_ID {
            return Err(SubspacesError::InvalidRequest("root section cannot have a parent".to_string()));
        }
        if !self.is_root() && self.parent_id == self.id {
            return Err(SubspacesError::InvalidRequest(format!(
                "section {} cannot be its own parent",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(SubspacesError::InvalidRequest("section name cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Apply an update, leaving `None` fields untouched
    pub fn update(&self, update: SectionUpdate) -> Section {
        Section {
            subspace_id: self.subspace_id,
            id: self.id,
            parent_id: self.parent_id,
            name: update.name.unwrap_or_else(|| self.name.clone()),
            description: update.description.unwrap_or_else(|| self.description.clone()),
        }
    }
}

/// Fields to change on a section; `None` means "do not modify"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}
