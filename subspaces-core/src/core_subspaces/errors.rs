/*
    errors.rs - Error taxonomy for the subspaces keeper

    Every failure carries the identifiers it concerns and maps to one
    ErrorKind, so callers can tell "you lack permission" apart from
    "that does not exist".
*/

use super::permission::Permission;
use super::subspace::UserListKind;
use super::types::{Address, GroupId, SectionId, SubspaceId};
use crate::core_feegrant::{AllowanceError, GrantKey};
use crate::core_store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`SubspacesError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Referenced subspace, section, group, grant or entry does not exist
    NotFound,
    /// A structural invariant would be violated
    InvalidState,
    /// The signer lacks the required permission
    Unauthorized,
    /// No candidate allowance accepted the fee
    AllowanceRejected,
    /// The request itself is malformed
    InvalidRequest,
    /// The underlying store failed
    Storage,
}

/// Errors that can occur in keeper operations
#[derive(Debug, Error)]
pub enum SubspacesError {
    #[error("Subspace {0} not found")]
    SubspaceNotFound(SubspaceId),

    #[error("Section {section_id} not found in subspace {subspace_id}")]
    SectionNotFound { subspace_id: SubspaceId, section_id: SectionId },

    #[error("User group {group_id} not found in subspace {subspace_id}")]
    GroupNotFound { subspace_id: SubspaceId, group_id: GroupId },

    #[error("User {user} is not a member of group {group_id} in subspace {subspace_id}")]
    NotGroupMember { subspace_id: SubspaceId, group_id: GroupId, user: Address },

    #[error("User {user} has no permissions set in section {section_id} of subspace {subspace_id}")]
    UserPermissionNotFound { subspace_id: SubspaceId, section_id: SectionId, user: Address },

    #[error("User {user} is not in the {kind} list of subspace {subspace_id}")]
    UserNotInList { subspace_id: SubspaceId, kind: UserListKind, user: Address },

    #[error("Grant not found: {0}")]
    GrantNotFound(GrantKey),

    #[error("Invalid section path for section {section_id} in subspace {subspace_id}")]
    InvalidSectionPath { subspace_id: SubspaceId, section_id: SectionId },

    #[error("Grant already exists: {0}")]
    GrantAlreadyExists(GrantKey),

    #[error("User {user} is already a member of group {group_id} in subspace {subspace_id}")]
    AlreadyGroupMember { subspace_id: SubspaceId, group_id: GroupId, user: Address },

    #[error("User {user} is already in the {kind} list of subspace {subspace_id}")]
    AlreadyInList { subspace_id: SubspaceId, kind: UserListKind, user: Address },

    #[error("Grantee group {group_id} does not exist in subspace {subspace_id}")]
    GranteeGroupNotFound { subspace_id: SubspaceId, group_id: GroupId },

    #[error("Cannot remove the root section of subspace {0}")]
    RootSectionImmutable(SubspaceId),

    #[error("Cannot remove the default group of subspace {0}")]
    DefaultGroupImmutable(SubspaceId),

    #[error("User {user} lacks {permission} in section {section_id} of subspace {subspace_id}")]
    Unauthorized {
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: Address,
        permission: Permission,
    },

    #[error("Payer {payer} is not a member of group {group_id} and cannot use its grant {key}")]
    PayerNotInGroup { key: GrantKey, group_id: GroupId, payer: Address },

    #[error("Allowance {key} rejected the fee: {source}")]
    AllowanceDeclined {
        key: GrantKey,
        #[source]
        source: AllowanceError,
    },

    #[error("No allowance in subspace {subspace_id} covers the fee for {payer}")]
    NoUsableAllowance { subspace_id: SubspaceId, payer: Address },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubspacesError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubspacesError::SubspaceNotFound(_)
            | SubspacesError::SectionNotFound { .. }
            | SubspacesError::GroupNotFound { .. }
            | SubspacesError::NotGroupMember { .. }
            | SubspacesError::UserPermissionNotFound { .. }
            | SubspacesError::UserNotInList { .. }
            | SubspacesError::GrantNotFound(_) => ErrorKind::NotFound,

            SubspacesError::InvalidSectionPath { .. }
            | SubspacesError::GrantAlreadyExists(_)
            | SubspacesError::AlreadyGroupMember { .. }
            | SubspacesError::AlreadyInList { .. }
            | SubspacesError::GranteeGroupNotFound { .. }
            | SubspacesError::RootSectionImmutable(_)
            | SubspacesError::DefaultGroupImmutable(_) => ErrorKind::InvalidState,

            SubspacesError::Unauthorized { .. } | SubspacesError::PayerNotInGroup { .. } => ErrorKind::Unauthorized,

            SubspacesError::AllowanceDeclined { .. } | SubspacesError::NoUsableAllowance { .. } => {
                ErrorKind::AllowanceRejected
            }

            SubspacesError::InvalidRequest(_) => ErrorKind::InvalidRequest,

            SubspacesError::Store(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for `kind() == ErrorKind::NotFound`
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for keeper operations
pub type SubspacesResult<T> = Result<T, SubspacesError>;
