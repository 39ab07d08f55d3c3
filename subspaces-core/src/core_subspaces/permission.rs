//! Permission flags
//!
//! Permission sets are OR-combined bitmasks. A check always tests one named
//! [`Permission`], never a subset relation across several requested flags.
//! `Everything` is itself a named permission whose mask is every bit set, and
//! it goes through the very same check as any single-bit flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags::bitflags! {
    /// Set of permissions held by a user or group
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Permissions: u32 {
        /// Post content in a section
        const WRITE = 1 << 0;
        /// Moderate other users' content
        const MODERATE_CONTENT = 1 << 1;
        /// Edit the subspace metadata
        const EDIT_SUBSPACE = 1 << 2;
        /// Create, edit and delete user groups
        const MANAGE_GROUPS = 1 << 3;
        /// Set individual user permissions
        const SET_PERMISSIONS = 1 << 4;
        /// Delete the subspace
        const DELETE_SUBSPACE = 1 << 5;
        /// Create, edit, move and delete sections
        const MANAGE_SECTIONS = 1 << 6;
        /// Grant and revoke fee allowances
        const MANAGE_ALLOWANCES = 1 << 7;
        /// Authorize operations on the treasury account
        const MANAGE_TREASURY_AUTHORIZATION = 1 << 8;
        /// Mint and burn subspace tokens
        const MANAGE_SUBSPACE_TOKENS = 1 << 9;

        /// Catch-all: every known flag
        const EVERYTHING = Self::WRITE.bits()
            | Self::MODERATE_CONTENT.bits()
            | Self::EDIT_SUBSPACE.bits()
            | Self::MANAGE_GROUPS.bits()
            | Self::SET_PERMISSIONS.bits()
            | Self::DELETE_SUBSPACE.bits()
            | Self::MANAGE_SECTIONS.bits()
            | Self::MANAGE_ALLOWANCES.bits()
            | Self::MANAGE_TREASURY_AUTHORIZATION.bits()
            | Self::MANAGE_SUBSPACE_TOKENS.bits();
    }
}

impl Permissions {
    /// Build a set from raw bits, dropping any bit that is not a known flag
    pub fn sanitize(bits: u32) -> Self {
        Permissions::from_bits_truncate(bits)
    }

    /// Test for one named permission
    pub fn allows(&self, permission: Permission) -> bool {
        let requested = permission.flags().bits();
        self.bits() & requested == requested
    }
}

/// A single named permission, as accepted by permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Write,
    ModerateContent,
    EditSubspace,
    ManageGroups,
    SetPermissions,
    DeleteSubspace,
    ManageSections,
    ManageAllowances,
    ManageTreasuryAuthorization,
    ManageSubspaceTokens,
    Everything,
}

impl Permission {
    /// Every named permission
    pub const ALL: [Permission; 11] = [
        Permission::Write,
        Permission::ModerateContent,
        Permission::EditSubspace,
        Permission::ManageGroups,
        Permission::SetPermissions,
        Permission::DeleteSubspace,
        Permission::ManageSections,
        Permission::ManageAllowances,
        Permission::ManageTreasuryAuthorization,
        Permission::ManageSubspaceTokens,
        Permission::Everything,
    ];

    /// The mask this permission stands for
    pub fn flags(self) -> Permissions {
        match self {
            Permission::Write => Permissions::WRITE,
            Permission::ModerateContent => Permissions::MODERATE_CONTENT,
            Permission::EditSubspace => Permissions::EDIT_SUBSPACE,
            Permission::ManageGroups => Permissions::MANAGE_GROUPS,
            Permission::SetPermissions => Permissions::SET_PERMISSIONS,
            Permission::DeleteSubspace => Permissions::DELETE_SUBSPACE,
            Permission::ManageSections => Permissions::MANAGE_SECTIONS,
            Permission::ManageAllowances => Permissions::MANAGE_ALLOWANCES,
            Permission::ManageTreasuryAuthorization => Permissions::MANAGE_TREASURY_AUTHORIZATION,
            Permission::ManageSubspaceTokens => Permissions::MANAGE_SUBSPACE_TOKENS,
            Permission::Everything => Permissions::EVERYTHING,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Write => "WRITE",
            Permission::ModerateContent => "MODERATE_CONTENT",
            Permission::EditSubspace => "EDIT_SUBSPACE",
            Permission::ManageGroups => "MANAGE_GROUPS",
            Permission::SetPermissions => "SET_PERMISSIONS",
            Permission::DeleteSubspace => "DELETE_SUBSPACE",
            Permission::ManageSections => "MANAGE_SECTIONS",
            Permission::ManageAllowances => "MANAGE_ALLOWANCES",
            Permission::ManageTreasuryAuthorization => "MANAGE_TREASURY_AUTHORIZATION",
            Permission::ManageSubspaceTokens => "MANAGE_SUBSPACE_TOKENS",
            Permission::Everything => "EVERYTHING",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("unknown permission: {}", s))
    }
}

impl From<Permission> for Permissions {
    fn from(permission: Permission) -> Self {
        permission.flags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_is_union_of_flags() {
        assert_eq!(Permissions::EVERYTHING, Permissions::all());
        for permission in Permission::ALL {
            assert!(Permissions::EVERYTHING.allows(permission));
        }
    }

    #[test]
    fn test_single_flag_check() {
        let perms = Permissions::WRITE | Permissions::EDIT_SUBSPACE;
        assert!(perms.allows(Permission::Write));
        assert!(perms.allows(Permission::EditSubspace));
        assert!(!perms.allows(Permission::DeleteSubspace));
        assert!(!perms.allows(Permission::Everything));
    }

    #[test]
    fn test_everything_requires_all_bits() {
        let almost = Permissions::EVERYTHING - Permissions::MANAGE_SUBSPACE_TOKENS;
        assert!(!almost.allows(Permission::Everything));
        assert!(almost.allows(Permission::ManageAllowances));
    }

    #[test]
    fn test_sanitize_drops_unknown_bits() {
        let perms = Permissions::sanitize(0xffff_ffff);
        assert_eq!(perms, Permissions::EVERYTHING);
        assert_eq!(Permissions::sanitize(1 << 31), Permissions::empty());
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("manage-groups".parse::<Permission>().unwrap(), Permission::ManageGroups);
        assert_eq!("EVERYTHING".parse::<Permission>().unwrap(), Permission::Everything);
        assert!("fly".parse::<Permission>().is_err());
        assert_eq!(Permission::SetPermissions.to_string(), "SET_PERMISSIONS");
    }
}
