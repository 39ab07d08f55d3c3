//! Grants of fee allowances to users and groups

use super::allowance::{Allowance, AllowanceError};
use crate::core_subspaces::types::{Address, GroupId, SubspaceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who may spend a grant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grantee {
    User(Address),
    Group(GroupId),
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grantee::User(user) => write!(f, "user {}", user),
            Grantee::Group(group_id) => write!(f, "group {}", group_id),
        }
    }
}

/// Unique key of a grant: at most one grant per granter/grantee pair per subspace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantKey {
    pub subspace_id: SubspaceId,
    pub granter: Address,
    pub grantee: Grantee,
}

impl GrantKey {
    pub fn new(subspace_id: SubspaceId, granter: Address, grantee: Grantee) -> Self {
        GrantKey { subspace_id, granter, grantee }
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subspace {} granter {} -> {}", self.subspace_id, self.granter, self.grantee)
    }
}

/// A fee allowance extended by a granter to a user or group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub subspace_id: SubspaceId,
    pub granter: Address,
    pub grantee: Grantee,
    pub allowance: Allowance,
}

impl Grant {
    pub fn new(subspace_id: SubspaceId, granter: Address, grantee: Grantee, allowance: Allowance) -> Self {
        Grant { subspace_id, granter, grantee, allowance }
    }

    /// Grant to a single user
    pub fn to_user(subspace_id: SubspaceId, granter: Address, user: Address, allowance: Allowance) -> Self {
        Grant::new(subspace_id, granter, Grantee::User(user), allowance)
    }

    /// Grant to every member of a group
    pub fn to_group(subspace_id: SubspaceId, granter: Address, group_id: GroupId, allowance: Allowance) -> Self {
        Grant::new(subspace_id, granter, Grantee::Group(group_id), allowance)
    }

    pub fn key(&self) -> GrantKey {
        GrantKey::new(self.subspace_id, self.granter.clone(), self.grantee.clone())
    }

    /// Stateless validation
    pub fn validate_basic(&self) -> Result<(), AllowanceError> {
        if self.subspace_id == 0 {
            return Err(AllowanceError::Invalid("invalid subspace id: 0".into()));
        }
        self.granter
            .validate()
            .map_err(|e| AllowanceError::Invalid(format!("invalid granter: {}", e)))?;
        if let Grantee::User(user) = &self.grantee {
            user.validate().map_err(|e| AllowanceError::Invalid(format!("invalid grantee: {}", e)))?;
            if user == &self.granter {
                return Err(AllowanceError::Invalid("cannot self-grant an allowance".into()));
            }
        }
        self.allowance.validate_basic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_feegrant::Coins;

    #[test]
    fn test_grant_key() {
        let grant = Grant::to_group(1, Address::new("granter"), 4, Allowance::unlimited());
        let key = grant.key();
        assert_eq!(key.grantee, Grantee::Group(4));
        assert_eq!(key.to_string(), "subspace 1 granter granter -> group 4");
    }

    #[test]
    fn test_validate_basic() {
        let allowance = Allowance::basic(Coins::single("test", 10), None);
        assert!(Grant::to_user(1, "granter".into(), "user".into(), allowance.clone())
            .validate_basic()
            .is_ok());
        assert!(Grant::to_user(1, "same".into(), "same".into(), allowance.clone())
            .validate_basic()
            .is_err());
        assert!(Grant::to_user(0, "granter".into(), "user".into(), allowance.clone())
            .validate_basic()
            .is_err());
        assert!(Grant::to_group(1, "".into(), 1, allowance).validate_basic().is_err());
    }
}
