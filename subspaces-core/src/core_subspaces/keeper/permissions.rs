//! Individual permissions and permission resolution
//!
//! Effective permissions of a user in a section:
//! 1. the owner holds everything;
//! 2. otherwise the OR of the user's individual permissions at the section
//!    and at every ancestor up to the root;
//! 3. OR the permissions of every group, at the section or any ancestor,
//!    the user is a member of.
//!
//! Permissions only accumulate going down the tree; a section cannot take
//! away what an ancestor granted.

use super::{check_address, Keeper};
use crate::core_store::{KvStore, StoreResult};
use crate::core_subspaces::errors::{SubspacesError, SubspacesResult};
use crate::core_subspaces::hooks::SubspaceEvent;
use crate::core_subspaces::keys;
use crate::core_subspaces::permission::{Permission, Permissions};
use crate::core_subspaces::types::{Address, GroupId, SectionId, SubspaceId, ROOT_SECTION_ID};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// One contribution to a user's effective permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PermissionDetail {
    /// Set individually on the user
    User { section_id: SectionId, permissions: Permissions },
    /// Inherited from a group the user belongs to
    Group { section_id: SectionId, group_id: GroupId, permissions: Permissions },
}

impl PermissionDetail {
    pub fn permissions(&self) -> Permissions {
        match self {
            PermissionDetail::User { permissions, .. } | PermissionDetail::Group { permissions, .. } => *permissions,
        }
    }
}

impl Keeper {
    /// Set the individual permissions of `user` in a section.
    ///
    /// Unknown bits are dropped; an empty set removes the entry.
    pub fn set_user_permissions(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
        permissions: Permissions,
    ) -> SubspacesResult<()> {
        check_address(user)?;
        let permissions = Permissions::sanitize(permissions.bits());

        self.transition(store, |tx, events| {
            self.require_subspace(tx, subspace_id)?;
            self.require_section(tx, subspace_id, section_id)?;

            let key = keys::user_permission_key(subspace_id, section_id, user);
            if permissions.is_empty() {
                if tx.has(&key)? {
                    tx.delete(&key)?;
                    events.push(SubspaceEvent::UserPermissionRemoved {
                        subspace_id,
                        section_id,
                        user: user.clone(),
                    });
                }
                return Ok(());
            }

            tx.set(&key, &permissions.bits().to_be_bytes())?;
            events.push(SubspaceEvent::UserPermissionSet {
                subspace_id,
                section_id,
                user: user.clone(),
                permissions,
            });
            Ok(())
        })?;

        info!(subspace_id, section_id, user = %user, permissions = permissions.bits(), "set user permissions");
        Ok(())
    }

    /// Remove the individual permissions of `user` in a section
    pub fn remove_user_permissions(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
    ) -> SubspacesResult<()> {
        self.transition(store, |tx, events| {
            let key = keys::user_permission_key(subspace_id, section_id, user);
            if !tx.has(&key)? {
                return Err(SubspacesError::UserPermissionNotFound { subspace_id, section_id, user: user.clone() });
            }
            tx.delete(&key)?;
            events.push(SubspaceEvent::UserPermissionRemoved { subspace_id, section_id, user: user.clone() });
            Ok(())
        })?;

        info!(subspace_id, section_id, user = %user, "removed user permissions");
        Ok(())
    }

    /// Individual permissions of `user` at exactly `section_id`
    pub fn get_user_permissions(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
    ) -> StoreResult<Permissions> {
        match store.get(&keys::user_permission_key(subspace_id, section_id, user))? {
            Some(bytes) => Ok(decode_permissions(&bytes)?),
            None => Ok(Permissions::empty()),
        }
    }

    pub fn has_user_permissions(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
    ) -> StoreResult<bool> {
        store.has(&keys::user_permission_key(subspace_id, section_id, user))
    }

    /// Every individual permission entry at `section_id`
    pub fn section_user_permissions(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
    ) -> StoreResult<Vec<(Address, Permissions)>> {
        let prefix = keys::section_permissions_prefix(subspace_id, section_id);
        store
            .iter_prefix(&prefix)?
            .map(|(key, value)| {
                let (user, rest) = keys::read_address(&key[prefix.len()..])?;
                keys::expect_end(rest)?;
                Ok((user, decode_permissions(&value)?))
            })
            .collect()
    }

    /// Combined permissions of `user` in a section
    pub fn effective_permissions(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
    ) -> SubspacesResult<Permissions> {
        check_address(user)?;
        let subspace = self.require_subspace(store, subspace_id)?;
        if &subspace.owner == user {
            return Ok(Permissions::EVERYTHING);
        }
        if section_id != ROOT_SECTION_ID {
            self.require_section(store, subspace_id, section_id)?;
        }

        let mut individual = Permissions::empty();
        let mut inherited = Permissions::empty();
        for section in self.ancestors_path(store, subspace_id, section_id) {
            let section = section?;
            individual |= self.get_user_permissions(store, subspace_id, section.id, user)?;

            for group in self.user_groups_in_section(store, subspace_id, section.id)? {
                let group = group?;
                if self.is_group_member(store, subspace_id, group.id, user)? {
                    inherited |= group.permissions;
                }
            }
        }

        Ok(individual | inherited)
    }

    /// Whether `user` holds `permission` in a section.
    ///
    /// Fails closed: an invalid address, a missing subspace or section, or a
    /// store failure answers `false`.
    pub fn has_permission(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
        permission: Permission,
    ) -> bool {
        let granted = match self.effective_permissions(store, subspace_id, section_id, user) {
            Ok(effective) => effective.allows(permission),
            Err(err) => {
                debug!(subspace_id, section_id, user = %user, error = %err, "permission check failed closed");
                false
            }
        };
        crate::metrics::record_permission_check(granted);
        granted
    }

    /// Fail with `Unauthorized` unless `user` holds `permission`.
    ///
    /// A missing subspace or section is reported as such.
    pub fn require_permission(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
        permission: Permission,
    ) -> SubspacesResult<()> {
        let granted = self.effective_permissions(store, subspace_id, section_id, user)?.allows(permission);
        crate::metrics::record_permission_check(granted);
        if granted {
            Ok(())
        } else {
            Err(SubspacesError::Unauthorized { subspace_id, section_id, user: user.clone(), permission })
        }
    }

    /// Users currently holding `permission` at the root: the owner, members of
    /// root groups holding it, then users with an individual root grant.
    /// No address appears twice.
    ///
    /// The default group has no stored members. When it holds `permission`
    /// every address has it, yet only the addresses above are listed.
    pub fn list_users_with_permission(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        permission: Permission,
    ) -> SubspacesResult<Vec<Address>> {
        let subspace = self.require_subspace(store, subspace_id)?;
        let mut seen = HashSet::new();
        let mut users = Vec::new();
        let mut push = |user: Address| {
            if seen.insert(user.clone()) {
                users.push(user);
            }
        };

        push(subspace.owner);

        for group in self.user_groups_in_section(store, subspace_id, ROOT_SECTION_ID)? {
            let group = group?;
            if group.permissions.allows(permission) {
                for member in self.group_members(store, subspace_id, group.id)? {
                    push(member);
                }
            }
        }

        for (user, permissions) in self.section_user_permissions(store, subspace_id, ROOT_SECTION_ID)? {
            if permissions.allows(permission) {
                push(user);
            }
        }

        Ok(users)
    }

    /// Every individual entry and group membership contributing to the
    /// user's permissions in a section, child section first
    pub fn permission_details(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
    ) -> SubspacesResult<Vec<PermissionDetail>> {
        check_address(user)?;
        self.require_subspace(store, subspace_id)?;
        self.require_section(store, subspace_id, section_id)?;

        let mut details = Vec::new();
        for section in self.ancestors_path(store, subspace_id, section_id) {
            let section = section?;
            if let Some(bytes) = store.get(&keys::user_permission_key(subspace_id, section.id, user))? {
                details.push(PermissionDetail::User {
                    section_id: section.id,
                    permissions: decode_permissions(&bytes)?,
                });
            }
            for group in self.user_groups_in_section(store, subspace_id, section.id)? {
                let group = group?;
                if self.is_group_member(store, subspace_id, group.id, user)? {
                    details.push(PermissionDetail::Group {
                        section_id: section.id,
                        group_id: group.id,
                        permissions: group.permissions,
                    });
                }
            }
        }
        Ok(details)
    }
}

fn decode_permissions(bytes: &[u8]) -> StoreResult<Permissions> {
    let bits = keys::decode_u32(bytes)?;
    Ok(Permissions::sanitize(bits))
}

#[cfg(test)]
mod tests {
    use super::PermissionDetail;
    use crate::core_store::{KvStore, MemoryStore};
    use crate::core_subspaces::errors::ErrorKind;
    use crate::core_subspaces::keys;
    use crate::core_subspaces::permission::{Permission, Permissions};
    use crate::core_subspaces::types::{Address, DEFAULT_GROUP_ID, ROOT_SECTION_ID};
    use crate::core_subspaces::group::UserGroupUpdate;
    use crate::test_utils::fixtures::{keeper_with_recorder, setup_subspace};

    #[test]
    fn test_owner_bypass() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");

        let owner = Address::new("owner");
        assert_eq!(
            keeper.effective_permissions(&store, subspace.id, ROOT_SECTION_ID, &owner).unwrap(),
            Permissions::EVERYTHING
        );
        assert!(keeper.has_permission(&store, subspace.id, ROOT_SECTION_ID, &owner, Permission::Everything));
    }

    #[test]
    fn test_no_entries_means_no_permissions() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");

        let nobody = Address::new("nobody");
        assert!(keeper
            .effective_permissions(&store, subspace.id, ROOT_SECTION_ID, &nobody)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_subspace_fails_closed() {
        let (keeper, _) = keeper_with_recorder();
        let store = MemoryStore::new();
        let user = Address::new("user");

        assert!(!keeper.has_permission(&store, 99, ROOT_SECTION_ID, &user, Permission::Write));
        let err = keeper.effective_permissions(&store, 99, ROOT_SECTION_ID, &user).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_section_fails_closed() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        assert!(!keeper.has_permission(&store, subspace.id, 5, &Address::new("u"), Permission::Write));
    }

    #[test]
    fn test_default_group_applies_to_everyone() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        keeper
            .edit_user_group(
                &mut store,
                subspace.id,
                DEFAULT_GROUP_ID,
                UserGroupUpdate { permissions: Some(Permissions::WRITE), ..Default::default() },
            )
            .unwrap();
        let child = keeper.create_section(&mut store, subspace.id, ROOT_SECTION_ID, "child", "").unwrap();

        let stranger = Address::new("stranger");
        assert!(keeper.has_permission(&store, subspace.id, child.id, &stranger, Permission::Write));
        assert!(!keeper.has_permission(&store, subspace.id, child.id, &stranger, Permission::ModerateContent));
    }

    #[test]
    fn test_permissions_accumulate_down_the_tree() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let user = Address::new("user");
        let a = keeper.create_section(&mut store, subspace.id, ROOT_SECTION_ID, "A", "").unwrap();

        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &user, Permissions::WRITE)
            .unwrap();
        keeper
            .set_user_permissions(&mut store, subspace.id, a.id, &user, Permissions::MODERATE_CONTENT)
            .unwrap();

        let at_root = keeper.effective_permissions(&store, subspace.id, ROOT_SECTION_ID, &user).unwrap();
        let at_a = keeper.effective_permissions(&store, subspace.id, a.id, &user).unwrap();
        assert_eq!(at_root, Permissions::WRITE);
        assert_eq!(at_a, Permissions::WRITE | Permissions::MODERATE_CONTENT);
    }

    #[test]
    fn test_empty_permissions_remove_entry() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let user = Address::new("user");

        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &user, Permissions::WRITE)
            .unwrap();
        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &user, Permissions::empty())
            .unwrap();
        assert!(!keeper.has_user_permissions(&store, subspace.id, ROOT_SECTION_ID, &user).unwrap());

        let err = keeper
            .remove_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &user)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unknown_stored_bits_are_ignored() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let user = Address::new("user");

        let key = keys::user_permission_key(subspace.id, ROOT_SECTION_ID, &user);
        store.set(&key, &(0x8000_0000u32 | Permissions::WRITE.bits()).to_be_bytes()).unwrap();

        assert_eq!(
            keeper.effective_permissions(&store, subspace.id, ROOT_SECTION_ID, &user).unwrap(),
            Permissions::WRITE
        );
    }

    #[test]
    fn test_list_users_with_permission() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let group = keeper
            .create_user_group(&mut store, subspace.id, ROOT_SECTION_ID, "Mods", "", Permissions::MANAGE_GROUPS)
            .unwrap();
        let mod_user = Address::new("moderator");
        let both = Address::new("both");
        let solo = Address::new("solo");
        keeper.add_user_to_group(&mut store, subspace.id, group.id, &mod_user).unwrap();
        keeper.add_user_to_group(&mut store, subspace.id, group.id, &both).unwrap();
        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &both, Permissions::MANAGE_GROUPS)
            .unwrap();
        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &solo, Permissions::MANAGE_GROUPS)
            .unwrap();
        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &Address::new("writer"), Permissions::WRITE)
            .unwrap();

        let users = keeper
            .list_users_with_permission(&store, subspace.id, Permission::ManageGroups)
            .unwrap();
        assert_eq!(users, vec![Address::new("owner"), both, mod_user, solo]);
    }

    #[test]
    fn test_list_users_when_default_group_holds_permission() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        keeper
            .edit_user_group(
                &mut store,
                subspace.id,
                DEFAULT_GROUP_ID,
                UserGroupUpdate { permissions: Some(Permissions::WRITE), ..Default::default() },
            )
            .unwrap();

        // Everybody can write, but there is nobody stored to list
        assert!(keeper.has_permission(&store, subspace.id, ROOT_SECTION_ID, &Address::new("anyone"), Permission::Write));
        let users = keeper.list_users_with_permission(&store, subspace.id, Permission::Write).unwrap();
        assert_eq!(users, vec![Address::new("owner")]);
    }

    #[test]
    fn test_long_address_does_not_inherit_prefix_owner_permissions() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let victim = Address::new("a".repeat(255));
        let impostor = Address::new(format!("{}evil", victim));
        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &victim, Permissions::MANAGE_ALLOWANCES)
            .unwrap();

        assert!(keeper.has_permission(&store, subspace.id, ROOT_SECTION_ID, &victim, Permission::ManageAllowances));
        assert!(!keeper.has_permission(&store, subspace.id, ROOT_SECTION_ID, &impostor, Permission::ManageAllowances));
        assert_eq!(
            keeper.effective_permissions(&store, subspace.id, ROOT_SECTION_ID, &impostor).unwrap_err().kind(),
            ErrorKind::InvalidRequest
        );
        assert!(keeper.get_user_permissions(&store, subspace.id, ROOT_SECTION_ID, &impostor).unwrap().is_empty());
        assert_eq!(
            keeper
                .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &impostor, Permissions::WRITE)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidRequest
        );
    }

    #[test]
    fn test_invalid_addresses_fail_closed() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        keeper
            .edit_user_group(
                &mut store,
                subspace.id,
                DEFAULT_GROUP_ID,
                UserGroupUpdate { permissions: Some(Permissions::WRITE), ..Default::default() },
            )
            .unwrap();

        for bad in ["", "  ", "has space", "line\nbreak"] {
            let user = Address::new(bad);
            assert!(!keeper.has_permission(&store, subspace.id, ROOT_SECTION_ID, &user, Permission::Write));
            assert!(!keeper.is_group_member(&store, subspace.id, DEFAULT_GROUP_ID, &user).unwrap());
            assert_eq!(
                keeper.permission_details(&store, subspace.id, ROOT_SECTION_ID, &user).unwrap_err().kind(),
                ErrorKind::InvalidRequest
            );
        }
    }

    #[test]
    fn test_permission_details() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let user = Address::new("user");
        let a = keeper.create_section(&mut store, subspace.id, ROOT_SECTION_ID, "A", "").unwrap();
        let group = keeper
            .create_user_group(&mut store, subspace.id, a.id, "Writers", "", Permissions::WRITE)
            .unwrap();
        keeper.add_user_to_group(&mut store, subspace.id, group.id, &user).unwrap();
        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &user, Permissions::EDIT_SUBSPACE)
            .unwrap();

        let details = keeper.permission_details(&store, subspace.id, a.id, &user).unwrap();
        assert_eq!(
            details,
            vec![
                PermissionDetail::Group { section_id: a.id, group_id: group.id, permissions: Permissions::WRITE },
                PermissionDetail::User { section_id: ROOT_SECTION_ID, permissions: Permissions::EDIT_SUBSPACE },
                PermissionDetail::Group {
                    section_id: ROOT_SECTION_ID,
                    group_id: DEFAULT_GROUP_ID,
                    permissions: Permissions::empty()
                },
            ]
        );
    }
}
