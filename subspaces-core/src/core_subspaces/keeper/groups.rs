//! User groups and memberships

use super::{check_address, read, write, Keeper};
use crate::core_store::{decode, delete_prefix, prefix_keys, KvStore, StoreError, StoreResult};
use crate::core_subspaces::errors::{SubspacesError, SubspacesResult};
use crate::core_subspaces::group::{UserGroup, UserGroupUpdate};
use crate::core_subspaces::hooks::SubspaceEvent;
use crate::core_subspaces::keys;
use crate::core_subspaces::permission::Permissions;
use crate::core_subspaces::types::{Address, GroupId, SectionId, SubspaceId, DEFAULT_GROUP_ID};
use tracing::{debug, info};

pub(crate) fn decode_group(value: &[u8]) -> StoreResult<UserGroup> {
    let mut group: UserGroup = decode(value)?;
    group.permissions = Permissions::sanitize(group.permissions.bits());
    Ok(group)
}

impl Keeper {
    /// Id the next created group of `subspace_id` will get
    pub fn next_group_id(&self, store: &dyn KvStore, subspace_id: SubspaceId) -> StoreResult<GroupId> {
        match store.get(&keys::next_group_id_key(subspace_id))? {
            Some(bytes) => keys::decode_u32(&bytes),
            None => Ok(DEFAULT_GROUP_ID + 1),
        }
    }

    pub fn set_next_group_id(&self, store: &mut dyn KvStore, subspace_id: SubspaceId, id: GroupId) -> StoreResult<()> {
        store.set(&keys::next_group_id_key(subspace_id), &id.to_be_bytes())
    }

    /// Create a group in `section_id`, allocating its id
    pub fn create_user_group(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        name: &str,
        description: &str,
        permissions: Permissions,
    ) -> SubspacesResult<UserGroup> {
        let group = self.transition(store, |tx, events| {
            self.require_subspace(tx, subspace_id)?;
            self.require_section(tx, subspace_id, section_id)?;

            let id = self.next_group_id(tx, subspace_id)?;
            let group = UserGroup::new(
                subspace_id,
                section_id,
                id,
                name,
                description,
                Permissions::sanitize(permissions.bits()),
            );
            group.validate()?;
            self.write_user_group(tx, &group)?;

            let next = id
                .checked_add(1)
                .ok_or_else(|| SubspacesError::InvalidRequest("group ids exhausted".to_string()))?;
            self.set_next_group_id(tx, subspace_id, next)?;
            events.push(SubspaceEvent::UserGroupSaved { subspace_id, group_id: id });
            Ok(group)
        })?;

        info!(subspace_id, section_id, group_id = group.id, "created user group");
        Ok(group)
    }

    /// Store a group, replacing any previous version.
    ///
    /// Saving a group with a different section moves it there.
    pub fn save_user_group(&self, store: &mut dyn KvStore, group: &UserGroup) -> SubspacesResult<()> {
        group.validate()?;
        self.transition(store, |tx, events| {
            self.write_user_group(tx, group)?;
            events.push(SubspaceEvent::UserGroupSaved { subspace_id: group.subspace_id, group_id: group.id });
            Ok(())
        })
    }

    pub(super) fn write_user_group(&self, tx: &mut dyn KvStore, group: &UserGroup) -> StoreResult<()> {
        let locator = keys::group_locator_key(group.subspace_id, group.id);
        if let Some(bytes) = tx.get(&locator)? {
            let previous = keys::decode_u32(&bytes)?;
            if previous != group.section_id {
                tx.delete(&keys::group_key(group.subspace_id, previous, group.id))?;
            }
        }
        tx.set(&locator, &group.section_id.to_be_bytes())?;
        write(tx, &keys::group_key(group.subspace_id, group.section_id, group.id), group)
    }

    /// Change a group's name, description or permissions
    pub fn edit_user_group(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
        update: UserGroupUpdate,
    ) -> SubspacesResult<UserGroup> {
        let updated = self.require_user_group(store, subspace_id, group_id)?.update(update);
        self.save_user_group(store, &updated)?;
        Ok(updated)
    }

    /// Move a group to another section
    pub fn move_user_group(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
        section_id: SectionId,
    ) -> SubspacesResult<UserGroup> {
        if group_id == DEFAULT_GROUP_ID {
            return Err(SubspacesError::DefaultGroupImmutable(subspace_id));
        }
        self.require_section(store, subspace_id, section_id)?;

        let mut group = self.require_user_group(store, subspace_id, group_id)?;
        group.section_id = section_id;
        self.save_user_group(store, &group)?;
        Ok(group)
    }

    pub fn has_user_group(&self, store: &dyn KvStore, subspace_id: SubspaceId, group_id: GroupId) -> StoreResult<bool> {
        store.has(&keys::group_locator_key(subspace_id, group_id))
    }

    pub fn get_user_group(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
    ) -> StoreResult<Option<UserGroup>> {
        let Some(bytes) = store.get(&keys::group_locator_key(subspace_id, group_id))? else {
            return Ok(None);
        };
        let section_id = keys::decode_u32(&bytes)?;
        match store.get(&keys::group_key(subspace_id, section_id, group_id))? {
            Some(value) => Ok(Some(decode_group(&value)?)),
            None => Err(StoreError::CorruptedData(format!(
                "group {} of subspace {} points at section {} but has no record there",
                group_id, subspace_id, section_id
            ))),
        }
    }

    /// Get a group or fail with `GroupNotFound`
    pub fn require_user_group(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
    ) -> SubspacesResult<UserGroup> {
        self.get_user_group(store, subspace_id, group_id)?
            .ok_or(SubspacesError::GroupNotFound { subspace_id, group_id })
    }

    /// Groups scoped to exactly `section_id`, in id order
    pub fn user_groups_in_section<'a>(
        &self,
        store: &'a dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
    ) -> StoreResult<impl Iterator<Item = StoreResult<UserGroup>> + 'a> {
        Ok(store
            .iter_prefix(&keys::section_groups_prefix(subspace_id, section_id))?
            .map(|(_, value)| decode_group(&value)))
    }

    /// Every group of a subspace, ordered by section then id
    pub fn user_groups(&self, store: &dyn KvStore, subspace_id: SubspaceId) -> StoreResult<Vec<UserGroup>> {
        store
            .iter_prefix(&keys::groups_prefix(subspace_id))?
            .map(|(_, value)| decode_group(&value))
            .collect()
    }

    /// Delete a group with its memberships and grants
    pub fn delete_user_group(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
    ) -> SubspacesResult<()> {
        if group_id == DEFAULT_GROUP_ID {
            return Err(SubspacesError::DefaultGroupImmutable(subspace_id));
        }

        self.transition(store, |tx, events| {
            let group = self.require_user_group(tx, subspace_id, group_id)?;
            self.delete_user_group_in(tx, &group, events)
        })?;

        info!(subspace_id, group_id, "deleted user group");
        Ok(())
    }

    pub(super) fn delete_user_group_in(
        &self,
        tx: &mut dyn KvStore,
        group: &UserGroup,
        events: &mut Vec<SubspaceEvent>,
    ) -> SubspacesResult<()> {
        let subspace_id = group.subspace_id;

        let members = delete_prefix(tx, &keys::group_members_prefix(subspace_id, group.id))?;
        debug!(subspace_id, group_id = group.id, members, "removed group members");

        for key in prefix_keys(tx, &keys::group_grants_for_group_prefix(subspace_id, group.id))? {
            let grant_key = keys::parse_grant_store_key(&key)?;
            self.remove_grant_in(tx, &grant_key, events)?;
        }

        tx.delete(&keys::group_locator_key(subspace_id, group.id))?;
        tx.delete(&keys::group_key(subspace_id, group.section_id, group.id))?;
        events.push(SubspaceEvent::UserGroupDeleted { subspace_id, group_id: group.id });
        Ok(())
    }

    /// Add `user` to a group
    pub fn add_user_to_group(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
        user: &Address,
    ) -> SubspacesResult<()> {
        if group_id == DEFAULT_GROUP_ID {
            return Err(SubspacesError::InvalidRequest(
                "every user is already part of the default group".to_string(),
            ));
        }
        check_address(user)?;

        self.transition(store, |tx, events| {
            self.require_user_group(tx, subspace_id, group_id)?;
            let key = keys::group_member_key(subspace_id, group_id, user);
            if tx.has(&key)? {
                return Err(SubspacesError::AlreadyGroupMember { subspace_id, group_id, user: user.clone() });
            }
            tx.set(&key, &[])?;
            events.push(SubspaceEvent::GroupMemberAdded { subspace_id, group_id, user: user.clone() });
            Ok(())
        })?;

        debug!(subspace_id, group_id, user = %user, "added group member");
        Ok(())
    }

    /// Remove `user` from a group
    pub fn remove_user_from_group(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
        user: &Address,
    ) -> SubspacesResult<()> {
        if group_id == DEFAULT_GROUP_ID {
            return Err(SubspacesError::InvalidRequest(
                "users cannot leave the default group".to_string(),
            ));
        }

        self.transition(store, |tx, events| {
            self.require_user_group(tx, subspace_id, group_id)?;
            let key = keys::group_member_key(subspace_id, group_id, user);
            if !tx.has(&key)? {
                return Err(SubspacesError::NotGroupMember { subspace_id, group_id, user: user.clone() });
            }
            tx.delete(&key)?;
            events.push(SubspaceEvent::GroupMemberRemoved { subspace_id, group_id, user: user.clone() });
            Ok(())
        })?;

        debug!(subspace_id, group_id, user = %user, "removed group member");
        Ok(())
    }

    /// Whether `user` belongs to a group; always true for the default group.
    /// An invalid address belongs to no group.
    pub fn is_group_member(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
        user: &Address,
    ) -> StoreResult<bool> {
        if let Err(err) = check_address(user) {
            debug!(subspace_id, group_id, error = %err, "membership check failed closed");
            return Ok(false);
        }
        if group_id == DEFAULT_GROUP_ID {
            return Ok(true);
        }
        store.has(&keys::group_member_key(subspace_id, group_id, user))
    }

    /// Stored members of a group, in key order
    pub fn group_members(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        group_id: GroupId,
    ) -> StoreResult<Vec<Address>> {
        let prefix = keys::group_members_prefix(subspace_id, group_id);
        store
            .iter_prefix(&prefix)?
            .map(|(key, _)| {
                let (user, rest) = keys::read_address(&key[prefix.len()..])?;
                keys::expect_end(rest)?;
                Ok(user)
            })
            .collect()
    }
}
