//! Admins, registered and banned users

use super::{check_address, Keeper};
use crate::core_store::{KvStore, StoreResult};
use crate::core_subspaces::errors::{SubspacesError, SubspacesResult};
use crate::core_subspaces::keys;
use crate::core_subspaces::subspace::UserListKind;
use crate::core_subspaces::types::{Address, SubspaceId};
use tracing::info;

impl Keeper {
    /// Add `user` to one of the subspace lists
    pub fn add_user_to_list(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        kind: UserListKind,
        user: &Address,
    ) -> SubspacesResult<()> {
        check_address(user)?;

        self.transition(store, |tx, _| {
            self.require_subspace(tx, subspace_id)?;
            let key = keys::user_list_key(subspace_id, kind, user);
            if tx.has(&key)? {
                return Err(SubspacesError::AlreadyInList { subspace_id, kind, user: user.clone() });
            }
            tx.set(&key, &[])?;
            Ok(())
        })?;

        info!(subspace_id, list = %kind, user = %user, "added user to list");
        Ok(())
    }

    pub fn remove_user_from_list(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        kind: UserListKind,
        user: &Address,
    ) -> SubspacesResult<()> {
        self.transition(store, |tx, _| {
            let key = keys::user_list_key(subspace_id, kind, user);
            if !tx.has(&key)? {
                return Err(SubspacesError::UserNotInList { subspace_id, kind, user: user.clone() });
            }
            tx.delete(&key)?;
            Ok(())
        })?;

        info!(subspace_id, list = %kind, user = %user, "removed user from list");
        Ok(())
    }

    pub fn is_user_in_list(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        kind: UserListKind,
        user: &Address,
    ) -> StoreResult<bool> {
        store.has(&keys::user_list_key(subspace_id, kind, user))
    }

    /// Users in a list, in key order
    pub fn users_in_list(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        kind: UserListKind,
    ) -> StoreResult<Vec<Address>> {
        let prefix = keys::user_list_prefix(subspace_id, kind);
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
