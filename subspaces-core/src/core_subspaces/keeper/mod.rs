/*
    keeper - State transitions over the subspace key ranges

    The keeper owns no store. Every operation takes the store it runs
    against; mutating operations run inside one copy-on-write transaction
    and dispatch their hooks only after that transaction committed.

    Submodules:
    - subspaces:   subspace lifecycle and id counters
    - sections:    section tree, path validation, cascading deletes
    - groups:      user groups and memberships
    - permissions: individual permissions and permission resolution
    - user_lists:  admins, registered and banned users
    - feegrant:    allowance grants, consumption and expiration
*/

mod feegrant;
mod groups;
mod permissions;
mod sections;
mod subspaces;
mod user_lists;

pub use feegrant::FeeUsage;
pub use permissions::PermissionDetail;
pub use sections::AncestorsPath;

pub(crate) use groups::decode_group;

use super::accounts::{AccountKeeper, KvAccountKeeper};
use super::errors::{SubspacesError, SubspacesResult};
use super::types::Address;
use super::hooks::{HookSet, SubspaceEvent};
use crate::core_store::{decode, encode, transact, KvStore, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Subspace keeper
#[derive(Clone)]
pub struct Keeper {
    hooks: HookSet,
    accounts: Arc<dyn AccountKeeper>,
}

impl Keeper {
    /// Create a keeper with the given hooks and account registry
    pub fn new(hooks: HookSet, accounts: Arc<dyn AccountKeeper>) -> Self {
        Self { hooks, accounts }
    }

    /// Hooks invoked after committed mutations
    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    /// Account registry used when storing grants
    pub fn accounts(&self) -> &dyn AccountKeeper {
        self.accounts.as_ref()
    }

    /// Run `f` as one atomic transition, then dispatch the events it collected
    fn transition<T, F>(&self, store: &mut dyn KvStore, f: F) -> SubspacesResult<T>
    where
        F: FnOnce(&mut dyn KvStore, &mut Vec<SubspaceEvent>) -> SubspacesResult<T>,
    {
        let mut events = Vec::new();
        let value = transact(store, |tx| f(tx, &mut events))?;
        self.hooks.dispatch_all(events);
        Ok(value)
    }
}

impl Default for Keeper {
    fn default() -> Self {
        Self::new(HookSet::new(), Arc::new(KvAccountKeeper))
    }
}

impl std::fmt::Debug for Keeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keeper").field("hooks", &self.hooks).finish_non_exhaustive()
    }
}

/// Reject an address a caller supplied before any key is built from it
fn check_address(address: &Address) -> SubspacesResult<()> {
    address.validate().map_err(SubspacesError::InvalidRequest)
}

fn read<T: DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> StoreResult<Option<T>> {
    store.get(key)?.map(|bytes| decode(&bytes)).transpose()
}

fn write<T: Serialize>(store: &mut dyn KvStore, key: &[u8], value: &T) -> StoreResult<()> {
    store.set(key, &encode(value)?)
}
