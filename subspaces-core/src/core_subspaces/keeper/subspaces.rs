//! Subspace lifecycle

use super::{read, write, Keeper};
use crate::core_store::{delete_prefix, prefix_keys, KvStore, StoreResult};
use crate::core_subspaces::errors::{SubspacesError, SubspacesResult};
use crate::core_subspaces::group::UserGroup;
use crate::core_subspaces::hooks::SubspaceEvent;
use crate::core_subspaces::keys;
use crate::core_subspaces::section::Section;
use crate::core_subspaces::subspace::Subspace;
use crate::core_subspaces::types::{SubspaceId, ROOT_SECTION_ID};
use std::collections::HashSet;
use tracing::info;

impl Keeper {
    /// Id the next created subspace will get
    pub fn next_subspace_id(&self, store: &dyn KvStore) -> StoreResult<SubspaceId> {
        match store.get(keys::NEXT_SUBSPACE_ID_KEY)? {
            Some(bytes) => keys::decode_u64(&bytes),
            None => Ok(1),
        }
    }

    pub fn set_next_subspace_id(&self, store: &mut dyn KvStore, id: SubspaceId) -> StoreResult<()> {
        store.set(keys::NEXT_SUBSPACE_ID_KEY, &id.to_be_bytes())
    }

    /// Create a subspace, replacing `draft.id` with the next available id.
    ///
    /// Also stores the root section and the default group, and initializes
    /// the section and group id counters.
    pub fn create_subspace(&self, store: &mut dyn KvStore, draft: Subspace) -> SubspacesResult<Subspace> {
        let subspace = self.transition(store, |tx, events| {
            let id = self.next_subspace_id(tx)?;
            let subspace = Subspace { id, ..draft };
            subspace.validate()?;

            write(tx, &keys::subspace_key(id), &subspace)?;
            events.push(SubspaceEvent::SubspaceSaved { subspace_id: id });

            let root = Section::root(id);
            write(tx, &keys::section_key(id, root.id), &root)?;
            events.push(SubspaceEvent::SectionSaved { subspace_id: id, section_id: root.id });
            self.set_next_section_id(tx, id, ROOT_SECTION_ID + 1)?;

            let default_group = UserGroup::default_group(id);
            self.write_user_group(tx, &default_group)?;
            events.push(SubspaceEvent::UserGroupSaved { subspace_id: id, group_id: default_group.id });
            self.set_next_group_id(tx, id, default_group.id + 1)?;

            let next = id
                .checked_add(1)
                .ok_or_else(|| SubspacesError::InvalidRequest("subspace ids exhausted".to_string()))?;
            self.set_next_subspace_id(tx, next)?;
            Ok(subspace)
        })?;

        info!(subspace_id = subspace.id, owner = %subspace.owner, "created subspace");
        Ok(subspace)
    }

    /// Store a subspace verbatim
    pub fn save_subspace(&self, store: &mut dyn KvStore, subspace: &Subspace) -> SubspacesResult<()> {
        subspace.validate()?;
        self.transition(store, |tx, events| {
            write(tx, &keys::subspace_key(subspace.id), subspace)?;
            events.push(SubspaceEvent::SubspaceSaved { subspace_id: subspace.id });
            Ok(())
        })
    }

    pub fn has_subspace(&self, store: &dyn KvStore, subspace_id: SubspaceId) -> StoreResult<bool> {
        store.has(&keys::subspace_key(subspace_id))
    }

    pub fn get_subspace(&self, store: &dyn KvStore, subspace_id: SubspaceId) -> StoreResult<Option<Subspace>> {
        read(store, &keys::subspace_key(subspace_id))
    }

    /// Get a subspace or fail with `SubspaceNotFound`
    pub fn require_subspace(&self, store: &dyn KvStore, subspace_id: SubspaceId) -> SubspacesResult<Subspace> {
        self.get_subspace(store, subspace_id)?
            .ok_or(SubspacesError::SubspaceNotFound(subspace_id))
    }

    /// All subspaces in id order
    pub fn subspaces(&self, store: &dyn KvStore) -> StoreResult<Vec<Subspace>> {
        store
            .iter_prefix(&keys::subspaces_prefix())?
            .map(|(_, value)| crate::core_store::decode(&value))
            .collect()
    }

    /// Delete a subspace and everything scoped to it
    pub fn delete_subspace(&self, store: &mut dyn KvStore, subspace_id: SubspaceId) -> SubspacesResult<()> {
        self.transition(store, |tx, events| {
            self.require_subspace(tx, subspace_id)?;

            // Walk the tree first so every section and group gets its own hook
            let children = self.children_by_parent(tx, subspace_id)?;
            let mut visited = HashSet::new();
            self.delete_section_tree(tx, subspace_id, ROOT_SECTION_ID, &children, &mut visited, events)?;

            // Grants that survived the walk (orphans) still need their index entries removed
            for prefix in [keys::user_grants_prefix(subspace_id), keys::group_grants_prefix(subspace_id)] {
                for key in prefix_keys(tx, &prefix)? {
                    let grant_key = keys::parse_grant_store_key(&key)?;
                    self.remove_grant_in(tx, &grant_key, events)?;
                }
            }

            for prefix in keys::SUBSPACE_SCOPED_PREFIXES {
                delete_prefix(tx, &keys::subspace_scoped_prefix(prefix, subspace_id))?;
            }

            tx.delete(&keys::subspace_key(subspace_id))?;
            events.push(SubspaceEvent::SubspaceDeleted { subspace_id });
            Ok(())
        })?;

        info!(subspace_id, "deleted subspace");
        Ok(())
    }
}
