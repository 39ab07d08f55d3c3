//! Section tree
//!
//! Sections form a tree rooted at section 0. Writes do not check parents
//! (ordered imports store children before parents are known to be valid);
//! administrative callers guard writes with [`Keeper::is_section_path_valid`].
//! Reads that walk a corrupted chain still terminate.

use super::{read, write, Keeper};
use crate::core_store::{decode, delete_prefix, KvStore, StoreResult};
use crate::core_subspaces::errors::{SubspacesError, SubspacesResult};
use crate::core_subspaces::hooks::SubspaceEvent;
use crate::core_subspaces::keys;
use crate::core_subspaces::section::{Section, SectionUpdate};
use crate::core_subspaces::types::{SectionId, SubspaceId, ROOT_SECTION_ID};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Lazy walk from a section up to and including the root.
///
/// Stops after the root, at a missing ancestor, or when a section would be
/// visited twice; a corrupted chain therefore ends early instead of looping.
pub struct AncestorsPath<'a> {
    store: &'a dyn KvStore,
    subspace_id: SubspaceId,
    next: Option<SectionId>,
    visited: HashSet<SectionId>,
}

impl<'a> AncestorsPath<'a> {
    fn new(store: &'a dyn KvStore, subspace_id: SubspaceId, section_id: SectionId) -> Self {
        Self { store, subspace_id, next: Some(section_id), visited: HashSet::new() }
    }
}

impl Iterator for AncestorsPath<'_> {
    type Item = StoreResult<Section>;

    fn next(&mut self) -> Option<Self::Item> {
        let section_id = self.next.take()?;
        if !self.visited.insert(section_id) {
            warn!(subspace_id = self.subspace_id, section_id, "cycle in section path, stopping walk");
            return None;
        }

        match read::<Section>(self.store, &keys::section_key(self.subspace_id, section_id)) {
            Ok(Some(section)) => {
                if !section.is_root() {
                    self.next = Some(section.parent_id);
                }
                Some(Ok(section))
            }
            // The root always exists, even when its record does not
            Ok(None) if section_id == ROOT_SECTION_ID => Some(Ok(Section::root(self.subspace_id))),
            Ok(None) => {
                warn!(subspace_id = self.subspace_id, section_id, "missing ancestor, stopping walk");
                None
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl Keeper {
    /// Id the next created section of `subspace_id` will get
    pub fn next_section_id(&self, store: &dyn KvStore, subspace_id: SubspaceId) -> StoreResult<SectionId> {
        match store.get(&keys::next_section_id_key(subspace_id))? {
            Some(bytes) => keys::decode_u32(&bytes),
            None => Ok(ROOT_SECTION_ID + 1),
        }
    }

    pub fn set_next_section_id(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        id: SectionId,
    ) -> StoreResult<()> {
        store.set(&keys::next_section_id_key(subspace_id), &id.to_be_bytes())
    }

    /// Create a section under `parent_id`, allocating its id
    pub fn create_section(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        parent_id: SectionId,
        name: &str,
        description: &str,
    ) -> SubspacesResult<Section> {
        let section = self.transition(store, |tx, events| {
            self.require_subspace(tx, subspace_id)?;
            self.require_section(tx, subspace_id, parent_id)?;

            let id = self.next_section_id(tx, subspace_id)?;
            let section = Section::new(subspace_id, id, parent_id, name, description);
            section.validate()?;

            write(tx, &keys::section_key(subspace_id, id), &section)?;
            if !self.is_section_path_valid(tx, subspace_id, id)? {
                return Err(SubspacesError::InvalidSectionPath { subspace_id, section_id: id });
            }

            let next = id
                .checked_add(1)
                .ok_or_else(|| SubspacesError::InvalidRequest("section ids exhausted".to_string()))?;
            self.set_next_section_id(tx, subspace_id, next)?;
            events.push(SubspaceEvent::SectionSaved { subspace_id, section_id: id });
            Ok(section)
        })?;

        info!(subspace_id, section_id = section.id, parent_id, "created section");
        Ok(section)
    }

    /// Store a section verbatim. The parent is not checked.
    pub fn save_section(&self, store: &mut dyn KvStore, section: &Section) -> SubspacesResult<()> {
        section.validate()?;
        self.transition(store, |tx, events| {
            write(tx, &keys::section_key(section.subspace_id, section.id), section)?;
            events.push(SubspaceEvent::SectionSaved {
                subspace_id: section.subspace_id,
                section_id: section.id,
            });
            Ok(())
        })
    }

    /// Change a section's name or description
    pub fn edit_section(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        update: SectionUpdate,
    ) -> SubspacesResult<Section> {
        let updated = self.require_section(store, subspace_id, section_id)?.update(update);
        self.save_section(store, &updated)?;
        Ok(updated)
    }

    /// Re-parent a section, rejecting moves that would create a cycle
    pub fn move_section(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        new_parent_id: SectionId,
    ) -> SubspacesResult<Section> {
        if section_id == ROOT_SECTION_ID {
            return Err(SubspacesError::RootSectionImmutable(subspace_id));
        }

        let moved = self.transition(store, |tx, events| {
            let mut section = self.require_section(tx, subspace_id, section_id)?;
            self.require_section(tx, subspace_id, new_parent_id)?;

            section.parent_id = new_parent_id;
            section.validate()?;
            write(tx, &keys::section_key(subspace_id, section_id), &section)?;

            // Checked against the pending write; a failure discards it
            if !self.is_section_path_valid(tx, subspace_id, section_id)? {
                return Err(SubspacesError::InvalidSectionPath { subspace_id, section_id });
            }

            events.push(SubspaceEvent::SectionSaved { subspace_id, section_id });
            Ok(section)
        })?;

        info!(subspace_id, section_id, new_parent_id, "moved section");
        Ok(moved)
    }

    pub fn has_section(&self, store: &dyn KvStore, subspace_id: SubspaceId, section_id: SectionId) -> StoreResult<bool> {
        store.has(&keys::section_key(subspace_id, section_id))
    }

    pub fn get_section(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
    ) -> StoreResult<Option<Section>> {
        read(store, &keys::section_key(subspace_id, section_id))
    }

    /// Get a section or fail with `SectionNotFound`
    pub fn require_section(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
    ) -> SubspacesResult<Section> {
        self.get_section(store, subspace_id, section_id)?
            .ok_or(SubspacesError::SectionNotFound { subspace_id, section_id })
    }

    /// All sections of a subspace in id order
    pub fn sections(&self, store: &dyn KvStore, subspace_id: SubspaceId) -> StoreResult<Vec<Section>> {
        store
            .iter_prefix(&keys::sections_prefix(subspace_id))?
            .map(|(_, value)| decode(&value))
            .collect()
    }

    /// Direct children of `parent_id`
    pub fn child_sections(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        parent_id: SectionId,
    ) -> StoreResult<Vec<Section>> {
        Ok(self
            .sections(store, subspace_id)?
            .into_iter()
            .filter(|s| s.parent_id == parent_id && !s.is_root())
            .collect())
    }

    /// Child ids of every section, from one scan of the subspace
    pub(crate) fn children_by_parent(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
    ) -> StoreResult<HashMap<SectionId, Vec<SectionId>>> {
        let mut children: HashMap<SectionId, Vec<SectionId>> = HashMap::new();
        for section in self.sections(store, subspace_id)? {
            if !section.is_root() {
                children.entry(section.parent_id).or_default().push(section.id);
            }
        }
        Ok(children)
    }

    /// Whether following parents from `section_id` reaches the root without
    /// revisiting a section or hitting a missing one
    pub fn is_section_path_valid(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
    ) -> StoreResult<bool> {
        let mut visited = HashSet::new();
        let mut current = section_id;

        loop {
            if !visited.insert(current) {
                debug!(subspace_id, section_id, revisited = current, "section path has a cycle");
                return Ok(false);
            }
            if current == ROOT_SECTION_ID {
                return Ok(true);
            }
            match self.get_section(store, subspace_id, current)? {
                Some(section) => current = section.parent_id,
                None => {
                    debug!(subspace_id, section_id, missing = current, "section path is broken");
                    return Ok(false);
                }
            }
        }
    }

    /// Sections from `section_id` up to the root, child first
    pub fn ancestors_path<'a>(
        &self,
        store: &'a dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
    ) -> AncestorsPath<'a> {
        AncestorsPath::new(store, subspace_id, section_id)
    }

    /// Delete a section with its subtree, groups and permissions
    pub fn delete_section(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
    ) -> SubspacesResult<()> {
        if section_id == ROOT_SECTION_ID {
            return Err(SubspacesError::RootSectionImmutable(subspace_id));
        }

        self.transition(store, |tx, events| {
            self.require_section(tx, subspace_id, section_id)?;
            let children = self.children_by_parent(tx, subspace_id)?;
            let mut visited = HashSet::new();
            self.delete_section_tree(tx, subspace_id, section_id, &children, &mut visited, events)
        })?;

        info!(subspace_id, section_id, "deleted section");
        Ok(())
    }

    /// Post-order cascade: groups, permissions, children, then the record
    pub(crate) fn delete_section_tree(
        &self,
        tx: &mut dyn KvStore,
        subspace_id: SubspaceId,
        section_id: SectionId,
        children: &HashMap<SectionId, Vec<SectionId>>,
        visited: &mut HashSet<SectionId>,
        events: &mut Vec<SubspaceEvent>,
    ) -> SubspacesResult<()> {
        if !visited.insert(section_id) {
            return Ok(());
        }

        let groups = self.user_groups_in_section(tx, subspace_id, section_id)?.collect::<StoreResult<Vec<_>>>()?;
        for group in groups {
            self.delete_user_group_in(tx, &group, events)?;
        }

        let removed = delete_prefix(tx, &keys::section_permissions_prefix(subspace_id, section_id))?;
        debug!(subspace_id, section_id, removed, "removed section permissions");

        for child in children.get(&section_id).into_iter().flatten() {
            self.delete_section_tree(tx, subspace_id, *child, children, visited, events)?;
        }

        tx.delete(&keys::section_key(subspace_id, section_id))?;
        crate::metrics::record_section_deleted();
        events.push(SubspaceEvent::SectionDeleted { subspace_id, section_id });
        Ok(())
    }
}
