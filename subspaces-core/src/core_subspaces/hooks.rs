//! Mutation hooks
//!
//! Subscribers are injected into the keeper through a [`HookSet`] and are
//! called synchronously, in registration order, after a state transition has
//! been committed. An empty set is valid.

use super::permission::Permissions;
use super::types::{Address, GroupId, SectionId, SubspaceId};
use crate::core_feegrant::GrantKey;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// A committed keeper mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubspaceEvent {
    SubspaceSaved { subspace_id: SubspaceId },
    SubspaceDeleted { subspace_id: SubspaceId },
    SectionSaved { subspace_id: SubspaceId, section_id: SectionId },
    SectionDeleted { subspace_id: SubspaceId, section_id: SectionId },
    UserGroupSaved { subspace_id: SubspaceId, group_id: GroupId },
    UserGroupDeleted { subspace_id: SubspaceId, group_id: GroupId },
    GroupMemberAdded { subspace_id: SubspaceId, group_id: GroupId, user: Address },
    GroupMemberRemoved { subspace_id: SubspaceId, group_id: GroupId, user: Address },
    UserPermissionSet {
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: Address,
        permissions: Permissions,
    },
    UserPermissionRemoved { subspace_id: SubspaceId, section_id: SectionId, user: Address },
    GrantSaved { key: GrantKey },
    GrantDeleted { key: GrantKey },
}

impl SubspaceEvent {
    /// Hook name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            SubspaceEvent::SubspaceSaved { .. } => "after_subspace_saved",
            SubspaceEvent::SubspaceDeleted { .. } => "after_subspace_deleted",
            SubspaceEvent::SectionSaved { .. } => "after_section_saved",
            SubspaceEvent::SectionDeleted { .. } => "after_section_deleted",
            SubspaceEvent::UserGroupSaved { .. } => "after_user_group_saved",
            SubspaceEvent::UserGroupDeleted { .. } => "after_user_group_deleted",
            SubspaceEvent::GroupMemberAdded { .. } => "after_group_member_added",
            SubspaceEvent::GroupMemberRemoved { .. } => "after_group_member_removed",
            SubspaceEvent::UserPermissionSet { .. } => "after_user_permission_set",
            SubspaceEvent::UserPermissionRemoved { .. } => "after_user_permission_removed",
            SubspaceEvent::GrantSaved { .. } => "after_grant_saved",
            SubspaceEvent::GrantDeleted { .. } => "after_grant_deleted",
        }
    }

    /// Subspace the event belongs to
    pub fn subspace_id(&self) -> SubspaceId {
        match self {
            SubspaceEvent::SubspaceSaved { subspace_id }
            | SubspaceEvent::SubspaceDeleted { subspace_id }
            | SubspaceEvent::SectionSaved { subspace_id, .. }
            | SubspaceEvent::SectionDeleted { subspace_id, .. }
            | SubspaceEvent::UserGroupSaved { subspace_id, .. }
            | SubspaceEvent::UserGroupDeleted { subspace_id, .. }
            | SubspaceEvent::GroupMemberAdded { subspace_id, .. }
            | SubspaceEvent::GroupMemberRemoved { subspace_id, .. }
            | SubspaceEvent::UserPermissionSet { subspace_id, .. }
            | SubspaceEvent::UserPermissionRemoved { subspace_id, .. } => *subspace_id,
            SubspaceEvent::GrantSaved { key } | SubspaceEvent::GrantDeleted { key } => key.subspace_id,
        }
    }
}

/// Observer of keeper mutations.
///
/// Every method defaults to forwarding an event to [`SubspacesHooks::on_event`],
/// which itself does nothing. Implement the typed methods you care about, or
/// `on_event` to see everything.
pub trait SubspacesHooks: Send + Sync {
    fn after_subspace_saved(&self, subspace_id: SubspaceId) {
        self.on_event(&SubspaceEvent::SubspaceSaved { subspace_id });
    }

    fn after_subspace_deleted(&self, subspace_id: SubspaceId) {
        self.on_event(&SubspaceEvent::SubspaceDeleted { subspace_id });
    }

    fn after_section_saved(&self, subspace_id: SubspaceId, section_id: SectionId) {
        self.on_event(&SubspaceEvent::SectionSaved { subspace_id, section_id });
    }

    fn after_section_deleted(&self, subspace_id: SubspaceId, section_id: SectionId) {
        self.on_event(&SubspaceEvent::SectionDeleted { subspace_id, section_id });
    }

    fn after_user_group_saved(&self, subspace_id: SubspaceId, group_id: GroupId) {
        self.on_event(&SubspaceEvent::UserGroupSaved { subspace_id, group_id });
    }

    fn after_user_group_deleted(&self, subspace_id: SubspaceId, group_id: GroupId) {
        self.on_event(&SubspaceEvent::UserGroupDeleted { subspace_id, group_id });
    }

    fn after_group_member_added(&self, subspace_id: SubspaceId, group_id: GroupId, user: &Address) {
        self.on_event(&SubspaceEvent::GroupMemberAdded { subspace_id, group_id, user: user.clone() });
    }

    fn after_group_member_removed(&self, subspace_id: SubspaceId, group_id: GroupId, user: &Address) {
        self.on_event(&SubspaceEvent::GroupMemberRemoved { subspace_id, group_id, user: user.clone() });
    }

    fn after_user_permission_set(
        &self,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
        permissions: Permissions,
    ) {
        self.on_event(&SubspaceEvent::UserPermissionSet {
            subspace_id,
            section_id,
            user: user.clone(),
            permissions,
        });
    }

    fn after_user_permission_removed(&self, subspace_id: SubspaceId, section_id: SectionId, user: &Address) {
        self.on_event(&SubspaceEvent::UserPermissionRemoved {
            subspace_id,
            section_id,
            user: user.clone(),
        });
    }

    fn after_grant_saved(&self, key: &GrantKey) {
        self.on_event(&SubspaceEvent::GrantSaved { key: key.clone() });
    }

    fn after_grant_deleted(&self, key: &GrantKey) {
        self.on_event(&SubspaceEvent::GrantDeleted { key: key.clone() });
    }

    fn on_event(&self, _event: &SubspaceEvent) {}
}

/// Ordered list of hook subscribers
#[derive(Clone, Default)]
pub struct HookSet {
    subscribers: Vec<Arc<dyn SubspacesHooks>>,
}

impl HookSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber, builder style
    pub fn with(mut self, hooks: Arc<dyn SubspacesHooks>) -> Self {
        self.subscribers.push(hooks);
        self
    }

    /// Add a subscriber
    pub fn add(&mut self, hooks: Arc<dyn SubspacesHooks>) {
        self.subscribers.push(hooks);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver one event to every subscriber
    pub fn dispatch(&self, event: &SubspaceEvent) {
        trace!(hook = event.name(), subspace_id = event.subspace_id(), "dispatching hook");
        for hooks in &self.subscribers {
            match event {
                SubspaceEvent::SubspaceSaved { subspace_id } => hooks.after_subspace_saved(*subspace_id),
                SubspaceEvent::SubspaceDeleted { subspace_id } => hooks.after_subspace_deleted(*subspace_id),
                SubspaceEvent::SectionSaved { subspace_id, section_id } => {
                    hooks.after_section_saved(*subspace_id, *section_id)
                }
                SubspaceEvent::SectionDeleted { subspace_id, section_id } => {
                    hooks.after_section_deleted(*subspace_id, *section_id)
                }
                SubspaceEvent::UserGroupSaved { subspace_id, group_id } => {
                    hooks.after_user_group_saved(*subspace_id, *group_id)
                }
                SubspaceEvent::UserGroupDeleted { subspace_id, group_id } => {
                    hooks.after_user_group_deleted(*subspace_id, *group_id)
                }
                SubspaceEvent::GroupMemberAdded { subspace_id, group_id, user } => {
                    hooks.after_group_member_added(*subspace_id, *group_id, user)
                }
                SubspaceEvent::GroupMemberRemoved { subspace_id, group_id, user } => {
                    hooks.after_group_member_removed(*subspace_id, *group_id, user)
                }
                SubspaceEvent::UserPermissionSet { subspace_id, section_id, user, permissions } => {
                    hooks.after_user_permission_set(*subspace_id, *section_id, user, *permissions)
                }
                SubspaceEvent::UserPermissionRemoved { subspace_id, section_id, user } => {
                    hooks.after_user_permission_removed(*subspace_id, *section_id, user)
                }
                SubspaceEvent::GrantSaved { key } => hooks.after_grant_saved(key),
                SubspaceEvent::GrantDeleted { key } => hooks.after_grant_deleted(key),
            }
        }
    }

    /// Deliver events in order
    pub fn dispatch_all(&self, events: impl IntoIterator<Item = SubspaceEvent>) {
        for event in events {
            self.dispatch(&event);
        }
    }
}

impl std::fmt::Debug for HookSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSet").field("subscribers", &self.subscribers.len()).finish()
    }
}

/// Forwards every event onto a tokio broadcast channel
#[derive(Clone)]
pub struct BroadcastHooks {
    tx: broadcast::Sender<SubspaceEvent>,
}

impl BroadcastHooks {
    /// Create a broadcaster buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SubspaceEvent> {
        self.tx.subscribe()
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastHooks {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SubspacesHooks for BroadcastHooks {
    fn on_event(&self, event: &SubspaceEvent) {
        // No receivers is not an error
        let _ = self.tx.send(event.clone());
    }
}
