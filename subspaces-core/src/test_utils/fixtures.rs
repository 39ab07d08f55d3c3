//! Test fixtures for creating common test objects

use crate::core_store::KvStore;
use crate::core_subspaces::accounts::KvAccountKeeper;
use crate::core_subspaces::hooks::{HookSet, SubspaceEvent, SubspacesHooks};
use crate::core_subspaces::keeper::Keeper;
use crate::core_subspaces::subspace::Subspace;
use crate::core_subspaces::types::{Address, Timestamp};
use std::sync::{Arc, Mutex};

/// Hooks subscriber that keeps every event it sees
#[derive(Debug, Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<SubspaceEvent>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in dispatch order
    pub fn events(&self) -> Vec<SubspaceEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl SubspacesHooks for RecordingHooks {
    fn on_event(&self, event: &SubspaceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Subspace draft owned and created by `owner`; the id is assigned on creation
pub fn draft_subspace(owner: &str) -> Subspace {
    Subspace::new(
        0,
        "Test subspace",
        "A subspace for tests",
        None,
        Address::new(owner),
        Address::new(owner),
        Timestamp::from_millis(1_000),
    )
}

/// Keeper whose only hook subscriber records events
pub fn keeper_with_recorder() -> (Keeper, Arc<RecordingHooks>) {
    let recorder = Arc::new(RecordingHooks::new());
    let hooks = HookSet::new().with(recorder.clone());
    (Keeper::new(hooks, Arc::new(KvAccountKeeper)), recorder)
}

/// Create a subspace owned by `owner`
pub fn setup_subspace(keeper: &Keeper, store: &mut dyn KvStore, owner: &str) -> Subspace {
    match keeper.create_subspace(store, draft_subspace(owner)) {
        Ok(subspace) => subspace,
        Err(e) => panic!("failed to create test subspace: {}", e),
    }
}
