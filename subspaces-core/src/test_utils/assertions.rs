//! Custom assertions for keeper tests

use crate::core_store::KvStore;
use crate::core_subspaces::errors::{ErrorKind, SubspacesResult};
use crate::core_subspaces::keeper::Keeper;
use crate::core_subspaces::permission::Permission;
use crate::core_subspaces::types::{Address, SectionId, SubspaceId};
use std::fmt::Debug;

/// Assert that a Result is Ok and return the value
pub fn assert_ok<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
}

/// Assert that a keeper call failed with the given kind of error
pub fn assert_error_kind<T: Debug>(result: SubspacesResult<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {:?} error, got Ok: {:?}", kind, value),
        Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {}", e),
    }
}

/// Assert that `user` holds `permission` in a section
pub fn assert_has_permission(
    keeper: &Keeper,
    store: &dyn KvStore,
    subspace_id: SubspaceId,
    section_id: SectionId,
    user: &Address,
    permission: Permission,
) {
    if !keeper.has_permission(store, subspace_id, section_id, user, permission) {
        panic!("Expected {} to hold {} in section {} of subspace {}", user, permission, section_id, subspace_id);
    }
}

/// Assert that `user` lacks `permission` in a section
pub fn assert_lacks_permission(
    keeper: &Keeper,
    store: &dyn KvStore,
    subspace_id: SubspaceId,
    section_id: SectionId,
    user: &Address,
    permission: Permission,
) {
    if keeper.has_permission(store, subspace_id, section_id, user, permission) {
        panic!("Expected {} to lack {} in section {} of subspace {}", user, permission, section_id, subspace_id);
    }
}

/// Assert that two collections have the same elements (order doesn't matter)
pub fn assert_same_elements<T: PartialEq + Debug>(a: &[T], b: &[T]) {
    if a.len() != b.len() || a.iter().any(|item| !b.contains(item)) {
        panic!("Collections differ. a: {:?}, b: {:?}", a, b);
    }
}
