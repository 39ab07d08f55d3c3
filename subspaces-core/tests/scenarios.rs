/*
    scenarios.rs - End-to-end keeper scenarios

    Each test drives the public keeper API against an in-memory store the
    way a message handler would: create a subspace, shape its section tree
    and groups, then check permissions and spend allowances.
*/

use subspaces_core::core_feegrant::{Allowance, Coins, Grant, Grantee};
use subspaces_core::core_store::MemoryStore;
use subspaces_core::core_subspaces::{
    Address, ErrorKind, FeeUsage, Permission, Permissions, SubspaceEvent, SubspacesError, Timestamp,
    ROOT_SECTION_ID,
};
use subspaces_core::test_utils::{
    assert_error_kind, assert_has_permission, assert_lacks_permission, keeper_with_recorder, setup_subspace,
};

fn coins(amount: u128) -> Coins {
    Coins::single("test", amount)
}

/// Scenario A: group permissions at the root
#[test]
fn test_group_permission_at_root() {
    let (keeper, _) = keeper_with_recorder();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "O");
    let user = Address::new("U");

    let group = keeper
        .create_user_group(&mut store, subspace.id, ROOT_SECTION_ID, "G1", "", Permissions::EDIT_SUBSPACE)
        .unwrap();
    keeper.add_user_to_group(&mut store, subspace.id, group.id, &user).unwrap();

    assert_has_permission(&keeper, &store, subspace.id, ROOT_SECTION_ID, &user, Permission::EditSubspace);
    assert_lacks_permission(&keeper, &store, subspace.id, ROOT_SECTION_ID, &user, Permission::DeleteSubspace);
}

/// Scenario B: individual permissions are inherited by descendants
#[test]
fn test_individual_permission_inherited() {
    let (keeper, _) = keeper_with_recorder();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "O");
    let user = Address::new("U");

    let a = keeper.create_section(&mut store, subspace.id, ROOT_SECTION_ID, "A", "").unwrap();
    let c = keeper.create_section(&mut store, subspace.id, a.id, "C", "").unwrap();
    keeper
        .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &user, Permissions::MANAGE_GROUPS)
        .unwrap();

    let effective = keeper.effective_permissions(&store, subspace.id, c.id, &user).unwrap();
    assert!(effective.contains(Permissions::MANAGE_GROUPS));
    assert!(keeper.get_user_permissions(&store, subspace.id, a.id, &user).unwrap().is_empty());
    assert!(keeper.get_user_permissions(&store, subspace.id, c.id, &user).unwrap().is_empty());
}

/// Scenario C: a user allowance is decremented, then removed when used up
#[test]
fn test_user_allowance_spent_to_exhaustion() {
    let (keeper, recorder) = keeper_with_recorder();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "G");
    let granter = Address::new("G");
    let user = Address::new("U");
    let now = Timestamp::from_millis(10_000);

    keeper
        .grant_allowance(&mut store, Grant::to_user(subspace.id, granter.clone(), user.clone(), Allowance::basic(coins(100), None)))
        .unwrap();

    let fee = coins(10);
    keeper
        .use_user_grant(&mut store, subspace.id, &granter, &user, &FeeUsage::new(&fee, &[], now))
        .unwrap();
    let grant = keeper.get_user_grant(&store, subspace.id, &granter, &user).unwrap().unwrap();
    assert_eq!(grant.allowance, Allowance::basic(coins(90), None));

    let fee = coins(90);
    keeper
        .use_user_grant(&mut store, subspace.id, &granter, &user, &FeeUsage::new(&fee, &[], now))
        .unwrap();
    assert!(!keeper.has_user_grant(&store, subspace.id, &granter, &user).unwrap());
    assert!(matches!(recorder.events().last(), Some(SubspaceEvent::GrantDeleted { .. })));
}

/// Scenario D: granting twice for the same key is rejected
#[test]
fn test_duplicate_grant_rejected() {
    let (keeper, _) = keeper_with_recorder();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "G");
    let granter = Address::new("G");
    let user = Address::new("U");

    let original = Grant::to_user(subspace.id, granter.clone(), user.clone(), Allowance::basic(coins(100), None));
    keeper.grant_allowance(&mut store, original.clone()).unwrap();

    let replacement = Grant::to_user(subspace.id, granter.clone(), user.clone(), Allowance::unlimited());
    let err = keeper.grant_allowance(&mut store, replacement).unwrap_err();
    assert!(matches!(err, SubspacesError::GrantAlreadyExists(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    assert_eq!(keeper.get_user_grant(&store, subspace.id, &granter, &user).unwrap(), Some(original));
}

/// Scenario E: group membership is checked when the grant is used
#[test]
fn test_group_grant_rechecks_membership() {
    let (keeper, _) = keeper_with_recorder();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "G");
    let granter = Address::new("G");
    let user = Address::new("U");
    let now = Timestamp::from_millis(10_000);

    let group = keeper
        .create_user_group(&mut store, subspace.id, ROOT_SECTION_ID, "G1", "", Permissions::empty())
        .unwrap();
    keeper.add_user_to_group(&mut store, subspace.id, group.id, &user).unwrap();
    keeper
        .grant_allowance(&mut store, Grant::to_group(subspace.id, granter.clone(), group.id, Allowance::basic(coins(100), None)))
        .unwrap();

    let fee = coins(1);
    keeper
        .use_group_grant(&mut store, subspace.id, &granter, group.id, &user, &FeeUsage::new(&fee, &[], now))
        .unwrap();

    keeper.remove_user_from_group(&mut store, subspace.id, group.id, &user).unwrap();

    let err = keeper
        .use_group_grant(&mut store, subspace.id, &granter, group.id, &user, &FeeUsage::new(&fee, &[], now))
        .unwrap_err();
    assert!(matches!(err, SubspacesError::PayerNotInGroup { .. }));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_error_kind(
        keeper.use_granted_fees(&mut store, subspace.id, &user, &FeeUsage::new(&fee, &[], now)),
        ErrorKind::AllowanceRejected,
    );

    let grant = keeper.get_group_grant(&store, subspace.id, &granter, group.id).unwrap().unwrap();
    assert_eq!(grant.allowance, Allowance::basic(coins(99), None));
}

#[test]
fn test_revoked_grant_cannot_be_used() {
    let (keeper, _) = keeper_with_recorder();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "G");
    let granter = Address::new("G");
    let user = Address::new("U");

    keeper
        .grant_allowance(&mut store, Grant::to_user(subspace.id, granter.clone(), user.clone(), Allowance::unlimited()))
        .unwrap();
    keeper
        .revoke_allowance(&mut store, &granter, subspace.id, Grantee::User(user.clone()))
        .unwrap();

    let fee = coins(1);
    let err = keeper
        .use_user_grant(&mut store, subspace.id, &granter, &user, &FeeUsage::new(&fee, &[], Timestamp::from_millis(0)))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_deleting_section_cascades() {
    let (keeper, _) = keeper_with_recorder();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "O");
    let user = Address::new("U");

    let a = keeper.create_section(&mut store, subspace.id, ROOT_SECTION_ID, "A", "").unwrap();
    let b = keeper.create_section(&mut store, subspace.id, a.id, "B", "").unwrap();
    let group = keeper
        .create_user_group(&mut store, subspace.id, b.id, "writers", "", Permissions::WRITE)
        .unwrap();
    keeper.add_user_to_group(&mut store, subspace.id, group.id, &user).unwrap();
    keeper
        .set_user_permissions(&mut store, subspace.id, b.id, &user, Permissions::MODERATE_CONTENT)
        .unwrap();

    keeper.delete_section(&mut store, subspace.id, a.id).unwrap();

    assert!(!keeper.has_section(&store, subspace.id, b.id).unwrap());
    assert!(!keeper.has_user_group(&store, subspace.id, group.id).unwrap());
    assert!(!keeper.has_user_permissions(&store, subspace.id, b.id, &user).unwrap());
    assert_error_kind(
        keeper.effective_permissions(&store, subspace.id, b.id, &user),
        ErrorKind::NotFound,
    );
}
