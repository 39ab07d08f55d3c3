use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use subspaces_core::core_feegrant::{Allowance, Coins, Grant};
use subspaces_core::core_store::MemoryStore;
use subspaces_core::core_subspaces::{
    Address, FeeUsage, Keeper, Permission, Permissions, SectionId, SubspaceId, Timestamp, ROOT_SECTION_ID,
};
use subspaces_core::test_utils::setup_subspace;

/// Subspace with a chain of `depth` sections, one group per level and a
/// member in every other group. Returns the deepest section.
fn deep_tree(keeper: &Keeper, store: &mut MemoryStore, depth: u32, user: &Address) -> (SubspaceId, SectionId) {
    let subspace = setup_subspace(keeper, store, "owner");
    let mut section = ROOT_SECTION_ID;
    for level in 0..depth {
        section = keeper
            .create_section(store, subspace.id, section, &format!("level {}", level), "")
            .unwrap();
        let group = keeper
            .create_user_group(store, subspace.id, section, "group", "", Permissions::WRITE)
            .unwrap();
        if level % 2 == 0 {
            keeper.add_user_to_group(store, subspace.id, group.id, user).unwrap();
        }
    }
    (subspace.id, section)
}

fn bench_effective_permissions(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_resolution");
    group.measurement_time(Duration::from_secs(5));

    for depth in [1u32, 8, 32] {
        let keeper = Keeper::default();
        let mut store = MemoryStore::new();
        let user = Address::new("member");
        let (subspace_id, section_id) = deep_tree(&keeper, &mut store, depth, &user);

        group.bench_with_input(BenchmarkId::new("effective_permissions", depth), &depth, |b, _| {
            b.iter(|| black_box(keeper.effective_permissions(&store, subspace_id, section_id, &user).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("has_permission_denied", depth), &depth, |b, _| {
            b.iter(|| {
                black_box(keeper.has_permission(&store, subspace_id, section_id, &user, Permission::ManageSections))
            })
        });
    }

    group.finish();
}

fn bench_use_granted_fees(c: &mut Criterion) {
    let mut group = c.benchmark_group("allowances");

    let keeper = Keeper::default();
    let mut store = MemoryStore::new();
    let subspace = setup_subspace(&keeper, &mut store, "owner");
    let payer = Address::new("payer");
    keeper
        .grant_allowance(&mut store, Grant::to_user(subspace.id, "owner".into(), payer.clone(), Allowance::unlimited()))
        .unwrap();
    let fee = Coins::single("test", 1);

    group.bench_function("use_granted_fees_unlimited", |b| {
        b.iter(|| {
            let usage = FeeUsage::new(&fee, &[], Timestamp::from_millis(0));
            black_box(keeper.use_granted_fees(&mut store, subspace.id, &payer, &usage).unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_effective_permissions, bench_use_granted_fees);
criterion_main!(benches);
