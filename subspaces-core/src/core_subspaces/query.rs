//! Read-only queries
//!
//! List queries page over one ordered key range. A page is addressed either
//! by `key` (the cursor returned as `next_key` by the previous page) or by
//! `offset`; an empty range is an empty page, never an error.

use super::errors::{SubspacesError, SubspacesResult};
use super::group::UserGroup;
use super::keeper::{decode_group, Keeper, PermissionDetail};
use super::keys;
use super::permission::Permissions;
use super::section::Section;
use super::subspace::{Subspace, UserListKind};
use super::types::{Address, GroupId, SectionId, SubspaceId};
use crate::config::QueryConfig;
use crate::core_feegrant::{Grant, GrantKey, Grantee};
use crate::core_store::{decode, prefix_end, KvStore, StoreResult};
use serde::{Deserialize, Serialize};

/// Page selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Cursor returned by the previous page
    pub key: Option<Vec<u8>>,
    /// Entries to skip; only used without `key`
    pub offset: u64,
    /// Page size; 0 means the configured default
    pub limit: u64,
    /// Count every entry in the range; only honored without `key`
    pub count_total: bool,
}

impl PageRequest {
    pub fn with_limit(limit: u64) -> Self {
        PageRequest { limit, ..Default::default() }
    }

    /// Request for the page following `response`
    pub fn next(&self, response: &PageResponse) -> Option<PageRequest> {
        response.next_key.as_ref().map(|key| PageRequest {
            key: Some(key.clone()),
            offset: 0,
            limit: self.limit,
            count_total: false,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    /// Cursor of the next page, `None` on the last page
    pub next_key: Option<Vec<u8>>,
    pub total: Option<u64>,
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageResponse,
}

/// Effective permissions of a user and where they come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPermissions {
    pub permissions: Permissions,
    pub details: Vec<PermissionDetail>,
}

/// Page over the entries under `prefix`.
///
/// `decode` receives each key with `prefix` stripped, and the value.
pub fn paginate<T, F>(
    store: &dyn KvStore,
    prefix: &[u8],
    page: &PageRequest,
    config: &QueryConfig,
    mut decode: F,
) -> SubspacesResult<Page<T>>
where
    F: FnMut(&[u8], &[u8]) -> StoreResult<T>,
{
    if page.key.is_some() && page.offset > 0 {
        return Err(SubspacesError::InvalidRequest(
            "either offset or key is expected, got both".to_string(),
        ));
    }

    let limit = usize::try_from(config.clamp_limit(page.limit)).unwrap_or(usize::MAX);
    let end = prefix_end(prefix);

    let start = match &page.key {
        Some(key) => [prefix, key.as_slice()].concat(),
        None => prefix.to_vec(),
    };
    let skip = match &page.key {
        Some(_) => 0,
        None => usize::try_from(page.offset).unwrap_or(usize::MAX),
    };

    let mut items = Vec::new();
    let mut next_key = None;
    let mut total = 0u64;
    let count_total = page.count_total && page.key.is_none();

    for (index, (key, value)) in store.iter_range(&start, end.as_deref())?.enumerate() {
        total += 1;
        if index < skip {
            continue;
        }
        if items.len() == limit {
            if next_key.is_none() {
                next_key = Some(key[prefix.len()..].to_vec());
            }
            if count_total {
                continue;
            }
            break;
        }
        items.push(decode(&key[prefix.len()..], &value)?);
    }

    Ok(Page {
        items,
        pagination: PageResponse { next_key, total: count_total.then_some(total) },
    })
}

fn decode_address_suffix(suffix: &[u8]) -> StoreResult<Address> {
    let (user, rest) = keys::read_address(suffix)?;
    keys::expect_end(rest)?;
    Ok(user)
}

/// Read-only view over the keeper's state
pub struct Querier<'a> {
    keeper: &'a Keeper,
    store: &'a dyn KvStore,
    config: QueryConfig,
}

impl<'a> Querier<'a> {
    pub fn new(keeper: &'a Keeper, store: &'a dyn KvStore) -> Self {
        Self::with_config(keeper, store, QueryConfig::default())
    }

    pub fn with_config(keeper: &'a Keeper, store: &'a dyn KvStore, config: QueryConfig) -> Self {
        Querier { keeper, store, config }
    }

    pub fn subspace(&self, subspace_id: SubspaceId) -> SubspacesResult<Subspace> {
        self.keeper.require_subspace(self.store, subspace_id)
    }

    pub fn subspaces(&self, page: &PageRequest) -> SubspacesResult<Page<Subspace>> {
        paginate(self.store, &keys::subspaces_prefix(), page, &self.config, |_, value| decode(value))
    }

    /// Admins, registered or banned users of a subspace
    pub fn user_list(
        &self,
        subspace_id: SubspaceId,
        kind: UserListKind,
        page: &PageRequest,
    ) -> SubspacesResult<Page<Address>> {
        self.keeper.require_subspace(self.store, subspace_id)?;
        paginate(self.store, &keys::user_list_prefix(subspace_id, kind), page, &self.config, |suffix, _| {
            decode_address_suffix(suffix)
        })
    }

    pub fn sections(&self, subspace_id: SubspaceId, page: &PageRequest) -> SubspacesResult<Page<Section>> {
        self.keeper.require_subspace(self.store, subspace_id)?;
        paginate(self.store, &keys::sections_prefix(subspace_id), page, &self.config, |_, value| decode(value))
    }

    pub fn section(&self, subspace_id: SubspaceId, section_id: SectionId) -> SubspacesResult<Section> {
        self.keeper.require_subspace(self.store, subspace_id)?;
        self.keeper.require_section(self.store, subspace_id, section_id)
    }

    /// Groups of a subspace, or only those living in `section_id`
    pub fn user_groups(
        &self,
        subspace_id: SubspaceId,
        section_id: Option<SectionId>,
        page: &PageRequest,
    ) -> SubspacesResult<Page<UserGroup>> {
        self.keeper.require_subspace(self.store, subspace_id)?;
        let prefix = match section_id {
            Some(section_id) => {
                self.keeper.require_section(self.store, subspace_id, section_id)?;
                keys::section_groups_prefix(subspace_id, section_id)
            }
            None => keys::groups_prefix(subspace_id),
        };
        paginate(self.store, &prefix, page, &self.config, |_, value| decode_group(value))
    }

    pub fn user_group(&self, subspace_id: SubspaceId, group_id: GroupId) -> SubspacesResult<UserGroup> {
        self.keeper.require_subspace(self.store, subspace_id)?;
        self.keeper.require_user_group(self.store, subspace_id, group_id)
    }

    /// Stored members of a group. The default group has none stored.
    pub fn user_group_members(
        &self,
        subspace_id: SubspaceId,
        group_id: GroupId,
        page: &PageRequest,
    ) -> SubspacesResult<Page<Address>> {
        self.user_group(subspace_id, group_id)?;
        paginate(
            self.store,
            &keys::group_members_prefix(subspace_id, group_id),
            page,
            &self.config,
            |suffix, _| decode_address_suffix(suffix),
        )
    }

    pub fn user_permissions(
        &self,
        subspace_id: SubspaceId,
        section_id: SectionId,
        user: &Address,
    ) -> SubspacesResult<UserPermissions> {
        let permissions = self.keeper.effective_permissions(self.store, subspace_id, section_id, user)?;
        let details = self.keeper.permission_details(self.store, subspace_id, section_id, user)?;
        Ok(UserPermissions { permissions, details })
    }

    pub fn user_grant(&self, subspace_id: SubspaceId, granter: &Address, grantee: &Address) -> SubspacesResult<Grant> {
        let key = GrantKey::new(subspace_id, granter.clone(), Grantee::User(grantee.clone()));
        self.keeper.get_grant(self.store, &key)?.ok_or(SubspacesError::GrantNotFound(key))
    }

    pub fn group_grant(&self, subspace_id: SubspaceId, granter: &Address, group_id: GroupId) -> SubspacesResult<Grant> {
        let key = GrantKey::new(subspace_id, granter.clone(), Grantee::Group(group_id));
        self.keeper.get_grant(self.store, &key)?.ok_or(SubspacesError::GrantNotFound(key))
    }

    /// User grants of a subspace, or only those made to `grantee`
    pub fn user_grants(
        &self,
        subspace_id: SubspaceId,
        grantee: Option<&Address>,
        page: &PageRequest,
    ) -> SubspacesResult<Page<Grant>> {
        let prefix = match grantee {
            Some(grantee) => keys::grantee_user_grants_prefix(subspace_id, grantee),
            None => keys::user_grants_prefix(subspace_id),
        };
        paginate(self.store, &prefix, page, &self.config, |_, value| decode(value))
    }

    /// Group grants of a subspace, or only those made to `group_id`
    pub fn group_grants(
        &self,
        subspace_id: SubspaceId,
        group_id: Option<GroupId>,
        page: &PageRequest,
    ) -> SubspacesResult<Page<Grant>> {
        let prefix = match group_id {
            Some(group_id) => keys::group_grants_for_group_prefix(subspace_id, group_id),
            None => keys::group_grants_prefix(subspace_id),
        };
        paginate(self.store, &prefix, page, &self.config, |_, value| decode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_feegrant::Allowance;
    use crate::core_store::MemoryStore;
    use crate::core_subspaces::errors::ErrorKind;
    use crate::core_subspaces::types::{DEFAULT_GROUP_ID, ROOT_SECTION_ID};
    use crate::test_utils::fixtures::{draft_subspace, keeper_with_recorder, setup_subspace};

    #[test]
    fn test_subspaces_pagination_by_key() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        for _ in 0..5 {
            keeper.create_subspace(&mut store, draft_subspace("owner")).unwrap();
        }
        let querier = Querier::new(&keeper, &store);

        let first = PageRequest { limit: 2, count_total: true, ..Default::default() };
        let page = querier.subspaces(&first).unwrap();
        assert_eq!(page.items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(page.pagination.total, Some(5));

        let second = first.next(&page.pagination).unwrap();
        let page = querier.subspaces(&second).unwrap();
        assert_eq!(page.items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(page.pagination.total, None);

        let third = second.next(&page.pagination).unwrap();
        let page = querier.subspaces(&third).unwrap();
        assert_eq!(page.items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![5]);
        assert!(third.next(&page.pagination).is_none());
    }

    #[test]
    fn test_offset_and_limit_clamp() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        for _ in 0..4 {
            keeper.create_subspace(&mut store, draft_subspace("owner")).unwrap();
        }
        let config = QueryConfig { default_limit: 1, max_limit: 2 };
        let querier = Querier::with_config(&keeper, &store, config);

        let page = querier.subspaces(&PageRequest { offset: 1, limit: 10, ..Default::default() }).unwrap();
        assert_eq!(page.items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![2, 3]);

        let page = querier.subspaces(&PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 1);

        let err = querier
            .subspaces(&PageRequest { key: Some(vec![0]), offset: 1, ..Default::default() })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_empty_results_are_empty_pages() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let querier = Querier::new(&keeper, &store);

        let page = querier
            .user_list(subspace.id, UserListKind::Banned, &PageRequest::default())
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.next_key, None);

        let page = querier
            .user_group_members(subspace.id, DEFAULT_GROUP_ID, &PageRequest::default())
            .unwrap();
        assert!(page.items.is_empty());
        assert!(querier.user_grants(subspace.id, None, &PageRequest::default()).unwrap().items.is_empty());
    }

    #[test]
    fn test_user_groups_by_section() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let child = keeper.create_section(&mut store, subspace.id, ROOT_SECTION_ID, "child", "").unwrap();
        let group = keeper
            .create_user_group(&mut store, subspace.id, child.id, "g", "", Permissions::WRITE)
            .unwrap();
        let querier = Querier::new(&keeper, &store);

        let all = querier.user_groups(subspace.id, None, &PageRequest::default()).unwrap();
        assert_eq!(all.items.len(), 2);
        let in_child = querier
            .user_groups(subspace.id, Some(child.id), &PageRequest::default())
            .unwrap();
        assert_eq!(in_child.items, vec![group]);

        let err = querier.user_groups(subspace.id, Some(42), &PageRequest::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_grant_queries() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let owner = Address::new("owner");
        let user = Address::new("user");
        keeper
            .grant_allowance(&mut store, Grant::to_user(subspace.id, owner.clone(), user.clone(), Allowance::unlimited()))
            .unwrap();
        keeper
            .grant_allowance(&mut store, Grant::to_group(subspace.id, owner.clone(), DEFAULT_GROUP_ID, Allowance::unlimited()))
            .unwrap();
        let querier = Querier::new(&keeper, &store);

        assert_eq!(querier.user_grant(subspace.id, &owner, &user).unwrap().grantee, Grantee::User(user.clone()));
        assert!(querier.group_grant(subspace.id, &owner, DEFAULT_GROUP_ID).is_ok());
        assert!(querier.group_grant(subspace.id, &owner, 7).unwrap_err().is_not_found());

        let page = querier.user_grants(subspace.id, Some(&user), &PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        let page = querier
            .user_grants(subspace.id, Some(&Address::new("other")), &PageRequest::default())
            .unwrap();
        assert!(page.items.is_empty());
        let page = querier.group_grants(subspace.id, None, &PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_user_permissions_query() {
        let (keeper, _) = keeper_with_recorder();
        let mut store = MemoryStore::new();
        let subspace = setup_subspace(&keeper, &mut store, "owner");
        let user = Address::new("user");
        keeper
            .set_user_permissions(&mut store, subspace.id, ROOT_SECTION_ID, &user, Permissions::WRITE)
            .unwrap();
        let querier = Querier::new(&keeper, &store);

        let result = querier.user_permissions(subspace.id, ROOT_SECTION_ID, &user).unwrap();
        assert_eq!(result.permissions, Permissions::WRITE);
        assert!(result
            .details
            .contains(&PermissionDetail::User { section_id: ROOT_SECTION_ID, permissions: Permissions::WRITE }));
    }
}
