/*
    core_subspaces - Subspaces, sections, groups and permissions

    A subspace is a tenant with an owner, a tree of sections rooted at
    section 0 and user groups attached to sections. Permissions are held
    individually or through groups and accumulate down the section tree.

    Submodules:
    - types:      identifiers, addresses and timestamps
    - permission: permission flags and single-permission checks
    - subspace:   subspace record and user lists
    - section:    section record
    - group:      user group record
    - keys:       store key layout
    - keeper:     state transitions and permission resolution
    - query:      paginated read-only queries
    - hooks:      post-commit mutation hooks
    - accounts:   account registry boundary
*/

pub mod accounts;
pub mod errors;
pub mod group;
pub mod hooks;
pub mod keeper;
pub mod keys;
pub mod permission;
pub mod query;
pub mod section;
pub mod subspace;
pub mod types;

pub use accounts::{AccountKeeper, KvAccountKeeper};
pub use errors::{ErrorKind, SubspacesError, SubspacesResult};
pub use group::{UserGroup, UserGroupUpdate};
pub use hooks::{BroadcastHooks, HookSet, SubspaceEvent, SubspacesHooks};
pub use keeper::{AncestorsPath, FeeUsage, Keeper, PermissionDetail};
pub use permission::{Permission, Permissions};
pub use query::{Page, PageRequest, PageResponse, Querier, UserPermissions};
pub use section::{Section, SectionUpdate};
pub use subspace::{Subspace, SubspaceUpdate, UserListKind};
pub use types::{Address, GroupId, SectionId, SubspaceId, Timestamp, DEFAULT_GROUP_ID, ROOT_SECTION_ID};
