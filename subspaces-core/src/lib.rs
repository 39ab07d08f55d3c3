//! Permission and fee-allowance core for subspaces
//!
//! Subspaces are tenants holding a tree of sections, user groups and
//! per-user permissions, plus fee allowances their managers grant to users
//! and groups. All state lives in an ordered key-value store; see
//! [`core_store`] for the backends.

pub mod config;
pub mod core_feegrant;
pub mod core_store;
pub mod core_subspaces;
pub mod logging;
pub mod metrics;
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_feegrant::{Allowance, AllowanceError, Coin, Coins, Grant, GrantKey, Grantee};
pub use core_store::{KvStore, MemoryStore, SqlStore, StoreError, StoreResult};
pub use core_subspaces::{
    Address, ErrorKind, FeeUsage, Keeper, Permission, Permissions, Querier, Section, Subspace, SubspacesError,
    SubspacesResult, UserGroup,
};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
