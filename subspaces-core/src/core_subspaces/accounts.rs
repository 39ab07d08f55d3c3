//! Account registry boundary
//!
//! Grant creation makes sure the grantee has an account record before the
//! grant is stored. The registry itself belongs to another subsystem; the
//! keeper only sees this trait.

use super::types::Address;
use crate::core_store::{KvStore, StoreResult};
use tracing::debug;

/// Account registry collaborator
pub trait AccountKeeper: Send + Sync {
    /// Whether an account exists for `address`
    fn has_account(&self, store: &dyn KvStore, address: &Address) -> StoreResult<bool>;

    /// Create an account record for `address`
    fn create_account(&self, store: &mut dyn KvStore, address: &Address) -> StoreResult<()>;
}

/// Key prefix of the account markers kept by [`KvAccountKeeper`]
pub const ACCOUNT_PREFIX: u8 = 0xA1;

/// Minimal registry keeping one marker per account in the shared store
#[derive(Debug, Clone, Copy, Default)]
pub struct KvAccountKeeper;

impl KvAccountKeeper {
    fn key(address: &Address) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + address.as_bytes().len());
        key.push(ACCOUNT_PREFIX);
        key.extend_from_slice(address.as_bytes());
        key
    }
}

impl AccountKeeper for KvAccountKeeper {
    fn has_account(&self, store: &dyn KvStore, address: &Address) -> StoreResult<bool> {
        store.has(&Self::key(address))
    }

    fn create_account(&self, store: &mut dyn KvStore, address: &Address) -> StoreResult<()> {
        store.set(&Self::key(address), &[])?;
        debug!(address = %address, "created account");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::MemoryStore;

    #[test]
    fn test_create_and_check_account() {
        let mut store = MemoryStore::new();
        let accounts = KvAccountKeeper;
        let address = Address::new("grantee");

        assert!(!accounts.has_account(&store, &address).unwrap());
        accounts.create_account(&mut store, &address).unwrap();
        assert!(accounts.has_account(&store, &address).unwrap());
        assert!(!accounts.has_account(&store, &Address::new("other")).unwrap());
    }
}
