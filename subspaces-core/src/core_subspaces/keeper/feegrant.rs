//! Fee allowance grants
//!
//! A grant key moves Absent -> Active through `grant_allowance` and back to
//! Absent through `revoke_allowance`, exhaustion, expiration or the deletion
//! of its group. Every grant carrying an expiration has exactly one entry in
//! the expiration index for as long as it exists.

use super::{check_address, read, write, Keeper};
use crate::core_feegrant::{AllowanceError, Coins, Grant, GrantKey, Grantee};
use crate::core_store::{prefix_keys, KvStore, StoreResult};
use crate::core_subspaces::errors::{SubspacesError, SubspacesResult};
use crate::core_subspaces::hooks::SubspaceEvent;
use crate::core_subspaces::keys;
use crate::core_subspaces::permission::Permission;
use crate::core_subspaces::types::{Address, GroupId, SubspaceId, Timestamp, ROOT_SECTION_ID};
use crate::metrics;
use tracing::{debug, info, warn};

/// Fee being paid and the context it is paid in
#[derive(Debug, Clone, Copy)]
pub struct FeeUsage<'a> {
    pub fee: &'a Coins,
    /// Type URLs of the messages in the transaction
    pub messages: &'a [&'a str],
    pub now: Timestamp,
}

impl<'a> FeeUsage<'a> {
    pub fn new(fee: &'a Coins, messages: &'a [&'a str], now: Timestamp) -> Self {
        FeeUsage { fee, messages, now }
    }

    /// Reject fees that are not a well-formed coin set
    fn validate(&self) -> SubspacesResult<()> {
        self.fee
            .validate()
            .map_err(|e| SubspacesError::InvalidRequest(format!("invalid fee: {}", e)))
    }
}

/// Result of offering a fee to one grant
enum Attempt {
    Accepted,
    Declined(AllowanceError),
    Missing,
}

impl Keeper {
    /// Store a new grant on behalf of its granter.
    ///
    /// The granter needs `ManageAllowances` at the root section and the key
    /// must be free; existing grants are never overwritten.
    pub fn grant_allowance(&self, store: &mut dyn KvStore, grant: Grant) -> SubspacesResult<()> {
        grant
            .validate_basic()
            .map_err(|e| SubspacesError::InvalidRequest(e.to_string()))?;

        let key = grant.key();
        self.transition(store, |tx, events| {
            self.require_subspace(tx, grant.subspace_id)?;
            self.require_permission(tx, grant.subspace_id, ROOT_SECTION_ID, &grant.granter, Permission::ManageAllowances)?;

            if let Grantee::Group(group_id) = grant.grantee {
                if !self.has_user_group(tx, grant.subspace_id, group_id)? {
                    return Err(SubspacesError::GranteeGroupNotFound { subspace_id: grant.subspace_id, group_id });
                }
            }

            if self.has_grant(tx, &key)? {
                return Err(SubspacesError::GrantAlreadyExists(key.clone()));
            }

            if let Grantee::User(user) = &grant.grantee {
                if !self.accounts().has_account(tx, user)? {
                    self.accounts().create_account(tx, user)?;
                    metrics::record_account_created();
                }
            }

            self.save_grant_in(tx, &grant, events)
        })?;

        metrics::record_grant_created();
        info!(grant = %key, "granted allowance");
        Ok(())
    }

    /// Remove a grant on behalf of its granter
    pub fn revoke_allowance(
        &self,
        store: &mut dyn KvStore,
        granter: &Address,
        subspace_id: SubspaceId,
        grantee: Grantee,
    ) -> SubspacesResult<()> {
        let key = GrantKey::new(subspace_id, granter.clone(), grantee);
        self.transition(store, |tx, events| {
            self.require_subspace(tx, subspace_id)?;
            self.require_permission(tx, subspace_id, ROOT_SECTION_ID, granter, Permission::ManageAllowances)?;
            if !self.remove_grant_in(tx, &key, events)? {
                return Err(SubspacesError::GrantNotFound(key.clone()));
            }
            Ok(())
        })?;

        metrics::record_grant_revoked();
        info!(grant = %key, "revoked allowance");
        Ok(())
    }

    /// Store a grant as is, keeping the expiration index in step
    pub fn save_grant(&self, store: &mut dyn KvStore, grant: &Grant) -> SubspacesResult<()> {
        self.transition(store, |tx, events| self.save_grant_in(tx, grant, events))
    }

    fn save_grant_in(&self, tx: &mut dyn KvStore, grant: &Grant, events: &mut Vec<SubspaceEvent>) -> SubspacesResult<()> {
        let key = grant.key();
        let store_key = keys::grant_store_key(&key);
        let expiration = grant.allowance.expiration();

        if let Some(previous) = read::<Grant>(tx, &store_key)? {
            match previous.allowance.expiration() {
                Some(old) if Some(old) != expiration => tx.delete(&keys::expiration_key(old, &key))?,
                _ => {}
            }
        }

        write(tx, &store_key, grant)?;
        if let Some(expiration) = expiration {
            tx.set(&keys::expiration_key(expiration, &key), &[])?;
        }
        events.push(SubspaceEvent::GrantSaved { key });
        Ok(())
    }

    /// Delete a grant and its index entry. Returns whether it existed.
    pub(super) fn remove_grant_in(
        &self,
        tx: &mut dyn KvStore,
        key: &GrantKey,
        events: &mut Vec<SubspaceEvent>,
    ) -> SubspacesResult<bool> {
        let store_key = keys::grant_store_key(key);
        let Some(grant) = read::<Grant>(tx, &store_key)? else {
            return Ok(false);
        };

        if let Some(expiration) = grant.allowance.expiration() {
            tx.delete(&keys::expiration_key(expiration, key))?;
        }
        tx.delete(&store_key)?;
        events.push(SubspaceEvent::GrantDeleted { key: key.clone() });
        Ok(true)
    }

    pub fn get_grant(&self, store: &dyn KvStore, key: &GrantKey) -> StoreResult<Option<Grant>> {
        read(store, &keys::grant_store_key(key))
    }

    pub fn has_grant(&self, store: &dyn KvStore, key: &GrantKey) -> StoreResult<bool> {
        store.has(&keys::grant_store_key(key))
    }

    pub fn get_user_grant(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        granter: &Address,
        grantee: &Address,
    ) -> StoreResult<Option<Grant>> {
        self.get_grant(store, &GrantKey::new(subspace_id, granter.clone(), Grantee::User(grantee.clone())))
    }

    pub fn has_user_grant(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        granter: &Address,
        grantee: &Address,
    ) -> StoreResult<bool> {
        self.has_grant(store, &GrantKey::new(subspace_id, granter.clone(), Grantee::User(grantee.clone())))
    }

    pub fn get_group_grant(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        granter: &Address,
        group_id: GroupId,
    ) -> StoreResult<Option<Grant>> {
        self.get_grant(store, &GrantKey::new(subspace_id, granter.clone(), Grantee::Group(group_id)))
    }

    pub fn has_group_grant(
        &self,
        store: &dyn KvStore,
        subspace_id: SubspaceId,
        granter: &Address,
        group_id: GroupId,
    ) -> StoreResult<bool> {
        self.has_grant(store, &GrantKey::new(subspace_id, granter.clone(), Grantee::Group(group_id)))
    }

    /// Offer `usage` to one grant, persisting the outcome inside `tx`
    fn try_use_in(
        &self,
        tx: &mut dyn KvStore,
        key: &GrantKey,
        usage: &FeeUsage<'_>,
        events: &mut Vec<SubspaceEvent>,
    ) -> SubspacesResult<Attempt> {
        let Some(mut grant) = self.get_grant(tx, key)? else {
            return Ok(Attempt::Missing);
        };

        match grant.allowance.accept(usage.now, usage.fee, usage.messages) {
            Ok(true) => {
                self.remove_grant_in(tx, key, events)?;
                metrics::record_grant_exhausted();
                debug!(grant = %key, "allowance exhausted");
                Ok(Attempt::Accepted)
            }
            Ok(false) => {
                self.save_grant_in(tx, &grant, events)?;
                Ok(Attempt::Accepted)
            }
            Err(err) => {
                if err.removes_grant() {
                    self.remove_grant_in(tx, key, events)?;
                    metrics::record_expired_grants_removed(1);
                }
                Ok(Attempt::Declined(err))
            }
        }
    }

    fn finish_use(key: GrantKey, attempt: Attempt) -> SubspacesResult<()> {
        match attempt {
            Attempt::Accepted => {
                metrics::record_grant_used();
                Ok(())
            }
            Attempt::Declined(source) => {
                metrics::record_grant_rejected();
                Err(SubspacesError::AllowanceDeclined { key, source })
            }
            Attempt::Missing => Err(SubspacesError::GrantNotFound(key)),
        }
    }

    /// Pay `usage.fee` from the grant `granter` gave to `grantee`.
    ///
    /// An expired grant is removed even though the call fails.
    pub fn use_user_grant(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        granter: &Address,
        grantee: &Address,
        usage: &FeeUsage<'_>,
    ) -> SubspacesResult<()> {
        check_address(granter)?;
        check_address(grantee)?;
        usage.validate()?;

        let key = GrantKey::new(subspace_id, granter.clone(), Grantee::User(grantee.clone()));
        let attempt = self.transition(store, |tx, events| self.try_use_in(tx, &key, usage, events))?;
        Self::finish_use(key, attempt)
    }

    /// Pay `usage.fee` for `payer` from the grant `granter` gave to a group.
    ///
    /// Membership is checked now, not when the grant was made.
    pub fn use_group_grant(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        granter: &Address,
        group_id: GroupId,
        payer: &Address,
        usage: &FeeUsage<'_>,
    ) -> SubspacesResult<()> {
        check_address(granter)?;
        check_address(payer)?;
        usage.validate()?;

        let key = GrantKey::new(subspace_id, granter.clone(), Grantee::Group(group_id));
        let attempt = self.transition(store, |tx, events| {
            if !self.has_grant(tx, &key)? {
                return Ok(Attempt::Missing);
            }
            if !self.is_group_member(tx, subspace_id, group_id, payer)? {
                return Err(SubspacesError::PayerNotInGroup { key: key.clone(), group_id, payer: payer.clone() });
            }
            self.try_use_in(tx, &key, usage, events)
        })?;
        Self::finish_use(key, attempt)
    }

    /// Pay `usage.fee` for `payer` from the first grant that accepts it.
    ///
    /// Grants made to the payer are tried first, in granter order, then
    /// grants made to groups the payer belongs to. A declining grant is
    /// skipped; expired grants met on the way are removed either way.
    pub fn use_granted_fees(
        &self,
        store: &mut dyn KvStore,
        subspace_id: SubspaceId,
        payer: &Address,
        usage: &FeeUsage<'_>,
    ) -> SubspacesResult<GrantKey> {
        check_address(payer)?;
        usage.validate()?;

        let timer = metrics::Timer::new("subspaces.grants.use.duration_ms");
        let used = self.transition(store, |tx, events| {
            let user_grants = grant_keys(tx, &keys::grantee_user_grants_prefix(subspace_id, payer))?;
            let group_grants = grant_keys(tx, &keys::group_grants_prefix(subspace_id))?;

            for key in user_grants.into_iter().chain(group_grants) {
                if let Grantee::Group(group_id) = key.grantee {
                    if !self.is_group_member(tx, subspace_id, group_id, payer)? {
                        continue;
                    }
                }
                match self.try_use_in(tx, &key, usage, events)? {
                    Attempt::Accepted => return Ok(Some(key)),
                    Attempt::Declined(err) => warn!(grant = %key, payer = %payer, error = %err, "allowance declined fee"),
                    Attempt::Missing => {}
                }
            }
            Ok(None)
        });
        timer.stop();

        match used? {
            Some(key) => {
                metrics::record_grant_used();
                info!(grant = %key, payer = %payer, fee = %usage.fee, "paid fee from allowance");
                Ok(key)
            }
            None => {
                metrics::record_grant_rejected();
                Err(SubspacesError::NoUsableAllowance { subspace_id, payer: payer.clone() })
            }
        }
    }

    /// Keys of every grant expiring at or before `now`, soonest first
    pub fn expiring_grant_keys(&self, store: &dyn KvStore, now: Timestamp) -> StoreResult<Vec<GrantKey>> {
        let start = keys::expiration_prefix();
        let end = keys::expiration_range_end(now);
        store
            .iter_range(&start, end.as_deref())?
            .map(|(key, _)| keys::parse_expiration_key(&key).map(|(_, grant_key)| grant_key))
            .collect()
    }

    /// Delete every grant expiring at or before `now`. Returns how many were removed.
    pub fn remove_expired_allowances(&self, store: &mut dyn KvStore, now: Timestamp) -> SubspacesResult<usize> {
        let removed = self.transition(store, |tx, events| {
            let start = keys::expiration_prefix();
            let end = keys::expiration_range_end(now);
            let entries: Vec<Vec<u8>> = tx.iter_range(&start, end.as_deref())?.map(|(key, _)| key).collect();

            let mut removed = 0;
            for entry in entries {
                let (_, key) = keys::parse_expiration_key(&entry)?;
                if self.remove_grant_in(tx, &key, events)? {
                    removed += 1;
                } else {
                    // Index entry without a grant
                    tx.delete(&entry)?;
                }
            }
            Ok(removed)
        })?;

        if removed > 0 {
            metrics::record_expired_grants_removed(removed as u64);
            info!(removed, now = %now, "removed expired allowances");
        }
        Ok(removed)
    }
}

fn grant_keys(store: &dyn KvStore, prefix: &[u8]) -> StoreResult<Vec<GrantKey>> {
    prefix_keys(store, prefix)?
        .iter()
        .map(|key| keys::parse_grant_store_key(key))
        .collect()
}
