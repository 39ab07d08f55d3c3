/*
    core_feegrant - Fee allowance model

    Value types only: coins, the allowance variants and grants. Storing,
    consuming and expiring grants is done by the keeper, which needs the
    permission engine to authorize allowance management.
*/

pub mod allowance;
pub mod coins;
pub mod grant;

pub use allowance::{Allowance, AllowanceError, AllowedMsgAllowance, BasicAllowance, PeriodicAllowance};
pub use coins::{Coin, Coins};
pub use grant::{Grant, GrantKey, Grantee};
