/*
    allowance.rs - Fee allowance variants

    An allowance both validates and consumes a fee. accept() mutates the
    remaining limit in place and reports whether the grant holding it should
    be removed. The set of variants is closed; each one is serialized with
    its variant index.
*/

use super::coins::Coins;
use crate::core_subspaces::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why an allowance declined a fee
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowanceError {
    #[error("allowance expired at {0}")]
    Expired(Timestamp),

    #[error("fee {fee} exceeds the remaining spend limit {remaining}")]
    InsufficientFunds { fee: String, remaining: String },

    #[error("fee {fee} exceeds the amount still spendable this period {remaining}")]
    PeriodLimitExceeded { fee: String, remaining: String },

    #[error("message {0} is not allowed by this allowance")]
    MessageNotAllowed(String),

    #[error("invalid allowance: {0}")]
    Invalid(String),
}

impl AllowanceError {
    /// Whether the grant holding the allowance must be removed
    pub fn removes_grant(&self) -> bool {
        matches!(self, AllowanceError::Expired(_))
    }
}

/// A one-time limit with an optional expiration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAllowance {
    /// Remaining spendable amount; `None` means unlimited
    pub spend_limit: Option<Coins>,
    pub expiration: Option<Timestamp>,
}

impl BasicAllowance {
    fn check_expiration(&self, now: Timestamp) -> Result<(), AllowanceError> {
        match self.expiration {
            Some(exp) if exp < now => Err(AllowanceError::Expired(exp)),
            _ => Ok(()),
        }
    }

    fn accept(&mut self, now: Timestamp, fee: &Coins) -> Result<bool, AllowanceError> {
        self.check_expiration(now)?;

        if let Some(limit) = &self.spend_limit {
            let left = limit.checked_sub(fee).ok_or_else(|| AllowanceError::InsufficientFunds {
                fee: fee.to_string(),
                remaining: limit.to_string(),
            })?;
            let exhausted = left.is_zero();
            self.spend_limit = Some(left);
            return Ok(exhausted);
        }

        Ok(false)
    }

    fn validate_basic(&self) -> Result<(), AllowanceError> {
        if let Some(limit) = &self.spend_limit {
            limit.validate().map_err(AllowanceError::Invalid)?;
            if limit.is_empty() {
                return Err(AllowanceError::Invalid("spend limit cannot be empty; use None for unlimited".into()));
            }
        }
        Ok(())
    }
}

/// A limit that refills every period, inside an overall basic limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicAllowance {
    pub basic: BasicAllowance,
    pub period: Duration,
    /// Maximum spendable per period
    pub period_spend_limit: Coins,
    /// Still spendable in the current period
    pub period_can_spend: Coins,
    /// When the current period ends
    pub period_reset: Timestamp,
}

impl PeriodicAllowance {
    fn try_reset_period(&mut self, now: Timestamp) {
        if now < self.period_reset {
            return;
        }

        // The lesser of the overall limit and the period limit
        self.period_can_spend = match &self.basic.spend_limit {
            Some(limit) if !limit.is_all_gte(&self.period_spend_limit) => limit.clone(),
            _ => self.period_spend_limit.clone(),
        };

        self.period_reset = self.period_reset.saturating_add(self.period);
        if now > self.period_reset {
            self.period_reset = now.saturating_add(self.period);
        }
    }

    fn accept(&mut self, now: Timestamp, fee: &Coins) -> Result<bool, AllowanceError> {
        self.basic.check_expiration(now)?;
        self.try_reset_period(now);

        let can_spend = self.period_can_spend.checked_sub(fee).ok_or_else(|| {
            AllowanceError::PeriodLimitExceeded {
                fee: fee.to_string(),
                remaining: self.period_can_spend.to_string(),
            }
        })?;

        if let Some(limit) = &self.basic.spend_limit {
            let left = limit.checked_sub(fee).ok_or_else(|| AllowanceError::InsufficientFunds {
                fee: fee.to_string(),
                remaining: limit.to_string(),
            })?;
            self.period_can_spend = can_spend;
            let exhausted = left.is_zero();
            self.basic.spend_limit = Some(left);
            return Ok(exhausted);
        }

        self.period_can_spend = can_spend;
        Ok(false)
    }

    fn validate_basic(&self) -> Result<(), AllowanceError> {
        self.basic.validate_basic()?;

        if self.period.is_zero() {
            return Err(AllowanceError::Invalid("period must be positive".into()));
        }
        self.period_spend_limit.validate().map_err(AllowanceError::Invalid)?;
        if self.period_spend_limit.is_empty() {
            return Err(AllowanceError::Invalid("period spend limit cannot be empty".into()));
        }
        self.period_can_spend.validate().map_err(AllowanceError::Invalid)?;

        if let Some(limit) = &self.basic.spend_limit {
            if !limit.is_all_gte(&self.period_spend_limit) {
                return Err(AllowanceError::Invalid(
                    "period spend limit exceeds the overall spend limit".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Restricts another allowance to a set of message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedMsgAllowance {
    pub allowance: Box<Allowance>,
    /// Message type URLs this allowance may pay for
    pub allowed_messages: Vec<String>,
}

/// A fee allowance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Allowance {
    Basic(BasicAllowance),
    Periodic(PeriodicAllowance),
    AllowedMsg(AllowedMsgAllowance),
}

impl Allowance {
    /// Unlimited, never-expiring allowance
    pub fn unlimited() -> Self {
        Allowance::Basic(BasicAllowance::default())
    }

    /// Basic allowance with a spend limit
    pub fn basic(spend_limit: Coins, expiration: Option<Timestamp>) -> Self {
        Allowance::Basic(BasicAllowance { spend_limit: Some(spend_limit), expiration })
    }

    /// Validate and consume `fee` for a transaction carrying `messages`.
    ///
    /// `Ok(true)` means the allowance is used up and its grant should be
    /// removed. On error the allowance is left unchanged; the grant should
    /// only be removed when [`AllowanceError::removes_grant`] says so.
    pub fn accept(
        &mut self,
        now: Timestamp,
        fee: &Coins,
        messages: &[&str],
    ) -> Result<bool, AllowanceError> {
        let mut next = self.clone();
        let remove = match &mut next {
            Allowance::Basic(basic) => basic.accept(now, fee)?,
            Allowance::Periodic(periodic) => periodic.accept(now, fee)?,
            Allowance::AllowedMsg(allowed) => {
                if let Some(msg) = messages
                    .iter()
                    .copied()
                    .find(|m| !allowed.allowed_messages.iter().any(|a| a.as_str() == *m))
                {
                    return Err(AllowanceError::MessageNotAllowed(msg.to_string()));
                }
                allowed.allowance.accept(now, fee, messages)?
            }
        };
        *self = next;
        Ok(remove)
    }

    /// Stateless validation
    pub fn validate_basic(&self) -> Result<(), AllowanceError> {
        match self {
            Allowance::Basic(basic) => basic.validate_basic(),
            Allowance::Periodic(periodic) => periodic.validate_basic(),
            Allowance::AllowedMsg(allowed) => {
                if allowed.allowed_messages.is_empty() {
                    return Err(AllowanceError::Invalid("allowed messages cannot be empty".into()));
                }
                allowed.allowance.validate_basic()
            }
        }
    }

    /// Absolute expiration, if any
    pub fn expiration(&self) -> Option<Timestamp> {
        match self {
            Allowance::Basic(basic) => basic.expiration,
            Allowance::Periodic(periodic) => periodic.basic.expiration,
            Allowance::AllowedMsg(allowed) => allowed.allowance.expiration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_basic_spend_and_exhaust() {
        let mut allowance = Allowance::basic(Coins::single("test", 100), None);

        assert_eq!(allowance.accept(t(0), &Coins::single("test", 10), &[]), Ok(false));
        match &allowance {
            Allowance::Basic(b) => assert_eq!(b.spend_limit, Some(Coins::single("test", 90))),
            other => panic!("unexpected variant: {:?}", other),
        }

        assert_eq!(allowance.accept(t(0), &Coins::single("test", 90), &[]), Ok(true));
    }

    #[test]
    fn test_basic_insufficient_leaves_state() {
        let mut allowance = Allowance::basic(Coins::single("test", 5), None);
        let before = allowance.clone();

        let err = allowance.accept(t(0), &Coins::single("test", 6), &[]).unwrap_err();
        assert!(matches!(err, AllowanceError::InsufficientFunds { .. }));
        assert!(!err.removes_grant());
        assert_eq!(allowance, before);
    }

    #[test]
    fn test_basic_expiration() {
        let mut allowance = Allowance::basic(Coins::single("test", 5), Some(t(1_000)));
        assert_eq!(allowance.accept(t(1_000), &Coins::single("test", 1), &[]), Ok(false));

        let err = allowance.accept(t(1_001), &Coins::single("test", 1), &[]).unwrap_err();
        assert_eq!(err, AllowanceError::Expired(t(1_000)));
        assert!(err.removes_grant());
    }

    #[test]
    fn test_unlimited_never_exhausts() {
        let mut allowance = Allowance::unlimited();
        for _ in 0..3 {
            assert_eq!(allowance.accept(t(0), &Coins::single("test", 1_000_000), &[]), Ok(false));
        }
    }

    #[test]
    fn test_periodic_resets() {
        let mut allowance = Allowance::Periodic(PeriodicAllowance {
            basic: BasicAllowance { spend_limit: Some(Coins::single("test", 100)), expiration: None },
            period: Duration::from_secs(10),
            period_spend_limit: Coins::single("test", 10),
            period_can_spend: Coins::empty(),
            period_reset: t(0),
        });

        // First use opens the period
        assert_eq!(allowance.accept(t(0), &Coins::single("test", 10), &[]), Ok(false));
        let err = allowance.accept(t(5_000), &Coins::single("test", 1), &[]).unwrap_err();
        assert!(matches!(err, AllowanceError::PeriodLimitExceeded { .. }));

        // Next period refills
        assert_eq!(allowance.accept(t(10_000), &Coins::single("test", 10), &[]), Ok(false));
        match &allowance {
            Allowance::Periodic(p) => {
                assert_eq!(p.basic.spend_limit, Some(Coins::single("test", 80)));
                assert_eq!(p.period_reset, t(20_000));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_periodic_reset_skips_idle_periods() {
        let mut allowance = Allowance::Periodic(PeriodicAllowance {
            basic: BasicAllowance::default(),
            period: Duration::from_secs(1),
            period_spend_limit: Coins::single("test", 3),
            period_can_spend: Coins::empty(),
            period_reset: t(0),
        });

        assert_eq!(allowance.accept(t(60_000), &Coins::single("test", 3), &[]), Ok(false));
        match &allowance {
            Allowance::Periodic(p) => assert_eq!(p.period_reset, t(61_000)),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_allowed_msg_filter() {
        let mut allowance = Allowance::AllowedMsg(AllowedMsgAllowance {
            allowance: Box::new(Allowance::basic(Coins::single("test", 50), None)),
            allowed_messages: vec!["/posts.MsgCreatePost".to_string()],
        });

        let err = allowance
            .accept(t(0), &Coins::single("test", 1), &["/posts.MsgCreatePost", "/bank.MsgSend"])
            .unwrap_err();
        assert_eq!(err, AllowanceError::MessageNotAllowed("/bank.MsgSend".to_string()));

        assert_eq!(
            allowance.accept(t(0), &Coins::single("test", 50), &["/posts.MsgCreatePost"]),
            Ok(true)
        );
    }

    #[test]
    fn test_validate_basic() {
        assert!(Allowance::unlimited().validate_basic().is_ok());
        assert!(Allowance::basic(Coins::empty(), None).validate_basic().is_err());

        let periodic = Allowance::Periodic(PeriodicAllowance {
            basic: BasicAllowance { spend_limit: Some(Coins::single("test", 5)), expiration: None },
            period: Duration::from_secs(1),
            period_spend_limit: Coins::single("test", 10),
            period_can_spend: Coins::empty(),
            period_reset: t(0),
        });
        assert!(periodic.validate_basic().is_err());

        let no_msgs = Allowance::AllowedMsg(AllowedMsgAllowance {
            allowance: Box::new(Allowance::unlimited()),
            allowed_messages: vec![],
        });
        assert!(no_msgs.validate_basic().is_err());
    }

    #[test]
    fn test_expiration_is_reported_through_wrappers() {
        let inner = Allowance::basic(Coins::single("test", 1), Some(t(42)));
        let wrapped = Allowance::AllowedMsg(AllowedMsgAllowance {
            allowance: Box::new(inner),
            allowed_messages: vec!["/x.Msg".into()],
        });
        assert_eq!(wrapped.expiration(), Some(t(42)));
    }
}
