//! Coin amounts used for fees and spend limits

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An amount of a single denomination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Coin { denom: denom.into(), amount }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Check a denomination: 3 to 128 characters, starting with a letter,
/// followed by letters, digits or one of `/:._-`
pub fn validate_denom(denom: &str) -> Result<(), String> {
    let mut chars = denom.chars();
    let valid_first = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c));
    if !(3..=128).contains(&denom.len()) || !valid_first || !valid_rest {
        return Err(format!("invalid denom: {:?}", denom));
    }
    Ok(())
}

/// A set of coins: sorted by denomination, one entry per denomination,
/// no zero amounts. Decoding rejects any list that breaks these rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Empty set
    pub fn empty() -> Self {
        Coins(Vec::new())
    }

    /// Build a normalized set, merging duplicate denominations and dropping zeros
    pub fn new(coins: impl IntoIterator<Item = Coin>) -> Self {
        let mut merged: BTreeMap<String, u128> = BTreeMap::new();
        for coin in coins {
            let entry = merged.entry(coin.denom).or_insert(0);
            *entry = entry.saturating_add(coin.amount);
        }
        Coins(
            merged
                .into_iter()
                .filter(|(_, amount)| *amount > 0)
                .map(|(denom, amount)| Coin { denom, amount })
                .collect(),
        )
    }

    /// Single-denomination set
    pub fn single(denom: impl Into<String>, amount: u128) -> Self {
        Coins::new([Coin::new(denom, amount)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every amount is zero, which for a normalized set means empty
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|c| c.amount == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    /// Amount held of `denom`
    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .binary_search_by(|c| c.denom.as_str().cmp(denom))
            .map(|i| self.0[i].amount)
            .unwrap_or(0)
    }

    /// Check denominations, ordering and amounts
    pub fn validate(&self) -> Result<(), String> {
        for coin in &self.0 {
            validate_denom(&coin.denom)?;
            if coin.amount == 0 {
                return Err(format!("coin {} has zero amount", coin.denom));
            }
        }
        for pair in self.0.windows(2) {
            if pair[0].denom >= pair[1].denom {
                return Err(format!("coins not sorted or duplicated: {}", self));
            }
        }
        Ok(())
    }

    /// `self - other`, or `None` if any denomination would go negative
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        for coin in &other.0 {
            if self.amount_of(&coin.denom) < coin.amount {
                return None;
            }
        }
        Some(Coins::new(self.0.iter().map(|c| {
            Coin::new(c.denom.clone(), c.amount - other.amount_of(&c.denom))
        })))
    }

    /// `self + other`
    pub fn saturating_add(&self, other: &Coins) -> Coins {
        Coins::new(self.0.iter().cloned().chain(other.0.iter().cloned()))
    }

    /// Whether `self` holds at least as much as `other` in every denomination of `other`
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.0.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }

    /// Whether `self` exceeds `other` in any denomination
    pub fn is_any_gt(&self, other: &Coins) -> bool {
        self.0.iter().any(|c| c.amount > other.amount_of(&c.denom))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = String;

    fn try_from(coins: Vec<Coin>) -> Result<Self, Self::Error> {
        let coins = Coins(coins);
        coins.validate()?;
        Ok(coins)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl FromIterator<Coin> for Coins {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        Coins::new(iter)
    }
}
