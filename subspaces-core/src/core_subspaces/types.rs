/*
    types.rs - Identifiers and scalar types shared across the keeper

    Includes:
    - Subspace, section and group identifiers
    - Account addresses
    - Millisecond timestamps
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Identifier of a subspace (tenant). Zero is never allocated.
pub type SubspaceId = u64;

/// Identifier of a section, unique within its subspace
pub type SectionId = u32;

/// Identifier of a user group, unique within its subspace
pub type GroupId = u32;

/// The implicit root section every subspace has
pub const ROOT_SECTION_ID: SectionId = 0;

/// The default group; every user is a member of it
pub const DEFAULT_GROUP_ID: GroupId = 0;

/// Longest address accepted by any keeper operation
pub const MAX_ADDRESS_LEN: usize = 255;

/// Account address of a user, granter or treasury
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Wrap an address string
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the raw address bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Check that the address is non-empty, printable and short enough
    pub fn validate(&self) -> Result<(), String> {
        if self.0.trim().is_empty() {
            return Err("address must not be empty".to_string());
        }
        if self.0.len() > MAX_ADDRESS_LEN {
            return Err(format!("address longer than {} bytes", MAX_ADDRESS_LEN));
        }
        if self.0.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(format!("address {:?} contains whitespace", self.0));
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp representing the current time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    /// Create a timestamp from milliseconds since epoch
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Get milliseconds since epoch
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Timestamp `duration` later, saturating at the far future
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
