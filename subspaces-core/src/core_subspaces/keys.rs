/*
    keys.rs - Store key layout

    Every key starts with a one-byte prefix naming its range, then the
    subspace id (big-endian, so numeric and byte order agree), then section
    or group ids, then length-prefixed addresses. Anything scoped to one
    subspace, section or group is therefore a single prefix scan.

    An address of up to 254 bytes is prefixed by its length in one byte.
    Longer ones are written as 0xFF, their length as a big-endian u64, then
    the bytes, so no two addresses ever share a key.

    0x01 next subspace id
    0x02 subspace           | subspace
    0x03 next section id    | subspace
    0x04 section            | subspace | section
    0x05 next group id      | subspace
    0x06 group              | subspace | section | group
    0x07 group locator      | subspace | group            -> section
    0x08 group member       | subspace | group   | user
    0x09 user permissions   | subspace | section | user
    0x0A user grant         | subspace | grantee | granter
    0x0B group grant        | subspace | group   | granter
    0x0C expiration index   | expiration millis | grant key
    0x0D user list entry    | subspace | list kind | user
*/

use super::subspace::UserListKind;
use super::types::{Address, GroupId, SectionId, SubspaceId, Timestamp};
use crate::core_feegrant::{GrantKey, Grantee};
use crate::core_store::{StoreError, StoreResult};

pub const NEXT_SUBSPACE_ID_KEY: &[u8] = &[0x01];
pub const SUBSPACE_PREFIX: u8 = 0x02;
pub const NEXT_SECTION_ID_PREFIX: u8 = 0x03;
pub const SECTION_PREFIX: u8 = 0x04;
pub const NEXT_GROUP_ID_PREFIX: u8 = 0x05;
pub const GROUP_PREFIX: u8 = 0x06;
pub const GROUP_LOCATOR_PREFIX: u8 = 0x07;
pub const GROUP_MEMBER_PREFIX: u8 = 0x08;
pub const USER_PERMISSION_PREFIX: u8 = 0x09;
pub const USER_GRANT_PREFIX: u8 = 0x0A;
pub const GROUP_GRANT_PREFIX: u8 = 0x0B;
pub const EXPIRATION_PREFIX: u8 = 0x0C;
pub const USER_LIST_PREFIX: u8 = 0x0D;

/// Address length byte announcing a u64 length
const LONG_ADDRESS_MARKER: u8 = 0xFF;

/// Prefixes of every range scoped to a single subspace
pub const SUBSPACE_SCOPED_PREFIXES: [u8; 10] = [
    SECTION_PREFIX,
    GROUP_PREFIX,
    GROUP_LOCATOR_PREFIX,
    GROUP_MEMBER_PREFIX,
    USER_PERMISSION_PREFIX,
    USER_GRANT_PREFIX,
    GROUP_GRANT_PREFIX,
    USER_LIST_PREFIX,
    NEXT_SECTION_ID_PREFIX,
    NEXT_GROUP_ID_PREFIX,
];

struct KeyBuilder(Vec<u8>);

impl KeyBuilder {
    fn new(prefix: u8) -> Self {
        KeyBuilder(vec![prefix])
    }

    fn u64(mut self, value: u64) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u32(mut self, value: u32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn byte(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    fn address(mut self, address: &Address) -> Self {
        let bytes = address.as_bytes();
        match u8::try_from(bytes.len()) {
            Ok(len) if len < LONG_ADDRESS_MARKER => self.0.push(len),
            _ => {
                self.0.push(LONG_ADDRESS_MARKER);
                self.0.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
            }
        }
        self.0.extend_from_slice(bytes);
        self
    }

    fn bytes(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    fn build(self) -> Vec<u8> {
        self.0
    }
}

/// Prefix of a range scoped to one subspace
pub fn subspace_scoped_prefix(prefix: u8, subspace_id: SubspaceId) -> Vec<u8> {
    KeyBuilder::new(prefix).u64(subspace_id).build()
}

pub fn subspaces_prefix() -> Vec<u8> {
    vec![SUBSPACE_PREFIX]
}

pub fn subspace_key(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(SUBSPACE_PREFIX, subspace_id)
}

pub fn next_section_id_key(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(NEXT_SECTION_ID_PREFIX, subspace_id)
}

pub fn sections_prefix(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(SECTION_PREFIX, subspace_id)
}

pub fn section_key(subspace_id: SubspaceId, section_id: SectionId) -> Vec<u8> {
    KeyBuilder::new(SECTION_PREFIX).u64(subspace_id).u32(section_id).build()
}

pub fn next_group_id_key(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(NEXT_GROUP_ID_PREFIX, subspace_id)
}

pub fn groups_prefix(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(GROUP_PREFIX, subspace_id)
}

pub fn section_groups_prefix(subspace_id: SubspaceId, section_id: SectionId) -> Vec<u8> {
    KeyBuilder::new(GROUP_PREFIX).u64(subspace_id).u32(section_id).build()
}

pub fn group_key(subspace_id: SubspaceId, section_id: SectionId, group_id: GroupId) -> Vec<u8> {
    KeyBuilder::new(GROUP_PREFIX).u64(subspace_id).u32(section_id).u32(group_id).build()
}

pub fn group_locator_key(subspace_id: SubspaceId, group_id: GroupId) -> Vec<u8> {
    KeyBuilder::new(GROUP_LOCATOR_PREFIX).u64(subspace_id).u32(group_id).build()
}

pub fn group_members_prefix(subspace_id: SubspaceId, group_id: GroupId) -> Vec<u8> {
    KeyBuilder::new(GROUP_MEMBER_PREFIX).u64(subspace_id).u32(group_id).build()
}

pub fn group_member_key(subspace_id: SubspaceId, group_id: GroupId, user: &Address) -> Vec<u8> {
    KeyBuilder::new(GROUP_MEMBER_PREFIX).u64(subspace_id).u32(group_id).address(user).build()
}

pub fn user_permissions_prefix(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(USER_PERMISSION_PREFIX, subspace_id)
}

pub fn section_permissions_prefix(subspace_id: SubspaceId, section_id: SectionId) -> Vec<u8> {
    KeyBuilder::new(USER_PERMISSION_PREFIX).u64(subspace_id).u32(section_id).build()
}

pub fn user_permission_key(subspace_id: SubspaceId, section_id: SectionId, user: &Address) -> Vec<u8> {
    KeyBuilder::new(USER_PERMISSION_PREFIX).u64(subspace_id).u32(section_id).address(user).build()
}

pub fn user_grants_prefix(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(USER_GRANT_PREFIX, subspace_id)
}

/// Every user grant whose grantee is `grantee`
pub fn grantee_user_grants_prefix(subspace_id: SubspaceId, grantee: &Address) -> Vec<u8> {
    KeyBuilder::new(USER_GRANT_PREFIX).u64(subspace_id).address(grantee).build()
}

pub fn group_grants_prefix(subspace_id: SubspaceId) -> Vec<u8> {
    subspace_scoped_prefix(GROUP_GRANT_PREFIX, subspace_id)
}

/// Every grant made to `group_id`
pub fn group_grants_for_group_prefix(subspace_id: SubspaceId, group_id: GroupId) -> Vec<u8> {
    KeyBuilder::new(GROUP_GRANT_PREFIX).u64(subspace_id).u32(group_id).build()
}

/// Store key of a grant
pub fn grant_store_key(key: &GrantKey) -> Vec<u8> {
    match &key.grantee {
        Grantee::User(user) => KeyBuilder::new(USER_GRANT_PREFIX)
            .u64(key.subspace_id)
            .address(user)
            .address(&key.granter)
            .build(),
        Grantee::Group(group_id) => KeyBuilder::new(GROUP_GRANT_PREFIX)
            .u64(key.subspace_id)
            .u32(*group_id)
            .address(&key.granter)
            .build(),
    }
}

/// Rebuild a grant key from its store key
pub fn parse_grant_store_key(bytes: &[u8]) -> StoreResult<GrantKey> {
    let (prefix, rest) = split_first(bytes)?;
    let (subspace_id, rest) = read_u64(rest)?;
    let (grantee, rest) = match prefix {
        USER_GRANT_PREFIX => {
            let (user, rest) = read_address(rest)?;
            (Grantee::User(user), rest)
        }
        GROUP_GRANT_PREFIX => {
            let (group_id, rest) = read_u32(rest)?;
            (Grantee::Group(group_id), rest)
        }
        other => {
            return Err(StoreError::CorruptedData(format!("unexpected grant key prefix {:#04x}", other)))
        }
    };
    let (granter, rest) = read_address(rest)?;
    expect_end(rest)?;
    Ok(GrantKey::new(subspace_id, granter, grantee))
}

pub fn expiration_prefix() -> Vec<u8> {
    vec![EXPIRATION_PREFIX]
}

pub fn expiration_key(expiration: Timestamp, key: &GrantKey) -> Vec<u8> {
    KeyBuilder::new(EXPIRATION_PREFIX).u64(expiration.as_millis()).bytes(&grant_store_key(key)).build()
}

/// Exclusive end of the index range holding every expiration `<= now`
pub fn expiration_range_end(now: Timestamp) -> Option<Vec<u8>> {
    match now.as_millis().checked_add(1) {
        Some(next) => Some(KeyBuilder::new(EXPIRATION_PREFIX).u64(next).build()),
        None => crate::core_store::prefix_end(&expiration_prefix()),
    }
}

pub fn parse_expiration_key(bytes: &[u8]) -> StoreResult<(Timestamp, GrantKey)> {
    let (prefix, rest) = split_first(bytes)?;
    if prefix != EXPIRATION_PREFIX {
        return Err(StoreError::CorruptedData(format!("unexpected expiration key prefix {:#04x}", prefix)));
    }
    let (millis, rest) = read_u64(rest)?;
    Ok((Timestamp::from_millis(millis), parse_grant_store_key(rest)?))
}

pub fn user_list_prefix(subspace_id: SubspaceId, kind: UserListKind) -> Vec<u8> {
    KeyBuilder::new(USER_LIST_PREFIX).u64(subspace_id).byte(kind.as_byte()).build()
}

pub fn user_list_key(subspace_id: SubspaceId, kind: UserListKind, user: &Address) -> Vec<u8> {
    KeyBuilder::new(USER_LIST_PREFIX).u64(subspace_id).byte(kind.as_byte()).address(user).build()
}

// ===== Decoding helpers =====

fn split_first(bytes: &[u8]) -> StoreResult<(u8, &[u8])> {
    bytes
        .split_first()
        .map(|(first, rest)| (*first, rest))
        .ok_or_else(|| StoreError::CorruptedData("empty key".to_string()))
}

pub fn read_u64(bytes: &[u8]) -> StoreResult<(u64, &[u8])> {
    if bytes.len() < 8 {
        return Err(StoreError::CorruptedData("key too short for u64".to_string()));
    }
    let (head, rest) = bytes.split_at(8);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(head);
    Ok((u64::from_be_bytes(buf), rest))
}

pub fn read_u32(bytes: &[u8]) -> StoreResult<(u32, &[u8])> {
    if bytes.len() < 4 {
        return Err(StoreError::CorruptedData("key too short for u32".to_string()));
    }
    let (head, rest) = bytes.split_at(4);
    let mut buf = [0u8; 4];
    buf.copy_from_slice(head);
    Ok((u32::from_be_bytes(buf), rest))
}

/// Read a length-prefixed address
pub fn read_address(bytes: &[u8]) -> StoreResult<(Address, &[u8])> {
    let (marker, rest) = split_first(bytes)?;
    let (len, rest) = if marker == LONG_ADDRESS_MARKER {
        let (len, rest) = read_u64(rest)?;
        let len = usize::try_from(len)
            .map_err(|_| StoreError::CorruptedData(format!("address length {} out of range", len)))?;
        (len, rest)
    } else {
        (marker as usize, rest)
    };
    if rest.len() < len {
        return Err(StoreError::CorruptedData("key too short for address".to_string()));
    }
    let (raw, rest) = rest.split_at(len);
    let address = String::from_utf8(raw.to_vec())
        .map_err(|_| StoreError::CorruptedData(format!("address is not utf-8: {}", hex::encode(raw))))?;
    Ok((Address::new(address), rest))
}

/// Fail if bytes remain after a fully decoded key
pub fn expect_end(bytes: &[u8]) -> StoreResult<()> {
    if bytes.is_empty() {
        Ok(())
    } else {
        Err(StoreError::CorruptedData(format!("trailing key bytes: {}", hex::encode(bytes))))
    }
}

/// Decode a `u64` counter value
pub fn decode_u64(bytes: &[u8]) -> StoreResult<u64> {
    let (value, rest) = read_u64(bytes)?;
    expect_end(rest)?;
    Ok(value)
}

/// Decode a `u32` counter value
pub fn decode_u32(bytes: &[u8]) -> StoreResult<u32> {
    let (value, rest) = read_u32(bytes)?;
    expect_end(rest)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::prefix_end;

    #[test]
    fn test_member_keys_scoped_under_group_prefix() {
        let prefix = group_members_prefix(1, 7);
        let key = group_member_key(1, 7, &Address::new("alice"));
        assert!(key.starts_with(&prefix));
        assert!(!group_member_key(1, 8, &Address::new("alice")).starts_with(&prefix));

        let (user, rest) = read_address(&key[prefix.len()..]).unwrap();
        assert_eq!(user, Address::new("alice"));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_length_prefix_prevents_address_collisions() {
        // "ab" granting to "c" must not collide with "a" granting to "bc"
        let k1 = grant_store_key(&GrantKey::new(1, Address::new("c"), Grantee::User(Address::new("ab"))));
        let k2 = grant_store_key(&GrantKey::new(1, Address::new("bc"), Grantee::User(Address::new("a"))));
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_long_addresses_keep_every_byte() {
        let base = "a".repeat(255);
        let longer = format!("{}evil", base);
        assert_ne!(
            user_permission_key(1, 0, &Address::new(base.as_str())),
            user_permission_key(1, 0, &Address::new(longer.as_str()))
        );
        assert_ne!(
            group_member_key(1, 2, &Address::new(base.as_str())),
            group_member_key(1, 2, &Address::new(longer.as_str()))
        );

        // 254 bytes still fits the one-byte length
        let short = Address::new("b".repeat(254));
        assert_eq!(user_list_key(1, UserListKind::Admins, &short)[10], 254);

        for address in [Address::new(base), Address::new(longer), short] {
            let key = GrantKey::new(3, address.clone(), Grantee::User(address));
            assert_eq!(parse_grant_store_key(&grant_store_key(&key)).unwrap(), key);
        }
    }

    #[test]
    fn test_grant_store_key_parses_back() {
        let user_key = GrantKey::new(9, Address::new("granter"), Grantee::User(Address::new("user")));
        assert_eq!(parse_grant_store_key(&grant_store_key(&user_key)).unwrap(), user_key);

        let group_key = GrantKey::new(9, Address::new("granter"), Grantee::Group(3));
        assert_eq!(parse_grant_store_key(&grant_store_key(&group_key)).unwrap(), group_key);
    }

    #[test]
    fn test_expiration_keys_order_by_time() {
        let key = GrantKey::new(1, Address::new("g"), Grantee::Group(1));
        let early = expiration_key(Timestamp::from_millis(5), &key);
        let late = expiration_key(Timestamp::from_millis(256), &key);
        assert!(early < late);

        let end = expiration_range_end(Timestamp::from_millis(5)).unwrap();
        assert!(early < end);
        assert!(late > end);

        let (at, parsed) = parse_expiration_key(&late).unwrap();
        assert_eq!(at, Timestamp::from_millis(256));
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_expiration_range_end_at_max() {
        assert_eq!(
            expiration_range_end(Timestamp::from_millis(u64::MAX)),
            prefix_end(&expiration_prefix())
        );
    }

    #[test]
    fn test_corrupted_keys_are_errors() {
        assert!(parse_grant_store_key(&[]).is_err());
        assert!(parse_grant_store_key(&[USER_GRANT_PREFIX, 0, 0]).is_err());
        assert!(parse_grant_store_key(&[0x42; 12]).is_err());
        assert!(read_address(&[5, b'a']).is_err());
    }
}
