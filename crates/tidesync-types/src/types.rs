//! Identifiers and logical time shared by every TideSync crate

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier of one synchronized item
///
/// Opaque to the client. An item keeps its identifier across content changes
/// but not across path changes: the path is part of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ItemId(uuid::Uuid);

impl ItemId {
    /// Generate a fresh random identifier
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Build an identifier from a fixed value
    pub const fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl From<uuid::Uuid> for ItemId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-local key of an item that has not been given an [`ItemId`] yet
///
/// Only meaningful within a single request/response exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ClientId(u64);

impl ClientId {
    /// Create a client id from a raw counter value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The id following this one
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical time assigned by the server to an accepted mutation
///
/// Replaces wall-clock time: the server bumps an item's time every time it
/// accepts a change to it, which gives a deterministic, server-authoritative
/// ordering for conflict detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ServerTime(u64);

impl ServerTime {
    /// Time of an item's first accepted version
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Create a server time from a raw counter value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The time following this one
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Identity of a server's data lineage
///
/// A different identity means the server's state was reset and previously
/// recorded logical times are meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ServerIdentity(uuid::Uuid);

impl ServerIdentity {
    /// Generate a fresh random identity
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Build an identity from a fixed value
    pub const fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }
}

impl From<uuid::Uuid> for ServerIdentity {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_time_is_monotonic() {
        let t0 = ServerTime::initial();
        let t1 = t0.next();

        assert_eq!(t0.get(), 0);
        assert_eq!(t1.get(), 1);
        assert!(t1 > t0);
        assert_eq!(t1.to_string(), "t1");
    }

    #[test]
    fn test_client_id_sequence() {
        let first = ClientId::default();
        assert_eq!(first, ClientId::new(0));
        assert_eq!(first.next().next().get(), 2);
    }

    #[test]
    fn test_identities_compare_by_value() {
        assert_eq!(ServerIdentity::from_u128(7), ServerIdentity::from_u128(7));
        assert_ne!(ServerIdentity::new_v4(), ServerIdentity::new_v4());
        assert_ne!(ItemId::new_v4(), ItemId::new_v4());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_identifiers_serialize_transparently() {
        let time = ServerTime::new(42);
        assert_eq!(serde_json::to_string(&time).unwrap(), "42");

        let id = ItemId::from_u128(1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000001\"");
        assert_eq!(serde_json::from_str::<ItemId>(&json).unwrap(), id);
    }
}
