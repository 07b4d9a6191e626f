//! Strongly-typed identifiers.
//!
//! Catalog references (quest tokens, equipment, characters, ...) are plain
//! case-insensitive strings per the data model (`spec.md` §3) and are not
//! wrapped here. These newtypes cover the runtime identifiers that are
//! genuinely UUIDs on the wire: avatars, transactions, and spawned character
//! instances.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn to_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_id!(AvatarId);
define_id!(TransactionId);
define_id!(CharacterInstanceId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(AvatarId::new(), AvatarId::new());
    }

    #[test]
    fn round_trips_through_string() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.to_string().parse().expect("valid uuid");
        assert_eq!(id, parsed);
    }
}
