//! Opaque string identifiers.
//!
//! Agent identifiers and API tokens are opaque strings rather than raw
//! UUIDs: the demo spawner mints human-readable `demo_*` identifiers, so
//! the wrappers hold a [`String`] and only the [`new`](AgentId::new)
//! constructors reach for UUID v4. The newtypes prevent accidental mixing
//! of identifiers and tokens at compile time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh random identifier (UUID v4 rendered as a string).
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// View the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }
    };
}

define_id! {
    /// Opaque unique identifier for an agent in the simulation.
    AgentId
}

define_id! {
    /// Bearer token authenticating an agent's API calls.
    ApiKey
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_unique() {
        assert_ne!(AgentId::new(), AgentId::new());
        assert_ne!(ApiKey::new(), ApiKey::new());
    }

    #[test]
    fn ids_round_trip_through_serde_as_plain_strings() {
        let id = AgentId::from("demo_1a2b3c4d");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"demo_1a2b3c4d\"");
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_inner_string() {
        let id = AgentId::from("abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(id.as_str(), "abc");
    }
}
