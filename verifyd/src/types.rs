//! Entity identifier newtypes.
//!
//! All ids are random UUIDs. Display uses a short prefixed form
//! (`u_xxxxxxxx`, `k_xxxxxxxx`, `j_xxxxxxxx`) so that log lines and API
//! payloads stay readable without carrying full UUIDs around.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Short readable form: prefix plus the first 8 hex characters.
            pub fn to_short_string(&self) -> String {
                let hex = format!("{:032x}", self.0.as_u128());
                format!("{}_{}", $prefix, &hex[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_short_string())
            }
        }
    };
}

entity_id!(UserId, "u");
entity_id!(KeyId, "k");
entity_id!(JobId, "j");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_string_prefixes() {
        assert!(UserId::new().to_short_string().starts_with("u_"));
        assert!(KeyId::new().to_short_string().starts_with("k_"));
        assert!(JobId::new().to_short_string().starts_with("j_"));
    }

    #[test]
    fn test_short_string_length() {
        // prefix + underscore + 8 hex chars
        assert_eq!(JobId::new().to_short_string().len(), 10);
    }

    #[test]
    fn test_serde_transparent() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        // Serializes as a plain UUID string, not a wrapper object
        assert!(json.starts_with('"'));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = UserId::new();
        let parsed: UserId = id.as_uuid().to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
