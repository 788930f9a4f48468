//! Branded ID newtypes.
//!
//! Ids are assigned by the hub and treated as opaque strings. Wrapping them
//! keeps a user id from being mixed up with a display name, which is also a
//! plain `String` on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Hub-assigned identifier of a chat participant.
    UserId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_string() {
        let id = UserId::from("42");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""42""#);
    }

    #[test]
    fn deserializes_from_bare_string() {
        let id: UserId = serde_json::from_str(r#""abc-123""#).unwrap();
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn numeric_json_is_not_an_id() {
        assert!(serde_json::from_str::<UserId>("42").is_err());
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(UserId::from("1"), UserId::from_string("1".to_string()));
        assert_ne!(UserId::from("1"), UserId::from("2"));
    }

    #[test]
    fn deref_and_display() {
        let id = UserId::from("u-7");
        assert!(id.starts_with("u-"));
        assert_eq!(id.to_string(), "u-7");
        assert_eq!(String::from(id), "u-7");
    }
}
