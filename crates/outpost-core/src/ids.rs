//! Branded ID newtypes for type safety.
//!
//! Every identifier in the Outpost system is a distinct newtype around
//! `String`, so a station ID can never be passed where a connection ID is
//! expected. Locally minted IDs are UUID v7 (time-ordered) via
//! [`uuid::Uuid::now_v7`]; IDs received from the outside (station IDs,
//! capture request IDs) wrap whatever string the server sent.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

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

        impl Default for $name {
            fn default() -> Self {
                Self::new()
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
    /// Durable identifier of a managed station connection. Allocated by the
    /// registry when a connection is added; keys both the persisted config
    /// record and the live connection object.
    ConnectionId
}

branded_id! {
    /// Identifier of a remote monitoring station, distinct from the
    /// transport URL it is reached at.
    StationId
}

branded_id! {
    /// Identifier of a server-initiated capture request, echoed back in the
    /// client's capture response.
    RequestId
}

branded_id! {
    /// Identifier of an image the server wants captured or has received.
    ImageId
}

branded_id! {
    /// Identifier of the operator that owns a connection.
    UserId
}
