//! Protocol typedefs
//!
//! Identifiers that share a wire encoding are kept as distinct types so the
//! session layer cannot pass a frame id where a script id is expected.

use super::codec::{DecodeError, FromJson};
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! string_typedef {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new<S: Into<String>>(value: S) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl<'a> FromJson<'a> for $name {
            fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError> {
                value
                    .as_str()
                    .map(|s| Self(s.to_string()))
                    .ok_or_else(|| DecodeError::type_mismatch(field, "string"))
            }
        }
    };
}

macro_rules! long_typedef {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'a> FromJson<'a> for $name {
            fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError> {
                i64::from_json(value, field).map(Self)
            }
        }
    };
}

string_typedef! {
    /// Server-assigned script identifier
    ScriptId
}

string_typedef! {
    /// Server-assigned breakpoint identifier
    BreakpointId
}

string_typedef! {
    /// Call frame identifier, valid only while paused
    CallFrameId
}

string_typedef! {
    /// Remote object handle
    RemoteObjectId
}

string_typedef! {
    /// Page frame identifier
    FrameId
}

string_typedef! {
    /// Page loader identifier
    LoaderId
}

long_typedef! {
    /// DOM node identifier
    NodeId
}

long_typedef! {
    /// Runtime execution context identifier
    ExecutionContextId
}
