//! Reader views and writer traits for protocol messages
//!
//! Incoming messages are decoded once into a `serde_json::Value`; typed
//! reader views borrow from that tree and only look at a field when its
//! accessor is called. Outgoing parameters are plain serde structs.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Failure to read a field from a protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Required field absent (or null)
    MissingField(String),
    /// Field present with the wrong JSON type
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
    /// Enumerated string outside the known set
    UnknownEnum { field: String, value: String },
}

impl DecodeError {
    pub fn missing(field: &str) -> Self {
        DecodeError::MissingField(field.to_string())
    }

    pub fn type_mismatch(field: &str, expected: &'static str) -> Self {
        DecodeError::TypeMismatch {
            field: field.to_string(),
            expected,
        }
    }

    pub fn unknown_enum(field: &str, value: &str) -> Self {
        DecodeError::UnknownEnum {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// True for an unrecognised enum value
    pub fn is_unknown_enum(&self) -> bool {
        matches!(self, DecodeError::UnknownEnum { .. })
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingField(field) => write!(f, "missing field {}", field),
            DecodeError::TypeMismatch { field, expected } => {
                write!(f, "field {} is not a {}", field, expected)
            }
            DecodeError::UnknownEnum { field, value } => {
                write!(f, "unknown value {:?} for field {}", value, field)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for crate::Error {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::MissingField(field) => crate::Error::ProtocolMissingField { field },
            DecodeError::TypeMismatch { field, expected } => {
                crate::Error::ProtocolTypeMismatch { field, expected }
            }
            DecodeError::UnknownEnum { field, value } => {
                crate::Error::ProtocolUnknownEnum { field, value }
            }
        }
    }
}

/// A type that can be read out of a JSON field without copying the tree
pub trait FromJson<'a>: Sized {
    /// Read `value`; `field` names the field for error reporting
    fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError>;
}

impl<'a> FromJson<'a> for &'a str {
    fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError> {
        value
            .as_str()
            .ok_or_else(|| DecodeError::type_mismatch(field, "string"))
    }
}

impl<'a> FromJson<'a> for i64 {
    fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError> {
        // Some backends send integral longs as 3.0
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| DecodeError::type_mismatch(field, "long"))
    }
}

impl<'a> FromJson<'a> for f64 {
    fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError> {
        value
            .as_f64()
            .ok_or_else(|| DecodeError::type_mismatch(field, "double"))
    }
}

impl<'a> FromJson<'a> for bool {
    fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError> {
        value
            .as_bool()
            .ok_or_else(|| DecodeError::type_mismatch(field, "bool"))
    }
}

/// Untyped field ("any" in the schema)
impl<'a> FromJson<'a> for &'a Value {
    fn from_json(value: &'a Value, _field: &str) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

/// Read a required field
pub fn required<'a, T: FromJson<'a>>(object: &'a Value, field: &str) -> Result<T, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(DecodeError::missing(field)),
        Some(value) => T::from_json(value, field),
    }
}

/// Read an optional field; absence (or null) yields `None`
pub fn optional<'a, T: FromJson<'a>>(
    object: &'a Value,
    field: &str,
) -> Result<Option<T>, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::from_json(value, field).map(Some),
    }
}

/// Homogeneous sequence whose elements are decoded on access
pub struct JsonList<'a, T> {
    items: &'a [Value],
    field: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> Clone for JsonList<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for JsonList<'a, T> {}

impl<'a, T> fmt::Debug for JsonList<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonList")
            .field("field", &self.field)
            .field("len", &self.items.len())
            .finish()
    }
}

impl<'a, T: FromJson<'a>> JsonList<'a, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Decode element `index`
    pub fn get(&self, index: usize) -> Option<Result<T, DecodeError>> {
        self.items.get(index).map(|item| T::from_json(item, self.field))
    }

    /// Iterate, decoding each element as it is reached
    pub fn iter(&self) -> impl Iterator<Item = Result<T, DecodeError>> + 'a {
        let (items, field) = (self.items, self.field);
        items.iter().map(move |item| T::from_json(item, field))
    }

    /// Decode every element, failing on the first bad one
    pub fn to_vec(&self) -> Result<Vec<T>, DecodeError> {
        self.iter().collect()
    }
}

impl<'a, T> FromJson<'a> for JsonList<'a, T> {
    fn from_json(value: &'a Value, field: &str) -> Result<Self, DecodeError> {
        // Element errors report the list position marker, not the list's field
        match value.as_array() {
            Some(items) => Ok(JsonList {
                items: items.as_slice(),
                field: "[]",
                _marker: PhantomData,
            }),
            None => Err(DecodeError::type_mismatch(field, "array")),
        }
    }
}

/// An outgoing command: typed parameters plus the reader view of its reply
pub trait ProtocolCommand: Serialize + Send + 'static {
    /// Wire method name, `<Domain>.<command>`
    const METHOD: &'static str;

    /// Reader view over the `result` object
    type Response<'a>: FromJson<'a>;

    /// Encode parameters; commands without parameters encode as `null`
    fn to_params(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Owned reply to a typed command; views borrow from it
pub struct Reply<C: ProtocolCommand> {
    json: Value,
    _command: PhantomData<fn() -> C>,
}

impl<C: ProtocolCommand> Reply<C> {
    pub fn new(json: Value) -> Self {
        Self {
            json,
            _command: PhantomData,
        }
    }

    /// Reader view over the reply
    pub fn data(&self) -> Result<C::Response<'_>, DecodeError> {
        <C::Response<'_> as FromJson<'_>>::from_json(&self.json, C::METHOD)
    }

    pub fn as_json(&self) -> &Value {
        &self.json
    }

    pub fn into_json(self) -> Value {
        self.json
    }
}

impl<C: ProtocolCommand> fmt::Debug for Reply<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("method", &C::METHOD)
            .field("json", &self.json)
            .finish()
    }
}

/// Declare a reader view over a JSON object.
///
/// Each field line is `required|optional name: Type = "jsonName";`.
macro_rules! json_view {
    (@accessor $lt:lifetime required $(#[$fmeta:meta])* $field:ident : $ty:ty = $json:literal) => {
        $(#[$fmeta])*
        pub fn $field(&self) -> ::std::result::Result<$ty, $crate::protocol::codec::DecodeError> {
            $crate::protocol::codec::required(self.json, $json)
        }
    };
    (@accessor $lt:lifetime optional $(#[$fmeta:meta])* $field:ident : $ty:ty = $json:literal) => {
        $(#[$fmeta])*
        pub fn $field(&self) -> ::std::result::Result<Option<$ty>, $crate::protocol::codec::DecodeError> {
            $crate::protocol::codec::optional(self.json, $json)
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident<$lt:lifetime> {
            $(
                $(#[$fmeta:meta])*
                $kind:ident $field:ident : $ty:ty = $json:literal;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name<$lt> {
            json: &$lt serde_json::Value,
        }

        impl<$lt> $name<$lt> {
            /// Wrap a decoded JSON object
            pub fn parse(
                json: &$lt serde_json::Value,
            ) -> ::std::result::Result<Self, $crate::protocol::codec::DecodeError> {
                <Self as $crate::protocol::codec::FromJson<$lt>>::from_json(json, stringify!($name))
            }

            /// The JSON this view reads from
            pub fn as_json(&self) -> &$lt serde_json::Value {
                self.json
            }

            /// Re-encode; equal to the decoded input
            pub fn to_json(&self) -> serde_json::Value {
                self.json.clone()
            }

            $(
                $crate::protocol::codec::json_view!(@accessor $lt $kind $(#[$fmeta])* $field : $ty = $json);
            )*
        }

        impl<$lt> $crate::protocol::codec::FromJson<$lt> for $name<$lt> {
            fn from_json(
                value: &$lt serde_json::Value,
                field: &str,
            ) -> ::std::result::Result<Self, $crate::protocol::codec::DecodeError> {
                if value.is_object() {
                    Ok(Self { json: value })
                } else {
                    Err($crate::protocol::codec::DecodeError::type_mismatch(field, "object"))
                }
            }
        }
    };
}

/// Declare a string enumeration
macro_rules! protocol_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $wire:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )*
        }

        impl $name {
            /// Wire spelling
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )*
                }
            }

            /// Parse the wire spelling
            pub fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $( $wire => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'a> $crate::protocol::codec::FromJson<'a> for $name {
            fn from_json(
                value: &'a serde_json::Value,
                field: &str,
            ) -> ::std::result::Result<Self, $crate::protocol::codec::DecodeError> {
                let text = value
                    .as_str()
                    .ok_or_else(|| $crate::protocol::codec::DecodeError::type_mismatch(field, "string"))?;
                Self::from_wire(text)
                    .ok_or_else(|| $crate::protocol::codec::DecodeError::unknown_enum(field, text))
            }
        }
    };
}

/// Declare a command that takes no parameters and replies with an empty object
macro_rules! empty_command {
    ($(#[$meta:meta])* $name:ident = $method:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, serde::Serialize)]
        pub struct $name;

        impl $crate::protocol::codec::ProtocolCommand for $name {
            const METHOD: &'static str = $method;
            type Response<'a> = $crate::protocol::codec::EmptyValue<'a>;
        }
    };
}

pub(crate) use empty_command;
pub(crate) use json_view;
pub(crate) use protocol_enum;

json_view! {
    /// Reply carrying no fields
    pub struct EmptyValue<'a> {}
}
