//! Runtime domain: remote objects, properties, evaluation

use crate::protocol::codec::{
    empty_command, json_view, protocol_enum, EmptyValue, JsonList, ProtocolCommand,
};
use crate::protocol::ids::{ExecutionContextId, RemoteObjectId};
use serde::Serialize;
use serde_json::Value;

protocol_enum! {
    /// Object type
    pub enum RemoteObjectType {
        Object = "object",
        Function = "function",
        Undefined = "undefined",
        String = "string",
        Number = "number",
        Boolean = "boolean",
        Symbol = "symbol",
        Bigint = "bigint",
    }
}

protocol_enum! {
    /// Object subtype hint
    pub enum RemoteObjectSubtype {
        Array = "array",
        Null = "null",
        Node = "node",
        Regexp = "regexp",
        Date = "date",
        Map = "map",
        Set = "set",
        Iterator = "iterator",
        Generator = "generator",
        Error = "error",
        Proxy = "proxy",
        Promise = "promise",
        TypedArray = "typedarray",
    }
}

json_view! {
    /// Mirror object referencing original JavaScript object.
    pub struct RemoteObjectValue<'a> {
        required object_type: RemoteObjectType = "type";
        optional subtype: RemoteObjectSubtype = "subtype";
        optional class_name: &'a str = "className";
        /// Primitive value, for primitives only
        optional value: &'a Value = "value";
        /// NaN, Infinity, -Infinity, -0
        optional unserializable_value: &'a str = "unserializableValue";
        optional description: &'a str = "description";
        optional object_id: RemoteObjectId = "objectId";
        optional preview: ObjectPreviewValue<'a> = "preview";
    }
}

json_view! {
    /// Object containing abbreviated remote object value.
    pub struct ObjectPreviewValue<'a> {
        optional lossless: bool = "lossless";
        /// True iff some of the properties of the original did not fit
        required overflow: bool = "overflow";
        required properties: JsonList<'a, PropertyPreviewValue<'a>> = "properties";
    }
}

json_view! {
    pub struct PropertyPreviewValue<'a> {
        required name: &'a str = "name";
        required property_type: RemoteObjectType = "type";
        optional value: &'a str = "value";
        optional subtype: RemoteObjectSubtype = "subtype";
    }
}

json_view! {
    /// Object property descriptor.
    pub struct PropertyDescriptorValue<'a> {
        required name: &'a str = "name";
        optional value: RemoteObjectValue<'a> = "value";
        optional writable: bool = "writable";
        optional get: RemoteObjectValue<'a> = "get";
        optional set: RemoteObjectValue<'a> = "set";
        required configurable: bool = "configurable";
        required enumerable: bool = "enumerable";
        optional was_thrown: bool = "wasThrown";
        optional is_own: bool = "isOwn";
    }
}

json_view! {
    /// Object internal property descriptor (`[[Prototype]]`, bound function targets, ...).
    pub struct InternalPropertyDescriptorValue<'a> {
        required name: &'a str = "name";
        optional value: RemoteObjectValue<'a> = "value";
    }
}

json_view! {
    pub struct GetPropertiesData<'a> {
        required result: JsonList<'a, PropertyDescriptorValue<'a>> = "result";
        optional internal_properties: JsonList<'a, InternalPropertyDescriptorValue<'a>> = "internalProperties";
    }
}

json_view! {
    pub struct EvaluateData<'a> {
        required result: RemoteObjectValue<'a> = "result";
        optional was_thrown: bool = "wasThrown";
    }
}

empty_command! {
    /// Enables reporting of execution contexts creation.
    RuntimeEnableParams = "Runtime.enable"
}

/// Returns properties of a given object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesParams {
    pub object_id: RemoteObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_properties: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessor_properties_only: Option<bool>,
}

impl GetPropertiesParams {
    pub fn new(object_id: RemoteObjectId) -> Self {
        Self {
            object_id,
            own_properties: None,
            accessor_properties_only: None,
        }
    }

    pub fn with_own_properties(mut self, own_properties: bool) -> Self {
        self.own_properties = Some(own_properties);
        self
    }

    pub fn with_accessor_properties_only(mut self, accessor_only: bool) -> Self {
        self.accessor_properties_only = Some(accessor_only);
        self
    }
}

impl ProtocolCommand for GetPropertiesParams {
    const METHOD: &'static str = "Runtime.getProperties";
    type Response<'a> = GetPropertiesData<'a>;
}

/// Evaluates expression on global object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    #[serde(rename = "includeCommandLineAPI", skip_serializing_if = "Option::is_none")]
    pub include_command_line_api: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ExecutionContextId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
}

impl EvaluateParams {
    pub fn new<S: Into<String>>(expression: S) -> Self {
        Self {
            expression: expression.into(),
            object_group: None,
            include_command_line_api: None,
            context_id: None,
            return_by_value: None,
        }
    }

    pub fn with_object_group<S: Into<String>>(mut self, group: S) -> Self {
        self.object_group = Some(group.into());
        self
    }

    pub fn with_context_id(mut self, context_id: ExecutionContextId) -> Self {
        self.context_id = Some(context_id);
        self
    }

    pub fn with_return_by_value(mut self, return_by_value: bool) -> Self {
        self.return_by_value = Some(return_by_value);
        self
    }

    pub fn with_command_line_api(mut self, include: bool) -> Self {
        self.include_command_line_api = Some(include);
        self
    }
}

impl ProtocolCommand for EvaluateParams {
    const METHOD: &'static str = "Runtime.evaluate";
    type Response<'a> = EvaluateData<'a>;
}

/// Releases all remote objects that belong to a given group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseObjectGroupParams {
    pub object_group: String,
}

impl ReleaseObjectGroupParams {
    pub fn new<S: Into<String>>(object_group: S) -> Self {
        Self {
            object_group: object_group.into(),
        }
    }
}

impl ProtocolCommand for ReleaseObjectGroupParams {
    const METHOD: &'static str = "Runtime.releaseObjectGroup";
    type Response<'a> = EmptyValue<'a>;
}

/// Call argument: exactly one of the three fields is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<RemoteObjectId>,
}

impl CallArgument {
    pub fn from_value(value: Value) -> Self {
        Self {
            value: Some(value),
            unserializable_value: None,
            object_id: None,
        }
    }

    pub fn from_object_id(object_id: RemoteObjectId) -> Self {
        Self {
            value: None,
            unserializable_value: None,
            object_id: Some(object_id),
        }
    }

    /// Argument that passes `remote` back to the backend unchanged
    pub fn from_remote(remote: &RemoteObjectValue<'_>) -> crate::Result<Self> {
        if let Some(object_id) = remote.object_id()? {
            return Ok(Self::from_object_id(object_id));
        }
        if let Some(text) = remote.unserializable_value()? {
            return Ok(Self {
                value: None,
                unserializable_value: Some(text.to_string()),
                object_id: None,
            });
        }
        // `undefined` has no value field and encodes as an empty argument
        Ok(Self {
            value: remote.value()?.cloned(),
            unserializable_value: None,
            object_id: None,
        })
    }
}
