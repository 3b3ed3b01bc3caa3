//! Value mirrors
//!
//! A `Value` is a client-side view of one remote object. Primitives carry
//! everything inline; complex values fetch their children on first use.

use super::properties::{page_elements, ChildLoader, EvalContext, ObjectProperties, PropertySet, ScopeProperties};
use super::variable::Variable;
use crate::model::handle::RemoteHandle;
use crate::model::script::SourceLocation;
use crate::protocol::domains::debugger::GetFunctionDetailsParams;
use crate::protocol::domains::runtime::{RemoteObjectSubtype, RemoteObjectType, RemoteObjectValue};
use crate::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Dynamic JavaScript type of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsType {
    Undefined,
    Null,
    Boolean,
    Number,
    BigInt,
    String,
    Symbol,
    Object,
    Array,
    Function,
    Date,
    RegExp,
    Error,
}

impl JsType {
    pub fn classify(object_type: RemoteObjectType, subtype: Option<RemoteObjectSubtype>) -> Self {
        match (object_type, subtype) {
            (RemoteObjectType::Undefined, _) => JsType::Undefined,
            (RemoteObjectType::Boolean, _) => JsType::Boolean,
            (RemoteObjectType::Number, _) => JsType::Number,
            (RemoteObjectType::Bigint, _) => JsType::BigInt,
            (RemoteObjectType::String, _) => JsType::String,
            (RemoteObjectType::Symbol, _) => JsType::Symbol,
            (RemoteObjectType::Function, _) => JsType::Function,
            (RemoteObjectType::Object, Some(RemoteObjectSubtype::Null)) => JsType::Null,
            (RemoteObjectType::Object, Some(RemoteObjectSubtype::Array | RemoteObjectSubtype::TypedArray)) => {
                JsType::Array
            }
            (RemoteObjectType::Object, Some(RemoteObjectSubtype::Date)) => JsType::Date,
            (RemoteObjectType::Object, Some(RemoteObjectSubtype::Regexp)) => JsType::RegExp,
            (RemoteObjectType::Object, Some(RemoteObjectSubtype::Error)) => JsType::Error,
            (RemoteObjectType::Object, _) => JsType::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsType::Undefined => "undefined",
            JsType::Null => "null",
            JsType::Boolean => "boolean",
            JsType::Number => "number",
            JsType::BigInt => "bigint",
            JsType::String => "string",
            JsType::Symbol => "symbol",
            JsType::Object => "object",
            JsType::Array => "array",
            JsType::Function => "function",
            JsType::Date => "date",
            JsType::RegExp => "regexp",
            JsType::Error => "error",
        }
    }

    /// Values of these types have no children
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            JsType::Undefined
                | JsType::Null
                | JsType::Boolean
                | JsType::Number
                | JsType::BigInt
                | JsType::String
                | JsType::Symbol
        )
    }
}

impl fmt::Display for JsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every remote value
#[derive(Debug, Clone)]
pub struct RemoteInfo {
    pub js_type: JsType,
    pub class_name: Option<String>,
    pub description: Option<String>,
    /// JSON value of a primitive
    pub raw: Option<serde_json::Value>,
    /// `NaN`, `Infinity`, `-0` and friends
    pub unserializable: Option<String>,
    pub handle: Option<RemoteHandle>,
}

impl RemoteInfo {
    fn from_view(remote: &RemoteObjectValue<'_>, ctx: &EvalContext) -> Result<Self> {
        Ok(Self {
            js_type: JsType::classify(remote.object_type()?, remote.subtype()?),
            class_name: remote.class_name()?.map(str::to_string),
            description: remote.description()?.map(str::to_string),
            raw: remote.value()?.cloned(),
            unserializable: remote.unserializable_value()?.map(str::to_string),
            handle: remote
                .object_id()?
                .map(|id| RemoteHandle::new(id, Arc::clone(&ctx.group))),
        })
    }

    /// Display text
    pub fn text(&self) -> String {
        if let Some(text) = &self.unserializable {
            return text.clone();
        }
        match (&self.raw, self.js_type) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(raw), _) if self.description.is_none() => raw.to_string(),
            (_, JsType::Undefined) if self.description.is_none() => "undefined".to_string(),
            (_, JsType::Null) if self.description.is_none() => "null".to_string(),
            _ => self
                .description
                .clone()
                .or_else(|| self.class_name.clone())
                .unwrap_or_default(),
        }
    }
}

/// Object or scope with lazily loaded children
#[derive(Debug)]
pub struct ObjectValue {
    info: RemoteInfo,
    children: ChildLoader,
}

impl ObjectValue {
    pub fn info(&self) -> &RemoteInfo {
        &self.info
    }

    pub async fn properties(&self) -> Result<Vec<Arc<Variable>>> {
        Ok(self.children.load(false).await?.properties.clone())
    }

    pub async fn internal_properties(&self) -> Result<Vec<Arc<Variable>>> {
        Ok(self.children.load(false).await?.internal.clone())
    }

    async fn refresh(&self) -> Result<Arc<PropertySet>> {
        self.children.load(true).await
    }
}

/// Array, possibly truncated by the server preview
#[derive(Debug)]
pub struct ArrayValue {
    object: ObjectValue,
    length: Option<usize>,
    truncated: AtomicBool,
}

impl ArrayValue {
    /// Element count from the description, when reported
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::Acquire)
    }

    /// Elements; at most one page while truncated
    pub async fn properties(&self) -> Result<Vec<Arc<Variable>>> {
        let properties = self.object.properties().await?;
        if self.is_truncated() {
            Ok(page_elements(&properties, self.object.children.context().page_size))
        } else {
            Ok(properties)
        }
    }

    /// Refetch every element and clear the truncation flag
    pub async fn reload_heavy_value(&self) -> Result<()> {
        let set = self.object.refresh().await?;
        debug!("Reloaded array with {} properties", set.properties.len());
        self.truncated.store(false, Ordering::Release);
        Ok(())
    }
}

/// Function; its source location is looked up on demand
#[derive(Debug)]
pub struct FunctionValue {
    object: ObjectValue,
    location: OnceCell<Option<SourceLocation>>,
}

impl FunctionValue {
    /// Definition site via `Debugger.getFunctionDetails`, cached
    pub async fn location(&self) -> Result<Option<SourceLocation>> {
        let location = self
            .location
            .get_or_try_init(|| async {
                let Some(handle) = &self.object.info.handle else {
                    return Ok(None);
                };
                let client = &self.object.children.context().client;
                let reply = client
                    .call(GetFunctionDetailsParams {
                        function_id: handle.id()?.clone(),
                    })
                    .await?;
                let data = reply.data()?;
                SourceLocation::from_view(&data.details()?.location()?).map(Some)
            })
            .await?;
        Ok(location.clone())
    }
}

/// Mirror of a remote value
#[derive(Debug)]
pub enum Value {
    Primitive(RemoteInfo),
    Object(ObjectValue),
    Array(ArrayValue),
    Function(FunctionValue),
    /// A thrown value
    Exception(Arc<Value>),
}

/// Array length from descriptions such as `Array[3]` or `Array(3)`
fn array_length(description: Option<&str>) -> Option<usize> {
    let description = description?;
    let open = description.rfind(['[', '('])?;
    let digits = description[open + 1..].trim_end_matches([']', ')']);
    digits.parse().ok()
}

impl Value {
    /// Build a mirror of `remote`; `qualified_name` names it as an expression
    pub fn from_remote(
        remote: &RemoteObjectValue<'_>,
        ctx: &EvalContext,
        qualified_name: Option<String>,
    ) -> Result<Arc<Self>> {
        let info = RemoteInfo::from_view(remote, ctx)?;
        let handle = match (&info.handle, info.js_type.is_primitive()) {
            (Some(handle), false) => handle.clone(),
            _ => return Ok(Arc::new(Value::Primitive(info))),
        };

        let object = |info: RemoteInfo| ObjectValue {
            info,
            children: ChildLoader::new(
                Arc::new(ObjectProperties::new(handle)),
                ctx.clone(),
                qualified_name,
            ),
        };

        let value = match info.js_type {
            JsType::Array => {
                let length = array_length(info.description.as_deref());
                let overflow = match remote.preview()? {
                    Some(preview) => preview.overflow()?,
                    None => false,
                };
                let truncated = overflow || length.is_some_and(|n| n > ctx.page_size);
                Value::Array(ArrayValue {
                    object: object(info),
                    length,
                    truncated: AtomicBool::new(truncated),
                })
            }
            JsType::Function => Value::Function(FunctionValue {
                object: object(info),
                location: OnceCell::new(),
            }),
            _ => Value::Object(object(info)),
        };
        Ok(Arc::new(value))
    }

    /// Synthetic object whose properties are the bindings of a scope
    pub fn scope_object(source: ScopeProperties, ctx: &EvalContext) -> Arc<Self> {
        Arc::new(Value::Object(ObjectValue {
            info: RemoteInfo {
                js_type: JsType::Object,
                class_name: Some("#Scope".to_string()),
                description: Some("#Scope".to_string()),
                raw: None,
                unserializable: None,
                handle: None,
            },
            children: ChildLoader::new(Arc::new(source), ctx.clone(), None),
        }))
    }

    pub fn exception(thrown: Arc<Value>) -> Arc<Self> {
        Arc::new(Value::Exception(thrown))
    }

    pub fn info(&self) -> &RemoteInfo {
        match self.target() {
            Value::Object(object) => &object.info,
            Value::Array(array) => &array.object.info,
            Value::Function(function) => &function.object.info,
            Value::Primitive(info) => info,
            Value::Exception(thrown) => thrown.info(),
        }
    }

    pub fn js_type(&self) -> JsType {
        self.info().js_type
    }

    /// Display text
    pub fn text(&self) -> String {
        self.info().text()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.info().class_name.as_deref()
    }

    pub fn handle(&self) -> Option<&RemoteHandle> {
        self.info().handle.as_ref()
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Value::Exception(_))
    }

    pub fn is_truncated(&self) -> bool {
        self.as_array().is_some_and(ArrayValue::is_truncated)
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self.target() {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self.target() {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// The value itself, or the thrown value of an exception
    fn target(&self) -> &Value {
        match self {
            Value::Exception(thrown) => thrown.target(),
            value => value,
        }
    }

    /// Named children; empty for primitives
    pub async fn properties(&self) -> Result<Vec<Arc<Variable>>> {
        match self.target() {
            Value::Object(object) => object.properties().await,
            Value::Array(array) => array.properties().await,
            Value::Function(function) => function.object.properties().await,
            Value::Primitive(_) | Value::Exception(_) => Ok(Vec::new()),
        }
    }

    /// Prototype link and server-side internal slots
    pub async fn internal_properties(&self) -> Result<Vec<Arc<Variable>>> {
        match self.target() {
            Value::Object(object) => object.internal_properties().await,
            Value::Array(array) => array.object.internal_properties().await,
            Value::Function(function) => function.object.internal_properties().await,
            Value::Primitive(_) | Value::Exception(_) => Ok(Vec::new()),
        }
    }

    /// Refetch children bypassing the cache; clears array truncation
    pub async fn reload_heavy_value(&self) -> Result<()> {
        match self.target() {
            Value::Object(object) => object.refresh().await.map(|_| ()),
            Value::Array(array) => array.reload_heavy_value().await,
            Value::Function(function) => function.object.refresh().await.map(|_| ()),
            Value::Primitive(_) | Value::Exception(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            JsType::classify(RemoteObjectType::Object, Some(RemoteObjectSubtype::Null)),
            JsType::Null
        );
        assert_eq!(
            JsType::classify(RemoteObjectType::Object, Some(RemoteObjectSubtype::Error)),
            JsType::Error
        );
        assert_eq!(JsType::classify(RemoteObjectType::Object, None), JsType::Object);
        assert!(JsType::Null.is_primitive());
        assert!(!JsType::Array.is_primitive());
    }

    #[test]
    fn test_array_length() {
        assert_eq!(array_length(Some("Array[3]")), Some(3));
        assert_eq!(array_length(Some("Array(250)")), Some(250));
        assert_eq!(array_length(Some("Array")), None);
        assert_eq!(array_length(None), None);
    }

    #[test]
    fn test_primitive_text() {
        let info = |raw: Option<serde_json::Value>, description: Option<&str>, js_type| RemoteInfo {
            js_type,
            class_name: None,
            description: description.map(str::to_string),
            raw,
            unserializable: None,
            handle: None,
        };
        assert_eq!(info(Some("hi".into()), None, JsType::String).text(), "hi");
        assert_eq!(info(Some(3.into()), Some("3"), JsType::Number).text(), "3");
        assert_eq!(info(Some(true.into()), None, JsType::Boolean).text(), "true");
        assert_eq!(info(None, None, JsType::Undefined).text(), "undefined");
    }
}
