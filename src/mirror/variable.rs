//! Variable mirrors
//!
//! Three kinds share one surface: real variables (a named property of an
//! object or scope), scope wrappers (a scope rendered as an expandable
//! variable) and exception holders (the thrown value of an exception pause).

use super::properties::{value_from_json, EvalContext, ScopeProperties, ScopeRef};
use super::value::{JsType, Value};
use crate::protocol::codec::ProtocolCommand;
use crate::protocol::domains::debugger::{EvaluateOnCallFrameParams, SetVariableValueParams};
use crate::protocol::domains::runtime::{CallArgument, RemoteObjectValue};
use crate::{Error, Result};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Variable kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Real,
    ScopeWrapper,
    ExceptionHolder,
}

#[derive(Debug)]
enum Origin {
    Real {
        /// Remote object JSON, realised into a `Value` on first use
        remote: serde_json::Value,
        qualified_name: Option<String>,
        internal: bool,
        scope: Option<ScopeRef>,
    },
    ScopeWrapper {
        source: ScopeProperties,
    },
    ExceptionHolder {
        exception: Arc<Value>,
    },
}

/// Mirror of a variable
#[derive(Debug)]
pub struct Variable {
    name: String,
    origin: Origin,
    ctx: EvalContext,
    /// Publish-once value slot
    value: OnceLock<Arc<Value>>,
}

impl Variable {
    /// A named property of an object or scope
    pub fn real<S: Into<String>>(
        name: S,
        remote: serde_json::Value,
        qualified_name: Option<String>,
        internal: bool,
        scope: Option<ScopeRef>,
        ctx: EvalContext,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            origin: Origin::Real {
                remote,
                qualified_name,
                internal,
                scope,
            },
            ctx,
            value: OnceLock::new(),
        })
    }

    /// A scope shown as a variable named `<scope-type>`
    pub fn scope_wrapper(source: ScopeProperties, ctx: EvalContext) -> Arc<Self> {
        Arc::new(Self {
            name: format!("<{}>", source.scope_ref().scope_type),
            origin: Origin::ScopeWrapper { source },
            ctx,
            value: OnceLock::new(),
        })
    }

    /// The thrown value of an exception pause
    pub fn exception_holder(exception: Arc<Value>, ctx: EvalContext) -> Arc<Self> {
        Arc::new(Self {
            name: "<exception>".to_string(),
            origin: Origin::ExceptionHolder { exception },
            ctx,
            value: OnceLock::new(),
        })
    }

    /// Stable name; never fails
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        match self.origin {
            Origin::Real { .. } => VariableKind::Real,
            Origin::ScopeWrapper { .. } => VariableKind::ScopeWrapper,
            Origin::ExceptionHolder { .. } => VariableKind::ExceptionHolder,
        }
    }

    /// True for `__proto__` and internal slots
    pub fn is_internal(&self) -> bool {
        matches!(self.origin, Origin::Real { internal: true, .. })
    }

    /// Type name shown next to the variable
    pub fn reference_type_name(&self) -> Result<String> {
        match &self.origin {
            Origin::Real { remote, .. } => {
                self.ctx.group.check()?;
                let view = RemoteObjectValue::parse(remote)?;
                let js_type = JsType::classify(view.object_type()?, view.subtype()?);
                Ok(js_type.to_string())
            }
            Origin::ScopeWrapper { .. } => Ok("<scope>".to_string()),
            Origin::ExceptionHolder { exception } => {
                self.ctx.group.check()?;
                Ok(exception.js_type().to_string())
            }
        }
    }

    /// The variable's value, built once and shared by every caller
    ///
    /// Fails with `StaleHandle` if first touched after the pause ended.
    pub fn value(&self) -> Result<Arc<Value>> {
        if let Some(value) = self.value.get() {
            return Ok(Arc::clone(value));
        }
        self.ctx.group.check()?;

        let created = self.create_value()?;
        // Concurrent first callers may both build; only one is installed
        match self.value.set(Arc::clone(&created)) {
            Ok(()) => Ok(created),
            Err(_) => Ok(self.value.get().cloned().unwrap_or(created)),
        }
    }

    fn create_value(&self) -> Result<Arc<Value>> {
        match &self.origin {
            Origin::Real { remote, .. } => {
                value_from_json(remote, &self.ctx, self.watch_expression().map(str::to_string))
            }
            Origin::ScopeWrapper { source } => Ok(Value::scope_object(source.clone(), &self.ctx)),
            Origin::ExceptionHolder { exception } => Ok(Arc::clone(exception)),
        }
    }

    /// Expression that re-evaluates to this variable; `None` when not watchable
    pub fn watch_expression(&self) -> Option<&str> {
        match &self.origin {
            Origin::Real { qualified_name, .. } => Some(qualified_name.as_deref().unwrap_or(&self.name)),
            _ => None,
        }
    }

    /// Whether `set_value` is available
    pub fn writable(&self) -> bool {
        match &self.origin {
            Origin::Real {
                scope: Some(scope), ..
            } => scope.is_mutable() && self.ctx.client.profile().supports_value_modification(),
            _ => false,
        }
    }

    /// Assign the result of `expression` evaluated on the innermost frame
    ///
    /// Returns the new value; the memoised `value()` keeps the old one.
    pub async fn set_value(&self, expression: &str) -> Result<Arc<Value>> {
        let scope = match &self.origin {
            Origin::Real {
                scope: Some(scope), ..
            } if self.writable() => scope.clone(),
            _ => return Err(Error::not_supported(SetVariableValueParams::METHOD)),
        };
        self.ctx.group.check()?;
        let top_frame = self
            .ctx
            .top_frame
            .clone()
            .ok_or_else(|| Error::session_busy("no call frame to evaluate on"))?;

        debug!("Evaluating new value for {}: {}", self.name, expression);
        let reply = self
            .ctx
            .client
            .call(EvaluateOnCallFrameParams::new(top_frame, expression).with_object_group(self.ctx.group.name()))
            .await?;
        let data = reply.data()?;
        let result = data.result()?;
        if data.was_thrown()?.unwrap_or(false) {
            return Err(Error::evaluation(result.description()?.unwrap_or("exception").to_string()));
        }

        let argument = CallArgument::from_remote(&result)?;
        self.ctx
            .client
            .call(
                SetVariableValueParams::new(scope.scope_number as i64, self.name.as_str(), argument)
                    .with_call_frame_id(scope.call_frame_id),
            )
            .await?;
        info!("Variable {} set to {}", self.name, expression);

        Value::from_remote(&result, &self.ctx, self.watch_expression().map(str::to_string))
    }
}
