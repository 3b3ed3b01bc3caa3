//! Property providers
//!
//! Real objects and scopes both expose their children through
//! [`PropertySource`]; a scope is not dressed up as a fake object.

use super::value::Value;
use super::variable::Variable;
use crate::model::handle::{HandleGroup, RemoteHandle};
use crate::protocol::codec::Reply;
use crate::protocol::domains::debugger::ScopeType;
use crate::protocol::domains::runtime::GetPropertiesParams;
use crate::protocol::ids::CallFrameId;
use crate::wip::client::ProtocolClient;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// What every mirror needs to talk to the backend during one pause
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub client: ProtocolClient,
    /// Group every handle of this pause belongs to
    pub group: Arc<HandleGroup>,
    /// Innermost call frame, target of `set_value` evaluations
    pub top_frame: Option<CallFrameId>,
    /// Array elements shown while a value is truncated
    pub page_size: usize,
}

/// Scope a variable lives in, for `Debugger.setVariableValue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRef {
    pub scope_type: ScopeType,
    /// Position in the frame's scope chain
    pub scope_number: usize,
    pub call_frame_id: CallFrameId,
}

impl ScopeRef {
    /// Scopes whose bindings the backend can assign
    pub fn is_mutable(&self) -> bool {
        matches!(
            self.scope_type,
            ScopeType::Local | ScopeType::Closure | ScopeType::Catch
        )
    }
}

/// Producer of a value's children
#[async_trait]
pub trait PropertySource: Send + Sync + fmt::Debug {
    /// Issue `Runtime.getProperties`
    ///
    /// Fails with `StaleHandle`, without traffic, once the handle's group is released.
    async fn fetch(&self, client: &ProtocolClient) -> Result<Reply<GetPropertiesParams>>;

    /// Scope the children are bindings of
    fn scope(&self) -> Option<&ScopeRef> {
        None
    }
}

async fn fetch_properties(handle: &RemoteHandle, client: &ProtocolClient) -> Result<Reply<GetPropertiesParams>> {
    let object_id = handle.id()?.clone();
    debug!("Fetching properties of {}", object_id);
    let reply = client.call(client.profile().get_properties(object_id)).await?;
    // Released while the request was in flight
    handle.group().check()?;
    Ok(reply)
}

/// Properties of a remote object
#[derive(Debug)]
pub struct ObjectProperties {
    handle: RemoteHandle,
}

impl ObjectProperties {
    pub fn new(handle: RemoteHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl PropertySource for ObjectProperties {
    async fn fetch(&self, client: &ProtocolClient) -> Result<Reply<GetPropertiesParams>> {
        fetch_properties(&self.handle, client).await
    }
}

/// Bindings of a call frame scope
#[derive(Debug, Clone)]
pub struct ScopeProperties {
    handle: RemoteHandle,
    scope: ScopeRef,
}

impl ScopeProperties {
    pub fn new(handle: RemoteHandle, scope: ScopeRef) -> Self {
        Self { handle, scope }
    }

    pub fn scope_ref(&self) -> &ScopeRef {
        &self.scope
    }
}

#[async_trait]
impl PropertySource for ScopeProperties {
    async fn fetch(&self, client: &ProtocolClient) -> Result<Reply<GetPropertiesParams>> {
        fetch_properties(&self.handle, client).await
    }

    fn scope(&self) -> Option<&ScopeRef> {
        Some(&self.scope)
    }
}

/// Children of one value
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Named properties, in reply order
    pub properties: Vec<Arc<Variable>>,
    /// `__proto__` and server-side internal slots
    pub internal: Vec<Arc<Variable>>,
}

/// Child name as an expression: `q.n`, `q[n]` or `q["n"]`
pub fn qualified_name(parent: Option<&str>, name: &str) -> Option<String> {
    let parent = parent?;
    if name.parse::<u64>().is_ok() {
        return Some(format!("{}[{}]", parent, name));
    }
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        Some(format!("{}.{}", parent, name))
    } else {
        Some(format!("{}[{}]", parent, serde_json::Value::from(name)))
    }
}

/// Lazily fetched, cached children of a value
pub struct ChildLoader {
    source: Arc<dyn PropertySource>,
    ctx: EvalContext,
    /// Expression naming the owner, if watchable
    qualified_name: Option<String>,
    cache: Mutex<Option<Arc<PropertySet>>>,
}

impl fmt::Debug for ChildLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildLoader")
            .field("source", &self.source)
            .field("qualified_name", &self.qualified_name)
            .finish()
    }
}

impl ChildLoader {
    pub fn new(source: Arc<dyn PropertySource>, ctx: EvalContext, qualified_name: Option<String>) -> Self {
        Self {
            source,
            ctx,
            qualified_name,
            cache: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// Fetch once and cache; `refresh` bypasses the cache
    pub async fn load(&self, refresh: bool) -> Result<Arc<PropertySet>> {
        self.ctx.group.check()?;

        // Held across the fetch so concurrent first callers share one request
        let mut cache = self.cache.lock().await;
        if !refresh {
            if let Some(set) = cache.as_ref() {
                return Ok(Arc::clone(set));
            }
        }

        let reply = self.source.fetch(&self.ctx.client).await?;
        let set = Arc::new(self.build(&reply)?);
        *cache = Some(Arc::clone(&set));
        Ok(set)
    }

    fn build(&self, reply: &Reply<GetPropertiesParams>) -> Result<PropertySet> {
        let data = reply.data()?;
        let mut set = PropertySet::default();

        for descriptor in data.result()?.iter() {
            let descriptor = descriptor?;
            let name = descriptor.name()?;
            // Accessor-only properties carry no value to show
            let Some(remote) = descriptor.value()? else {
                debug!("Skipping accessor property {}", name);
                continue;
            };
            let internal = name == "__proto__";
            let variable = Variable::real(
                name,
                remote.to_json(),
                qualified_name(self.qualified_name.as_deref(), name),
                internal,
                self.source.scope().cloned(),
                self.ctx.clone(),
            );
            if internal {
                set.internal.push(variable);
            } else {
                set.properties.push(variable);
            }
        }

        if let Some(internal) = data.internal_properties()? {
            for descriptor in internal.iter() {
                let descriptor = descriptor?;
                if let Some(remote) = descriptor.value()? {
                    set.internal.push(Variable::real(
                        descriptor.name()?,
                        remote.to_json(),
                        None,
                        true,
                        None,
                        self.ctx.clone(),
                    ));
                }
            }
        }

        Ok(set)
    }
}

/// Keep at most `page_size` array elements; named properties stay
pub(crate) fn page_elements(properties: &[Arc<Variable>], page_size: usize) -> Vec<Arc<Variable>> {
    let mut shown = 0;
    properties
        .iter()
        .filter(|variable| {
            if variable.name().parse::<usize>().is_err() {
                return true;
            }
            shown += 1;
            shown <= page_size
        })
        .cloned()
        .collect()
}

/// Build a value from a remote object JSON under `ctx`
pub(crate) fn value_from_json(
    remote: &serde_json::Value,
    ctx: &EvalContext,
    qualified_name: Option<String>,
) -> Result<Arc<Value>> {
    let view = crate::protocol::domains::runtime::RemoteObjectValue::parse(remote)?;
    Value::from_remote(&view, ctx, qualified_name)
}
