//! Suspension model
//!
//! A `Suspension` is the client-side snapshot of one pause. It is built
//! synchronously from the `Debugger.paused` payload and owns the handle
//! group every mirror of that pause is pinned to.

use super::handle::{HandleGroup, RemoteHandle};
use super::script::SourceLocation;
use crate::mirror::properties::{EvalContext, ScopeProperties, ScopeRef};
use crate::mirror::value::Value;
use crate::mirror::variable::Variable;
use crate::protocol::domains::debugger::{CallFrameValue, PausedEventData, PausedReason, ScopeType};
use crate::protocol::ids::{BreakpointId, CallFrameId};
use crate::wip::client::ProtocolClient;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// One entry of a frame's scope chain
#[derive(Debug)]
pub struct Scope {
    scope_type: ScopeType,
    index: usize,
    variable: Arc<Variable>,
}

impl Scope {
    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    /// Position in the scope chain, innermost first
    pub fn index(&self) -> usize {
        self.index
    }

    /// The scope as an expandable variable named `<scope-type>`
    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    /// Bindings of the scope, fetched on first call
    pub async fn variables(&self) -> Result<Vec<Arc<Variable>>> {
        self.variable.value()?.properties().await
    }
}

/// Frame kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Synthetic frame holding the thrown value
    Exception,
    Real,
}

/// One frame of the suspended stack
#[derive(Debug)]
pub struct CallFrame {
    kind: FrameKind,
    id: Option<CallFrameId>,
    function_name: String,
    location: Option<SourceLocation>,
    scopes: Vec<Scope>,
    this: Option<Arc<Variable>>,
    exception: Option<Arc<Variable>>,
}

impl CallFrame {
    fn exception_frame(exception: Arc<Value>, ctx: &EvalContext) -> Self {
        Self {
            kind: FrameKind::Exception,
            id: None,
            function_name: "<exception>".to_string(),
            location: None,
            scopes: Vec::new(),
            this: None,
            exception: Some(Variable::exception_holder(exception, ctx.clone())),
        }
    }

    fn from_view(frame: &CallFrameValue<'_>, ctx: &EvalContext) -> Result<Self> {
        let id = frame.call_frame_id()?;
        let mut scopes = Vec::new();
        for (index, scope) in frame.scope_chain()?.iter().enumerate() {
            let scope = scope?;
            let scope_type = scope.scope_type()?;
            let object_id = scope
                .object()?
                .object_id()?
                .ok_or_else(|| Error::ProtocolMissingField {
                    field: "objectId".to_string(),
                })?;
            let source = ScopeProperties::new(
                RemoteHandle::new(object_id, Arc::clone(&ctx.group)),
                ScopeRef {
                    scope_type,
                    scope_number: index,
                    call_frame_id: id.clone(),
                },
            );
            scopes.push(Scope {
                scope_type,
                index,
                variable: Variable::scope_wrapper(source, ctx.clone()),
            });
        }

        let this = Variable::real("this", frame.this_object()?.to_json(), None, false, None, ctx.clone());

        Ok(Self {
            kind: FrameKind::Real,
            id: Some(id),
            function_name: frame.function_name()?.to_string(),
            location: Some(SourceLocation::from_view(&frame.location()?)?),
            scopes,
            this: Some(this),
            exception: None,
        })
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Backend id; `None` for the synthetic exception frame
    pub fn id(&self) -> Option<&CallFrameId> {
        self.id.as_ref()
    }

    /// Function name; empty for anonymous functions
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn this_variable(&self) -> Option<&Arc<Variable>> {
        self.this.as_ref()
    }

    /// Top-level variables shown for the frame
    ///
    /// One wrapper per scope for real frames; the exception holder alone for
    /// the synthetic frame.
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        match &self.exception {
            Some(holder) => vec![Arc::clone(holder)],
            None => self.scopes.iter().map(|scope| Arc::clone(&scope.variable)).collect(),
        }
    }
}

/// Snapshot of a paused debuggee
#[derive(Debug)]
pub struct Suspension {
    ctx: EvalContext,
    reason: PausedReason,
    frames: Vec<Arc<CallFrame>>,
    exception: Option<Arc<Value>>,
    hit_breakpoints: Vec<BreakpointId>,
    paused_at: DateTime<Utc>,
}

impl Suspension {
    /// Build from a `Debugger.paused` payload under a fresh handle group
    pub fn from_paused(data: &PausedEventData<'_>, client: ProtocolClient, page_size: usize) -> Result<Self> {
        let reason = match data.reason() {
            Ok(reason) => reason,
            Err(e) if e.is_unknown_enum() => {
                warn!("Unknown pause reason, treating as other: {}", e);
                PausedReason::Other
            }
            Err(e) => return Err(e.into()),
        };

        let call_frames = data.call_frames()?;
        let top_frame = match call_frames.get(0) {
            Some(frame) => Some(frame?.call_frame_id()?),
            None => None,
        };
        let ctx = EvalContext {
            client,
            group: HandleGroup::new("pause"),
            top_frame,
            page_size,
        };

        let exception = match (reason, data.data()?) {
            (PausedReason::Exception | PausedReason::PromiseRejection, Some(thrown)) => {
                Some(Value::exception(Value::from_remote(&thrown, &ctx, None)?))
            }
            _ => None,
        };

        let mut frames = Vec::with_capacity(call_frames.len() + 1);
        if let Some(exception) = &exception {
            frames.push(Arc::new(CallFrame::exception_frame(Arc::clone(exception), &ctx)));
        }
        for frame in call_frames.iter() {
            frames.push(Arc::new(CallFrame::from_view(&frame?, &ctx)?));
        }

        let hit_breakpoints = match data.hit_breakpoints()? {
            Some(hit) => hit
                .iter()
                .map(|id| id.map(BreakpointId::new))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        debug!(
            "Suspended ({}) with {} frames in group {}",
            reason,
            frames.len(),
            ctx.group.name()
        );

        Ok(Self {
            ctx,
            reason,
            frames,
            exception,
            hit_breakpoints,
            paused_at: Utc::now(),
        })
    }

    pub fn reason(&self) -> PausedReason {
        self.reason
    }

    /// Every frame, the synthetic exception frame first when present
    pub fn frames(&self) -> &[Arc<CallFrame>] {
        &self.frames
    }

    /// Frames backed by the debuggee's stack
    pub fn real_frames(&self) -> impl Iterator<Item = &Arc<CallFrame>> {
        self.frames.iter().filter(|frame| frame.kind() == FrameKind::Real)
    }

    /// Real frame `index`, counting from the innermost
    pub fn frame(&self, index: usize) -> Result<&Arc<CallFrame>> {
        self.real_frames()
            .nth(index)
            .ok_or_else(|| Error::invalid_argument(format!("no call frame {}", index)))
    }

    pub fn top_frame(&self) -> Option<&Arc<CallFrame>> {
        self.real_frames().next()
    }

    /// Thrown value of an exception pause
    pub fn exception(&self) -> Option<&Arc<Value>> {
        self.exception.as_ref()
    }

    pub fn hit_breakpoints(&self) -> &[BreakpointId] {
        &self.hit_breakpoints
    }

    pub fn paused_at(&self) -> DateTime<Utc> {
        self.paused_at
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// Object group of this pause
    pub fn group(&self) -> &Arc<HandleGroup> {
        &self.ctx.group
    }

    pub fn is_valid(&self) -> bool {
        self.ctx.group.is_valid()
    }

    /// End the pause; returns true on the first call
    pub fn invalidate(&self) -> bool {
        self.ctx.group.invalidate()
    }
}
