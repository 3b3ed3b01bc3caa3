//! Debug session controller
//!
//! Owns the handshake and routes backend events into the script registry,
//! breakpoint manager, frame manager and suspension model.

use super::events::{DebugEvent, DebugEventKind, EventDispatcher, FilteredReceiver};
use super::state::SessionState;
use crate::config::Config;
use crate::mirror::properties::EvalContext;
use crate::mirror::value::Value;
use crate::model::breakpoint::{Breakpoint, BreakpointManager, BreakpointTarget};
use crate::model::frame::FrameManager;
use crate::model::handle::HandleGroup;
use crate::model::script::{Script, ScriptRegistry};
use crate::model::suspension::Suspension;
use crate::protocol::codec::{ProtocolCommand, Reply};
use crate::protocol::domains::debugger::{
    self, BreakpointResolvedEventData, EvaluateOnCallFrameParams, PauseOnExceptionsState,
    PauseParams, PausedEventData, ResumeParams, ScopeType, ScriptParsedEventData,
    SetBreakpointsActiveParams, SetPauseOnExceptionsParams, StepIntoParams, StepOutParams,
    StepOverParams,
};
use crate::protocol::domains::dom::GetDocumentParams;
use crate::protocol::domains::page::{self, FrameNavigatedEventData, GetResourceTreeParams, ReloadParams};
use crate::protocol::domains::runtime::{EvaluateData, EvaluateParams, ReleaseObjectGroupParams};
use crate::protocol::ids::ScriptId;
use crate::protocol::profile::BackendProfile;
use crate::wip::client::ProtocolClient;
use crate::wip::processor::CommandProcessor;
use crate::wip::traits::Transport;
use crate::{Error, Result};
use serde_json::Value as Json;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of an evaluation
#[derive(Debug, Clone)]
pub struct EvaluateResult {
    /// The result; a `Value::Exception` when the expression threw
    pub value: Arc<Value>,
    pub was_thrown: bool,
}

/// One debugger connection to one tab
#[derive(Debug)]
pub struct DebugSession {
    client: ProtocolClient,
    config: Config,
    state: RwLock<SessionState>,
    events: EventDispatcher,
    scripts: ScriptRegistry,
    breakpoints: BreakpointManager,
    frames: FrameManager,
    suspension: RwLock<Option<Arc<Suspension>>>,
    /// Group for evaluations outside any pause; lives as long as the session
    console_group: Arc<HandleGroup>,
    close_watcher: Mutex<Option<JoinHandle<()>>>,
}

impl DebugSession {
    /// Run the handshake over `transport` and return a running session
    pub async fn connect(
        transport: Arc<dyn Transport>,
        profile: BackendProfile,
        config: Config,
    ) -> Result<Arc<Self>> {
        info!("Connecting debug session with {} profile", profile);

        let client = ProtocolClient::new(CommandProcessor::start(transport), profile);
        let events = EventDispatcher::new(config.event_capacity);
        let session = Arc::new(Self {
            breakpoints: BreakpointManager::new(client.clone(), events.clone()),
            client,
            config,
            state: RwLock::new(SessionState::Disconnected),
            events,
            scripts: ScriptRegistry::new(),
            frames: FrameManager::new(),
            suspension: RwLock::new(None),
            console_group: HandleGroup::new("console"),
            close_watcher: Mutex::new(None),
        });

        session.transition(SessionState::Connecting);
        session.register_handlers();
        session.spawn_close_watcher();

        if let Err(e) = session.handshake().await {
            error!("Handshake failed: {}", e);
            let _ = session.client.processor().shutdown().await;
            session.on_transport_closed();
            return Err(e);
        }

        // A pause may already have arrived during the handshake
        if session.state() == SessionState::Connecting {
            session.transition(SessionState::Running);
        }
        info!("Debug session ready, {} scripts loaded", session.scripts.len());
        Ok(session)
    }

    async fn handshake(&self) -> Result<()> {
        for method in self.client.profile().handshake_commands() {
            debug!("Handshake: {}", method);
            self.client.call_raw(method, None).await?;
        }

        let reply = self.client.call(GetResourceTreeParams).await?;
        self.frames.apply_resource_tree(&reply.data()?)?;
        Ok(())
    }

    fn register_handlers(self: &Arc<Self>) {
        self.route(debugger::events::SCRIPT_PARSED, |session, params| {
            session.on_script_parsed(params, false)
        });
        self.route(debugger::events::SCRIPT_FAILED_TO_PARSE, |session, params| {
            session.on_script_parsed(params, true)
        });
        self.route(debugger::events::GLOBAL_OBJECT_CLEARED, |session, _| {
            session.breakpoints.on_scripts_collected();
            session.collect_scripts();
            Ok(())
        });
        self.route(debugger::events::PAUSED, Self::on_paused);
        self.route(debugger::events::RESUMED, |session, _| {
            session.end_suspension(true);
            Ok(())
        });
        self.route(debugger::events::BREAKPOINT_RESOLVED, |session, params| {
            session
                .breakpoints
                .on_breakpoint_resolved(&BreakpointResolvedEventData::parse(params)?)
        });
        self.route(page::events::FRAME_NAVIGATED, Self::on_frame_navigated);
    }

    /// Register `handler` for `method` without keeping the session alive
    fn route<F>(self: &Arc<Self>, method: &'static str, handler: F)
    where
        F: Fn(&Arc<Self>, &Json) -> Result<()> + Send + Sync + 'static,
    {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.client.on_event(method, move |params| {
            if let Some(session) = weak.upgrade() {
                if let Err(e) = handler(&session, params) {
                    warn!("Failed to handle {}: {}", method, e);
                }
            }
        });
    }

    /// Watch for transport loss; holds neither the session nor the processor
    fn spawn_close_watcher(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut closed = self.client.processor().subscribe_closed();
        let watcher = tokio::spawn(async move {
            // Errs once the processor is dropped with the session
            if closed.wait_for(|closed| *closed).await.is_err() {
                return;
            }
            if let Some(session) = weak.upgrade() {
                session.on_transport_closed();
            }
        });
        *self.close_watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);
    }

    fn transition(&self, to: SessionState) -> bool {
        let from = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let from = *state;
            if !from.can_transition_to(to) {
                debug!("Ignoring state change {} -> {}", from, to);
                return false;
            }
            *state = to;
            from
        };
        info!("Session state: {} -> {}", from, to);
        self.events.dispatch(DebugEvent::StateChanged { from, to });
        true
    }

    fn on_script_parsed(&self, params: &Json, failed_to_parse: bool) -> Result<()> {
        let script = self
            .scripts
            .on_script_parsed(&ScriptParsedEventData::parse(params)?, failed_to_parse)?;
        self.events.dispatch(DebugEvent::ScriptParsed(script));
        Ok(())
    }

    fn collect_scripts(&self) {
        for script in self.scripts.collect_all() {
            self.events.dispatch(DebugEvent::ScriptCollected(script));
        }
    }

    fn on_paused(self: &Arc<Self>, params: &Json) -> Result<()> {
        if !self.state().is_live() {
            debug!("Ignoring pause in state {}", self.state());
            return Ok(());
        }

        let data = PausedEventData::parse(params)?;
        let suspension = Arc::new(Suspension::from_paused(
            &data,
            self.client.clone(),
            self.config.array_page_size,
        )?);

        if self.breakpoints.should_auto_resume(suspension.hit_breakpoints()) {
            debug!("Skipping pause on ignored breakpoint");
            self.release(&suspension);
            self.client.send_detached(ResumeParams)?;
            return Ok(());
        }

        // Two pauses without a resume in between: the first is over
        let previous = self
            .suspension
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::clone(&suspension));
        if let Some(previous) = previous {
            self.release(&previous);
        }

        self.transition(SessionState::Suspended);
        info!(
            "Suspended: {} at {:?}",
            suspension.reason(),
            suspension.top_frame().and_then(|frame| frame.location().map(ToString::to_string))
        );
        self.events.dispatch(DebugEvent::Suspended(Arc::clone(&suspension)));

        if self.config.prefetch_top_frame {
            Self::prefetch_top_frame(&suspension);
        }
        Ok(())
    }

    /// Load the innermost frame's local bindings ahead of the UI
    fn prefetch_top_frame(suspension: &Arc<Suspension>) {
        let Some(frame) = suspension.top_frame().cloned() else {
            return;
        };
        tokio::spawn(async move {
            for scope in frame.scopes().iter().filter(|scope| scope.scope_type() != ScopeType::Global) {
                if let Err(e) = scope.variables().await {
                    debug!("Prefetch of <{}> scope stopped: {}", scope.scope_type(), e);
                    break;
                }
            }
        });
    }

    /// Invalidate a pause's handles and release its group on the backend
    fn release(&self, suspension: &Suspension) {
        if suspension.invalidate() && !self.client.is_closed() {
            if let Err(e) = self
                .client
                .send_detached(ReleaseObjectGroupParams::new(suspension.group().name()))
            {
                debug!("Could not release object group: {}", e);
            }
        }
    }

    fn end_suspension(&self, announce: bool) {
        let suspension = self
            .suspension
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(suspension) = suspension else {
            return;
        };

        self.release(&suspension);
        if announce && self.transition(SessionState::Running) {
            self.events.dispatch(DebugEvent::Resumed);
        }
    }

    fn on_frame_navigated(self: &Arc<Self>, params: &Json) -> Result<()> {
        let Some(url) = self
            .frames
            .on_frame_navigated(&FrameNavigatedEventData::parse(params)?)?
        else {
            return Ok(());
        };

        self.collect_scripts();
        self.breakpoints.rebind_all();
        self.events.dispatch(DebugEvent::Navigated { url });
        Ok(())
    }

    fn on_transport_closed(&self) {
        let was = self.state();
        // Only the first of the watcher and `disconnect` gets past this
        if !self.transition(SessionState::Disconnected) {
            return;
        }
        if was != SessionState::Closing {
            error!("Transport lost in state {}", was);
        }

        if let Some(suspension) = self
            .suspension
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            suspension.invalidate();
        }
        self.console_group.invalidate();
        self.breakpoints.on_transport_closed();
        self.collect_scripts();
        self.events.dispatch(DebugEvent::Closed);
    }

    fn require_live(&self) -> Result<()> {
        let state = self.state();
        match state {
            SessionState::Closing | SessionState::Disconnected => Err(Error::SessionClosed),
            _ => Ok(()),
        }
    }

    fn require_suspended(&self) -> Result<Arc<Suspension>> {
        self.require_live()?;
        self.suspension()
            .ok_or_else(|| Error::session_busy(format!("debuggee is not suspended ({})", self.state())))
    }

    async fn step<C: ProtocolCommand>(&self, command: C) -> Result<()> {
        self.require_suspended()?;
        info!("{}", C::METHOD);
        self.client.call(command).await?;
        Ok(())
    }

    /// Close the transport; pending work fails with `SessionClosed`
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        if !self.transition(SessionState::Closing) {
            return Ok(());
        }
        self.client.processor().shutdown().await?;
        self.on_transport_closed();
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn profile(&self) -> BackendProfile {
        self.client.profile()
    }

    pub fn client(&self) -> &ProtocolClient {
        &self.client
    }

    /// URL of the top frame
    pub fn url(&self) -> Option<String> {
        self.frames.url()
    }

    /// Live scripts in load order
    pub fn list_scripts(&self) -> Vec<Arc<Script>> {
        self.scripts.list()
    }

    pub fn script(&self, id: &ScriptId) -> Option<Arc<Script>> {
        self.scripts.get(id)
    }

    /// Source text of a script, fetched once
    #[instrument(skip(self))]
    pub async fn get_source(&self, id: &ScriptId) -> Result<Arc<str>> {
        self.require_live()?;
        self.scripts.source(&self.client, id).await
    }

    #[instrument(skip(self))]
    pub async fn add_breakpoint(&self, target: BreakpointTarget, condition: Option<String>) -> Result<Breakpoint> {
        self.require_live()?;
        self.breakpoints.add(target, condition).await
    }

    #[instrument(skip(self))]
    pub async fn remove_breakpoint(&self, uid: u64) -> Result<()> {
        self.require_live()?;
        self.breakpoints.remove(uid).await
    }

    pub fn list_breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.list()
    }

    #[instrument(skip(self))]
    pub async fn set_breakpoint_enabled(&self, uid: u64, enabled: bool) -> Result<Breakpoint> {
        self.require_live()?;
        self.breakpoints.set_enabled(uid, enabled).await
    }

    #[instrument(skip(self))]
    pub async fn set_breakpoint_condition(&self, uid: u64, condition: Option<String>) -> Result<Breakpoint> {
        self.require_live()?;
        self.breakpoints.set_condition(uid, condition).await
    }

    pub fn set_breakpoint_ignore_count(&self, uid: u64, count: u32) -> Result<()> {
        self.breakpoints.set_ignore_count(uid, count)
    }

    /// Request a pause at the next statement
    #[instrument(skip(self))]
    pub async fn suspend(&self) -> Result<()> {
        self.require_live()?;
        if self.state() == SessionState::Suspended {
            return Err(Error::session_busy("debuggee is already suspended"));
        }
        self.client.call(PauseParams).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<()> {
        self.step(ResumeParams).await
    }

    #[instrument(skip(self))]
    pub async fn step_over(&self) -> Result<()> {
        self.step(StepOverParams).await
    }

    #[instrument(skip(self))]
    pub async fn step_into(&self) -> Result<()> {
        self.step(StepIntoParams).await
    }

    #[instrument(skip(self))]
    pub async fn step_out(&self) -> Result<()> {
        self.step(StepOutParams).await
    }

    #[instrument(skip(self))]
    pub async fn set_pause_on_exceptions(&self, state: PauseOnExceptionsState) -> Result<()> {
        self.require_live()?;
        self.client.call(SetPauseOnExceptionsParams { state }).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_breakpoints_active(&self, active: bool) -> Result<()> {
        self.require_live()?;
        self.client.call(SetBreakpointsActiveParams { active }).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn reload_page(&self, ignore_cache: bool) -> Result<()> {
        self.require_live()?;
        self.client
            .call(ReloadParams {
                ignore_cache: Some(ignore_cache),
            })
            .await?;
        Ok(())
    }

    /// Evaluate `expression` on real call frame `frame_index`, or globally
    ///
    /// Frame results belong to the current pause; global results live until
    /// the session closes.
    #[instrument(skip(self))]
    pub async fn evaluate(&self, expression: &str, frame_index: Option<usize>) -> Result<EvaluateResult> {
        self.require_live()?;
        let qualified_name = Some(format!("({})", expression));

        let (json, ctx) = match frame_index {
            Some(index) => {
                let suspension = self.require_suspended()?;
                let frame_id = suspension
                    .frame(index)?
                    .id()
                    .cloned()
                    .ok_or_else(|| Error::invalid_argument(format!("call frame {} has no id", index)))?;
                let reply = self
                    .client
                    .call(
                        EvaluateOnCallFrameParams::new(frame_id, expression)
                            .with_object_group(suspension.group().name()),
                    )
                    .await?;
                // Resumed while the request was in flight
                suspension.group().check()?;
                (reply.into_json(), suspension.context().clone())
            }
            None => {
                let reply = self
                    .client
                    .call(EvaluateParams::new(expression).with_object_group(self.console_group.name()))
                    .await?;
                let ctx = EvalContext {
                    client: self.client.clone(),
                    group: Arc::clone(&self.console_group),
                    top_frame: None,
                    page_size: self.config.array_page_size,
                };
                (reply.into_json(), ctx)
            }
        };

        // Both commands reply with `{ result, wasThrown }`
        let data = EvaluateData::parse(&json)?;
        let value = Value::from_remote(&data.result()?, &ctx, qualified_name)?;
        let was_thrown = data.was_thrown()?.unwrap_or(false);
        debug!("Evaluated {:?}, thrown: {}", expression, was_thrown);

        Ok(EvaluateResult {
            value: if was_thrown { Value::exception(value) } else { value },
            was_thrown,
        })
    }

    /// Current pause, if suspended
    pub fn suspension(&self) -> Option<Arc<Suspension>> {
        self.suspension
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The page's DOM tree; read it with `reply.data()?.root()?`
    #[instrument(skip(self))]
    pub async fn document(&self) -> Result<Reply<GetDocumentParams>> {
        self.require_live()?;
        self.client.call(GetDocumentParams).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DebugEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_filtered(&self, kinds: Vec<DebugEventKind>) -> FilteredReceiver {
        self.events.subscribe_filtered(kinds)
    }

    /// Event stream; lagged gaps are skipped
    pub fn events(&self) -> impl Stream<Item = DebugEvent> + Send + 'static {
        self.events.stream()
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        let watcher = self.close_watcher.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(watcher) = watcher.take() {
            watcher.abort();
        }
        if !self.client.is_closed() {
            debug!("Debug session dropped without disconnect");
        }
    }
}
