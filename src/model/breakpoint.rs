//! Breakpoint manager
//!
//! The client-side set is authoritative: every breakpoint has a local `uid`
//! that survives navigation, while the server id it is bound to changes each
//! time the breakpoint is (re)submitted. Each submission carries a
//! generation number; a reply for a stale generation is an orphan and its
//! server breakpoint is removed again.

use super::script::SourceLocation;
use crate::protocol::codec::Reply;
use crate::protocol::domains::debugger::{
    BreakpointResolvedEventData, LocationParam, RemoveBreakpointParams, SetBreakpointByUrlParams,
    SetBreakpointParams,
};
use crate::protocol::ids::{BreakpointId, ScriptId};
use crate::session::events::{DebugEvent, EventDispatcher};
use crate::wip::client::ProtocolClient;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Where a breakpoint should stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointTarget {
    /// Every script loaded from `url`; survives reloads
    Url {
        url: String,
        line: i64,
        column: Option<i64>,
    },
    /// One concrete script; dropped when the script is collected
    Script {
        script_id: ScriptId,
        line: i64,
        column: Option<i64>,
    },
}

impl BreakpointTarget {
    pub fn url<S: Into<String>>(url: S, line: i64) -> Self {
        BreakpointTarget::Url {
            url: url.into(),
            line,
            column: None,
        }
    }

    pub fn script(script_id: ScriptId, line: i64) -> Self {
        BreakpointTarget::Script {
            script_id,
            line,
            column: None,
        }
    }

    pub fn with_column(self, column: i64) -> Self {
        match self {
            BreakpointTarget::Url { url, line, .. } => BreakpointTarget::Url {
                url,
                line,
                column: Some(column),
            },
            BreakpointTarget::Script { script_id, line, .. } => BreakpointTarget::Script {
                script_id,
                line,
                column: Some(column),
            },
        }
    }

    /// Whether the target outlives a navigation
    pub fn survives_navigation(&self) -> bool {
        matches!(self, BreakpointTarget::Url { .. })
    }
}

/// Server side of a breakpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub server_id: BreakpointId,
    pub locations: Vec<SourceLocation>,
}

/// Snapshot of one user breakpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub uid: u64,
    pub target: BreakpointTarget,
    pub condition: Option<String>,
    pub enabled: bool,
    /// Hits still to be skipped
    pub ignore_count: u32,
    pub binding: Option<Binding>,
}

impl Breakpoint {
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

#[derive(Debug)]
struct Entry {
    breakpoint: Breakpoint,
    generation: u64,
}

#[derive(Debug, Default)]
struct BreakpointTable {
    next_uid: u64,
    entries: BTreeMap<u64, Entry>,
}

impl BreakpointTable {
    fn entry_mut(&mut self, uid: u64) -> Result<&mut Entry> {
        self.entries
            .get_mut(&uid)
            .ok_or_else(|| Error::invalid_argument(format!("no breakpoint with uid {}", uid)))
    }

    fn find_by_server_id(&mut self, server_id: &BreakpointId) -> Option<&mut Entry> {
        self.entries.values_mut().find(|entry| {
            entry
                .breakpoint
                .binding
                .as_ref()
                .is_some_and(|binding| &binding.server_id == server_id)
        })
    }
}

/// Submission waiting to be written
struct Submission {
    uid: u64,
    generation: u64,
    target: BreakpointTarget,
    condition: Option<String>,
}

#[derive(Debug)]
struct Inner {
    client: ProtocolClient,
    events: EventDispatcher,
    table: Mutex<BreakpointTable>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, BreakpointTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a reply; returns the resolved locations to announce
    fn bind(&self, uid: u64, generation: u64, binding: Binding) -> Option<Vec<SourceLocation>> {
        let mut table = self.lock();
        match table.entries.get_mut(&uid) {
            Some(entry) if entry.generation == generation => {
                let locations = binding.locations.clone();
                entry.breakpoint.binding = Some(binding);
                Some(locations)
            }
            _ => None,
        }
    }

    fn on_bound(self: &Arc<Self>, uid: u64, generation: u64, binding: Binding) {
        let server_id = binding.server_id.clone();
        match self.bind(uid, generation, binding) {
            Some(locations) => {
                debug!("Breakpoint {} bound to {}", uid, server_id);
                for location in locations {
                    self.events.dispatch(DebugEvent::BreakpointResolved { uid, location });
                }
            }
            None => {
                debug!("Removing orphaned server breakpoint {}", server_id);
                self.unset(server_id);
            }
        }
    }

    fn unset(&self, server_id: BreakpointId) {
        if let Err(e) = self.client.send_detached(RemoveBreakpointParams::new(server_id)) {
            debug!("Could not remove server breakpoint: {}", e);
        }
    }

    /// Settle a submission's reply
    ///
    /// Only `SessionClosed` reaches the waiter; any other failure leaves the
    /// breakpoint recorded but unbound.
    fn settle(self: &Arc<Self>, uid: u64, generation: u64, binding: Result<Binding>) -> Result<()> {
        match binding {
            Ok(binding) => {
                self.on_bound(uid, generation, binding);
                Ok(())
            }
            Err(Error::SessionClosed) => {
                debug!("Breakpoint {} lost with the session", uid);
                Err(Error::SessionClosed)
            }
            Err(e) => {
                warn!("Breakpoint {} was not set: {}", uid, e);
                Ok(())
            }
        }
    }

    /// Write one submission; the receiver fires once the reply is processed
    fn submit(self: &Arc<Self>, submission: Submission) -> Result<oneshot::Receiver<Result<()>>> {
        let (done_tx, done_rx) = oneshot::channel();
        let Submission {
            uid,
            generation,
            target,
            condition,
        } = submission;

        match target {
            BreakpointTarget::Url { url, line, column } => {
                let mut params = SetBreakpointByUrlParams::new(line).with_url(url);
                if let Some(column) = column {
                    params = params.with_column_number(column);
                }
                if let Some(condition) = condition {
                    params = params.with_condition(condition);
                }
                let inner = Arc::clone(self);
                self.client.send_command(
                    params,
                    move |outcome: Result<Reply<SetBreakpointByUrlParams>>| {
                        let binding = outcome.and_then(|reply| {
                            let data = reply.data()?;
                            let locations = data
                                .locations()?
                                .iter()
                                .map(|location| SourceLocation::from_view(&location?))
                                .collect::<Result<Vec<_>>>()?;
                            Ok(Binding {
                                server_id: data.breakpoint_id()?,
                                locations,
                            })
                        });
                        let _ = done_tx.send(inner.settle(uid, generation, binding));
                    },
                    None,
                )?;
            }
            BreakpointTarget::Script {
                script_id,
                line,
                column,
            } => {
                let mut location = LocationParam::new(script_id, line);
                if let Some(column) = column {
                    location = location.with_column_number(column);
                }
                let mut params = SetBreakpointParams::new(location);
                if let Some(condition) = condition {
                    params = params.with_condition(condition);
                }
                let inner = Arc::clone(self);
                self.client.send_command(
                    params,
                    move |outcome: Result<Reply<SetBreakpointParams>>| {
                        let binding = outcome.and_then(|reply| {
                            let data = reply.data()?;
                            Ok(Binding {
                                server_id: data.breakpoint_id()?,
                                locations: vec![SourceLocation::from_view(&data.actual_location()?)?],
                            })
                        });
                        let _ = done_tx.send(inner.settle(uid, generation, binding));
                    },
                    None,
                )?;
            }
        }

        Ok(done_rx)
    }
}

/// Client-side breakpoint set
#[derive(Debug, Clone)]
pub struct BreakpointManager {
    inner: Arc<Inner>,
}

impl BreakpointManager {
    pub fn new(client: ProtocolClient, events: EventDispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                events,
                table: Mutex::new(BreakpointTable {
                    next_uid: 1,
                    entries: BTreeMap::new(),
                }),
            }),
        }
    }

    async fn wait(done: oneshot::Receiver<Result<()>>) -> Result<()> {
        // The callback runs exactly once, even on close
        done.await.map_err(|_| Error::SessionClosed)?
    }

    /// Add a breakpoint and wait until the backend has answered
    ///
    /// A protocol failure leaves the breakpoint recorded but unbound. Losing
    /// the transport before the reply fails with `SessionClosed` and forgets
    /// the breakpoint.
    pub async fn add(&self, target: BreakpointTarget, condition: Option<String>) -> Result<Breakpoint> {
        let uid = {
            let mut table = self.inner.lock();
            let uid = table.next_uid;
            table.next_uid += 1;
            table.entries.insert(
                uid,
                Entry {
                    breakpoint: Breakpoint {
                        uid,
                        target: target.clone(),
                        condition: condition.clone(),
                        enabled: true,
                        ignore_count: 0,
                        binding: None,
                    },
                    generation: 0,
                },
            );
            uid
        };
        info!("Adding breakpoint {} at {:?}", uid, target);

        let submitted = self.inner.submit(Submission {
            uid,
            generation: 0,
            target,
            condition,
        });
        let done = match submitted {
            Ok(done) => done,
            Err(e) => {
                self.inner.lock().entries.remove(&uid);
                return Err(e);
            }
        };
        if let Err(e) = Self::wait(done).await {
            self.inner.lock().entries.remove(&uid);
            return Err(e);
        }
        self.get(uid)
    }

    /// Retire `uid`, unsetting its server breakpoint
    pub async fn remove(&self, uid: u64) -> Result<()> {
        let entry = self
            .inner
            .lock()
            .entries
            .remove(&uid)
            .ok_or_else(|| Error::invalid_argument(format!("no breakpoint with uid {}", uid)))?;
        info!("Removing breakpoint {}", uid);

        // An unanswered submission is cleaned up when its reply arrives
        if let Some(binding) = entry.breakpoint.binding {
            self.inner
                .client
                .call(RemoveBreakpointParams::new(binding.server_id))
                .await?;
        }
        Ok(())
    }

    /// Enable or disable; disabling unsets the server breakpoint
    pub async fn set_enabled(&self, uid: u64, enabled: bool) -> Result<Breakpoint> {
        let (stale, submission) = {
            let mut table = self.inner.lock();
            let entry = table.entry_mut(uid)?;
            if entry.breakpoint.enabled == enabled {
                return Ok(entry.breakpoint.clone());
            }
            entry.breakpoint.enabled = enabled;
            entry.generation += 1;
            let stale = entry.breakpoint.binding.take();
            let submission = enabled.then(|| Submission {
                uid,
                generation: entry.generation,
                target: entry.breakpoint.target.clone(),
                condition: entry.breakpoint.condition.clone(),
            });
            (stale, submission)
        };

        self.resubmit(stale, submission).await?;
        self.get(uid)
    }

    /// Replace the condition, rebinding an enabled breakpoint
    pub async fn set_condition(&self, uid: u64, condition: Option<String>) -> Result<Breakpoint> {
        let (stale, submission) = {
            let mut table = self.inner.lock();
            let entry = table.entry_mut(uid)?;
            entry.breakpoint.condition = condition;
            if !entry.breakpoint.enabled {
                return Ok(entry.breakpoint.clone());
            }
            entry.generation += 1;
            let stale = entry.breakpoint.binding.take();
            let submission = Submission {
                uid,
                generation: entry.generation,
                target: entry.breakpoint.target.clone(),
                condition: entry.breakpoint.condition.clone(),
            };
            (stale, Some(submission))
        };

        self.resubmit(stale, submission).await?;
        self.get(uid)
    }

    /// Unset the stale binding, then submit; fails with `SessionClosed` if
    /// the transport goes away before the reply
    async fn resubmit(&self, stale: Option<Binding>, submission: Option<Submission>) -> Result<()> {
        if let Some(binding) = stale {
            self.inner
                .client
                .call(RemoveBreakpointParams::new(binding.server_id))
                .await?;
        }
        if let Some(submission) = submission {
            let done = self.inner.submit(submission)?;
            Self::wait(done).await?;
        }
        Ok(())
    }

    /// Skip the next `count` hits
    pub fn set_ignore_count(&self, uid: u64, count: u32) -> Result<()> {
        self.inner.lock().entry_mut(uid)?.breakpoint.ignore_count = count;
        Ok(())
    }

    pub fn get(&self, uid: u64) -> Result<Breakpoint> {
        self.inner
            .lock()
            .entries
            .get(&uid)
            .map(|entry| entry.breakpoint.clone())
            .ok_or_else(|| Error::invalid_argument(format!("no breakpoint with uid {}", uid)))
    }

    /// All breakpoints in uid order
    pub fn list(&self) -> Vec<Breakpoint> {
        self.inner
            .lock()
            .entries
            .values()
            .map(|entry| entry.breakpoint.clone())
            .collect()
    }

    /// Handle `Debugger.breakpointResolved`
    pub fn on_breakpoint_resolved(&self, data: &BreakpointResolvedEventData<'_>) -> Result<()> {
        let server_id = data.breakpoint_id()?;
        let location = SourceLocation::from_view(&data.location()?)?;

        let uid = {
            let mut table = self.inner.lock();
            match table.find_by_server_id(&server_id) {
                Some(entry) => {
                    let binding = entry.breakpoint.binding.as_mut();
                    if let Some(binding) = binding {
                        binding.locations.push(location.clone());
                    }
                    entry.breakpoint.uid
                }
                None => {
                    debug!("Resolution for unknown server breakpoint {}", server_id);
                    return Ok(());
                }
            }
        };

        debug!("Breakpoint {} resolved at {}", uid, location);
        self.inner
            .events
            .dispatch(DebugEvent::BreakpointResolved { uid, location });
        Ok(())
    }

    /// Re-submit after navigation; every server id is void
    ///
    /// Runs on the dispatcher, so it only writes and never waits.
    pub fn rebind_all(&self) {
        let submissions: Vec<_> = {
            let mut table = self.inner.lock();
            table
                .entries
                .values_mut()
                .filter_map(|entry| {
                    entry.generation += 1;
                    entry.breakpoint.binding = None;
                    if !entry.breakpoint.enabled || !entry.breakpoint.target.survives_navigation() {
                        return None;
                    }
                    Some(Submission {
                        uid: entry.breakpoint.uid,
                        generation: entry.generation,
                        target: entry.breakpoint.target.clone(),
                        condition: entry.breakpoint.condition.clone(),
                    })
                })
                .collect()
        };

        info!("Re-submitting {} breakpoints", submissions.len());
        for submission in submissions {
            let uid = submission.uid;
            if let Err(e) = self.inner.submit(submission) {
                warn!("Failed to re-submit breakpoint {}: {}", uid, e);
            }
        }
    }

    /// Unbind breakpoints pinned to scripts that were just collected
    ///
    /// Url targets keep their bindings; the backend re-resolves those itself.
    pub fn on_scripts_collected(&self) {
        let mut table = self.inner.lock();
        for entry in table.entries.values_mut() {
            if entry.breakpoint.target.survives_navigation() {
                continue;
            }
            entry.generation += 1;
            if entry.breakpoint.binding.take().is_some() {
                debug!("Breakpoint {} lost its script", entry.breakpoint.uid);
            }
        }
    }

    /// Drop every binding after transport loss
    pub fn on_transport_closed(&self) {
        let mut table = self.inner.lock();
        for entry in table.entries.values_mut() {
            entry.generation += 1;
            entry.breakpoint.binding = None;
        }
    }

    /// Consume ignore counts for a pause caused by `hit`
    ///
    /// Returns true when every breakpoint hit still had hits to skip, in which
    /// case the pause should not be surfaced.
    pub fn should_auto_resume(&self, hit: &[BreakpointId]) -> bool {
        if hit.is_empty() {
            return false;
        }

        let mut table = self.inner.lock();
        let mut skip = true;
        for server_id in hit {
            match table.find_by_server_id(server_id) {
                Some(entry) if entry.breakpoint.ignore_count > 0 => {
                    entry.breakpoint.ignore_count -= 1;
                    debug!(
                        "Ignoring hit of breakpoint {}, {} left",
                        entry.breakpoint.uid, entry.breakpoint.ignore_count
                    );
                }
                _ => skip = false,
            }
        }
        skip
    }
}
