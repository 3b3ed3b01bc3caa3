//! Command processor
//!
//! Multiplexes request/response traffic and unsolicited events over one
//! [`Transport`]. Three tasks cooperate: a reader that feeds incoming frames
//! to a single dispatcher, the dispatcher that runs callbacks and event
//! handlers in arrival order, and a writer that puts outgoing frames on the
//! wire in call order.
//!
//! Callbacks run on the dispatcher. They may call [`CommandProcessor::send`]
//! but must not await a reply, since that reply can only be delivered by the
//! dispatcher they are blocking.

use super::traits::{EventHandler, ResponseCallback, SyncCallback, Transport};
use super::types::{WipMessage, WipNotification, WipRequest, WipRpcResponse};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Callbacks of a command awaiting its reply
struct PendingCommand {
    /// Command method (for logging)
    method: String,
    callback: ResponseCallback,
    sync: Option<SyncCallback>,
}

/// Pending table; `seq` allocation and insertion share the lock so the
/// table's order is the write order
struct PendingTable {
    next_seq: u64,
    closed: bool,
    entries: BTreeMap<u64, PendingCommand>,
}

/// Work item for the dispatcher
#[derive(Debug)]
enum DispatchItem {
    Frame(String),
    WriteFailed { seq: u64, error: Error },
    Closed(String),
}

/// Frame queued for the writer
struct OutgoingFrame {
    seq: u64,
    text: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// WIP command processor
pub struct CommandProcessor {
    transport: Arc<dyn Transport>,
    pending: Mutex<PendingTable>,
    handlers: RwLock<HashMap<String, EventHandler>>,
    outgoing: mpsc::UnboundedSender<OutgoingFrame>,
    dispatch: mpsc::UnboundedSender<DispatchItem>,
    closed: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("transport", &self.transport)
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl CommandProcessor {
    /// Start processing traffic on `transport`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(transport: Arc<dyn Transport>) -> Arc<Self> {
        info!("Starting command processor on {:?}", transport);

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let (closed_tx, _) = watch::channel(false);

        let processor = Arc::new(Self {
            transport: Arc::clone(&transport),
            pending: Mutex::new(PendingTable {
                next_seq: 1,
                closed: false,
                entries: BTreeMap::new(),
            }),
            handlers: RwLock::new(HashMap::new()),
            outgoing: outgoing_tx,
            dispatch: dispatch_tx.clone(),
            closed: closed_tx,
            tasks: Mutex::new(Vec::new()),
        });

        let reader = tokio::spawn(Self::read_loop(Arc::clone(&transport), dispatch_tx.clone()));
        let writer = tokio::spawn(Self::write_loop(transport, outgoing_rx, dispatch_tx));
        let dispatcher = tokio::spawn(Self::dispatch_loop(Arc::downgrade(&processor), dispatch_rx));

        lock(&processor.tasks).extend([reader, writer, dispatcher]);

        processor
    }

    /// Send a command; returns its sequence number
    ///
    /// `callback` receives the `result` object or the failure, then `sync`
    /// fires. Both run exactly once unless this call itself fails, in which
    /// case neither runs.
    pub fn send(
        &self,
        method: &str,
        params: Option<Value>,
        callback: ResponseCallback,
        sync: Option<SyncCallback>,
    ) -> Result<u64> {
        let mut table = lock(&self.pending);
        if table.closed {
            return Err(Error::SessionClosed);
        }

        let seq = table.next_seq;
        let text = serde_json::to_string(&WipRequest {
            id: seq,
            method,
            params: params.as_ref(),
        })?;
        table.next_seq += 1;

        debug!("Sending command {}: {}", seq, method);

        table.entries.insert(
            seq,
            PendingCommand {
                method: method.to_string(),
                callback,
                sync,
            },
        );

        if self.outgoing.send(OutgoingFrame { seq, text }).is_err() {
            table.entries.remove(&seq);
            return Err(Error::SessionClosed);
        }

        Ok(seq)
    }

    /// Send a command and wait for its reply
    ///
    /// Must not be awaited from a callback or event handler.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let (sender, receiver) = oneshot::channel();
        self.send(
            method,
            params,
            Box::new(move |outcome| {
                let _ = sender.send(outcome);
            }),
            None,
        )?;

        receiver.await.map_err(|_| Error::SessionClosed)?
    }

    /// Register the handler for an event method, replacing any previous one
    pub fn on_event(&self, method: &str, handler: EventHandler) {
        debug!("Registering handler for {}", method);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_string(), handler);
    }

    /// Remove the handler for an event method
    pub fn remove_handler(&self, method: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(method)
            .is_some()
    }

    /// Decode one incoming frame and deliver it
    pub fn dispatch_incoming(&self, frame: &str) {
        debug!("Received frame: {}", frame);

        match WipMessage::parse(frame) {
            Ok(WipMessage::Response(response)) => self.complete(response),
            Ok(WipMessage::Notification(notification)) => self.dispatch_event(notification),
            Err(e) => warn!("Dropping malformed frame ({}): {}", e, frame),
        }
    }

    fn complete(&self, response: WipRpcResponse) {
        let entry = lock(&self.pending).entries.remove(&response.id);

        let Some(entry) = entry else {
            warn!("Received response for unknown command ID: {}", response.id);
            return;
        };

        let outcome = match response.error {
            Some(error) => {
                debug!(
                    "Command {} ({}) failed: {} ({})",
                    response.id, entry.method, error.message, error.code
                );
                Err(Error::protocol(error.code, error.message, error.data))
            }
            None => Ok(response
                .result
                .unwrap_or_else(|| Value::Object(Default::default()))),
        };

        (entry.callback)(outcome);
        if let Some(sync) = entry.sync {
            sync();
        }
    }

    fn dispatch_event(&self, notification: WipNotification) {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&notification.method)
            .cloned();

        match handler {
            Some(handler) => {
                let params = notification
                    .params
                    .unwrap_or_else(|| Value::Object(Default::default()));
                handler(&params);
            }
            None => warn!("Dropping unhandled event: {}", notification.method),
        }
    }

    fn fail_one(&self, seq: u64, error: Error) {
        let entry = lock(&self.pending).entries.remove(&seq);
        if let Some(entry) = entry {
            (entry.callback)(Err(error));
            if let Some(sync) = entry.sync {
                sync();
            }
        }
    }

    /// Fail every pending command with `SessionClosed`, in send order,
    /// then run every sync callback in the same order
    fn fan_out_close(&self, reason: &str) {
        let drained = {
            let mut table = lock(&self.pending);
            table.closed = true;
            std::mem::take(&mut table.entries)
        };

        info!(
            "Command processor closed ({}), failing {} pending commands",
            reason,
            drained.len()
        );

        let mut syncs = Vec::with_capacity(drained.len());
        for (seq, entry) in drained {
            debug!("Failing command {} ({}): session closed", seq, entry.method);
            (entry.callback)(Err(Error::SessionClosed));
            if let Some(sync) = entry.sync {
                syncs.push(sync);
            }
        }
        for sync in syncs {
            sync();
        }

        self.closed.send_replace(true);
    }

    /// Close the transport and wait until pending work has been failed
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down command processor");

        let result = self.transport.close().await;
        let _ = self
            .dispatch
            .send(DispatchItem::Closed("closed by client".to_string()));
        self.wait_closed().await;

        result
    }

    /// Resolves once the processor has closed
    pub async fn wait_closed(&self) {
        let mut receiver = self.closed.subscribe();
        let _ = receiver.wait_for(|closed| *closed).await;
    }

    /// Watch that turns `true` on close; its sender is dropped with the processor
    pub fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Check if the processor has closed
    pub fn is_closed(&self) -> bool {
        lock(&self.pending).closed
    }

    /// Number of commands awaiting a reply
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).entries.len()
    }

    async fn read_loop(transport: Arc<dyn Transport>, dispatch: mpsc::UnboundedSender<DispatchItem>) {
        debug!("Reader task started");
        loop {
            match transport.recv_frame().await {
                Some(Ok(frame)) => {
                    if dispatch.send(DispatchItem::Frame(frame)).is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!("Transport receive failed: {}", e);
                    let _ = dispatch.send(DispatchItem::Closed(e.to_string()));
                    break;
                }
                None => {
                    info!("Transport closed by peer");
                    let _ = dispatch.send(DispatchItem::Closed("transport closed".to_string()));
                    break;
                }
            }
        }
        debug!("Reader task exited");
    }

    async fn write_loop(
        transport: Arc<dyn Transport>,
        mut outgoing: mpsc::UnboundedReceiver<OutgoingFrame>,
        dispatch: mpsc::UnboundedSender<DispatchItem>,
    ) {
        while let Some(frame) = outgoing.recv().await {
            if let Err(e) = transport.send_frame(frame.text).await {
                error!("Failed to write command {}: {}", frame.seq, e);
                let _ = dispatch.send(DispatchItem::WriteFailed {
                    seq: frame.seq,
                    error: e,
                });
            }
        }
        debug!("Writer task exited");
    }

    async fn dispatch_loop(processor: Weak<Self>, mut items: mpsc::UnboundedReceiver<DispatchItem>) {
        while let Some(item) = items.recv().await {
            let Some(processor) = processor.upgrade() else {
                break;
            };
            match item {
                DispatchItem::Frame(frame) => processor.dispatch_incoming(&frame),
                DispatchItem::WriteFailed { seq, error } => processor.fail_one(seq, error),
                DispatchItem::Closed(reason) => {
                    processor.fan_out_close(&reason);
                    break;
                }
            }
        }
        debug!("Dispatcher task exited");
    }
}

impl Drop for CommandProcessor {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }

        // Best effort: only possible while a runtime is still around
        if self.transport.is_active() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let transport = Arc::clone(&self.transport);
                handle.spawn(async move {
                    if let Err(e) = transport.close().await {
                        debug!("Closing dropped transport failed: {}", e);
                    }
                });
            }
        }
    }
}
