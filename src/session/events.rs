//! Session event dispatcher
//!
//! Broadcasts debugger state changes to any number of listeners.

use super::state::SessionState;
use crate::model::script::{Script, SourceLocation};
use crate::model::suspension::Suspension;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Event delivered to session listeners
#[derive(Debug, Clone)]
pub enum DebugEvent {
    StateChanged { from: SessionState, to: SessionState },
    ScriptParsed(Arc<Script>),
    ScriptCollected(Arc<Script>),
    Suspended(Arc<Suspension>),
    Resumed,
    /// A breakpoint gained a resolved location
    BreakpointResolved { uid: u64, location: SourceLocation },
    /// The top frame navigated
    Navigated { url: String },
    Closed,
}

/// Event kind, for filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugEventKind {
    StateChanged,
    ScriptParsed,
    ScriptCollected,
    Suspended,
    Resumed,
    BreakpointResolved,
    Navigated,
    Closed,
}

impl DebugEvent {
    pub fn kind(&self) -> DebugEventKind {
        match self {
            DebugEvent::StateChanged { .. } => DebugEventKind::StateChanged,
            DebugEvent::ScriptParsed(_) => DebugEventKind::ScriptParsed,
            DebugEvent::ScriptCollected(_) => DebugEventKind::ScriptCollected,
            DebugEvent::Suspended(_) => DebugEventKind::Suspended,
            DebugEvent::Resumed => DebugEventKind::Resumed,
            DebugEvent::BreakpointResolved { .. } => DebugEventKind::BreakpointResolved,
            DebugEvent::Navigated { .. } => DebugEventKind::Navigated,
            DebugEvent::Closed => DebugEventKind::Closed,
        }
    }
}

/// Receiver that only yields events of the requested kinds
pub struct FilteredReceiver {
    inner: broadcast::Receiver<DebugEvent>,
    kinds: Vec<DebugEventKind>,
}

impl FilteredReceiver {
    /// Receive the next matching event
    ///
    /// Lagging is logged and skipped; a closed channel yields `SessionClosed`.
    pub async fn recv(&mut self) -> Result<DebugEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event receiver lagged behind by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(Error::SessionClosed),
            }
        }
    }

    fn matches(&self, event: &DebugEvent) -> bool {
        // No kinds means every event
        self.kinds.is_empty() || self.kinds.contains(&event.kind())
    }
}

/// Event dispatcher
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: broadcast::Sender<DebugEvent>,
    capacity: usize,
}

impl EventDispatcher {
    /// Create a dispatcher whose receivers buffer `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> broadcast::Receiver<DebugEvent> {
        self.tx.subscribe()
    }

    /// Subscribe to the given kinds only
    pub fn subscribe_filtered(&self, kinds: Vec<DebugEventKind>) -> FilteredReceiver {
        FilteredReceiver {
            inner: self.tx.subscribe(),
            kinds,
        }
    }

    /// Stream of events; lagged gaps are logged and skipped
    pub fn stream(&self) -> impl Stream<Item = DebugEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                warn!("Event stream lagged behind by {} events", n);
                None
            }
        })
    }

    /// Broadcast an event; having no listeners is not an error
    pub fn dispatch(&self, event: DebugEvent) {
        debug!("Dispatching {:?} event", event.kind());
        if self.tx.send(event).is_err() {
            debug!("No listeners for event");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_dispatch_without_listeners() {
        let dispatcher = EventDispatcher::new(8);
        dispatcher.dispatch(DebugEvent::Resumed);
        assert_eq!(dispatcher.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_other_kinds() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe_filtered(vec![DebugEventKind::Navigated]);

        dispatcher.dispatch(DebugEvent::Resumed);
        dispatcher.dispatch(DebugEvent::Navigated {
            url: "http://site/".to_string(),
        });

        match rx.recv().await.unwrap() {
            DebugEvent::Navigated { url } => assert_eq!(url, "http://site/"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_skips_lag() {
        let dispatcher = EventDispatcher::new(2);
        let mut stream = Box::pin(dispatcher.stream());

        for _ in 0..4 {
            dispatcher.dispatch(DebugEvent::Resumed);
        }
        dispatcher.dispatch(DebugEvent::Closed);

        // The two oldest events were overwritten
        assert!(matches!(stream.next().await, Some(DebugEvent::Resumed)));
        assert!(matches!(stream.next().await, Some(DebugEvent::Closed)));
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let dispatcher = EventDispatcher::new(4);
        let mut rx = dispatcher.subscribe_filtered(Vec::new());
        drop(dispatcher);
        assert!(matches!(rx.recv().await, Err(Error::SessionClosed)));
    }
}
