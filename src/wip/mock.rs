//! Mock transport for testing
//!
//! Records every frame the processor writes and lets tests push frames the
//! other way. An optional responder turns each request into the frames a
//! backend would answer with, events first and the reply last.

use super::traits::Transport;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Maps one request to the frames the backend sends back
pub type Responder = Box<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

/// In-memory transport
pub struct MockTransport {
    sent: Mutex<Vec<Value>>,
    sent_notify: Notify,
    incoming_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    incoming_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    responder: RwLock<Option<Responder>>,
    is_active: AtomicBool,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("sent", &self.sent_count())
            .field("is_active", &self.is_active())
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a silent mock; nothing is answered unless injected
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            incoming_tx: Mutex::new(Some(incoming_tx)),
            incoming_rx: tokio::sync::Mutex::new(incoming_rx),
            responder: RwLock::new(None),
            is_active: AtomicBool::new(true),
        }
    }

    /// Create a mock that answers each request through `responder`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        let mock = Self::new();
        mock.set_responder(responder);
        mock
    }

    /// Replace the responder
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        *self.responder.write().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(responder));
    }

    /// Push a raw frame towards the processor
    pub fn inject(&self, frame: Value) {
        let sender = self.incoming_tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            let _ = sender.send(frame.to_string());
        }
    }

    /// Push a success reply
    pub fn inject_reply(&self, id: u64, result: Value) {
        self.inject(json!({ "id": id, "result": result }));
    }

    /// Push an error reply
    pub fn inject_error(&self, id: u64, code: i64, message: &str) {
        self.inject(json!({ "id": id, "error": { "code": code, "message": message } }));
    }

    /// Push an event
    pub fn inject_event(&self, method: &str, params: Value) {
        self.inject(json!({ "method": method, "params": params }));
    }

    /// Every request written so far
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Methods of every request written so far
    pub fn sent_methods(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|frame| frame["method"].as_str().map(str::to_string))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Wait until `count` requests have been written
    pub async fn wait_for_sent(&self, count: usize) -> Result<Vec<Value>> {
        let wait = async {
            loop {
                let notified = self.sent_notify.notified();
                if self.sent_count() >= count {
                    return self.sent();
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .map_err(|_| Error::internal(format!("Timed out waiting for {} requests", count)))
    }

    /// Wait for the first request with `method` and return it
    pub async fn wait_for_method(&self, method: &str) -> Result<Value> {
        let wait = async {
            loop {
                let notified = self.sent_notify.notified();
                if let Some(frame) = self.sent().into_iter().find(|frame| frame["method"] == method) {
                    return frame;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .map_err(|_| Error::internal(format!("Timed out waiting for {}", method)))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_frame(&self, frame: String) -> Result<()> {
        if !self.is_active() {
            return Err(Error::transport("Connection is closed"));
        }

        let request: Value = serde_json::from_str(&frame)?;
        let answers = self
            .responder
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|responder| responder(&request))
            .unwrap_or_default();

        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(request);
        self.sent_notify.notify_waiters();

        for answer in answers {
            self.inject(answer);
        }
        Ok(())
    }

    async fn recv_frame(&self) -> Option<Result<String>> {
        let mut receiver = self.incoming_rx.lock().await;
        receiver.recv().await.map(Ok)
    }

    async fn close(&self) -> Result<()> {
        self.is_active.store(false, Ordering::SeqCst);
        // Dropping the sender ends the stream once queued frames are read
        self.incoming_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

/// Reply helper for responders: `{"id": <request id>, "result": result}`
pub fn reply_to(request: &Value, result: Value) -> Value {
    json!({ "id": request["id"], "result": result })
}

/// Event helper for responders
pub fn event(method: &str, params: Value) -> Value {
    json!({ "method": method, "params": params })
}
