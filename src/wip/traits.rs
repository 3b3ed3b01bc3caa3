//! WIP transport layer traits
//!
//! This module defines the seam between the command processor and the
//! byte-frame channel it runs over.

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Duplex frame channel to a debug backend
///
/// One reader and one writer use the transport concurrently; implementations
/// must not hold a lock shared by `send_frame` and `recv_frame`.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Write one text frame
    async fn send_frame(&self, frame: String) -> Result<()>;

    /// Next incoming frame; `None` once the channel has closed
    async fn recv_frame(&self) -> Option<Result<String>>;

    /// Close the channel; pending `recv_frame` calls complete with `None`
    async fn close(&self) -> Result<()>;

    /// Check if the channel is open
    fn is_active(&self) -> bool;
}

/// Completion callback of a command: the `result` object or the failure
pub type ResponseCallback = Box<dyn FnOnce(Result<Value>) + Send + 'static>;

/// Fires once after the response callback, on success and failure alike
pub type SyncCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handler for one event method; receives the event's `params`
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync + 'static>;
