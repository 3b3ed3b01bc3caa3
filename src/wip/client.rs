//! Typed protocol client
//!
//! Wraps a [`CommandProcessor`] with the backend profile it talks to, so
//! commands the backend lacks fail with `NotSupported` before anything is
//! written.

use super::processor::CommandProcessor;
use super::traits::SyncCallback;
use crate::protocol::codec::{ProtocolCommand, Reply};
use crate::protocol::profile::BackendProfile;
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// Typed command client
#[derive(Debug, Clone)]
pub struct ProtocolClient {
    processor: Arc<CommandProcessor>,
    profile: BackendProfile,
}

impl ProtocolClient {
    pub fn new(processor: Arc<CommandProcessor>, profile: BackendProfile) -> Self {
        Self { processor, profile }
    }

    pub fn profile(&self) -> BackendProfile {
        self.profile
    }

    pub fn processor(&self) -> &Arc<CommandProcessor> {
        &self.processor
    }

    fn check_supported(&self, method: &str) -> Result<()> {
        if self.profile.supports(method) {
            Ok(())
        } else {
            Err(Error::not_supported(method))
        }
    }

    fn encode<C: ProtocolCommand>(command: &C) -> Result<Option<Value>> {
        let params = command.to_params()?;
        Ok(if params.is_null() { None } else { Some(params) })
    }

    /// Send a command and wait for its typed reply
    pub async fn call<C: ProtocolCommand>(&self, command: C) -> Result<Reply<C>> {
        self.check_supported(C::METHOD)?;
        let params = Self::encode(&command)?;
        let result = self.processor.call(C::METHOD, params).await?;
        Ok(Reply::new(result))
    }

    /// Send a command without waiting; `callback` runs on the dispatcher
    pub fn send_command<C, F>(&self, command: C, callback: F, sync: Option<SyncCallback>) -> Result<u64>
    where
        C: ProtocolCommand,
        F: FnOnce(Result<Reply<C>>) + Send + 'static,
    {
        self.check_supported(C::METHOD)?;
        let params = Self::encode(&command)?;
        self.processor.send(
            C::METHOD,
            params,
            Box::new(move |outcome| callback(outcome.map(Reply::new))),
            sync,
        )
    }

    /// Send a command whose reply is only logged on failure
    pub fn send_detached<C: ProtocolCommand>(&self, command: C) -> Result<u64> {
        self.send_command(
            command,
            |outcome: Result<Reply<C>>| {
                if let Err(e) = outcome {
                    tracing::warn!("{} failed: {}", C::METHOD, e);
                }
            },
            None,
        )
    }

    /// Send an untyped command by method name
    pub async fn call_raw(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.check_supported(method)?;
        self.processor.call(method, params).await
    }

    /// Register an event handler
    pub fn on_event<F>(&self, method: &str, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.processor.on_event(method, Arc::new(handler));
    }

    pub fn is_closed(&self) -> bool {
        self.processor.is_closed()
    }
}
