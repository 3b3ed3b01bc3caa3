//! Common test utilities
//!
//! Shared helpers for the integration tests; every test runs against the
//! mock backend in `mock_backend.rs`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use wipdbg::session::{DebugEvent, FilteredReceiver};
use wipdbg::wip::Browser;
use wipdbg::{Config, DebugSession};

/// Configuration pointing at `endpoint`
pub fn test_config(endpoint: &str) -> Config {
    Config {
        endpoint: endpoint.to_string(),
        connect_timeout_ms: 2000,
        prefetch_top_frame: false,
        ..Config::default()
    }
}

/// Attach to the first tab that has a debugger URL
pub async fn attach_first_tab(endpoint: &str) -> Result<Arc<DebugSession>, Box<dyn std::error::Error>> {
    let config = test_config(endpoint);
    let browser = Browser::new(endpoint);
    let tabs = browser.list_tabs().await?;
    let tab = tabs
        .iter()
        .find(|tab| tab.web_socket_debugger_url.is_some())
        .ok_or("no attachable tab")?;
    Ok(browser.attach(tab, &config).await?)
}

/// Next event of the subscribed kinds, failing after five seconds
pub async fn next_event(rx: &mut FilteredReceiver) -> DebugEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}
