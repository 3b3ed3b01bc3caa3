//! Tab discovery over the remote-inspection HTTP endpoint
//!
//! The browser lists inspectable tabs at `/json` and reports its protocol
//! revision at `/json/version`.

use super::connection::WebSocketTransport;
use crate::config::Config;
use crate::protocol::profile::{BackendProfile, ProfileSelection};
use crate::session::DebugSession;
use crate::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inspectable tab
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: String,
    #[serde(rename = "type", default)]
    pub tab_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Absent while another client is attached
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Browser version information
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser", default)]
    pub product: String,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,
    #[serde(rename = "WebKit-Version", default)]
    pub webkit_version: String,
}

/// Remote-inspection endpoint of one browser
#[derive(Debug, Clone)]
pub struct Browser {
    /// HTTP endpoint (e.g., "http://localhost:9222")
    endpoint: String,
    http: reqwest::Client,
}

impl Browser {
    /// Create a browser handle
    ///
    /// # Arguments
    /// * `endpoint` - HTTP endpoint; `ws://` forms are accepted and converted
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        let endpoint = endpoint
            .into()
            .replace("ws://", "http://")
            .replace("wss://", "https://")
            .trim_end_matches('/')
            .to_string();
        info!("Creating browser handle for endpoint: {}", endpoint);
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List inspectable tabs
    pub async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let url = format!("{}/json", self.endpoint);
        debug!("Fetching tabs from {}", url);

        let tabs: Vec<TabInfo> = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        debug!("Found {} tabs", tabs.len());
        Ok(tabs)
    }

    /// Get browser version
    pub async fn version(&self) -> Result<BrowserVersion> {
        let url = format!("{}/json/version", self.endpoint);
        debug!("Fetching browser version from {}", url);

        let version = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(version)
    }

    /// Pick the backend profile for this browser
    pub async fn resolve_profile(&self, selection: ProfileSelection) -> BackendProfile {
        if selection != ProfileSelection::Auto {
            return selection.resolve(None);
        }
        match self.version().await {
            Ok(version) => {
                info!("Browser reports protocol version {}", version.protocol_version);
                selection.resolve(Some(&version.protocol_version))
            }
            Err(e) => {
                warn!("Failed to read browser version, assuming dev profile: {}", e);
                selection.resolve(None)
            }
        }
    }

    /// Connect a debug session to `tab`
    pub async fn attach(&self, tab: &TabInfo, config: &Config) -> Result<Arc<DebugSession>> {
        let ws_url = tab.web_socket_debugger_url.as_deref().ok_or_else(|| {
            Error::transport(format!("Tab {} has no debugger URL; is another client attached?", tab.id))
        })?;

        info!("Attaching to tab {} ({})", tab.id, tab.url);

        let profile = self.resolve_profile(config.profile).await;
        let transport = WebSocketTransport::connect(ws_url, config.connect_timeout()).await?;

        DebugSession::connect(transport, profile, config.clone()).await
    }
}
