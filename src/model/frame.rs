//! Frame manager
//!
//! Watches the URL of the page's top frame. Child frame navigations are
//! observed but leave no client state.

use crate::protocol::domains::page::{FrameNavigatedEventData, GetResourceTreeData};
use crate::protocol::ids::FrameId;
use crate::Result;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct FrameState {
    root_id: Option<FrameId>,
    url: Option<String>,
}

/// Tracks the top frame of one tab
#[derive(Debug, Default)]
pub struct FrameManager {
    state: RwLock<FrameState>,
}

impl FrameManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `Page.getResourceTree` reply
    ///
    /// Returns the URL when it should be announced; the first URL learned
    /// this way is applied silently.
    pub fn apply_resource_tree(&self, data: &GetResourceTreeData<'_>) -> Result<Option<String>> {
        let frame = data.frame_tree()?.frame()?;
        let url = frame.url()?.to_string();

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let silent = state.url.is_none();
        state.root_id = Some(frame.id()?);
        state.url = Some(url.clone());

        debug!("Frame tree read, top frame at {}", url);
        Ok(if silent { None } else { Some(url) })
    }

    /// Handle `Page.frameNavigated`; returns the new URL for a top-frame navigation
    pub fn on_frame_navigated(&self, data: &FrameNavigatedEventData<'_>) -> Result<Option<String>> {
        let frame = data.frame()?;
        if !frame.is_root()? {
            debug!("Ignoring child frame navigation to {}", frame.url()?);
            return Ok(None);
        }

        let url = frame.url()?.to_string();
        info!("Top frame navigated to {}", url);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.root_id = Some(frame.id()?);
        state.url = Some(url.clone());
        Ok(Some(url))
    }

    /// URL of the top frame, once known
    pub fn url(&self) -> Option<String> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).url.clone()
    }

    pub fn root_frame_id(&self) -> Option<FrameId> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).root_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(url: &str) -> serde_json::Value {
        json!({ "frameTree": { "frame": { "id": "F1", "loaderId": "L1", "url": url } } })
    }

    #[test]
    fn test_first_url_is_silent() {
        let frames = FrameManager::new();
        let first = tree("http://site/");
        assert_eq!(
            frames.apply_resource_tree(&GetResourceTreeData::parse(&first).unwrap()).unwrap(),
            None
        );
        assert_eq!(frames.url().as_deref(), Some("http://site/"));
        assert_eq!(frames.root_frame_id(), Some(FrameId::new("F1")));

        let second = tree("http://site/2");
        assert_eq!(
            frames.apply_resource_tree(&GetResourceTreeData::parse(&second).unwrap()).unwrap(),
            Some("http://site/2".to_string())
        );
    }

    #[test]
    fn test_root_and_child_navigation() {
        let frames = FrameManager::new();

        let child = json!({ "frame": { "id": "F2", "parentId": "F1", "loaderId": "L", "url": "http://ads/" } });
        assert_eq!(
            frames.on_frame_navigated(&FrameNavigatedEventData::parse(&child).unwrap()).unwrap(),
            None
        );
        assert_eq!(frames.url(), None);

        let root = json!({ "frame": { "id": "F1", "parentId": "", "loaderId": "L", "url": "http://site/next" } });
        assert_eq!(
            frames.on_frame_navigated(&FrameNavigatedEventData::parse(&root).unwrap()).unwrap(),
            Some("http://site/next".to_string())
        );
        assert_eq!(frames.url().as_deref(), Some("http://site/next"));
    }
}
