//! Page domain: frame tree and navigation

use crate::protocol::codec::{empty_command, json_view, EmptyValue, JsonList, ProtocolCommand};
use crate::protocol::ids::{FrameId, LoaderId};
use serde::Serialize;

/// Event names
pub mod events {
    pub const FRAME_NAVIGATED: &str = "Page.frameNavigated";
}

json_view! {
    /// Information about the Frame on the page.
    pub struct FrameValue<'a> {
        required id: FrameId = "id";
        /// Parent frame identifier; absent or empty for the top frame
        optional parent_id: &'a str = "parentId";
        required loader_id: LoaderId = "loaderId";
        optional name: &'a str = "name";
        required url: &'a str = "url";
        optional security_origin: &'a str = "securityOrigin";
        optional mime_type: &'a str = "mimeType";
    }
}

impl<'a> FrameValue<'a> {
    /// True for the top frame of the page
    pub fn is_root(&self) -> Result<bool, crate::protocol::codec::DecodeError> {
        Ok(self.parent_id()?.map_or(true, str::is_empty))
    }
}

json_view! {
    /// Information about the Frame hierarchy along with their cached resources.
    pub struct FrameResourceTreeValue<'a> {
        required frame: FrameValue<'a> = "frame";
        optional child_frames: JsonList<'a, FrameResourceTreeValue<'a>> = "childFrames";
    }
}

json_view! {
    pub struct GetResourceTreeData<'a> {
        required frame_tree: FrameResourceTreeValue<'a> = "frameTree";
    }
}

json_view! {
    /// Fired once navigation of the frame has completed.
    pub struct FrameNavigatedEventData<'a> {
        required frame: FrameValue<'a> = "frame";
    }
}

empty_command! {
    /// Enables page domain notifications.
    PageEnableParams = "Page.enable"
}

/// Returns present frame / resource tree structure.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GetResourceTreeParams;

impl ProtocolCommand for GetResourceTreeParams {
    const METHOD: &'static str = "Page.getResourceTree";
    type Response<'a> = GetResourceTreeData<'a>;
}

/// Reloads given page optionally ignoring the cache.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_cache: Option<bool>,
}

impl ProtocolCommand for ReloadParams {
    const METHOD: &'static str = "Page.reload";
    type Response<'a> = EmptyValue<'a>;
}
