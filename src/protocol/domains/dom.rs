//! DOM domain: read-only document views

use crate::protocol::codec::{empty_command, json_view, JsonList, ProtocolCommand};
use crate::protocol::ids::{FrameId, NodeId};
use serde::Serialize;

json_view! {
    /// DOM interaction is implemented in terms of mirror objects that represent the actual DOM nodes.
    pub struct NodeValue<'a> {
        /// Passed into the rest of the DOM messages as the `nodeId`
        required node_id: NodeId = "nodeId";
        required node_type: i64 = "nodeType";
        required node_name: &'a str = "nodeName";
        required local_name: &'a str = "localName";
        required node_value: &'a str = "nodeValue";
        /// Child count for `Container` nodes
        optional child_node_count: i64 = "childNodeCount";
        /// Child nodes of this node when requested with children
        optional children: JsonList<'a, NodeValue<'a>> = "children";
        /// Flat `[name1, value1, name2, value2]` attribute list
        optional attributes: JsonList<'a, &'a str> = "attributes";
        optional document_url: &'a str = "documentURL";
        optional base_url: &'a str = "baseURL";
        optional public_id: &'a str = "publicId";
        optional system_id: &'a str = "systemId";
        optional internal_subset: &'a str = "internalSubset";
        optional xml_version: &'a str = "xmlVersion";
        optional name: &'a str = "name";
        optional value: &'a str = "value";
        /// Frame ID for frame owner elements
        optional frame_id: FrameId = "frameId";
        optional content_document: NodeValue<'a> = "contentDocument";
        optional shadow_roots: JsonList<'a, NodeValue<'a>> = "shadowRoots";
        optional template_content: NodeValue<'a> = "templateContent";
    }
}

impl<'a> NodeValue<'a> {
    /// Attribute pairs, decoded lazily from the flat list
    pub fn attribute_pairs(&self) -> Result<Vec<(&'a str, &'a str)>, crate::protocol::codec::DecodeError> {
        let Some(list) = self.attributes()? else {
            return Ok(Vec::new());
        };
        let flat = list.to_vec()?;
        Ok(flat.chunks(2).filter(|pair| pair.len() == 2).map(|pair| (pair[0], pair[1])).collect())
    }
}

json_view! {
    pub struct GetDocumentData<'a> {
        required root: NodeValue<'a> = "root";
    }
}

empty_command! {
    /// Enables DOM agent for the given page.
    DomEnableParams = "DOM.enable"
}

/// Returns the root DOM node to the caller.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GetDocumentParams;

impl ProtocolCommand for GetDocumentParams {
    const METHOD: &'static str = "DOM.getDocument";
    type Response<'a> = GetDocumentData<'a>;
}
