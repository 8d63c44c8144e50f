//! JSON page snapshots.
//!
//! A snapshot describes a page's `<body>` content so it can be loaded into a
//! [`Document`] outside a browser (CLI, tests):
//!
//! ```json
//! {
//!   "host": "example.com",
//!   "body": [
//!     { "tag": "div", "attrs": { "class": "ad-banner" },
//!       "rect": { "x": 0, "y": 0, "width": 300, "height": 90 },
//!       "children": [ { "text": "Buy now" } ] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};
use crate::tree::{Document, NodeId, Rect};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub host: String,
    /// Rect of `<body>` itself.
    pub rect: Option<Rect>,
    pub body: Vec<NodeSnapshot>,
}

/// One node: an element when `tag` is set, otherwise a text node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSnapshot {
    pub tag: Option<String>,
    pub attrs: BTreeMap<String, String>,
    /// Inline `display` value (`style="display: ..."`).
    pub display: Option<String>,
    pub important: bool,
    /// Hidden by the page's stylesheets.
    pub hidden: bool,
    pub rect: Option<Rect>,
    /// Part of the tool's own overlay UI.
    pub overlay: bool,
    /// Interactive overlay control.
    pub interactive: bool,
    pub text: Option<String>,
    pub children: Vec<NodeSnapshot>,
}

impl PageSnapshot {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| VeilError::Other(anyhow::anyhow!("invalid page snapshot: {e}")))
    }

    /// Build a live document from the snapshot.
    pub fn into_document(self) -> Result<Document> {
        let mut doc = Document::new(self.host);
        let body = doc.body();
        if let Some(rect) = self.rect {
            doc.set_rect(body, rect)?;
        }
        for node in &self.body {
            build(&mut doc, body, node)?;
        }
        Ok(doc)
    }
}

fn build(doc: &mut Document, parent: NodeId, node: &NodeSnapshot) -> Result<()> {
    let Some(tag) = node.tag.as_deref() else {
        doc.create_text(parent, node.text.as_deref().unwrap_or_default())?;
        return Ok(());
    };

    let id = doc.create_element(parent, tag)?;
    for (name, value) in &node.attrs {
        doc.set_attr(id, name, value)?;
    }
    if let Some(display) = &node.display {
        doc.set_inline_display(id, display, node.important)?;
    }
    if node.hidden {
        doc.set_stylesheet_hidden(id, true)?;
    }
    if let Some(rect) = node.rect {
        doc.set_rect(id, rect)?;
    }
    if node.interactive {
        doc.mark_interactive(id)?;
    } else if node.overlay {
        doc.mark_overlay(id)?;
    }
    if let Some(text) = &node.text {
        doc.create_text(id, text)?;
    }
    for child in &node.children {
        build(doc, id, child)?;
    }
    Ok(())
}
