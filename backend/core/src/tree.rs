//! Document tree abstraction.
//!
//! An arena of nodes addressed by [`NodeId`]. Handles are never reused while
//! the document lives, so they double as the stable per-node identity used by
//! the suppression table in `veil-rules`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};

/// The `display` value that makes an element invisible.
pub const DISPLAY_NONE: &str = "none";

/// Opaque handle to a node of one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Layout box of an element in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Half-open containment test: the right and bottom edges are outside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// An inline `display` declaration (`style="display: ..."`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDisplay {
    pub value: String,
    pub important: bool,
}

/// Element payload of a node.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    inline_display: Option<InlineDisplay>,
    stylesheet_hidden: bool,
    rect: Option<Rect>,
    overlay: bool,
    interactive: bool,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            inline_display: None,
            stylesheet_hidden: false,
            rect: None,
            overlay: false,
            interactive: false,
        }
    }

    /// Lower-case tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Attributes in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `id` attribute, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    /// Class names in attribute order.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn inline_display(&self) -> Option<&InlineDisplay> {
        self.inline_display.as_ref()
    }

    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    /// Computed `display` is `none`: an inline declaration wins over the
    /// page's stylesheets, otherwise the stylesheet verdict applies.
    pub fn is_display_none(&self) -> bool {
        match &self.inline_display {
            Some(inline) => inline.value.trim().eq_ignore_ascii_case(DISPLAY_NONE),
            None => self.stylesheet_hidden,
        }
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attrs.push((name, value.to_string())),
        }
    }

    fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        before != self.attrs.len()
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Which elements take part in a hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTest {
    /// Every rendered element, including the tool's own overlay.
    All,
    /// Overlay subtrees are transparent to the pointer.
    SkipOverlay,
}

/// A live page: the node arena plus the host it was loaded from.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    html: NodeId,
    body: NodeId,
    host: String,
}

impl Document {
    /// Create an empty page (`<html><body></body></html>`) served from `host`.
    pub fn new(host: impl Into<String>) -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            html: NodeId(0),
            body: NodeId(0),
            host: host.into(),
        };
        doc.html = doc.push_node(Some(doc.root), NodeKind::Element(Element::new("html")));
        doc.body = doc.push_node(Some(doc.html), NodeKind::Element(Element::new("body")));
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn html(&self) -> NodeId {
        self.html
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    fn push_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    fn check_container(&self, parent: NodeId) -> Result<()> {
        match self.node(parent).map(|n| &n.kind) {
            Some(NodeKind::Document | NodeKind::Element(_)) => Ok(()),
            Some(NodeKind::Text(_)) => Err(VeilError::NotAnElement(parent.0)),
            None => Err(VeilError::NodeNotFound(parent.0)),
        }
    }

    /// Append a new element as the last child of `parent`.
    pub fn create_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId> {
        self.check_container(parent)?;
        Ok(self.push_node(Some(parent), NodeKind::Element(Element::new(tag))))
    }

    /// Append a text node as the last child of `parent`.
    pub fn create_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId> {
        self.check_container(parent)?;
        Ok(self.push_node(Some(parent), NodeKind::Text(text.to_string())))
    }

    /// Remove `node` from its parent. The handle stays valid but disconnected.
    pub fn detach(&mut self, node: NodeId) -> Result<()> {
        let parent = self
            .node(node)
            .ok_or(VeilError::NodeNotFound(node.0))?
            .parent;
        if let Some(parent) = parent {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
        self.nodes[node.0].parent = None;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            Some(_) => Err(VeilError::NotAnElement(id.0)),
            None => Err(VeilError::NodeNotFound(id.0)),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Parent node, only if it is an element (the `<html>` element has none).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|c| *c == id)?;
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .find(|c| self.is_element(*c))
    }

    /// True when the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == self.root {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    /// All connected elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
            }
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Attributes and presentation
    // -----------------------------------------------------------------------

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        self.element_mut(id)?.set_attr(name, value);
        Ok(())
    }

    /// Returns whether the attribute was present.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<bool> {
        Ok(self.element_mut(id)?.remove_attr(name))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        let element = self.element_mut(id)?;
        if element.has_class(class) {
            return Ok(());
        }
        let joined = match element.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        element.set_attr("class", &joined);
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        let element = self.element_mut(id)?;
        if !element.has_class(class) {
            return Ok(());
        }
        let remaining: Vec<&str> = element.classes().filter(|c| *c != class).collect();
        let joined = remaining.join(" ");
        element.set_attr("class", &joined);
        Ok(())
    }

    pub fn inline_display(&self, id: NodeId) -> Option<&InlineDisplay> {
        self.element(id)?.inline_display()
    }

    pub fn set_inline_display(&mut self, id: NodeId, value: &str, important: bool) -> Result<()> {
        self.element_mut(id)?.inline_display = Some(InlineDisplay {
            value: value.to_string(),
            important,
        });
        Ok(())
    }

    pub fn clear_inline_display(&mut self, id: NodeId) -> Result<()> {
        self.element_mut(id)?.inline_display = None;
        Ok(())
    }

    /// Mark the element as hidden by the page's own stylesheets.
    pub fn set_stylesheet_hidden(&mut self, id: NodeId, hidden: bool) -> Result<()> {
        self.element_mut(id)?.stylesheet_hidden = hidden;
        Ok(())
    }

    /// Computed `display: none` for this element alone (ancestors not considered).
    pub fn is_display_none(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(Element::is_display_none)
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) -> Result<()> {
        self.element_mut(id)?.rect = Some(rect);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Overlay UI
    // -----------------------------------------------------------------------

    /// Flag `id` as the root of (part of) the tool's own overlay UI.
    pub fn mark_overlay(&mut self, id: NodeId) -> Result<()> {
        self.element_mut(id)?.overlay = true;
        Ok(())
    }

    /// Flag `id` as an interactive overlay control (button, slider, ...).
    pub fn mark_interactive(&mut self, id: NodeId) -> Result<()> {
        let element = self.element_mut(id)?;
        element.overlay = true;
        element.interactive = true;
        Ok(())
    }

    /// The node or one of its ancestors belongs to the overlay UI.
    pub fn is_overlay(&self, id: NodeId) -> bool {
        self.closest_flag(id, |e| e.overlay)
    }

    /// The node sits on (or inside) an interactive overlay control.
    pub fn is_interactive_control(&self, id: NodeId) -> bool {
        self.closest_flag(id, |e| e.interactive)
    }

    fn closest_flag(&self, id: NodeId, flag: impl Fn(&Element) -> bool) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if self.element(node).is_some_and(&flag) {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    // -----------------------------------------------------------------------
    // Hit testing
    // -----------------------------------------------------------------------

    /// Topmost rendered element whose box contains the point.
    ///
    /// Paint order is document order: later siblings and descendants are
    /// drawn above earlier ones. Subtrees with computed `display: none`
    /// are not rendered and never hit.
    pub fn element_from_point(&self, x: f64, y: f64, mode: HitTest) -> Option<NodeId> {
        let mut hit = None;
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if let Some(element) = self.element(node) {
                if element.is_display_none() {
                    continue;
                }
                if mode == HitTest::SkipOverlay && element.overlay {
                    continue;
                }
                if element.rect.is_some_and(|r| r.contains(x, y)) {
                    hit = Some(node);
                }
            }
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new("example.com");
        let body = doc.body();
        doc.set_rect(body, Rect::new(0.0, 0.0, 400.0, 800.0)).unwrap();
        let main = doc.create_element(body, "MAIN").unwrap();
        doc.set_rect(main, Rect::new(0.0, 0.0, 400.0, 400.0)).unwrap();
        let card = doc.create_element(main, "div").unwrap();
        doc.set_rect(card, Rect::new(10.0, 10.0, 100.0, 100.0)).unwrap();
        let panel = doc.create_element(body, "div").unwrap();
        doc.mark_overlay(panel).unwrap();
        doc.set_rect(panel, Rect::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        (doc, main, card, panel)
    }

    #[test]
    fn skeleton_has_html_and_body() {
        let doc = Document::new("example.com");
        assert_eq!(doc.tag_name(doc.html()), Some("html"));
        assert_eq!(doc.tag_name(doc.body()), Some("body"));
        assert_eq!(doc.parent_element(doc.html()), None);
        assert_eq!(doc.elements(), vec![doc.html(), doc.body()]);
    }

    #[test]
    fn tags_are_lowercased() {
        let (doc, main, _, _) = sample();
        assert_eq!(doc.tag_name(main), Some("main"));
    }

    #[test]
    fn class_helpers_preserve_order() {
        let (mut doc, main, _, _) = sample();
        doc.set_attr(main, "class", "layout wide").unwrap();
        doc.add_class(main, "veil-selected").unwrap();
        let classes: Vec<_> = doc.element(main).unwrap().classes().collect();
        assert_eq!(classes, vec!["layout", "wide", "veil-selected"]);
        doc.remove_class(main, "veil-selected").unwrap();
        assert_eq!(doc.attr(main, "class"), Some("layout wide"));
    }

    #[test]
    fn detached_nodes_are_disconnected() {
        let (mut doc, main, card, _) = sample();
        doc.detach(main).unwrap();
        assert!(!doc.is_connected(card));
        assert!(!doc.elements().contains(&card));
    }

    #[test]
    fn overlay_membership_is_inherited() {
        let (mut doc, _, card, panel) = sample();
        let button = doc.create_element(panel, "button").unwrap();
        doc.mark_interactive(button).unwrap();
        assert!(doc.is_overlay(button));
        assert!(doc.is_interactive_control(button));
        assert!(doc.is_overlay(panel));
        assert!(!doc.is_interactive_control(panel));
        assert!(!doc.is_overlay(card));
    }

    #[test]
    fn hit_test_prefers_topmost_and_can_skip_overlay() {
        let (doc, main, card, panel) = sample();
        assert_eq!(doc.element_from_point(20.0, 20.0, HitTest::All), Some(panel));
        assert_eq!(doc.element_from_point(20.0, 20.0, HitTest::SkipOverlay), Some(card));
        assert_eq!(doc.element_from_point(200.0, 200.0, HitTest::All), Some(main));
    }

    #[test]
    fn hidden_subtrees_are_not_hit() {
        let (mut doc, main, _, panel) = sample();
        doc.set_inline_display(main, DISPLAY_NONE, true).unwrap();
        doc.set_stylesheet_hidden(panel, true).unwrap();
        assert_eq!(doc.element_from_point(20.0, 20.0, HitTest::All), Some(doc.body()));
    }

    #[test]
    fn inline_display_overrides_stylesheet() {
        let (mut doc, main, _, _) = sample();
        doc.set_stylesheet_hidden(main, true).unwrap();
        assert!(doc.is_display_none(main));
        doc.set_inline_display(main, "block", false).unwrap();
        assert!(!doc.is_display_none(main));
        doc.clear_inline_display(main).unwrap();
        assert!(doc.is_display_none(main));
    }

    #[test]
    fn text_nodes_cannot_have_children() {
        let (mut doc, main, _, _) = sample();
        let text = doc.create_text(main, "hello").unwrap();
        assert!(matches!(
            doc.create_element(text, "span"),
            Err(VeilError::NotAnElement(_))
        ));
        assert_eq!(doc.text(text), Some("hello"));
    }
}
