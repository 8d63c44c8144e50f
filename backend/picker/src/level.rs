//! Ancestor-level widening of a committed selection.

use veil_core::{Document, NodeId};

/// Walk up to `levels` ancestors from `base`.
///
/// Stops early rather than stepping onto `body`, `html`, overlay UI, or past
/// the top of a detached subtree.
pub fn ancestor_at_level(doc: &Document, base: NodeId, levels: usize) -> NodeId {
    let mut current = base;
    for _ in 0..levels {
        match next_ancestor(doc, current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// Largest level that still moves the selection (the slider's maximum).
pub fn max_level(doc: &Document, base: NodeId) -> usize {
    let mut levels = 0;
    let mut current = base;
    while let Some(parent) = next_ancestor(doc, current) {
        levels += 1;
        current = parent;
    }
    levels
}

fn next_ancestor(doc: &Document, node: NodeId) -> Option<NodeId> {
    let parent = doc.parent_element(node)?;
    match doc.tag_name(parent) {
        Some("body" | "html") => None,
        _ if doc.is_overlay(parent) => None,
        _ => Some(parent),
    }
}
