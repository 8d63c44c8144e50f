//! Selector synthesis.
//!
//! Turns a picked element into a short selector that finds it again on the
//! next page load. Candidates are tried cheapest first:
//!
//! 1. `#id`, when the element carries a stable id that is unique in the page.
//! 2. A child-combinator path built bottom-up from the element, one segment
//!    per ancestor (`tag.class1.class2` and/or `tag:nth-of-type(n)`), stopping
//!    as soon as the path is unique.
//! 3. The parent's preview selector joined to the path, or to the element's own segment.
//!
//! In [`SynthesisMode::Preview`] only the path is built; uniqueness is not
//! checked. In [`SynthesisMode::RequireUnique`] a non-unique best-effort path
//! is still returned when nothing better exists, so callers that persist the
//! result must check uniqueness themselves.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use veil_core::{escape_identifier, Document, NodeId};

/// Ancestor steps walked from the target by default.
pub const DEFAULT_MAX_DEPTH: usize = 7;

/// Class the picker puts on the highlighted element. Never part of a selector.
pub const HIGHLIGHT_CLASS: &str = "veil-selected";

/// Classes kept per segment.
const MAX_CLASSES_PER_SEGMENT: usize = 2;

static STATE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)active|select|focus|hover|disabled|open|closed|visible|hidden|js-|ui-")
        .expect("state class pattern is valid")
});
static HASH_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9]{4,}").expect("hash class pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Display only; the selector may match other elements too.
    Preview,
    /// Stop at the first unique candidate and try parent widening.
    RequireUnique,
}

/// Class names worth anchoring on: long enough, no digits, no state words,
/// no generated hashes, no BEM-style modifiers.
pub fn is_stable_class(class: &str) -> bool {
    class.chars().count() > 2
        && class != HIGHLIGHT_CLASS
        && !class.chars().any(|c| c.is_ascii_digit())
        && !STATE_CLASS_RE.is_match(class)
        && !HASH_CLASS_RE.is_match(class)
        && !class.contains("--")
        && !class.contains("__")
}

/// Ids that are likely hand-written rather than generated by a framework.
pub fn is_stable_id(id: &str) -> bool {
    let lower = id.to_ascii_lowercase();
    id.chars().count() > 2
        && !id.chars().all(|c| c.is_ascii_digit())
        && !lower.starts_with("ember")
        && !lower.starts_with("react")
        && !id.contains(':')
}

/// Whether `node` can be picked at all.
pub fn is_valid_candidate(doc: &Document, node: NodeId) -> bool {
    match doc.tag_name(node) {
        Some("body" | "html") | None => false,
        Some(_) => doc.is_connected(node) && !doc.is_overlay(node),
    }
}

/// Build a selector for `node`, walking at most `max_depth` ancestors.
///
/// Returns `None` when no usable selector exists: the node is not a
/// connected page element, it belongs to the overlay UI, or the path would
/// be empty or just `body` / `html`.
pub fn synthesize(
    doc: &Document,
    node: NodeId,
    max_depth: usize,
    mode: SynthesisMode,
) -> Option<String> {
    if !is_valid_candidate(doc, node) {
        return None;
    }

    if let Some(id) = doc.element(node)?.id().filter(|id| is_stable_id(id)) {
        let candidate = format!("#{}", escape_identifier(id));
        if is_unique_match(doc, &candidate, node) {
            return Some(candidate);
        }
    }

    let mut segments: Vec<String> = Vec::new();
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if segments.len() >= max_depth {
            break;
        }
        match doc.tag_name(current) {
            Some("body" | "html") | None => break,
            Some(_) => {}
        }
        if doc.is_overlay(current) {
            cursor = doc.parent_element(current);
            continue;
        }

        segments.insert(0, segment(doc, current)?);
        if mode == SynthesisMode::RequireUnique {
            let path = segments.join(" > ");
            if is_unique_match(doc, &path, node) {
                return Some(path);
            }
        }
        cursor = doc.parent_element(current);
    }

    if segments.is_empty() {
        return None;
    }
    let path = segments.join(" > ");

    if mode == SynthesisMode::RequireUnique {
        if let Some(widened) = widen_with_parent(doc, node, &path, max_depth) {
            return Some(widened);
        }
        debug!(%node, selector = %path, "No unique selector within depth; using best effort");
    }

    if path == "body" || path == "html" {
        return None;
    }
    if let Err(e) = doc.count_matches(&path) {
        debug!(%node, error = %e, "Generated selector failed to parse");
        return None;
    }
    Some(path)
}

/// `<parent preview> > <path>`, then `<parent preview> > <own segment>`;
/// the first that is unique wins.
fn widen_with_parent(doc: &Document, node: NodeId, path: &str, max_depth: usize) -> Option<String> {
    let parent = doc.parent_element(node)?;
    let parent_selector = synthesize(
        doc,
        parent,
        max_depth.saturating_sub(1),
        SynthesisMode::Preview,
    )?;
    let own = segment(doc, node)?;
    let found = [path, own.as_str()]
        .into_iter()
        .map(|tail| format!("{parent_selector} > {tail}"))
        .find(|combined| is_unique_match(doc, combined, node));
    found
}

/// One path segment for `node`: tag, up to two stable classes, and a
/// 1-based `:nth-of-type` when same-tag siblings exist.
fn segment(doc: &Document, node: NodeId) -> Option<String> {
    let element = doc.element(node)?;
    let tag = element.tag();
    let mut out = tag.to_string();

    for class in element
        .classes()
        .filter(|c| is_stable_class(c))
        .take(MAX_CLASSES_PER_SEGMENT)
    {
        out.push('.');
        out.push_str(&escape_identifier(class));
    }

    if let Some(parent) = doc.parent_element(node).filter(|p| !doc.is_overlay(*p)) {
        let same_tag: Vec<NodeId> = doc
            .element_children(parent)
            .filter(|s| doc.tag_name(*s) == Some(tag) && !doc.is_overlay(*s))
            .collect();
        if same_tag.len() > 1 {
            if let Some(index) = same_tag.iter().position(|s| *s == node) {
                out.push_str(&format!(":nth-of-type({})", index + 1));
            }
        }
    }
    Some(out)
}

/// `selector` matches exactly one element and that element is `node`.
pub fn is_unique_match(doc: &Document, selector: &str, node: NodeId) -> bool {
    match doc.query_selector_all(selector) {
        Ok(matches) => matches.as_slice() == [node],
        Err(e) => {
            debug!(selector, error = %e, "Candidate selector rejected by query engine");
            false
        }
    }
}
