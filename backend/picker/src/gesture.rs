//! Tap-to-select gesture recognition.
//!
//! [`TapSelector`] consumes raw pointer events while selection mode is on
//! and decides whether a gesture was a tap on page content (commit a
//! selection) or a scroll (stay silent).
//!
//! # State Machine
//!
//! ```text
//! Idle ──down──▶ ArmedCandidate ──move > T──▶ MovedBeyondThreshold ──up──▶ Idle
//!                     │
//!                     └──up ≤ T──▶ Committed(node)
//! ```
//!
//! # Invariants
//!
//! 1. A gesture whose displacement ever exceeds the threshold commits nothing.
//! 2. Events on interactive overlay controls never change state.
//! 3. A committed node is never overlay UI, `body` or `html`.
//! 4. Only one pointer is tracked; a second pointer turns the gesture into a
//!    non-selecting one.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use veil_core::{Document, HitTest, NodeId};

use crate::synthesizer::is_valid_candidate;

/// Maximum displacement (px, Euclidean) for a gesture to count as a tap.
pub const TAP_THRESHOLD: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub tap_threshold: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_threshold: TAP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// A raw pointer or touch event in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
    /// Active touch points; mouse events have one.
    pub pointer_count: usize,
    /// The event target reported by the host, if any. When absent the
    /// target is hit-tested from the coordinates.
    pub target: Option<NodeId>,
}

impl PointerEvent {
    fn new(phase: PointerPhase, x: f64, y: f64) -> Self {
        Self {
            phase,
            x,
            y,
            pointer_count: 1,
            target: None,
        }
    }

    pub fn down(x: f64, y: f64) -> Self {
        Self::new(PointerPhase::Down, x, y)
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self::new(PointerPhase::Move, x, y)
    }

    pub fn up(x: f64, y: f64) -> Self {
        Self::new(PointerPhase::Up, x, y)
    }

    pub fn cancel() -> Self {
        Self::new(PointerPhase::Cancel, 0.0, 0.0)
    }

    #[must_use]
    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn with_pointers(mut self, count: usize) -> Self {
        self.pointer_count = count;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    ArmedCandidate {
        candidate: Option<NodeId>,
        start_x: f64,
        start_y: f64,
    },
    MovedBeyondThreshold,
    Committed(NodeId),
}

/// What the caller should do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Not ours; let the event through untouched.
    Ignored,
    /// A tap may be starting; the candidate can be highlighted.
    Armed { candidate: Option<NodeId> },
    /// The gesture became a scroll; drop any provisional highlight.
    Cancelled,
    /// A tap selected `node`. The caller must cancel the page's default
    /// action for the release event.
    Committed { node: NodeId, prevent_default: bool },
    /// A tap landed on nothing selectable; the selection should be cleared.
    Missed { prevent_default: bool },
    /// A scroll gesture ended.
    ScrollEnded,
}

#[derive(Debug, Clone)]
pub struct TapSelector {
    config: GestureConfig,
    state: GestureState,
}

impl Default for TapSelector {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl TapSelector {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Node of the last committed tap, if the machine is resting there.
    pub fn committed(&self) -> Option<NodeId> {
        match self.state {
            GestureState::Committed(node) => Some(node),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
    }

    pub fn process(&mut self, doc: &Document, event: &PointerEvent) -> GestureOutcome {
        let target = event
            .target
            .or_else(|| doc.element_from_point(event.x, event.y, HitTest::All));

        if event.phase != PointerPhase::Cancel
            && target.is_some_and(|t| doc.is_interactive_control(t))
        {
            trace!(?target, "Event on overlay control; leaving it alone");
            // A release still ends whatever gesture was in flight.
            if event.phase == PointerPhase::Up
                && matches!(
                    self.state,
                    GestureState::ArmedCandidate { .. } | GestureState::MovedBeyondThreshold
                )
            {
                self.state = GestureState::Idle;
            }
            return GestureOutcome::Ignored;
        }

        match event.phase {
            PointerPhase::Down => self.on_down(doc, event, target),
            PointerPhase::Move => self.on_move(event),
            PointerPhase::Up => self.on_up(doc, event),
            PointerPhase::Cancel => {
                let was_armed = matches!(self.state, GestureState::ArmedCandidate { .. });
                if !matches!(self.state, GestureState::Committed(_)) {
                    self.state = GestureState::Idle;
                }
                if was_armed {
                    GestureOutcome::Cancelled
                } else {
                    GestureOutcome::Ignored
                }
            }
        }
    }

    fn on_down(
        &mut self,
        doc: &Document,
        event: &PointerEvent,
        target: Option<NodeId>,
    ) -> GestureOutcome {
        if event.pointer_count > 1 {
            self.state = GestureState::MovedBeyondThreshold;
            return GestureOutcome::Ignored;
        }
        if target.is_some_and(|t| doc.is_overlay(t)) {
            return GestureOutcome::Ignored;
        }
        self.state = GestureState::ArmedCandidate {
            candidate: target,
            start_x: event.x,
            start_y: event.y,
        };
        GestureOutcome::Armed { candidate: target }
    }

    fn on_move(&mut self, event: &PointerEvent) -> GestureOutcome {
        let GestureState::ArmedCandidate {
            start_x, start_y, ..
        } = self.state
        else {
            return GestureOutcome::Ignored;
        };
        if event.pointer_count > 1 || self.beyond_threshold(start_x, start_y, event) {
            debug!("Gesture moved beyond tap threshold; treating as scroll");
            self.state = GestureState::MovedBeyondThreshold;
            return GestureOutcome::Cancelled;
        }
        GestureOutcome::Ignored
    }

    fn on_up(&mut self, doc: &Document, event: &PointerEvent) -> GestureOutcome {
        match self.state {
            GestureState::ArmedCandidate {
                candidate,
                start_x,
                start_y,
            } => {
                if self.beyond_threshold(start_x, start_y, event) {
                    self.state = GestureState::Idle;
                    return GestureOutcome::ScrollEnded;
                }
                match resolve_target(doc, candidate, event.x, event.y) {
                    Some(node) => {
                        debug!(%node, "Tap committed");
                        self.state = GestureState::Committed(node);
                        GestureOutcome::Committed {
                            node,
                            prevent_default: true,
                        }
                    }
                    None => {
                        self.state = GestureState::Idle;
                        GestureOutcome::Missed {
                            prevent_default: true,
                        }
                    }
                }
            }
            GestureState::MovedBeyondThreshold => {
                self.state = GestureState::Idle;
                GestureOutcome::ScrollEnded
            }
            GestureState::Idle | GestureState::Committed(_) => GestureOutcome::Ignored,
        }
    }

    fn beyond_threshold(&self, start_x: f64, start_y: f64, event: &PointerEvent) -> bool {
        let dx = event.x - start_x;
        let dy = event.y - start_y;
        (dx * dx + dy * dy).sqrt() > self.config.tap_threshold
    }
}

/// Final target of a tap: the armed candidate, else a fresh hit test at the
/// release point. Overlay hits are re-tested with the overlay transparent,
/// then climbed out of.
fn resolve_target(doc: &Document, candidate: Option<NodeId>, x: f64, y: f64) -> Option<NodeId> {
    let mut node = candidate.or_else(|| doc.element_from_point(x, y, HitTest::All))?;
    if doc.is_overlay(node) {
        node = doc
            .element_from_point(x, y, HitTest::SkipOverlay)
            .unwrap_or(node);
    }
    while doc.is_overlay(node) {
        node = doc.parent_element(node)?;
    }
    is_valid_candidate(doc, node).then_some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::Rect;

    struct Page {
        doc: Document,
        card: NodeId,
        link: NodeId,
        veil: NodeId,
        button: NodeId,
    }

    /// body 0..400; card 0..200 with link 10..60; transparent overlay 300..400
    /// with a button.
    fn page() -> Page {
        let mut doc = Document::new("example.com");
        let body = doc.body();
        doc.set_rect(body, Rect::new(0.0, 0.0, 400.0, 400.0)).unwrap();
        let card = doc.create_element(body, "div").unwrap();
        doc.set_rect(card, Rect::new(0.0, 0.0, 200.0, 200.0)).unwrap();
        let link = doc.create_element(card, "a").unwrap();
        doc.set_rect(link, Rect::new(10.0, 10.0, 50.0, 50.0)).unwrap();
        let veil = doc.create_element(body, "div").unwrap();
        doc.mark_overlay(veil).unwrap();
        doc.set_rect(veil, Rect::new(0.0, 300.0, 400.0, 100.0)).unwrap();
        let button = doc.create_element(veil, "button").unwrap();
        doc.mark_interactive(button).unwrap();
        doc.set_rect(button, Rect::new(0.0, 350.0, 50.0, 50.0)).unwrap();
        Page {
            doc,
            card,
            link,
            veil,
            button,
        }
    }

    #[test]
    fn tap_commits_node_under_initial_down() {
        let p = page();
        let mut tap = TapSelector::default();
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::down(20.0, 20.0)),
            GestureOutcome::Armed {
                candidate: Some(p.link)
            }
        );
        tap.process(&p.doc, &PointerEvent::moved(25.0, 28.0));
        // Release drifted onto the card but stays within the threshold.
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(30.0, 30.0)),
            GestureOutcome::Committed {
                node: p.link,
                prevent_default: true
            }
        );
        assert_eq!(tap.committed(), Some(p.link));
    }

    #[test]
    fn movement_beyond_threshold_is_a_scroll() {
        let p = page();
        let mut tap = TapSelector::default();
        tap.process(&p.doc, &PointerEvent::down(20.0, 20.0));
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::moved(20.0, 40.0)),
            GestureOutcome::Cancelled
        );
        assert_eq!(tap.state(), GestureState::MovedBeyondThreshold);
        // Even coming back near the start does not re-arm the tap.
        tap.process(&p.doc, &PointerEvent::moved(20.0, 21.0));
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(20.0, 21.0)),
            GestureOutcome::ScrollEnded
        );
        assert_eq!(tap.state(), GestureState::Idle);
        assert_eq!(tap.committed(), None);
    }

    #[test]
    fn threshold_is_euclidean_and_inclusive() {
        let p = page();
        let mut tap = TapSelector::default();
        tap.process(&p.doc, &PointerEvent::down(20.0, 20.0));
        // 9-12-15 triangle: exactly on the threshold still counts as a tap.
        assert!(matches!(
            tap.process(&p.doc, &PointerEvent::up(29.0, 32.0)),
            GestureOutcome::Committed { .. }
        ));

        tap.process(&p.doc, &PointerEvent::down(20.0, 20.0));
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(31.0, 31.0)),
            GestureOutcome::ScrollEnded
        );
    }

    #[test]
    fn controls_are_left_alone_and_selection_is_kept() {
        let p = page();
        let mut tap = TapSelector::default();
        tap.process(&p.doc, &PointerEvent::down(100.0, 100.0));
        tap.process(&p.doc, &PointerEvent::up(100.0, 100.0));
        assert_eq!(tap.committed(), Some(p.card));

        let on_button = PointerEvent::down(10.0, 360.0);
        assert_eq!(tap.process(&p.doc, &on_button), GestureOutcome::Ignored);
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(10.0, 360.0).with_target(p.button)),
            GestureOutcome::Ignored
        );
        assert_eq!(tap.committed(), Some(p.card));
    }

    #[test]
    fn down_on_overlay_background_does_not_arm() {
        let p = page();
        let mut tap = TapSelector::default();
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::down(200.0, 320.0)),
            GestureOutcome::Ignored
        );
        assert_eq!(tap.state(), GestureState::Idle);
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(200.0, 320.0)),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn fallback_hit_test_sees_through_overlay() {
        let p = page();
        let mut tap = TapSelector::default();
        // Host reported no target on down (e.g. a shadow root boundary).
        tap.state = GestureState::ArmedCandidate {
            candidate: None,
            start_x: 200.0,
            start_y: 320.0,
        };
        let resolved = tap.process(&p.doc, &PointerEvent::up(200.0, 320.0).with_target(p.veil));
        // The body is the only page content under the overlay: not selectable.
        assert_eq!(
            resolved,
            GestureOutcome::Missed {
                prevent_default: true
            }
        );
        assert_eq!(resolve_target(&p.doc, Some(p.veil), 100.0, 350.0), None);
        assert_eq!(resolve_target(&p.doc, None, 20.0, 20.0), Some(p.link));
    }

    #[test]
    fn tap_on_body_misses() {
        let p = page();
        let mut tap = TapSelector::default();
        tap.process(&p.doc, &PointerEvent::down(300.0, 250.0));
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(300.0, 250.0)),
            GestureOutcome::Missed {
                prevent_default: true
            }
        );
    }

    #[test]
    fn multi_touch_never_selects() {
        let p = page();
        let mut tap = TapSelector::default();
        tap.process(&p.doc, &PointerEvent::down(20.0, 20.0).with_pointers(2));
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(20.0, 20.0)),
            GestureOutcome::ScrollEnded
        );

        tap.process(&p.doc, &PointerEvent::down(20.0, 20.0));
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::moved(20.0, 20.0).with_pointers(2)),
            GestureOutcome::Cancelled
        );
        assert_eq!(tap.committed(), None);
    }

    #[test]
    fn cancel_disarms() {
        let p = page();
        let mut tap = TapSelector::default();
        tap.process(&p.doc, &PointerEvent::down(20.0, 20.0));
        assert_eq!(tap.process(&p.doc, &PointerEvent::cancel()), GestureOutcome::Cancelled);
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(20.0, 20.0)),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn release_on_control_ends_armed_gesture() {
        let p = page();
        let mut tap = TapSelector::default();
        tap.process(&p.doc, &PointerEvent::down(20.0, 20.0));
        assert!(matches!(tap.state(), GestureState::ArmedCandidate { .. }));

        let up = PointerEvent::up(20.0, 20.0).with_target(p.button);
        assert_eq!(tap.process(&p.doc, &up), GestureOutcome::Ignored);
        assert_eq!(tap.state(), GestureState::Idle);

        // A later stray release does not commit the old candidate.
        assert_eq!(
            tap.process(&p.doc, &PointerEvent::up(20.0, 20.0)),
            GestureOutcome::Ignored
        );
        assert_eq!(tap.committed(), None);
    }
}
