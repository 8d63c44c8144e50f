//! Dragging the overlay panels around the viewport.
//!
//! A press on a panel only becomes a drag once the pointer has travelled
//! past [`DRAG_THRESHOLD`] on either axis; shorter presses are reported as
//! [`DragOutcome::Released`] so the panel can treat them as clicks.

use tracing::trace;
use veil_core::{Document, Rect};

use crate::gesture::{PointerEvent, PointerPhase};

/// Per-axis travel (px) before a press turns into a drag.
pub const DRAG_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragOutcome {
    Ignored,
    /// Pressed; waiting for the threshold.
    Pending,
    /// Panel moved to the given top-left corner.
    Moved { x: f64, y: f64 },
    /// Drag finished at the given top-left corner.
    Ended { x: f64, y: f64 },
    /// Press released without dragging.
    Released,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    pointer_x: f64,
    pointer_y: f64,
    panel: Rect,
    dragging: bool,
    last: (f64, f64),
}

#[derive(Debug, Default)]
pub struct PanelDrag {
    press: Option<Press>,
}

impl PanelDrag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.press.is_some_and(|p| p.dragging)
    }

    /// Feed one pointer event aimed at the panel whose current box is `panel`.
    pub fn process(
        &mut self,
        doc: &Document,
        event: &PointerEvent,
        panel: Rect,
        viewport: Viewport,
    ) -> DragOutcome {
        match event.phase {
            PointerPhase::Down => {
                if event.pointer_count != 1
                    || event.target.is_some_and(|t| doc.is_interactive_control(t))
                {
                    return DragOutcome::Ignored;
                }
                self.press = Some(Press {
                    pointer_x: event.x,
                    pointer_y: event.y,
                    panel,
                    dragging: false,
                    last: (panel.x, panel.y),
                });
                DragOutcome::Pending
            }
            PointerPhase::Move => {
                let Some(press) = self.press.as_mut() else {
                    return DragOutcome::Ignored;
                };
                if event.pointer_count != 1 {
                    self.press = None;
                    return DragOutcome::Ignored;
                }
                let dx = event.x - press.pointer_x;
                let dy = event.y - press.pointer_y;
                if !press.dragging && dx.abs() <= DRAG_THRESHOLD && dy.abs() <= DRAG_THRESHOLD {
                    return DragOutcome::Pending;
                }
                press.dragging = true;
                let x = clamp_axis(press.panel.x + dx, press.panel.width, viewport.width);
                let y = clamp_axis(press.panel.y + dy, press.panel.height, viewport.height);
                press.last = (x, y);
                trace!(x, y, "Panel dragged");
                DragOutcome::Moved { x, y }
            }
            PointerPhase::Up | PointerPhase::Cancel => match self.press.take() {
                Some(press) if press.dragging => DragOutcome::Ended {
                    x: press.last.0,
                    y: press.last.1,
                },
                Some(_) if event.phase == PointerPhase::Up => DragOutcome::Released,
                _ => DragOutcome::Ignored,
            },
        }
    }
}

fn clamp_axis(position: f64, size: f64, limit: f64) -> f64 {
    position.clamp(0.0, (limit - size).max(0.0))
}
