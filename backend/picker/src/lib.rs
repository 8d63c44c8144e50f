//! Element picking: tap-to-select gestures, ancestor widening, panel
//! dragging, and selector synthesis for the picked element.

pub mod drag;
pub mod gesture;
pub mod level;
pub mod synthesizer;

pub use drag::{DragOutcome, PanelDrag, Viewport, DRAG_THRESHOLD};
pub use gesture::{
    GestureConfig, GestureOutcome, GestureState, PointerEvent, PointerPhase, TapSelector,
    TAP_THRESHOLD,
};
pub use level::{ancestor_at_level, max_level};
pub use synthesizer::{
    is_stable_class, is_stable_id, is_unique_match, is_valid_candidate, synthesize,
    SynthesisMode, DEFAULT_MAX_DEPTH, HIGHLIGHT_CLASS,
};
