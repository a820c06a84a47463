//! Touch and scroll interaction tracking
//!
//! Raw pointer samples from the host platform become semantic interaction
//! records (tap, long-press, swipe, pinch, scroll depth). Records are
//! buffered locally and forwarded to the event pipeline in bulk so that
//! high-frequency sampling never turns into per-sample dispatch decisions.
//!
//! - [`GestureClassifier`] is the synchronous state machine
//! - [`GestureTracker`] runs it on a task and owns its long-press timer
//! - [`GestureHandle`] is what platform callbacks talk to

mod classifier;
mod scroll;
mod tracker;

pub use classifier::{
    classify, Classification, GestureClassifier, LongPressTimer, Motion, TouchPoint, TouchState,
};
pub use scroll::{scroll_depth, ScrollDepthTable};
pub use tracker::{GestureHandle, GestureTracker};
