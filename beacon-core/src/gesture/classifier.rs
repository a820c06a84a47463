//! Touch gesture classification
//!
//! A single-pointer state machine:
//!
//! ```text
//! Idle ──down──→ Pressed ──up──→ Idle        (tap, swipe or nothing)
//!                   │
//!                   └─deadline─→ LongPressFired ──up──→ Idle   (no second record)
//! ```
//!
//! Every input carries the instant it happened, so classification is a pure
//! function of the samples and the long-press deadline is plain data that
//! whoever drives the classifier waits on.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tokio::time::Instant;

use crate::config::GestureConfig;
use crate::session::SessionContext;
use crate::types::{
    GestureKind, Record, ScrollDirection, ScrollRecord, SwipeDirection, TouchRecord,
};

use super::scroll::{scroll_depth, ScrollDepthTable};

/// Where and when a touch went down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
    pub at: Instant,
    pub force: Option<f64>,
}

/// Pending long-press timer
///
/// Cancelled by dropping it together with the `Pressed` state that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPressTimer {
    pub deadline: Instant,
}

/// Lifecycle of the active pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchState {
    Idle,
    Pressed {
        start: TouchPoint,
        timer: LongPressTimer,
    },
    LongPressFired {
        start: TouchPoint,
    },
}

/// Result of comparing a touch-up against its touch-down
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    Tap,
    Swipe(SwipeDirection),
    /// Neither a clean tap nor a qualifying swipe
    Ambiguous,
}

/// Measurements of one resolved touch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub dx: f64,
    pub dy: f64,
    pub distance: f64,
    pub duration: Duration,
    /// px/ms
    pub velocity: f64,
}

impl Motion {
    pub fn between(start: (f64, f64), end: (f64, f64), duration: Duration) -> Self {
        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        let distance = dx.hypot(dy);
        // Millisecond clock granularity; keeps velocity finite
        let millis = (duration.as_secs_f64() * 1000.0).max(1.0);
        let velocity = distance / millis;
        Self {
            dx,
            dy,
            distance,
            duration,
            velocity,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Classify a completed touch
pub fn classify(motion: &Motion, config: &GestureConfig) -> Classification {
    if motion.distance < config.tap_max_distance && motion.duration < config.long_press() {
        return Classification::Tap;
    }
    if motion.distance >= config.swipe_min_distance && motion.velocity >= config.swipe_min_velocity
    {
        return Classification::Swipe(swipe_direction(motion.dx, motion.dy));
    }
    Classification::Ambiguous
}

/// Dominant axis decides left/right vs up/down; +y points down the screen
fn swipe_direction(dx: f64, dy: f64) -> SwipeDirection {
    if dx.abs() > dy.abs() {
        if dx > 0.0 {
            SwipeDirection::Right
        } else {
            SwipeDirection::Left
        }
    } else if dy > 0.0 {
        SwipeDirection::Down
    } else {
        SwipeDirection::Up
    }
}

/// Turns raw touch and scroll samples into interaction records
///
/// Emitted records collect in a local buffer; callers drain it into the
/// event queue with [`take_buffer`](Self::take_buffer) once
/// [`is_full`](Self::is_full) reports the bound was reached.
pub struct GestureClassifier {
    config: GestureConfig,
    session: Arc<SessionContext>,
    state: TouchState,
    screen: Option<String>,
    depths: ScrollDepthTable,
    last_scroll_y: f64,
    buffer: Vec<Record>,
    rng: Box<dyn RngCore + Send>,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig, session: Arc<SessionContext>) -> Self {
        Self::with_rng(config, session, StdRng::from_entropy())
    }

    /// Classifier with a caller-supplied sampling RNG
    pub fn with_rng(
        config: GestureConfig,
        session: Arc<SessionContext>,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        Self {
            config,
            session,
            state: TouchState::Idle,
            screen: None,
            depths: ScrollDepthTable::new(),
            last_scroll_y: 0.0,
            buffer: Vec::new(),
            rng: Box::new(rng),
        }
    }

    pub fn state(&self) -> TouchState {
        self.state
    }

    pub fn screen(&self) -> Option<&str> {
        self.screen.as_deref()
    }

    /// Activate a screen: its scroll high-water mark starts over
    ///
    /// Re-activating the screen that is already active changes nothing.
    pub fn set_screen(&mut self, screen: impl Into<String>) {
        let screen = screen.into();
        if self.screen.as_deref() == Some(screen.as_str()) {
            return;
        }
        self.depths.reset(&screen);
        self.last_scroll_y = 0.0;
        self.screen = Some(screen);
    }

    /// Deepest scroll seen on a screen since it was activated
    pub fn high_water(&self, screen: &str) -> u8 {
        self.depths.high_water(screen)
    }

    /// Touch-down: start a gesture and arm the long-press timer
    ///
    /// A touch-down while another gesture is active replaces it.
    pub fn touch_start(&mut self, x: f64, y: f64, force: Option<f64>, at: Instant) {
        let start = TouchPoint { x, y, at, force };
        self.state = TouchState::Pressed {
            start,
            timer: LongPressTimer {
                deadline: at + self.config.long_press(),
            },
        };
    }

    /// When the pending long-press timer fires, if one is armed
    pub fn long_press_deadline(&self) -> Option<Instant> {
        match self.state {
            TouchState::Pressed { timer, .. } => Some(timer.deadline),
            _ => None,
        }
    }

    /// Fire the long-press timer if it is due at `now`
    ///
    /// Returns true when the gesture resolved as a long-press (whether or not
    /// sampling kept the record).
    pub fn fire_long_press(&mut self, now: Instant) -> bool {
        let TouchState::Pressed { start, timer } = self.state else {
            return false;
        };
        if now < timer.deadline {
            return false;
        }

        self.state = TouchState::LongPressFired { start };

        if self.config.track_touches {
            let mut touch = self.touch(GestureKind::LongPress, start.x, start.y);
            touch.force = start.force;
            touch.duration_ms = Some(self.config.long_press_ms);
            self.emit_touch(touch);
        }
        true
    }

    /// Touch-up: resolve the active gesture
    ///
    /// Returns the kind of record emitted, if any.
    pub fn touch_end(&mut self, x: f64, y: f64, at: Instant) -> Option<GestureKind> {
        // A timer that came due before this touch-up resolves first
        self.fire_long_press(at);

        let state = std::mem::replace(&mut self.state, TouchState::Idle);
        let start = match state {
            TouchState::Pressed { start, .. } => start,
            TouchState::LongPressFired { .. } | TouchState::Idle => return None,
        };

        let motion = Motion::between(
            (start.x, start.y),
            (x, y),
            at.saturating_duration_since(start.at),
        );

        match classify(&motion, &self.config) {
            Classification::Tap if self.config.track_touches => {
                let mut touch = self.touch(GestureKind::Tap, x, y);
                touch.force = start.force;
                touch.duration_ms = Some(motion.duration_ms());
                self.emit_touch(touch).then_some(GestureKind::Tap)
            }
            Classification::Swipe(direction) if self.config.track_gestures => {
                let mut touch = self.touch(GestureKind::Swipe, start.x, start.y);
                touch.direction = Some(direction);
                touch.distance = Some(motion.distance);
                touch.velocity = Some(motion.velocity);
                touch.duration_ms = Some(motion.duration_ms());
                self.emit_touch(touch).then_some(GestureKind::Swipe)
            }
            _ => None,
        }
    }

    /// Drop the active gesture and its timer without emitting anything
    pub fn cancel(&mut self) {
        self.state = TouchState::Idle;
    }

    /// Explicit two-finger pinch report
    pub fn pinch(&mut self, scale: f64, x: f64, y: f64) -> bool {
        if !self.config.track_gestures {
            return false;
        }
        let mut touch = self.touch(GestureKind::Pinch, x, y);
        touch.scale = Some(scale);
        self.emit_touch(touch)
    }

    /// Scroll sample; emits a record only when the active screen's
    /// high-water mark rises. Returns the new depth when emitted.
    pub fn scroll(&mut self, scroll_y: f64, content_height: f64, viewport_height: f64) -> Option<u8> {
        if !self.config.track_scrolls {
            return None;
        }

        let direction = if scroll_y > self.last_scroll_y {
            ScrollDirection::Down
        } else {
            ScrollDirection::Up
        };
        self.last_scroll_y = scroll_y;

        let depth = scroll_depth(scroll_y, content_height, viewport_height);
        let key = self.screen.clone().unwrap_or_default();
        if !self.depths.observe(&key, depth) {
            return None;
        }

        let record = self.session.record(ScrollRecord {
            screen: self.screen.clone(),
            depth,
            direction,
            scroll_y,
        });
        self.buffer.push(record);
        Some(depth)
    }

    /// Whether the local buffer reached its bound
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.config.buffer_size
    }

    pub fn buffered(&self) -> &[Record] {
        &self.buffer
    }

    /// Take every buffered record
    pub fn take_buffer(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.buffer)
    }

    fn touch(&self, gesture: GestureKind, x: f64, y: f64) -> TouchRecord {
        let mut touch = TouchRecord::at(gesture, x, y);
        touch.screen = self.screen.clone();
        touch
    }

    /// Apply sampling, then buffer; returns whether the record was kept
    fn emit_touch(&mut self, touch: TouchRecord) -> bool {
        let draw: f64 = self.rng.gen();
        if draw > self.config.touch_sampling {
            tracing::trace!(gesture = touch.gesture.as_str(), "Touch record sampled out");
            return false;
        }
        let record = self.session.record(touch);
        self.buffer.push(record);
        true
    }
}
