//! Background driver for the gesture classifier.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::pipeline::PipelineHandle;
use crate::types::Category;

use super::classifier::GestureClassifier;

enum GestureInput {
    TouchStart {
        x: f64,
        y: f64,
        force: Option<f64>,
        at: Instant,
    },
    TouchEnd {
        x: f64,
        y: f64,
        at: Instant,
    },
    Pinch {
        scale: f64,
        x: f64,
        y: f64,
    },
    Scroll {
        scroll_y: f64,
        content_height: f64,
        viewport_height: f64,
    },
    Screen(String),
    Flush(oneshot::Sender<usize>),
    Shutdown,
}

/// Platform-facing side of a [`GestureTracker`]
///
/// Callbacks are timestamped when called and never block.
#[derive(Clone)]
pub struct GestureHandle {
    tx: mpsc::UnboundedSender<GestureInput>,
}

impl GestureHandle {
    pub fn on_touch_start(&self, x: f64, y: f64, force: Option<f64>) {
        self.send(GestureInput::TouchStart {
            x,
            y,
            force,
            at: Instant::now(),
        });
    }

    pub fn on_touch_end(&self, x: f64, y: f64) {
        self.send(GestureInput::TouchEnd {
            x,
            y,
            at: Instant::now(),
        });
    }

    pub fn on_pinch(&self, scale: f64, x: f64, y: f64) {
        self.send(GestureInput::Pinch { scale, x, y });
    }

    pub fn on_scroll(&self, scroll_y: f64, content_height: f64, viewport_height: f64) {
        self.send(GestureInput::Scroll {
            scroll_y,
            content_height,
            viewport_height,
        });
    }

    /// Make `screen` the active screen for subsequent records
    pub fn set_screen(&self, screen: impl Into<String>) {
        self.send(GestureInput::Screen(screen.into()));
    }

    /// Forward buffered records to the event queue now
    ///
    /// Returns the number of records forwarded.
    pub async fn flush(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(GestureInput::Flush(reply)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    fn send(&self, input: GestureInput) {
        // A stopped tracker drops late samples
        let _ = self.tx.send(input);
    }
}

/// Runs a [`GestureClassifier`] on its own task
///
/// The task owns the classifier (and so the scroll-depth table), waits on the
/// classifier's long-press deadline, and forwards its buffer to the pipeline
/// when the buffer fills, on every `flush_interval` tick and at shutdown.
pub struct GestureTracker {
    handle: GestureHandle,
    task: JoinHandle<()>,
}

impl GestureTracker {
    /// Spawn the tracker task; must be called within a Tokio runtime
    pub fn start(
        classifier: GestureClassifier,
        pipeline: PipelineHandle,
        flush_interval: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(classifier, rx, pipeline, flush_interval));
        Self {
            handle: GestureHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> GestureHandle {
        self.handle.clone()
    }

    /// Cancel any pending long-press and forward what is buffered
    pub async fn shutdown(self) {
        self.handle.send(GestureInput::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Gesture tracker ended abnormally");
        }
    }
}

async fn run(
    mut classifier: GestureClassifier,
    mut rx: mpsc::UnboundedReceiver<GestureInput>,
    pipeline: PipelineHandle,
    flush_interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let long_press = sleep_until(classifier.long_press_deadline());

        tokio::select! {
            biased;

            _ = long_press => {
                classifier.fire_long_press(Instant::now());
            }
            input = rx.recv() => match input {
                Some(GestureInput::TouchStart { x, y, force, at }) => {
                    classifier.touch_start(x, y, force, at);
                }
                Some(GestureInput::TouchEnd { x, y, at }) => {
                    classifier.touch_end(x, y, at);
                }
                Some(GestureInput::Pinch { scale, x, y }) => {
                    classifier.pinch(scale, x, y);
                }
                Some(GestureInput::Scroll { scroll_y, content_height, viewport_height }) => {
                    classifier.scroll(scroll_y, content_height, viewport_height);
                }
                Some(GestureInput::Screen(screen)) => {
                    classifier.set_screen(screen);
                }
                Some(GestureInput::Flush(reply)) => {
                    let _ = reply.send(forward(&mut classifier, &pipeline));
                }
                Some(GestureInput::Shutdown) | None => break,
            },
            _ = ticker.tick() => {
                forward(&mut classifier, &pipeline);
            }
        }

        if classifier.is_full() {
            forward(&mut classifier, &pipeline);
        }
    }

    classifier.cancel();
    let forwarded = forward(&mut classifier, &pipeline);
    tracing::debug!(forwarded, "Gesture tracker stopped");
}

/// Wait for the deadline, or forever when no timer is armed
fn sleep_until(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

/// Move the classifier's buffer into the event queue
fn forward(classifier: &mut GestureClassifier, pipeline: &PipelineHandle) -> usize {
    let records = classifier.take_buffer();
    let count = records.len();
    for record in records {
        pipeline.enqueue(Category::Interaction, record);
    }
    if count > 0 {
        tracing::trace!(count, "Forwarded interaction records");
    }
    count
}
