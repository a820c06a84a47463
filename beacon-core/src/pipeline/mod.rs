//! Event pipeline
//!
//! Producers hand records to a [`PipelineHandle`]; a single background task
//! owns the [`Dispatcher`] and its queue, so no lock guards pending records.
//!
//! ## Architecture
//!
//! ```text
//! collectors ──enqueue──┐
//! gesture tracker ──────┼──→ mpsc ──→ [dispatcher task] ──flush──→ Transport
//! flush()/shutdown() ───┘              ↑ interval tick
//! send_immediate() ─────────────────────────────────────────────→ Transport
//!        └── on failure ──→ mpsc (requeue)
//! ```
//!
//! A flush runs when:
//! - the queue length reaches `max_queue_size`
//! - the `flush_interval` timer ticks
//! - [`PipelineHandle::flush`] is called
//! - the pipeline shuts down
//!
//! Commands arriving while a flush is awaiting the network stay in the
//! channel and land in the next cycle.

mod dispatcher;
mod outbound;
mod queue;

pub use dispatcher::{Dispatcher, FlushReport, PublishStats};
pub use outbound::BeforeSend;
pub use queue::{group_by_category, Queue, QueueEntry};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{Category, Record};

use outbound::Outbound;

/// Result of [`PipelineHandle::send_immediate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Delivered directly
    Sent,
    /// Direct send failed; the record waits in the queue for retry
    Queued,
    /// Dropped by the `before_send` hook
    Vetoed,
    /// The pipeline is disabled or already shut down
    Discarded,
}

enum Command {
    Enqueue(QueueEntry),
    Flush(oneshot::Sender<FlushReport>),
    Shutdown,
}

/// Cheap, cloneable producer side of a pipeline
///
/// Every method is safe to call from any thread and never fails; a handle
/// of a disabled or shut-down pipeline silently discards records.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: Option<mpsc::UnboundedSender<Command>>,
    outbound: Arc<Outbound>,
}

impl PipelineHandle {
    /// Append a record under the given category; returns immediately
    pub fn enqueue(&self, category: Category, record: Record) {
        self.send(Command::Enqueue(QueueEntry::new(category, record)));
    }

    /// Append a record under its own category
    pub fn submit(&self, record: Record) {
        self.enqueue(record.category(), record);
    }

    /// Flush now and wait for every group to settle
    pub async fn flush(&self) -> FlushReport {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Flush(reply)) {
            return FlushReport::default();
        }
        rx.await.unwrap_or_default()
    }

    /// Send a record right away, bypassing the queue
    ///
    /// Used for errors and crashes that may precede process termination.
    /// A failed attempt falls back to the queue with a fresh retry count.
    pub async fn send_immediate(&self, record: Record) -> Delivery {
        if !self.is_active() {
            return Delivery::Discarded;
        }

        let category = record.category();
        let Some(record) = self.outbound.screen(record) else {
            tracing::debug!(category = %category, "Immediate record vetoed by before_send");
            return Delivery::Vetoed;
        };

        match self.outbound.send_single(category, &record).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    error = %e,
                    "Immediate send failed, queueing for retry"
                );
                if self.send(Command::Enqueue(QueueEntry::screened(category, record))) {
                    Delivery::Queued
                } else {
                    Delivery::Discarded
                }
            }
        }
    }

    /// Whether records sent through this handle can still reach the queue
    pub fn is_active(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn send(&self, command: Command) -> bool {
        match &self.tx {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        }
    }
}

/// A running event pipeline
///
/// Must be started from within a Tokio runtime.
pub struct Pipeline {
    handle: PipelineHandle,
    task: Option<JoinHandle<PublishStats>>,
}

impl Pipeline {
    /// Validate the configuration and start the dispatcher task
    ///
    /// A disabled configuration yields a pipeline whose handles discard
    /// everything and which runs no timer.
    pub fn start(
        config: &PipelineConfig,
        transport: Arc<dyn Transport>,
        before_send: Option<BeforeSend>,
    ) -> Result<Self> {
        config.validate()?;

        let outbound = Arc::new(Outbound::new(config, transport, before_send));

        if !config.enabled {
            tracing::info!("Pipeline disabled, records will be discarded");
            return Ok(Self {
                handle: PipelineHandle { tx: None, outbound },
                task: None,
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(config, outbound.clone());
        let task = tokio::spawn(run(dispatcher, rx, config.flush_interval()));

        tracing::info!(
            flush_interval_ms = config.flush_interval_ms,
            max_queue_size = config.max_queue_size,
            "Pipeline started"
        );

        Ok(Self {
            handle: PipelineHandle {
                tx: Some(tx),
                outbound,
            },
            task: Some(task),
        })
    }

    /// A producer handle for this pipeline
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Stop the flush timer, run one final flush and return the totals
    ///
    /// Records submitted before this call are part of the final flush.
    pub async fn shutdown(self) -> PublishStats {
        let Some(task) = self.task else {
            return PublishStats::default();
        };
        self.handle.send(Command::Shutdown);
        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "Pipeline task ended abnormally");
                PublishStats::default()
            }
        }
    }
}

async fn run(
    mut dispatcher: Dispatcher,
    mut rx: mpsc::UnboundedReceiver<Command>,
    flush_interval: Duration,
) -> PublishStats {
    let mut ticker = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Enqueue(entry)) => {
                    if dispatcher.push(entry) {
                        dispatcher.flush().await;
                    }
                }
                Some(Command::Flush(reply)) => {
                    let report = dispatcher.flush().await;
                    let _ = reply.send(report);
                }
                Some(Command::Shutdown) | None => break,
            },
            _ = ticker.tick() => {
                dispatcher.flush().await;
            }
        }
    }

    // Take whatever was submitted before shutdown, then one last flush
    rx.close();
    while let Ok(command) = rx.try_recv() {
        if let Command::Enqueue(entry) = command {
            dispatcher.push(entry);
        }
    }
    let report = dispatcher.flush().await;

    tracing::info!(
        sent = report.sent,
        abandoned = dispatcher.pending_count(),
        "Pipeline stopped"
    );

    dispatcher.stats().clone()
}
