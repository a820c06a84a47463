//! Dispatcher for batching and sending queued records
//!
//! The Dispatcher owns the pending queue. It groups entries by category on
//! each flush and sends them:
//! - `event` groups with more than one entry as a single batch request
//! - everything else as one request per entry
//!
//! Failed requests put their entries back with `retry_count + 1`; entries
//! past `max_retries` are dropped. Nothing is ever reported to producers.
//!
//! Only entries added since the last flush count toward the watermark.
//! Requeued entries wait for the next timer tick.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::transport::Endpoint;
use crate::types::{Category, Record};

use super::outbound::Outbound;
use super::queue::{group_by_category, Queue, QueueEntry};

/// Publishing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishStats {
    /// Records delivered successfully
    pub records_sent: usize,
    /// Records put back in the queue after a failed send
    pub records_requeued: usize,
    /// Records dropped after exhausting retries
    pub records_dropped: usize,
    /// Records vetoed by the `before_send` hook
    pub records_vetoed: usize,
    /// Number of API calls made
    pub api_calls: usize,
    /// Number of failed API calls
    pub api_failures: usize,
}

/// Outcome of one flush
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub requeued: usize,
    pub dropped: usize,
    pub vetoed: usize,
}

impl FlushReport {
    /// Number of entries the flush took out of the queue
    pub fn drained(&self) -> usize {
        self.sent + self.requeued + self.dropped + self.vetoed
    }
}

/// Owns the queue and turns it into transport calls
pub struct Dispatcher {
    outbound: Arc<Outbound>,
    queue: Queue,
    /// Entries pushed since the last flush
    fresh: usize,
    max_queue_size: usize,
    max_retries: u32,
    debug: bool,
    stats: PublishStats,
}

impl Dispatcher {
    pub(crate) fn new(config: &PipelineConfig, outbound: Arc<Outbound>) -> Self {
        Self {
            outbound,
            queue: Queue::new(),
            fresh: 0,
            max_queue_size: config.max_queue_size,
            max_retries: config.max_retries,
            debug: config.debug,
            stats: PublishStats::default(),
        }
    }

    /// Append a record
    ///
    /// Returns true once `max_queue_size` records arrived since the last
    /// flush. Entries waiting for a retry do not count.
    pub fn enqueue(&mut self, category: Category, record: Record) -> bool {
        self.push(QueueEntry::new(category, record))
    }

    pub(crate) fn push(&mut self, entry: QueueEntry) -> bool {
        self.queue.push(entry);
        self.fresh += 1;
        self.fresh >= self.max_queue_size
    }

    /// Send everything currently queued
    ///
    /// Resolves once every group has been sent or requeued.
    pub async fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        self.fresh = 0;
        let entries = self.queue.drain();
        if entries.is_empty() {
            return report;
        }

        let screened: Vec<QueueEntry> = entries
            .into_iter()
            .filter_map(|entry| self.screen(entry, &mut report))
            .collect();

        for (category, group) in group_by_category(screened) {
            match Endpoint::batch_for(category) {
                Some(endpoint) if group.len() > 1 => {
                    self.send_batch(category, endpoint, group, &mut report)
                        .await
                }
                _ => {
                    for entry in group {
                        self.send_single(entry, &mut report).await;
                    }
                }
            }
        }

        self.stats.records_sent += report.sent;
        self.stats.records_requeued += report.requeued;
        self.stats.records_dropped += report.dropped;
        self.stats.records_vetoed += report.vetoed;

        tracing::debug!(
            sent = report.sent,
            requeued = report.requeued,
            dropped = report.dropped,
            vetoed = report.vetoed,
            pending = self.queue.len(),
            "Flushed queue"
        );

        report
    }

    fn screen(&self, entry: QueueEntry, report: &mut FlushReport) -> Option<QueueEntry> {
        if entry.screened {
            return Some(entry);
        }
        let QueueEntry {
            category,
            record,
            enqueued_at,
            retry_count,
            ..
        } = entry;
        match self.outbound.screen(record) {
            Some(record) => Some(QueueEntry {
                category,
                record,
                enqueued_at,
                retry_count,
                screened: true,
            }),
            None => {
                tracing::debug!(category = %category, "Record vetoed by before_send");
                report.vetoed += 1;
                None
            }
        }
    }

    async fn send_batch(
        &mut self,
        category: Category,
        endpoint: Endpoint,
        group: Vec<QueueEntry>,
        report: &mut FlushReport,
    ) {
        let records: Vec<&Record> = group.iter().map(|e| &e.record).collect();
        self.stats.api_calls += 1;

        match self.outbound.send_batch(endpoint, &records).await {
            Ok(()) => {
                report.sent += group.len();
            }
            Err(e) => {
                self.stats.api_failures += 1;
                tracing::warn!(
                    category = %category,
                    count = group.len(),
                    error = %e,
                    "Failed to send batch"
                );
                for entry in group {
                    self.requeue(entry, report);
                }
            }
        }
    }

    async fn send_single(&mut self, entry: QueueEntry, report: &mut FlushReport) {
        self.stats.api_calls += 1;

        match self.outbound.send_single(entry.category, &entry.record).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                self.stats.api_failures += 1;
                tracing::warn!(
                    category = %entry.category,
                    retry_count = entry.retry_count,
                    error = %e,
                    "Failed to send record"
                );
                self.requeue(entry, report);
            }
        }
    }

    fn requeue(&mut self, entry: QueueEntry, report: &mut FlushReport) {
        let category = entry.category;
        match entry.into_retry(self.max_retries) {
            Some(entry) => {
                self.queue.push(entry);
                report.requeued += 1;
            }
            None => {
                if self.debug {
                    tracing::info!(category = %category, "Dropping record after max retries");
                } else {
                    tracing::debug!(category = %category, "Dropping record after max retries");
                }
                report.dropped += 1;
            }
        }
    }

    /// Get current publishing statistics
    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    /// Get number of pending entries
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Retry counts of pending entries, in queue order
    pub fn pending_retry_counts(&self) -> Vec<u32> {
        self.queue.retry_counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::pipeline::outbound::BeforeSend;
    use crate::transport::Transport;
    use crate::types::{CrashReport, CustomEvent, RecordMeta, ScreenView};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockTransport {
        fail: AtomicBool,
        calls: Mutex<Vec<(Endpoint, serde_json::Value)>>,
    }

    impl MockTransport {
        fn calls(&self) -> Vec<(Endpoint, serde_json::Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, endpoint: Endpoint, payload: &serde_json::Value) -> Result<()> {
            self.calls.lock().unwrap().push((endpoint, payload.clone()));
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::Transport("API error (503): unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn dispatcher(transport: Arc<MockTransport>, before_send: Option<BeforeSend>) -> Dispatcher {
        let config = PipelineConfig {
            api_key: Some("key".to_string()),
            application_id: Some("app".to_string()),
            ..Default::default()
        };
        let outbound = Arc::new(Outbound::new(&config, transport, before_send));
        Dispatcher::new(&config, outbound)
    }

    fn event(name: &str) -> Record {
        Record::new(
            RecordMeta::now("s", None),
            CustomEvent {
                name: name.to_string(),
                properties: serde_json::Value::Null,
            },
        )
    }

    fn screen(name: &str) -> Record {
        Record::new(
            RecordMeta::now("s", None),
            ScreenView {
                screen: name.to_string(),
                previous_screen: None,
                duration_ms: None,
            },
        )
    }

    #[tokio::test]
    async fn test_events_batch_and_others_send_individually() {
        let transport = Arc::new(MockTransport::default());
        let mut dispatcher = dispatcher(transport.clone(), None);

        dispatcher.enqueue(Category::Event, event("a"));
        dispatcher.enqueue(Category::ScreenView, screen("home"));
        dispatcher.enqueue(Category::Event, event("b"));
        dispatcher.enqueue(Category::ScreenView, screen("cart"));

        let report = dispatcher.flush().await;
        assert_eq!(report.sent, 4);
        assert_eq!(dispatcher.pending_count(), 0);

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, Endpoint::EventBatch);
        let names: Vec<_> = calls[0].1["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(calls[1].0, Endpoint::ScreenViews);
        assert_eq!(calls[1].1["screen"], "home");
        assert_eq!(calls[2].1["screen"], "cart");
    }

    #[tokio::test]
    async fn test_single_event_uses_single_endpoint() {
        let transport = Arc::new(MockTransport::default());
        let mut dispatcher = dispatcher(transport.clone(), None);

        dispatcher.enqueue(Category::Event, event("only"));
        dispatcher.flush().await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Endpoint::Events);
        assert_eq!(calls[0].1["name"], "only");
    }

    #[tokio::test]
    async fn test_failed_batch_requeues_every_entry() {
        let transport = Arc::new(MockTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let mut dispatcher = dispatcher(transport.clone(), None);

        dispatcher.enqueue(Category::Event, event("a"));
        dispatcher.enqueue(Category::Event, event("b"));

        let report = dispatcher.flush().await;
        assert_eq!(report.requeued, 2);
        assert_eq!(dispatcher.pending_retry_counts(), vec![1, 1]);
        assert_eq!(dispatcher.stats().api_failures, 1);
    }

    #[tokio::test]
    async fn test_entries_dropped_after_max_retries() {
        let transport = Arc::new(MockTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let mut dispatcher = dispatcher(transport.clone(), None);

        dispatcher.enqueue(Category::Error, {
            Record::new(
                RecordMeta::now("s", None),
                CrashReport {
                    message: "boom".to_string(),
                    error_type: "Panic".to_string(),
                    stack_trace: None,
                    fatal: false,
                    context: serde_json::Value::Null,
                },
            )
        });

        for expected in 1..=3 {
            dispatcher.flush().await;
            assert_eq!(dispatcher.pending_retry_counts(), vec![expected]);
        }

        let report = dispatcher.flush().await;
        assert_eq!(report.dropped, 1);
        assert_eq!(dispatcher.pending_count(), 0);

        // Never reappears
        transport.fail.store(false, Ordering::SeqCst);
        assert_eq!(dispatcher.flush().await, FlushReport::default());
        assert_eq!(transport.calls().len(), 4);
        assert_eq!(dispatcher.stats().records_dropped, 1);
    }

    #[tokio::test]
    async fn test_veto_drops_without_retry() {
        let transport = Arc::new(MockTransport::default());
        let hook: BeforeSend = Arc::new(|record: Record| match &record.body {
            crate::types::RecordBody::Event(e) if e.name == "secret" => None,
            _ => Some(record),
        });
        let mut dispatcher = dispatcher(transport.clone(), Some(hook));

        dispatcher.enqueue(Category::Event, event("secret"));
        dispatcher.enqueue(Category::Event, event("public"));

        let report = dispatcher.flush().await;
        assert_eq!(report.vetoed, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(dispatcher.pending_count(), 0);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Endpoint::Events);
        assert_eq!(calls[0].1["name"], "public");
    }

    #[tokio::test]
    async fn test_enqueue_reports_watermark() {
        let transport = Arc::new(MockTransport::default());
        let mut dispatcher = dispatcher(transport, None);

        for i in 0..29 {
            assert!(!dispatcher.enqueue(Category::Event, event(&i.to_string())));
        }
        assert!(dispatcher.enqueue(Category::Event, event("30")));
    }

    #[tokio::test]
    async fn test_requeued_entries_do_not_count_toward_watermark() {
        let transport = Arc::new(MockTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let mut dispatcher = dispatcher(transport, None);

        for i in 0..30 {
            dispatcher.enqueue(Category::ScreenView, screen(&i.to_string()));
        }
        dispatcher.flush().await;
        assert_eq!(dispatcher.pending_count(), 30);

        for i in 0..29 {
            assert!(!dispatcher.enqueue(Category::Event, event(&i.to_string())));
        }
        assert!(dispatcher.enqueue(Category::Event, event("last")));
    }

    #[tokio::test]
    async fn test_flush_sends_each_record_once() {
        let transport = Arc::new(MockTransport::default());
        let mut dispatcher = dispatcher(transport.clone(), None);

        for i in 0..5 {
            dispatcher.enqueue(Category::ScreenView, screen(&format!("s{}", i)));
        }
        let report = dispatcher.flush().await;
        assert_eq!(report.sent, 5);
        assert_eq!(report.drained(), 5);

        let screens: Vec<_> = transport
            .calls()
            .iter()
            .map(|(_, p)| p["screen"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(screens, vec!["s0", "s1", "s2", "s3", "s4"]);
    }
}
